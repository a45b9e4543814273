//! Session lifecycle states.

use std::fmt;

/// Position of a session in its lifecycle.
///
/// Sessions move strictly forward:
/// `Connected → AwaitVersion → ConfigDelivered → Active → Closed`.
/// [`SessionState::Error`] can be entered from any state. Both `Closed` and
/// `Error` are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// The endpoint has been upgraded; nothing has been read yet.
    #[default]
    Connected,
    /// Waiting for the station's version announcement.
    AwaitVersion,
    /// The version was received and the router configuration is being sent.
    ConfigDelivered,
    /// The message loop is running.
    Active,
    /// The session ended normally.
    Closed,
    /// The session ended because of a transport or protocol failure.
    Error,
}

impl SessionState {
    /// Returns `true` for `Closed` and `Error`.
    #[must_use]
    pub const fn is_terminal(self) -> bool { matches!(self, Self::Closed | Self::Error) }

    fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::AwaitVersion => "await_version",
            Self::ConfigDelivered => "config_delivered",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
