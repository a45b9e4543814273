//! Outbound half of an active session.
//!
//! Server-initiated frames are queued on a bounded channel and written by a
//! dedicated task, so a slow or blocked write never stalls the receive loop
//! and the receive loop never delays a write.

use std::{sync::Arc, time::Duration};

use futures::{Sink, SinkExt};
use log::{debug, warn};
use tokio::{
    select,
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use super::{SessionStats, WriteError};
use crate::{
    eui::Eui,
    metrics::{self, Direction},
    transport::{WsError, WsMessage},
};

/// Upper bound on the close handshake once a session is over.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A queued text frame and the channel its write result is reported on.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub(crate) frame: String,
    pub(crate) kind: &'static str,
    pub(crate) ack: oneshot::Sender<Result<(), WriteError>>,
}

/// Returned when a write failed and the connection must be torn down.
#[derive(Debug)]
pub(crate) struct WriterFailed;

/// Drain `rx` into `sink` until cancelled or every sender is gone.
///
/// Every frame taken off the queue is counted in `stats` here, whether or not
/// its caller is still waiting for the result. A failed write cancels
/// `cancel`, ending the session. Frames still queued when the writer stops
/// are counted as writes without a connection. The sink is closed before
/// returning.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub(crate) async fn run_writer<K>(
    mut sink: K,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    eui: Eui,
    stats: Arc<SessionStats>,
) -> Result<(), WriterFailed>
where
    K: Sink<WsMessage, Error = WsError> + Unpin,
{
    let result = loop {
        let outbound = select! {
            biased;

            () = cancel.cancelled() => break Ok(()),
            next = rx.recv() => match next {
                Some(outbound) => outbound,
                None => break Ok(()),
            },
        };
        let Outbound { frame, kind, ack } = outbound;
        match sink.send(WsMessage::Text(frame)).await {
            Ok(()) => {
                stats.record_write_ok();
                metrics::inc_frames(Direction::Outbound, kind);
                report(ack, Ok(()), eui);
            }
            Err(e) => {
                stats.record_write_err();
                warn!("write failed: eui={eui}, error={e}, kind={kind}");
                report(ack, Err(WriteError::Transport(e)), eui);
                cancel.cancel();
                break Err(WriterFailed);
            }
        }
    };
    rx.close();
    while let Ok(Outbound { kind, ack, .. }) = rx.try_recv() {
        stats.record_write_no_conn();
        debug!("queued write dropped: eui={eui}, kind={kind}");
        report(ack, Err(WriteError::NoConnection), eui);
    }
    close_sink(&mut sink, eui).await;
    result
}

fn report(ack: oneshot::Sender<Result<(), WriteError>>, result: Result<(), WriteError>, eui: Eui) {
    if ack.send(result).is_err() {
        debug!("write result unobserved: eui={eui}");
    }
}

/// Send a close frame, giving up after [`CLOSE_TIMEOUT`].
pub(crate) async fn close_sink<K>(sink: &mut K, eui: Eui)
where
    K: Sink<WsMessage, Error = WsError> + Unpin,
{
    match timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("close failed: eui={eui}, error={e}"),
        Err(_) => debug!("close timed out: eui={eui}"),
    }
}
