//! Runtime control for [`StationServer`].

mod accept;

use std::future::Future;

use accept::{AcceptLoopOptions, accept_loop};
use log::{info, warn};
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, ServerError, StationServer, connection::ConnectionOptions};
use crate::hooks::NetworkServer;

impl<S: NetworkServer> StationServer<S, Bound> {
    /// Run the server until Ctrl+C is received.
    ///
    /// ```no_run
    /// # use basicstation::server::{ServerError, StationServer};
    /// # async fn demo<S: basicstation::hooks::NetworkServer>(network: S) -> Result<(), ServerError> {
    /// StationServer::new(network)
    ///     .bind(([0, 0, 0, 0], 6038).into())?
    ///     .run()
    ///     .await
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors; the `Result` is reserved for setup failures.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// On shutdown the accept loop stops, every live session is cancelled,
    /// and this call returns once all connection tasks have finished.
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors; the `Result` is reserved for setup failures.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let StationServer {
            network,
            session_config,
            discovery_config,
            handshake_timeout,
            backoff_config,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        if let Ok(addr) = listener.local_addr() {
            info!("station server listening: local_addr={addr}");
        }

        tracker.spawn(accept_loop(
            listener,
            AcceptLoopOptions {
                connection: ConnectionOptions {
                    network,
                    session: session_config,
                    discovery: discovery_config,
                    handshake_timeout,
                    shutdown: shutdown_token.clone(),
                },
                shutdown: shutdown_token.clone(),
                tracker: tracker.clone(),
                backoff: backoff_config,
            },
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        info!("station server stopped");
        Ok(())
    }
}
