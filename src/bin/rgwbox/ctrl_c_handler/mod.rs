use rgwbox_rs::PipelineCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

/// Watch for Ctrl-C until `token` is cancelled.
///
/// The handle resolves to `true` when Ctrl-C was what cancelled the token,
/// `false` when the token was cancelled elsewhere (e.g. the drain finished).
pub fn spawn_ctrl_c_handler(token: PipelineCancellationToken) -> JoinHandle<bool> {
    tokio::spawn(async move {
        select! {
            _ = token.cancelled() => {
                debug!("ctrl-c handler stopped.");
                false
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received, cancelling the drain.");
                token.cancel();
                true
            }
        }
    })
}
