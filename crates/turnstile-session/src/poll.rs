use std::{fmt::Display, future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Run `round` repeatedly at a fixed pace until `cancel` fires.
///
/// Each round runs concurrently with an `interval` sleep; the next round starts once both are
/// done, so a slow round delays the next one instead of overlapping it. A failed round is logged
/// and does not stop the loop. Cancellation drops the round in flight.
///
/// Returns how many rounds were started.
pub async fn poll_loop<R, Fut, E>(
    interval: Duration,
    cancel: CancellationToken,
    mut round: R,
) -> u64
where
    R: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut rounds = 0;
    while !cancel.is_cancelled() {
        rounds += 1;
        let current = rounds;
        let work = round();
        let paced = async {
            let (result, ()) = tokio::join!(work, tokio::time::sleep(interval));
            if let Err(err) = result {
                error!(round = current, error = %err, "poll round failed");
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = paced => {}
        }
    }

    debug!(rounds, "poll loop stopped");
    rounds
}
