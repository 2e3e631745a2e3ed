use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use turnstile_core::{Subscribe, WorkerPoolQueue};
use turnstile_observe::{Journal, logger_init};
use turnstile_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
use turnstile_session::{AccessToken, SessionGuard, poll_loop};

mod config;
mod portal;

use config::PollerConfig;
use portal::{SimulatedPortal, SimulatedTokenEndpoint};

type Guard = SessionGuard<SimulatedPortal>;
type Token = AccessToken<SimulatedTokenEndpoint>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Config + logger
    let cfg = PollerConfig::from_env()?;
    logger_init(&cfg.logger)?;
    info!(?cfg, "poller configured");

    // 2) Subscribers shared by every coordinator
    let metrics = PrometheusMetrics::new()?;
    let subscribers: Vec<Arc<dyn Subscribe>> =
        vec![Arc::new(Journal::new()), Arc::new(metrics.clone())];

    // 3) Session guard, token cache and the write-action pool
    let guard = Arc::new(SessionGuard::with_subscribers(
        SimulatedPortal::new(cfg.session_lifetime),
        cfg.gate.clone(),
        subscribers.clone(),
    )?);
    let token = Arc::new(AccessToken::with_subscribers(
        SimulatedTokenEndpoint::default(),
        subscribers.clone(),
    )?);
    let actions = Arc::new(WorkerPoolQueue::with_subscribers(
        cfg.pool.clone(),
        subscribers,
    )?);

    // 4) Poll until Ctrl+C
    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down...");
            stop.cancel();
        }
    });

    let count = cfg.actions;
    let rounds = poll_loop(cfg.interval, cancel, || {
        round(
            Arc::clone(&guard),
            Arc::clone(&token),
            Arc::clone(&actions),
            count,
        )
    })
    .await;
    info!(rounds, "poller stopped");

    // 5) Final metrics snapshot
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metrics.gather(), &mut buffer)?;
    print!("{}", String::from_utf8_lossy(&buffer));

    Ok(())
}

/// One poll round: make sure the session is alive, then race the write actions through the pool.
async fn round(
    guard: Arc<Guard>,
    token: Arc<Token>,
    actions: Arc<WorkerPoolQueue>,
    count: usize,
) -> anyhow::Result<()> {
    let session = guard.ensure().await?;
    let bearer = token.get().await?;

    let handles: Vec<_> = (0..count)
        .map(|slot| tokio::spawn(actions.enqueue(act(slot, session.generation))))
        .collect();

    for handle in handles {
        match handle.await? {
            Ok(slot) => info!(slot, session = session.generation, %bearer, "action done"),
            Err(slot) => warn!(slot, "action rejected by portal"),
        }
    }
    Ok(())
}

/// Simulated write operation; later slots take longer, the last ones overrun the task timeout.
async fn act(slot: usize, generation: u64) -> Result<usize, usize> {
    tokio::time::sleep(Duration::from_millis(200 + 450 * slot as u64)).await;
    if (slot as u64 + generation) % 5 == 4 {
        return Err(slot);
    }
    Ok(slot)
}
