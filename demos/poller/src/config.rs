use std::{env, str::FromStr, time::Duration};

use anyhow::Context;
use turnstile_model::{GateConfig, PoolConfig};
use turnstile_observe::{LoggerConfig, LoggerFormat};

/// Demo settings, read from `POLLER_*` environment variables.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub logger: LoggerConfig,
    pub pool: PoolConfig,
    pub gate: GateConfig,
    pub interval: Duration,
    /// Write operations submitted per round.
    pub actions: usize,
    /// Probes a simulated session survives before the portal drops it.
    pub session_lifetime: u32,
}

impl PollerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let format: LoggerFormat = var("POLLER_LOG_FORMAT", LoggerFormat::Text)?;
        let level = env::var("POLLER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let pool = PoolConfig::default()
            .with_workers(var("POLLER_WORKERS", 2)?)
            .with_timeout_ms(var("POLLER_TASK_TIMEOUT_MS", 1_000)?);
        let gate = GateConfig::new(var("POLLER_GATE_IDLE_MS", 120_000)?);

        Ok(Self {
            logger: LoggerConfig::default().with_format(format).with_level(level),
            pool,
            gate,
            interval: Duration::from_millis(var("POLLER_INTERVAL_MS", 1_000)?),
            actions: var("POLLER_ACTIONS", 3)?,
            session_lifetime: var("POLLER_SESSION_LIFETIME", 4)?,
        })
    }
}

fn var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
