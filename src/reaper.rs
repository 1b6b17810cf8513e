use crate::store::EndpointRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Periodic background sweep that evicts idle and over-age endpoints.
pub struct Reaper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Starts the sweep. The first tick fires one `period` after spawning.
    pub fn spawn(registry: Arc<EndpointRegistry>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(registry, period, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stops the timer and waits for the task to finish. A tick already in
    /// progress runs to completion.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "reaper task ended abnormally");
        }
    }
}

async fn run(
    registry: Arc<EndpointRegistry>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs_f64(), "reaper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(&registry).await;
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    info!("reaper stopped");
}

/// One sweep: captures the time once and evicts everything expired as of
/// then. Returns how many endpoints were evicted. The whole sweep runs in its
/// own task, so a failure anywhere in it is logged and reported as zero.
pub async fn tick(registry: &Arc<EndpointRegistry>) -> usize {
    let sweep = {
        let registry = Arc::clone(registry);
        tokio::spawn(async move {
            if registry.is_empty().await {
                return Vec::new();
            }
            let now = registry.now();
            registry.evict_expired(now).await
        })
    };

    match sweep.await {
        Ok(evicted) if evicted.is_empty() => {
            debug!("reaper found nothing to evict");
            0
        }
        Ok(evicted) => {
            info!(count = evicted.len(), "reaper evicted expired endpoints");
            evicted.len()
        }
        Err(e) => {
            error!(error = %e, "reaper tick failed");
            0
        }
    }
}
