use crate::context::{BackupContext, CycleOutcome};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

struct Running {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Runs a backup cycle on start and then once per configured interval.
///
/// Two states: idle and running. `start` while running and `stop` while idle
/// do nothing. A cycle in progress is never cut short; `stop` waits for it.
pub struct BackupScheduler {
    context: Arc<BackupContext>,
    running: Mutex<Option<Running>>,
}

impl BackupScheduler {
    pub fn new(context: Arc<BackupContext>) -> Self {
        Self {
            context,
            running: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<BackupContext> {
        &self.context
    }

    /// Spawns the timer task on the current tokio runtime. Returns `false`
    /// if it was already running.
    ///
    /// The task's first cycle is not skipped by a `stop` that follows right
    /// away; `stop` waits for it.
    pub fn start(&self) -> bool {
        let mut running = self.lock();
        if running.is_some() {
            debug!("backup scheduler already running");
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(self.context.clone(), shutdown_rx));
        *running = Some(Running { handle, shutdown });
        self.context.set_scheduled(true);

        info!(
            "backup scheduler started, every {}s",
            self.context.config().interval_secs
        );
        true
    }

    /// Stops the timer after any in-flight cycle finishes. Returns `false`
    /// if it was not running.
    pub async fn stop(&self) -> bool {
        let running = self.lock().take();
        let Some(running) = running else {
            return false;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            warn!("backup scheduler task ended abnormally: {e}");
        }
        self.context.set_scheduled(false);

        info!("backup scheduler stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.lock().take() {
            let _ = running.shutdown.send(true);
            self.context.set_scheduled(false);
        }
    }
}

async fn run_loop(context: Arc<BackupContext>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(context.config().interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick completes immediately and runs even if `stop` was
    // already requested.
    ticker.tick().await;
    scheduled_cycle(&context).await;

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => scheduled_cycle(&context).await,
        }
    }
}

async fn scheduled_cycle(context: &BackupContext) {
    match context.run_cycle().await {
        Ok(CycleOutcome::Completed(report)) => {
            debug!("scheduled backup {} done", report.snapshot.id);
        }
        Ok(other) => debug!("scheduled backup: {other:?}"),
        Err(e) => error!("scheduled backup failed: {e}"),
    }
}
