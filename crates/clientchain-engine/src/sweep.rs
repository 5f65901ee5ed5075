//! Reconciliation sweep — resumes dormant executions whose time has come.
//!
//! This is what gives `wait` actions elapsed-time semantics without a timer
//! per execution. The sweep is safe at any interval: a missed run only
//! delays progress.

use clientchain_core::error::Result;
use clientchain_policy::Clock;
use std::sync::Arc;

use crate::runner::ExecutionRunner;

impl ExecutionRunner {
    /// Advance every running execution due at or before now. Failures are
    /// isolated per execution; one bad row never stops the rest. Returns how
    /// many executions were picked up.
    pub async fn sweep_due(&self, clock: &dyn Clock) -> Result<usize> {
        let due = self.store().due_executions(clock.now())?;
        if due.is_empty() {
            return Ok(0);
        }
        tracing::debug!("🔄 Sweep found {} due execution(s)", due.len());

        let mut processed = 0;
        for id in &due {
            match self.advance(id).await {
                Ok(()) => processed += 1,
                Err(e) => tracing::warn!("⚠️ Sweep: advancing execution {id} failed: {e}"),
            }
        }
        Ok(processed)
    }
}

/// Background sweeper loop. Runs until the process exits.
pub fn spawn_sweeper(
    runner: Arc<ExecutionRunner>,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match runner.sweep_due(clock.as_ref()).await {
                Ok(0) => {}
                Ok(n) => tracing::info!("🔄 Sweep resumed {n} execution(s)"),
                Err(e) => tracing::error!("❌ Sweep failed: {e}"),
            }
        }
    })
}
