//! Coalescing policy reload coordinator.
//!
//! Mutations call [`PolicyReloader::trigger`], which never blocks. Requests land in a single-slot
//! queue drained by one background worker. While a request is pending, further triggers are
//! dropped: the pending reload rereads current state, so it covers them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::casbin::PolicyEnforcer;
use super::policy::PolicySource;
use crate::error::ServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Queued; the worker will reload.
    Accepted,
    /// A reload is already pending and will cover this change.
    Coalesced,
    /// Enforcement is disabled; nothing to reload.
    Disabled,
    /// The worker has stopped.
    Closed,
}

#[derive(Debug, Clone)]
pub struct PolicyReloader {
    sender: Option<mpsc::Sender<()>>,
}

impl PolicyReloader {
    /// A reloader that ignores every trigger.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// ## Summary
    /// Starts the reload worker and returns the handle used to trigger it.
    ///
    /// The worker runs until every clone of the returned reloader has been dropped.
    pub fn spawn(
        enforcer: Arc<dyn PolicyEnforcer>,
        source: Arc<dyn PolicySource>,
        slow_reload_warn: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<()>(1);
        let worker = tokio::spawn(async move {
            tracing::debug!("Policy reload worker started");
            while receiver.recv().await.is_some() {
                let result =
                    reload_policy(enforcer.as_ref(), source.as_ref(), slow_reload_warn).await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Policy reload failed; keeping previous policy");
                }
            }
            tracing::debug!("Policy reload worker stopped");
        });
        (
            Self {
                sender: Some(sender),
            },
            worker,
        )
    }

    /// Requests a reload without waiting for it.
    pub fn trigger(&self) -> ReloadOutcome {
        let Some(sender) = &self.sender else {
            return ReloadOutcome::Disabled;
        };
        match sender.try_send(()) {
            Ok(()) => {
                tracing::trace!("Policy reload queued");
                ReloadOutcome::Accepted
            }
            Err(TrySendError::Full(())) => {
                tracing::debug!("Policy reload already pending; trigger coalesced");
                ReloadOutcome::Coalesced
            }
            Err(TrySendError::Closed(())) => {
                tracing::warn!("Policy reload worker is gone; trigger dropped");
                ReloadOutcome::Closed
            }
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }
}

/// ## Summary
/// Reads a fresh snapshot from `source` and swaps it into `enforcer`.
///
/// ## Errors
/// Returns the error of the snapshot read or of the policy compilation.
pub async fn reload_policy(
    enforcer: &dyn PolicyEnforcer,
    source: &dyn PolicySource,
    slow_reload_warn: Duration,
) -> ServiceResult<()> {
    let started = Instant::now();
    let snapshot = source.snapshot().await?;
    enforcer.load(snapshot).await?;

    let elapsed = started.elapsed();
    if elapsed > slow_reload_warn {
        tracing::warn!(elapsed_ms = elapsed.as_millis(), "Policy reload was slow");
    } else {
        tracing::info!(elapsed_ms = elapsed.as_millis(), "Policy reloaded");
    }
    Ok(())
}
