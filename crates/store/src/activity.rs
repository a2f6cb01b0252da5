//! Best-effort activity recording.
//!
//! A failed write is reported back to the caller and logged, but never turns
//! the surrounding operation into a failure.

use crm_core::types::{ActivityAction, NewActivity};
use std::sync::Arc;
use tracing::warn;

use crate::ActivityLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    Recorded(i64),
    Failed(String),
}

impl ActivityOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, ActivityOutcome::Recorded(_))
    }
}

#[derive(Clone)]
pub struct ActivityRecorder {
    log: Arc<dyn ActivityLog>,
    user_name: String,
}

impl ActivityRecorder {
    pub fn new(log: Arc<dyn ActivityLog>, user_name: impl Into<String>) -> Self {
        Self {
            log,
            user_name: user_name.into(),
        }
    }

    pub async fn record(
        &self,
        action: ActivityAction,
        target: impl Into<String>,
        details: serde_json::Value,
    ) -> ActivityOutcome {
        let entry = NewActivity {
            action,
            user_name: self.user_name.clone(),
            target: target.into(),
            details,
        };

        match self.log.append(entry).await {
            Ok(activity) => ActivityOutcome::Recorded(activity.id),
            Err(e) => {
                warn!(action = action.as_str(), error = %e, "Failed to record activity");
                metrics::counter!("activities.write_failures").increment(1);
                ActivityOutcome::Failed(e.to_string())
            }
        }
    }
}
