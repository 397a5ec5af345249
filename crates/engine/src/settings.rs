use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    poll::{PollPolicy, duration_secs},
    store::DEFAULT_MAX_RETAINED_EXECUTIONS,
};

/// Overall limit on one execution, measured from its start.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(300);
/// Generation limit passed to the summarization capability.
pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 1024;

/// Tunables of the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowSettings {
    pub poll: PollPolicy,
    #[serde(with = "duration_secs")]
    pub execution_timeout: Duration,
    pub summary_max_tokens: u32,
    /// Finished executions kept in memory before the oldest are evicted.
    pub max_retained_executions: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            summary_max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
            max_retained_executions: DEFAULT_MAX_RETAINED_EXECUTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings: WorkflowSettings = serde_json::from_str("{}").expect("parse");
        assert_eq!(settings, WorkflowSettings::default());
        assert_eq!(settings.poll.interval, Duration::from_secs(30));
        assert_eq!(settings.execution_timeout, Duration::from_secs(300));
        assert_eq!(settings.summary_max_tokens, 1024);
        assert_eq!(settings.max_retained_executions, 500);
    }

    #[test]
    fn retention_is_configurable() {
        let settings: WorkflowSettings = serde_json::from_str(r#"{ "maxRetainedExecutions": 50 }"#).expect("parse");
        assert_eq!(settings.max_retained_executions, 50);
    }
}
