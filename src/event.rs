use crate::environment::Environment;
use std::fmt;
use tokio::sync::mpsc;

/// Outcome of one step of an environment task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEvent {
    pub environment: Environment,
    /// Item the event is about; `None` for token and task-level failures
    pub feature_id: Option<String>,
    pub message: String,
    pub is_error: bool,
}

impl ResultEvent {
    pub fn success(
        environment: Environment,
        feature_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            feature_id: Some(feature_id.into()),
            message: message.into(),
            is_error: false,
        }
    }

    pub fn item_error(
        environment: Environment,
        feature_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            feature_id: Some(feature_id.into()),
            message: message.into(),
            is_error: true,
        }
    }

    pub fn task_error(environment: Environment, message: impl Into<String>) -> Self {
        Self {
            environment,
            feature_id: None,
            message: message.into(),
            is_error: true,
        }
    }
}

impl fmt::Display for ResultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.environment, self.message)
    }
}

/// Sending half of a dispatch's event stream.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ResultEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<ResultEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: ResultEvent) {
        if event.is_error {
            tracing::warn!(environment = %event.environment, "{}", event.message);
        } else {
            tracing::info!(environment = %event.environment, "{}", event.message);
        }
        // A dropped receiver only means nobody is watching; the task keeps going.
        let _ = self.tx.send(event);
    }
}
