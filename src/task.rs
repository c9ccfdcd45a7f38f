use crate::auth::{acquire_token, Credentials, Token};
use crate::environment::{Environment, EnvironmentConfig};
use crate::event::{EventSink, ResultEvent};
use crate::feature::{ActivityUpdate, FeaturePayload};
use crate::http::execute;
use reqwest::Method;
use std::fmt;

/// What a dispatch does in every selected environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create(FeaturePayload),
    /// Feature ids, in submission order. Duplicates are sent twice.
    Delete(Vec<String>),
    UpdateActivity(Vec<ActivityUpdate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Delete,
    UpdateActivity,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
            OperationKind::UpdateActivity => "update-activity",
        })
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create(_) => OperationKind::Create,
            Operation::Delete(_) => OperationKind::Delete,
            Operation::UpdateActivity(_) => OperationKind::UpdateActivity,
        }
    }

    /// Number of feature API calls per environment.
    pub fn item_count(&self) -> usize {
        match self {
            Operation::Create(_) => 1,
            Operation::Delete(ids) => ids.len(),
            Operation::UpdateActivity(updates) => updates.len(),
        }
    }

    /// Whether the operation changes or removes existing features.
    pub fn is_destructive(&self) -> bool {
        !matches!(self, Operation::Create(_))
    }
}

/// `{base}/{id}`
pub fn feature_item_url(base: &str, feature_id: &str) -> String {
    format!("{}/{}", base.strip_suffix('/').unwrap_or(base), feature_id)
}

/// `{base}/{id}/enabled/{enabled}`
pub fn activity_url(base: &str, feature_id: &str, enabled: bool) -> String {
    format!("{}/enabled/{}", feature_item_url(base, feature_id), enabled)
}

/// Lifecycle of one environment task.
///
/// `Pending → AcquiringToken → TokenFailed` or
/// `Pending → AcquiringToken → Executing → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    AcquiringToken,
    TokenFailed,
    Executing,
    Completed,
}

/// Unit of work for one environment: one token, then the items in order.
pub struct EnvironmentTask {
    config: EnvironmentConfig,
    client: reqwest::Client,
    credentials: Credentials,
    operation: Operation,
    state: TaskState,
}

impl EnvironmentTask {
    pub fn new(
        config: EnvironmentConfig,
        client: reqwest::Client,
        credentials: Credentials,
        operation: Operation,
    ) -> Self {
        Self {
            config,
            client,
            credentials,
            operation,
            state: TaskState::Pending,
        }
    }

    pub fn environment(&self) -> Environment {
        self.config.key
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition(&mut self, next: TaskState) {
        tracing::debug!(from = ?self.state, to = ?next, "task state");
        self.state = next;
    }

    /// Run to completion, emitting one event per item (or one for a token failure).
    pub async fn run(mut self, sink: &EventSink) -> TaskState {
        let env = self.environment();

        self.transition(TaskState::AcquiringToken);
        let token = match acquire_token(&self.client, &self.config, &self.credentials).await {
            Ok(token) => token,
            Err(e) => {
                sink.emit(ResultEvent::task_error(
                    env,
                    format!("{}: token request failed: {}", self.operation.kind(), e),
                ));
                self.transition(TaskState::TokenFailed);
                return self.state;
            }
        };

        self.transition(TaskState::Executing);
        match &self.operation {
            Operation::Create(payload) => {
                sink.emit(self.create(&token, payload).await);
            }
            Operation::Delete(ids) => {
                for id in ids {
                    sink.emit(self.delete(&token, id).await);
                }
            }
            Operation::UpdateActivity(updates) => {
                for update in updates {
                    sink.emit(self.update_activity(&token, update).await);
                }
            }
        }

        self.transition(TaskState::Completed);
        self.state
    }

    async fn create(&self, token: &Token, payload: &FeaturePayload) -> ResultEvent {
        let env = self.environment();
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                return ResultEvent::item_error(
                    env,
                    &payload.id,
                    format!("failed to create feature '{}': {}", payload.id, e),
                )
            }
        };

        match execute(
            &self.client,
            Method::POST,
            &self.config.feature_url,
            token,
            Some(&body),
        )
        .await
        {
            Ok(response) => ResultEvent::success(
                env,
                &payload.id,
                format!("feature '{}' created: {}", payload.id, response),
            ),
            Err(e) => ResultEvent::item_error(
                env,
                &payload.id,
                format!("failed to create feature '{}': {}", payload.id, e),
            ),
        }
    }

    async fn delete(&self, token: &Token, id: &str) -> ResultEvent {
        let env = self.environment();
        let url = feature_item_url(&self.config.feature_url, id);

        match execute(&self.client, Method::DELETE, &url, token, None).await {
            Ok(_) => ResultEvent::success(env, id, format!("feature '{}' deleted", id)),
            Err(e) => {
                ResultEvent::item_error(env, id, format!("failed to delete feature '{}': {}", id, e))
            }
        }
    }

    async fn update_activity(&self, token: &Token, update: &ActivityUpdate) -> ResultEvent {
        let env = self.environment();
        let id = &update.feature_id;
        let url = activity_url(&self.config.feature_url, id, update.enabled);

        match execute(&self.client, Method::PUT, &url, token, None).await {
            Ok(response) => ResultEvent::success(
                env,
                id,
                format!(
                    "feature '{}' enabled set to {}: {}",
                    id, update.enabled, response
                ),
            ),
            Err(e) => ResultEvent::item_error(
                env,
                id,
                format!(
                    "failed to set feature '{}' enabled={}: {}",
                    id, update.enabled, e
                ),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://ftm.example/api/v1/feature";

    #[test]
    fn test_activity_url_is_exact() {
        assert_eq!(
            activity_url(BASE, "a.b.c", true),
            "https://ftm.example/api/v1/feature/a.b.c/enabled/true"
        );
        assert_eq!(
            activity_url(BASE, "a.b.c", false),
            "https://ftm.example/api/v1/feature/a.b.c/enabled/false"
        );
    }

    #[test]
    fn test_item_url_tolerates_one_trailing_slash() {
        assert_eq!(
            feature_item_url("https://ftm.example/feature/", "f1"),
            "https://ftm.example/feature/f1"
        );
        assert_eq!(
            feature_item_url("https://ftm.example/feature", "f1"),
            "https://ftm.example/feature/f1"
        );
    }

    #[test]
    fn test_operation_shape() {
        let delete = Operation::Delete(vec!["f1".into(), "f1".into(), "f2".into()]);
        assert_eq!(delete.kind(), OperationKind::Delete);
        assert_eq!(delete.item_count(), 3);
        assert!(delete.is_destructive());

        let update = Operation::UpdateActivity(vec![ActivityUpdate::new("a", true)]);
        assert_eq!(update.kind().to_string(), "update-activity");
        assert_eq!(update.item_count(), 1);
    }
}
