use crate::auth::Credentials;
use crate::environment::{Environment, EnvironmentRegistry};
use crate::error::FtmError;
use crate::event::{EventSink, ResultEvent};
use crate::http::{build_client, HttpSettings};
use crate::task::{EnvironmentTask, Operation, TaskState};
use futures_util::{FutureExt, Stream};
use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

/// Fans an operation out to environments, one task per environment.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<EnvironmentRegistry>,
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(registry: Arc<EnvironmentRegistry>, settings: &HttpSettings) -> Result<Self, FtmError> {
        Ok(Self::with_client(registry, build_client(settings)?))
    }

    pub fn with_client(registry: Arc<EnvironmentRegistry>, client: reqwest::Client) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    /// Start `operation` in every environment of `environments`.
    ///
    /// Returns immediately; results arrive on the returned [`Dispatch`]. Each
    /// task gets its own copy of the operation and credentials and fetches its
    /// own token. Repeated environments run once. Must be called from within a
    /// tokio runtime.
    pub fn dispatch(
        &self,
        operation: Operation,
        environments: &[Environment],
        credentials: Credentials,
    ) -> Dispatch {
        let targets: BTreeSet<Environment> = environments.iter().copied().collect();
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let kind = operation.kind();

        tracing::info!(
            operation = %kind,
            items = operation.item_count(),
            environments = targets.len(),
            "dispatching"
        );

        let mut tasks = Vec::with_capacity(targets.len());
        for env in targets.iter().copied() {
            let Some(config) = self.registry.get(env) else {
                sink.emit(ResultEvent::task_error(
                    env,
                    FtmError::UnknownEnvironment(env.to_string()).to_string(),
                ));
                continue;
            };

            let task = EnvironmentTask::new(
                config.clone(),
                self.client.clone(),
                credentials.clone(),
                operation.clone(),
            );
            let task_sink = sink.clone();
            let span = tracing::info_span!("environment_task", environment = %env, operation = %kind);
            let work = async move { task.run(&task_sink).await };

            tasks.push((env, spawn_contained(env, sink.clone(), work, span)));
        }

        Dispatch {
            events: rx,
            tasks,
            environments: targets.into_iter().collect(),
        }
    }
}

/// Spawn `work` so that a panic inside it becomes one error event for `env`
/// instead of unwinding into the runtime.
fn spawn_contained<F>(env: Environment, sink: EventSink, work: F, span: Span) -> JoinHandle<()>
where
    F: Future<Output = TaskState> + Send + 'static,
{
    tokio::spawn(
        async move {
            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(state) => tracing::debug!(?state, "task finished"),
                Err(_) => sink.emit(ResultEvent::task_error(env, "task aborted unexpectedly")),
            }
        }
        .instrument(span),
    )
}

/// Running dispatch: owns the spawned tasks and the receiving end of their events.
///
/// Events of one environment arrive in submission order; events of different
/// environments interleave arbitrarily. The stream ends once every task is done.
/// Dropping a `Dispatch` does not stop its tasks.
pub struct Dispatch {
    events: mpsc::UnboundedReceiver<ResultEvent>,
    tasks: Vec<(Environment, JoinHandle<()>)>,
    environments: Vec<Environment>,
}

impl Dispatch {
    /// Targeted environments, deduplicated, in canonical order.
    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub async fn next_event(&mut self) -> Option<ResultEvent> {
        match self.events.recv().await {
            Some(event) => Some(event),
            None => {
                self.join().await;
                None
            }
        }
    }

    /// Wait for every task and return all events in arrival order.
    pub async fn collect(mut self) -> Vec<ResultEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> impl Stream<Item = ResultEvent> {
        futures_util::stream::unfold(self, |mut dispatch| async move {
            dispatch.next_event().await.map(|event| (event, dispatch))
        })
    }

    async fn join(&mut self) {
        for (env, handle) in self.tasks.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(environment = %env, "environment task did not finish: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicking_task_becomes_one_error_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let work = async {
            if true {
                panic!("environment task blew up");
            }
            TaskState::Completed
        };

        let handle = spawn_contained(Environment::Stage, EventSink::new(tx), work, Span::none());
        assert!(handle.await.is_ok());

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].environment, Environment::Stage);
        assert_eq!(events[0].feature_id, None);
        assert!(events[0].is_error);
        assert_eq!(events[0].message, "task aborted unexpectedly");
    }

    #[tokio::test]
    async fn test_contained_task_that_finishes_emits_nothing_extra() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_contained(
            Environment::Dev,
            EventSink::new(tx),
            async { TaskState::Completed },
            Span::none(),
        );
        assert!(handle.await.is_ok());
        assert!(rx.recv().await.is_none());
    }
}
