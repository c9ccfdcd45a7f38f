//! Feature Toggle Manager.
//!
//! Creates, deletes and toggles feature flags on the feature-management API
//! of several environments at once. The [`dispatcher::Dispatcher`] spawns one
//! task per environment; each task fetches its own bearer token and then runs
//! its items sequentially, reporting every outcome as a [`event::ResultEvent`].

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod event;
pub mod feature;
pub mod hosts;
pub mod http;
pub mod task;

pub use dispatcher::{Dispatch, Dispatcher};
pub use environment::{Environment, EnvironmentConfig, EnvironmentRegistry};
pub use error::{FtmError, ValidationError};
pub use event::ResultEvent;
pub use task::{Operation, OperationKind};
