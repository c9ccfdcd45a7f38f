use thiserror::Error;

/// Failures raised by the token acquirer, the request executor and the registry.
///
/// Environment tasks never propagate these; they turn each one into an error
/// [`ResultEvent`](crate::event::ResultEvent) for the affected environment or item.
#[derive(Debug, Error)]
pub enum FtmError {
    #[error("unknown environment '{0}' (expected one of dev, test, preprod, stage, prod)")]
    UnknownEnvironment(String),

    #[error("token endpoint returned {status}: {body}")]
    TokenRequestFailed { status: u16, body: String },

    #[error("token endpoint response has no access_token")]
    TokenMissing,

    #[error("{method} {url} returned {status}: {body}")]
    HttpRequestFailed {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("unsupported HTTP method {0}")]
    UnsupportedMethod(String),

    #[error("{context}: {}", with_causes(.source))]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FtmError {
    pub(crate) fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }
}

/// reqwest's own message hides why a request failed (timeout, refused
/// connection, certificate), so append every cause it carries.
fn with_causes(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut cause = std::error::Error::source(err);
    while let Some(inner) = cause {
        let inner_text = inner.to_string();
        if !text.ends_with(&inner_text) {
            text.push_str(": ");
            text.push_str(&inner_text);
        }
        cause = std::error::Error::source(inner);
    }
    text
}

/// Input rejected before anything is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required fields are missing: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("unknown team '{0}'")]
    UnknownTeam(String),

    #[error("unknown audience type '{0}' (expected ALL or SERVICE)")]
    UnknownAudienceType(String),

    #[error("invalid activity update '{0}' (expected ID=true or ID=false)")]
    InvalidActivityUpdate(String),

    #[error("select at least one environment")]
    NoEnvironments,
}
