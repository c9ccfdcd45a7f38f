use crate::environment::EnvironmentConfig;
use crate::error::{FtmError, ValidationError};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::fmt;

/// OAuth client the feature-management realm issues operator tokens for.
pub const TOKEN_CLIENT_ID: &str = "feature-service";

const TOKEN_PREVIEW_CHARS: usize = 12;

/// Operator credentials for the password grant. Held for one operation only.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.username.trim().is_empty() {
            missing.push("Username");
        }
        if self.password.trim().is_empty() {
            missing.push("Password");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFields(missing))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Bearer token scoped to one environment task.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to show in logs.
    pub fn preview(&self) -> String {
        let prefix: String = self.0.chars().take(TOKEN_PREVIEW_CHARS).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.preview())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchange operator credentials for a bearer token (password grant).
///
/// Single attempt. A non-2xx answer is [`FtmError::TokenRequestFailed`]; a 2xx
/// answer without a usable `access_token` is [`FtmError::TokenMissing`].
pub async fn acquire_token(
    client: &reqwest::Client,
    env: &EnvironmentConfig,
    credentials: &Credentials,
) -> Result<Token, FtmError> {
    let form = [
        ("client_id", TOKEN_CLIENT_ID),
        ("grant_type", "password"),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ];

    let response = client
        .post(&env.token_url)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .form(&form)
        .send()
        .await
        .map_err(|e| FtmError::transport(format!("token request to {}", env.token_url), e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FtmError::transport("reading token response", e))?;

    if !status.is_success() {
        return Err(FtmError::TokenRequestFailed {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|_| FtmError::TokenMissing)?;
    match parsed.access_token {
        Some(token) if !token.is_empty() => {
            let token = Token::new(token);
            tracing::debug!(environment = %env.key, token = %token.preview(), "token acquired");
            Ok(token)
        }
        _ => Err(FtmError::TokenMissing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_hides_secrets() {
        let credentials = Credentials::new("Ivan.Ivanov", "hunter2");
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("Ivan.Ivanov"));
        assert!(!rendered.contains("hunter2"));

        let token = Token::new("eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.payload.signature");
        let rendered = format!("{:?}", token);
        assert_eq!(rendered, "Token(eyJhbGciOiJS...)");
    }

    #[test]
    fn test_validate_reports_blank_fields() {
        assert_eq!(
            Credentials::new(" ", "").validate(),
            Err(ValidationError::MissingFields(vec!["Username", "Password"]))
        );
        assert_eq!(
            Credentials::new("user", "").validate(),
            Err(ValidationError::MissingFields(vec!["Password"]))
        );
        assert!(Credentials::new("user", "secret").validate().is_ok());
    }
}
