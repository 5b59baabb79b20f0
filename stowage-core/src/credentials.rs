use crate::{CredentialsConfig, Result, StorageError};
use std::fmt;

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
}

#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            credentials: Credentials {
                access_key_id: access_key_id.into(),
                secret_access_key: secret_access_key.into(),
                session_token: None,
            },
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.credentials.session_token = Some(token.into());
        self
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn credentials(&self) -> Result<Credentials> {
        if self.credentials.access_key_id.trim().is_empty()
            || self.credentials.secret_access_key.trim().is_empty()
        {
            return Err(StorageError::Config(
                "static credentials require an access key and a secret key".to_string(),
            ));
        }
        Ok(self.credentials.clone())
    }
}

/// Reads the standard AWS environment variables on every call.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialProvider;

impl CredentialProvider for EnvCredentialProvider {
    fn credentials(&self) -> Result<Credentials> {
        let access_key_id = required_env(ACCESS_KEY_ENV)?;
        let secret_access_key = required_env(SECRET_KEY_ENV)?;
        let session_token = std::env::var(SESSION_TOKEN_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());

        Ok(Credentials {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(StorageError::Config(format!(
            "environment variable {} is not set",
            name
        ))),
    }
}

impl CredentialsConfig {
    pub fn provider(&self) -> Box<dyn CredentialProvider> {
        match self {
            CredentialsConfig::Env => Box::new(EnvCredentialProvider),
            CredentialsConfig::Static {
                access_key_id,
                secret_access_key,
                session_token,
            } => {
                let provider = StaticCredentialProvider::new(access_key_id, secret_access_key);
                match session_token {
                    Some(token) => Box::new(provider.with_session_token(token)),
                    None => Box::new(provider),
                }
            }
        }
    }
}
