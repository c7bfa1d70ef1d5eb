// token.rs
use crate::config::{AuthConfig, LoginConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("reading token store {}: {source}", path.display())]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("token store {} is not a json object: {source}", path.display())]
    StoreFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("login request failed: {0}")]
    Login(#[from] reqwest::Error),
}

/// Supplies the opaque credential sent in the auth command.
/// `Ok(None)` means "no token", which is not an error.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    async fn token(&self) -> Result<Option<String>, TokenError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenSupplier for StaticToken {
    async fn token(&self) -> Result<Option<String>, TokenError> {
        Ok(self.0.clone().filter(|t| !t.is_empty()))
    }
}

/// A JSON object on disk used as a string key-value store.
#[derive(Debug, Clone)]
pub struct KeyValueTokenStore {
    path: PathBuf,
    key: String,
}

impl KeyValueTokenStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl TokenSupplier for KeyValueTokenStore {
    async fn token(&self) -> Result<Option<String>, TokenError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(TokenError::StoreRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let store: Map<String, Value> =
            serde_json::from_str(&text).map_err(|source| TokenError::StoreFormat {
                path: self.path.clone(),
                source,
            })?;
        Ok(store
            .get(&self.key)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_owned))
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Exchanges a username and password for a JWT at `{base_url}/api/auth/login`.
#[derive(Clone)]
pub struct LoginTokenSupplier {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl LoginTokenSupplier {
    pub fn new(cfg: &LoginConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        }
    }
}

#[async_trait]
impl TokenSupplier for LoginTokenSupplier {
    async fn token(&self) -> Result<Option<String>, TokenError> {
        let url = format!("{}/api/auth/login", self.base_url);
        let resp: LoginResponse = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Some(resp.token).filter(|t| !t.is_empty()))
    }
}

/// Asks each supplier in turn and returns the first token found.
/// Failing suppliers are logged and skipped.
#[derive(Default)]
pub struct FirstAvailable {
    suppliers: Vec<(&'static str, Box<dyn TokenSupplier>)>,
}

impl FirstAvailable {
    pub fn with(mut self, name: &'static str, supplier: impl TokenSupplier + 'static) -> Self {
        self.suppliers.push((name, Box::new(supplier)));
        self
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }
}

#[async_trait]
impl TokenSupplier for FirstAvailable {
    async fn token(&self) -> Result<Option<String>, TokenError> {
        for (name, supplier) in &self.suppliers {
            match supplier.token().await {
                Ok(Some(token)) => {
                    debug!(source = *name, "auth token found");
                    return Ok(Some(token));
                }
                Ok(None) => debug!(source = *name, "no auth token"),
                Err(e) => warn!(source = *name, error = %e, "token source failed"),
            }
        }
        Ok(None)
    }
}

pub fn from_config(cfg: &AuthConfig) -> FirstAvailable {
    let mut chain = FirstAvailable::default();
    if let Some(token) = &cfg.token {
        chain = chain.with("config", StaticToken::new(token.clone()));
    }
    if let Some(path) = &cfg.token_store {
        chain = chain.with("store", KeyValueTokenStore::new(path.clone(), cfg.token_key.clone()));
    }
    if let Some(login) = &cfg.login {
        chain = chain.with("login", LoginTokenSupplier::new(login));
    }
    chain
}
