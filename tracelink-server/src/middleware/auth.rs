//! API key authentication middleware for axum

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracelink_core::OwnerId;

use crate::error::ApiError;

/// Header carrying an API key
const API_KEY_HEADER: &str = "x-api-key";

/// One API key and the owner it authenticates as
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub owner: String,
}

/// Configuration for API key authentication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Whether authentication is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Accepted API keys
    #[serde(default)]
    pub keys: Vec<ApiKey>,

    /// Whether localhost requests skip the key check
    #[serde(default)]
    pub bypass_localhost: bool,

    /// Owner assumed when a request is not checked
    #[serde(default = "default_local_owner")]
    pub local_owner: String,

    /// Reverse proxies whose `x-forwarded-for` / `x-real-ip` headers are believed
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

fn default_local_owner() -> String {
    OwnerId::local().to_string()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keys: Vec::new(),
            bypass_localhost: false,
            local_owner: default_local_owner(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl AccessConfig {
    /// Enabled config accepting the given keys
    pub fn with_keys(keys: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            enabled: true,
            keys: keys
                .into_iter()
                .map(|(key, owner)| ApiKey { key, owner })
                .collect(),
            ..Default::default()
        }
    }

    /// Check if the config is usable (enabled configs need at least one key)
    pub fn is_valid(&self) -> bool {
        !self.enabled || !self.keys.is_empty()
    }
}

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AuthContext {
    /// Authentication disabled or bypassed for localhost
    Local { owner: OwnerId },
    /// Authenticated with an API key
    Authenticated { owner: OwnerId },
}

impl AuthContext {
    pub fn owner(&self) -> &OwnerId {
        match self {
            Self::Local { owner } | Self::Authenticated { owner } => owner,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }
}

/// Authentication layer state
#[derive(Debug, Clone)]
pub struct AuthLayer {
    keys: Option<Arc<HashMap<String, OwnerId>>>,
    config: AccessConfig,
}

impl AuthLayer {
    /// Create a new AuthLayer with the given configuration
    pub fn new(config: AccessConfig) -> Self {
        let keys = config.enabled.then(|| {
            Arc::new(
                config
                    .keys
                    .iter()
                    .map(|k| (k.key.clone(), OwnerId::new(k.owner.clone())))
                    .collect(),
            )
        });
        Self { keys, config }
    }

    /// Create a disabled AuthLayer (for testing or when auth is not configured)
    pub fn disabled() -> Self {
        Self::new(AccessConfig::default())
    }

    /// Peers allowed to report the client address in forwarding headers
    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.config.trusted_proxies
    }

    fn local(&self) -> AuthContext {
        AuthContext::Local {
            owner: OwnerId::new(self.config.local_owner.clone()),
        }
    }
}

/// Check if the request is from localhost
fn is_localhost(addr: &SocketAddr) -> bool {
    addr.ip().is_loopback()
}

/// Extract an API key from `x-api-key` or a bearer authorization header
fn extract_key(request: &Request) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        return Some(value.trim().to_string());
    }

    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Authentication middleware function
pub async fn auth_middleware(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    axum::Extension(auth_layer): axum::Extension<AuthLayer>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let from_localhost = connect_info.is_some_and(|ConnectInfo(addr)| is_localhost(&addr));

    let auth_context = match &auth_layer.keys {
        None => auth_layer.local(),
        Some(_) if auth_layer.config.bypass_localhost && from_localhost => auth_layer.local(),
        Some(keys) => match extract_key(&request) {
            Some(key) => match keys.get(&key) {
                Some(owner) => AuthContext::Authenticated {
                    owner: owner.clone(),
                },
                None => {
                    tracing::debug!("Unknown API key");
                    return Err(ApiError::Unauthorized);
                }
            },
            None => {
                tracing::debug!("No API key provided");
                return Err(ApiError::Unauthorized);
            }
        },
    };

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}
