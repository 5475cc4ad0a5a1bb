//! Client for the Phantom subscriber-management API.
//!
//! Phantom exposes a single endpoint where the operation is selected with the
//! `action` query parameter. Every call except `autentificar` carries a short
//! lived token, which is cached in a [`TokenCache`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::Clock;
use crate::config::PhantomConfig;

const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum PhantomError {
    #[error("Phantom request failed: {0}")]
    Request(String),

    #[error("Phantom HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("Phantom authentication failed: {0}")]
    UpstreamAuth(String),

    #[error("Unexpected Phantom response: {0}")]
    UpstreamBody(String),
}

impl From<reqwest::Error> for PhantomError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Single-slot credential cache with a fixed expiry.
///
/// Concurrent callers that miss at the same time may each refresh; the last
/// `set` wins.
pub struct TokenCache {
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached value if present and not yet expired.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        let now = self.clock.now();
        let slot = self
            .slot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        slot.as_ref()
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.value.clone())
    }

    pub fn set(&self, value: impl Into<String>, ttl: Duration) {
        let cached = CachedToken {
            value: value.into(),
            expires_at: self.clock.now() + ttl,
        };

        *self
            .slot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(cached);
    }

    pub fn clear(&self) {
        *self
            .slot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

/// Upstream operations the rest of the crate depends on.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Raw `Abonados_por_OLT` listing for every OLT. The shape is not
    /// normalized here.
    async fn fetch_all_subscribers(&self) -> Result<Value, PhantomError>;

    /// Mobile number recorded upstream for a subscriber, `None` when absent or blank.
    async fn lookup_mobile_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<String>, PhantomError>;
}

pub struct PhantomClient {
    client: Client,
    base_url: Url,
    api_user: String,
    api_pass: String,
    token_ttl: Duration,
    cache: Arc<TokenCache>,
}

impl PhantomClient {
    pub fn new(
        config: &PhantomConfig,
        client: Client,
        cache: Arc<TokenCache>,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid Phantom base URL {}: {e}", config.base_url))?;

        let token_ttl = Duration::try_minutes(config.token_ttl_minutes)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Phantom token TTL of {} minutes is out of range",
                    config.token_ttl_minutes
                )
            })?;

        Ok(Self {
            client,
            base_url,
            api_user: config.api_user.clone(),
            api_pass: config.api_pass.clone(),
            token_ttl,
            cache,
        })
    }

    fn action_url(&self, action: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Returns the cached token, authenticating against Phantom on a miss.
    pub async fn get_token(&self) -> Result<String, PhantomError> {
        if let Some(token) = self.cache.get() {
            return Ok(token);
        }

        let url = self.action_url(
            "autentificar",
            &[
                ("api_user", self.api_user.as_str()),
                ("api_pass", self.api_pass.as_str()),
            ],
        );

        debug!("Requesting new Phantom token");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PhantomError::UpstreamHttp {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let token = parse_token_body(&body)?;
        self.cache.set(token.clone(), self.token_ttl);

        info!(ttl_minutes = self.token_ttl.num_minutes(), "Phantom token refreshed");
        Ok(token)
    }

    async fn get_json(&self, action: &str, params: &[(&str, &str)]) -> Result<Value, PhantomError> {
        let token = self.get_token().await?;

        let mut all_params = vec![("token", token.as_str())];
        all_params.extend_from_slice(params);
        let url = self.action_url(action, &all_params);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(action, status = status.as_u16(), "Phantom call failed");
            if matches!(status.as_u16(), 401 | 403) {
                self.cache.clear();
            }
            return Err(PhantomError::UpstreamHttp {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| PhantomError::UpstreamBody(format!("{action} returned invalid JSON: {e}")))
    }
}

#[async_trait]
impl SubscriberDirectory for PhantomClient {
    async fn fetch_all_subscribers(&self) -> Result<Value, PhantomError> {
        self.get_json(
            "Abonados_por_OLT",
            &[("OLT", crate::constants::phantom::ALL_OLTS)],
        )
        .await
    }

    async fn lookup_mobile_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<String>, PhantomError> {
        let root = self
            .get_json(
                "Consulta_Cliente_Avanzada",
                &[("IDA", external_id), ("JSON", "1")],
            )
            .await?;

        Ok(extract_mobile(&root))
    }
}

/// Interprets the `autentificar` response, which is either a JSON object with
/// a `token` field or the token as plain text.
pub fn parse_token_body(body: &str) -> Result<String, PhantomError> {
    let trimmed = body.trim();

    let token = if trimmed.starts_with('{') {
        let doc: Value = serde_json::from_str(trimmed)
            .map_err(|e| PhantomError::UpstreamAuth(format!("invalid JSON: {e}")))?;

        match doc.get("token") {
            Some(Value::String(token)) => token.trim().to_string(),
            Some(Value::Null) | None => {
                return Err(PhantomError::UpstreamAuth(
                    "JSON response without 'token'".to_string(),
                ));
            }
            Some(other) => value_to_text(other),
        }
    } else {
        if trimmed.to_ascii_lowercase().contains("error") {
            return Err(PhantomError::UpstreamAuth(preview(trimmed)));
        }
        trimmed.replace(' ', "")
    };

    if token.is_empty() {
        return Err(PhantomError::UpstreamAuth(format!(
            "empty token, response: {}",
            preview(trimmed)
        )));
    }

    Ok(token)
}

/// Finds a `Movil` field (any casing) in an object, or in the first element
/// of an array of objects.
#[must_use]
pub fn extract_mobile(root: &Value) -> Option<String> {
    let record = match root {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let mobile = record
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("movil"))
        .map(|(_, value)| value_to_text(value))?;

    let mobile = mobile.trim();
    (!mobile.is_empty()).then(|| mobile.to_string())
}

/// Text form of a JSON scalar: strings verbatim, null as empty, everything
/// else as its JSON representation.
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect()
}
