//! Configuration surface: read and update where leads go and with which key.
//!
//! Writes never mutate the live snapshot; they build a new `ForwardingConfig`
//! and swap it in. Requests already in flight keep the snapshot they loaded.

use crate::config::{validate_http_url, ForwardingConfig};
use crate::errors::{AppError, ResultExt};
use crate::handlers::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Forwarding configuration as exposed over HTTP. The API key is never echoed.
#[derive(Debug, Serialize)]
pub struct ForwardingView {
    #[serde(flatten)]
    pub forwarding: ForwardingConfig,
    pub api_key_configured: bool,
    pub api_key_fingerprint: Option<String>,
}

impl From<&ForwardingConfig> for ForwardingView {
    fn from(cfg: &ForwardingConfig) -> Self {
        Self {
            forwarding: cfg.clone(),
            api_key_configured: cfg.api_key_configured(),
            api_key_fingerprint: cfg.api_key_fingerprint(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DestinationUpdate {
    /// Event type to route; `None` replaces the default destination.
    pub event_type: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyUpdate {
    pub api_key: String,
}

/// Validates the admin token from the X-Admin-Token header.
///
/// When no token is configured the surface is open (warned at startup).
pub fn validate_admin_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(ref expected) = state.config.admin_token else {
        return Ok(());
    };

    let token = headers
        .get("X-Admin-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Admin-Token header".to_string()))?;

    if !constant_time_compare(token, expected) {
        tracing::warn!("Invalid admin token received");
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// GET /config
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ForwardingView>, AppError> {
    validate_admin_token(&state, &headers)?;
    let snapshot = state.forwarding.load();
    Ok(Json(ForwardingView::from(&**snapshot)))
}

/// PUT /config/destinations
pub async fn put_destination(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<DestinationUpdate>,
) -> Result<Json<ForwardingView>, AppError> {
    validate_admin_token(&state, &headers)?;

    let url = validate_http_url("url", &update.url)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let event_type = match update.event_type.as_deref().map(str::trim) {
        Some("") => {
            return Err(AppError::BadRequest("event_type cannot be empty".to_string()));
        }
        other => other.map(str::to_string),
    };

    state.forwarding.rcu(|current| {
        let mut next = ForwardingConfig::clone(current);
        match &event_type {
            Some(event_type) => {
                next.destinations.insert(event_type.clone(), url.clone());
            }
            None => next.default_destination = url.clone(),
        }
        next
    });

    match &event_type {
        Some(event_type) => tracing::info!("✓ Destination for {} set to {}", event_type, url),
        None => tracing::info!("✓ Default destination set to {}", url),
    }

    let snapshot = state.forwarding.load();
    Ok(Json(ForwardingView::from(&**snapshot)))
}

/// DELETE /config/destinations/:event_type
pub async fn delete_destination(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_type): Path<String>,
) -> Result<Json<BTreeMap<String, String>>, AppError> {
    validate_admin_token(&state, &headers)?;

    if !state.forwarding.load().destinations.contains_key(&event_type) {
        return Err(AppError::NotFound(format!(
            "No destination configured for '{}'",
            event_type
        )))
        .context("Removing destination");
    }

    state.forwarding.rcu(|current| {
        let mut next = ForwardingConfig::clone(current);
        next.destinations.remove(&event_type);
        next
    });
    tracing::info!("✓ Destination for {} removed", event_type);

    Ok(Json(state.forwarding.load().destinations.clone()))
}

/// PUT /config/api-key
pub async fn put_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<ApiKeyUpdate>,
) -> Result<Json<ForwardingView>, AppError> {
    validate_admin_token(&state, &headers)?;

    let api_key = update.api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(AppError::BadRequest("api_key cannot be empty".to_string()));
    }

    state.forwarding.rcu(|current| {
        let mut next = ForwardingConfig::clone(current);
        next.api_key = api_key.clone();
        next
    });
    tracing::info!("✓ CRM API key updated");

    let snapshot = state.forwarding.load();
    Ok(Json(ForwardingView::from(&**snapshot)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("token", "token"));
        assert!(!constant_time_compare("token", "tokem"));
        assert!(!constant_time_compare("token", "token2"));
    }
}
