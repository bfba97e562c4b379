use crate::classification::{classify, UNKNOWN_EVENT};
use crate::errors::PipelineError;
use crate::extraction::extract_lead;
use crate::handlers::{AppState, MAX_BODY_BYTES};
use crate::webhook_models::{InboundEvent, WebhookResponse, WebhookStatus};
use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

/// Telein Webhook Handler
///
/// Receives IVR callbacks from Telein, either as a JSON body (POST) or as
/// query parameters (GET). Qualifying events are normalized and forwarded to
/// the CRM.
///
/// Always answers 200: oversized or malformed input, ignored events and CRM
/// failures are reported in the body so Telein never retries on its own.
/// The body is read here, not by an extractor, so an overflow cannot turn
/// into a 413.
pub async fn telein_webhook(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
    body: Body,
) -> (StatusCode, Json<WebhookResponse>) {
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("❌ Telein webhook body rejected: {}", e);
            let err = PipelineError::PayloadTooLarge {
                limit: MAX_BODY_BYTES,
            };
            return (
                StatusCode::OK,
                Json(error_response(UNKNOWN_EVENT.to_string(), &err, err.kind())),
            );
        }
    };

    let query = parse_query(raw_query.as_deref());
    let event = InboundEvent::acquire(&body, &query, &state.config.default_key);

    tracing::info!("Received Telein webhook");
    tracing::debug!(
        "Telein payload: {}",
        serde_json::to_string(&event).unwrap_or_default()
    );

    let event_type = event
        .top_level_text("event_type")
        .unwrap_or_else(|| UNKNOWN_EVENT.to_string());

    // Processing runs in its own task so a panic is contained here.
    let response = match tokio::spawn(process_event(state, event)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Webhook processing aborted: {}", e);
            error_response(
                event_type,
                "Internal error while processing webhook",
                "internal_error",
            )
        }
    };

    (StatusCode::OK, Json(response))
}

/// Error response for failures that happen before or around the pipeline.
fn error_response(
    event_type: String,
    message: impl std::fmt::Display,
    kind: &str,
) -> WebhookResponse {
    WebhookResponse {
        status: WebhookStatus::Error,
        event_type,
        timestamp: Utc::now().to_rfc3339(),
        message: message.to_string(),
        lead: None,
        forward_result: None,
        error_kind: Some(kind.to_string()),
    }
}

/// Runs classification, extraction and forwarding for one event.
///
/// Takes a single forwarding snapshot so a concurrent config update cannot
/// change the destination halfway through.
pub async fn process_event(state: Arc<AppState>, event: InboundEvent) -> WebhookResponse {
    let classification = classify(&event);
    let timestamp = Utc::now().to_rfc3339();

    if !classification.proceed {
        let reason = classification.ignore_reason();
        tracing::info!("Ignoring Telein event: {}", reason);
        return WebhookResponse {
            status: WebhookStatus::Ignored,
            event_type: classification.event_type,
            timestamp,
            message: reason,
            lead: None,
            forward_result: None,
            error_kind: None,
        };
    }

    let lead = match extract_lead(&event) {
        Ok(lead) => lead,
        Err(e) => {
            tracing::warn!("❌ Telein {} event rejected: {}", classification.event_type, e);
            return WebhookResponse {
                status: WebhookStatus::Error,
                event_type: classification.event_type,
                timestamp,
                message: e.to_string(),
                lead: None,
                forward_result: None,
                error_kind: Some(e.kind().to_string()),
            };
        }
    };

    tracing::info!(
        "Processing {} event: name={}, phone={}, key={:?}",
        classification.event_type,
        lead.name,
        lead.phone,
        classification.key
    );

    let snapshot = state.forwarding.load_full();
    let result = state
        .crm_client
        .forward(&snapshot, &lead, &classification.event_type)
        .await;

    let (status, message, error_kind) = match &result.failure {
        None => (
            WebhookStatus::Success,
            "Lead forwarded successfully".to_string(),
            None,
        ),
        Some(e) => (
            WebhookStatus::Error,
            format!("Lead not forwarded: {}", e),
            Some(e.kind().to_string()),
        ),
    };

    WebhookResponse {
        status,
        event_type: classification.event_type,
        timestamp,
        message,
        lead: Some(lead),
        forward_result: Some(result),
        error_kind,
    }
}

/// Decodes a raw query string into ordered pairs. Never fails.
fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_decodes_pairs() {
        let pairs = parse_query(Some("nome=Jo%C3%A3o+Silva&telefone=%2811%29+99999-9999"));
        assert_eq!(
            pairs,
            vec![
                ("nome".to_string(), "João Silva".to_string()),
                ("telefone".to_string(), "(11) 99999-9999".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_response_keeps_event_type() {
        let response = error_response(
            "lead_created".to_string(),
            "Internal error while processing webhook",
            "internal_error",
        );
        assert_eq!(response.status, WebhookStatus::Error);
        assert_eq!(response.event_type, "lead_created");
        assert_eq!(response.error_kind.as_deref(), Some("internal_error"));
        assert!(response.lead.is_none());
    }

    #[test]
    fn test_parse_query_tolerates_garbage() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
        assert_eq!(parse_query(Some("%%%=x")).len(), 1);
    }
}
