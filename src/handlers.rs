use crate::admin_handler::{self, validate_admin_token};
use crate::config::{key_fingerprint, Config};
use crate::errors::AppError;
use crate::extraction::normalize_phone;
use crate::ipluc_client::IplucClient;
use crate::webhook_handler;
use crate::webhook_models::Lead;
use arc_swap::ArcSwap;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Environment variables reported by `/debug/env`.
const KNOWN_ENV_VARS: [&str; 11] = [
    "PORT",
    "IPLUC_URL",
    "IPLUC_DESTINATIONS",
    "IPLUC_API_KEY",
    "CRM_PROVIDER",
    "IPLUC_CONVENIO_CODE",
    "IPLUC_UTM_SOURCE",
    "IPLUC_REFERRER",
    "TELEIN_DEFAULT_KEY",
    "FORWARD_TIMEOUT_SECS",
    "ADMIN_TOKEN",
];

/// Largest request body accepted on any route.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Startup configuration.
    pub config: Config,
    /// Live forwarding settings. Each request loads one snapshot;
    /// administrative routes swap in a new one.
    pub forwarding: ArcSwap<crate::config::ForwardingConfig>,
    /// Client for posting leads to the CRM.
    pub crm_client: IplucClient,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let crm_client = IplucClient::new(config.forward_timeout)?;
        Ok(Self {
            forwarding: ArcSwap::from_pointee(config.forwarding.clone()),
            config,
            crm_client,
            started_at: Utc::now(),
        })
    }
}

/// Builds the full router.
///
/// The Telein webhook sits outside the rate limiter and the body limit layer:
/// it must answer 200 to everything Telein sends, so it enforces the size
/// limit itself.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    // Configure rate limiter: 5 requests/second per IP, burst of 10
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(5)
            .burst_size(10)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let admin_routes = Router::new()
        .route("/config", get(admin_handler::get_config))
        .route("/config/destinations", put(admin_handler::put_destination))
        .route(
            "/config/destinations/:event_type",
            delete(admin_handler::delete_destination),
        )
        .route("/config/api-key", put(admin_handler::put_api_key))
        .route("/debug/env", get(debug_env))
        .layer(GovernorLayer {
            config: governor_conf,
        });

    let webhook_routes = Router::new().route(
        "/webhook/telein",
        post(webhook_handler::telein_webhook).get(webhook_handler::telein_webhook),
    );

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/test/webhook", post(test_webhook))
        .route("/receber_lead", post(receber_lead))
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB is far above any Telein payload
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .merge(webhook_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Ok(app)
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "mensagem": "Telein Webhook API está funcionando!",
        "status": "online",
        "endpoints": {
            "webhook": "/webhook/telein",
            "lead": "/receber_lead",
            "health": "/health",
            "status": "/status",
            "config": "/config"
        }
    }))
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "service": "telein-ipluc-bridge"
        })),
    )
}

/// GET /status
///
/// Runtime summary; never includes the API key itself.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.forwarding.load();
    let now = Utc::now();
    Json(json!({
        "service": "telein-ipluc-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_seconds": (now - state.started_at).num_seconds(),
        "provider": snapshot.provider,
        "default_destination": snapshot.default_destination,
        "event_destinations": snapshot.destinations.len(),
        "api_key_configured": snapshot.api_key_configured(),
        "default_key": state.config.default_key,
        "forward_timeout_secs": state.config.forward_timeout.as_secs(),
    }))
}

/// GET /debug/env
///
/// Reports which recognised variables are set. Secrets appear only as
/// fingerprints.
pub async fn debug_env(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    validate_admin_token(&state, &headers)?;

    let mut vars = serde_json::Map::new();
    for name in KNOWN_ENV_VARS {
        let value = match std::env::var(name) {
            Ok(v) if name == "IPLUC_API_KEY" || name == "ADMIN_TOKEN" => {
                json!({"set": true, "fingerprint": key_fingerprint(&v)})
            }
            Ok(v) => json!({"set": true, "value": v}),
            Err(_) => json!({"set": false}),
        };
        vars.insert(name.to_string(), value);
    }

    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "variables": vars,
    })))
}

/// POST /receber_lead
///
/// Legacy typed intake kept for older Telein campaigns. Acknowledges the
/// lead with its phone normalized; nothing is forwarded.
pub async fn receber_lead(Json(lead): Json<Lead>) -> Json<serde_json::Value> {
    let telefone_normalizado = normalize_phone(&lead.telefone);
    tracing::info!(
        "Lead recebido: nome={}, telefone={}, campanha={}",
        lead.nome,
        telefone_normalizado,
        lead.campanha
    );

    Json(json!({
        "mensagem": "Lead recebido com sucesso!",
        "dados": lead,
        "telefone_normalizado": telefone_normalizado,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// POST /test/webhook
pub async fn test_webhook() -> Json<serde_json::Value> {
    let test_data = json!({
        "event_type": "test",
        "message": "Teste de webhook",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Json(json!({
        "status": "success",
        "message": "Webhook testado com sucesso",
        "test_data": test_data,
    }))
}
