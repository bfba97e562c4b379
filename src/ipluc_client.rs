use crate::config::{CrmProvider, ForwardingConfig};
use crate::errors::{AppError, PipelineError};
use crate::extraction::ExtractedLead;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Lead status the CRM expects for freshly created leads.
pub const NEW_LEAD_STATUS_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardStatus {
    Success,
    Error,
}

/// Outcome of one forward attempt, reported back to Telein in-body.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardResult {
    pub status: ForwardStatus,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<PipelineError>,
}

impl ForwardResult {
    fn success(url: String, code: u16, body: String) -> Self {
        Self {
            status: ForwardStatus::Success,
            url,
            response_code: Some(code),
            response_body: Some(body),
            error: None,
            failure: None,
        }
    }

    fn failure(url: String, err: PipelineError) -> Self {
        let (response_code, response_body) = match &err {
            PipelineError::DownstreamRejection { status, body } => (Some(*status), Some(body.clone())),
            _ => (None, None),
        };
        Self {
            status: ForwardStatus::Error,
            url,
            response_code,
            response_body,
            error: Some(err.to_string()),
            failure: Some(err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ForwardStatus::Success
    }
}

/// Client for posting normalized leads to the downstream CRM (IPLUC).
///
/// One POST per lead, no retries: Telein must never see a failure, so errors
/// are folded into [`ForwardResult`] instead of being returned.
#[derive(Clone)]
pub struct IplucClient {
    client: reqwest::Client,
}

impl IplucClient {
    /// Creates a new `IplucClient` whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create CRM client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Forwards a lead using one configuration snapshot.
    ///
    /// # Arguments
    ///
    /// * `config` - Forwarding snapshot taken for the current request.
    /// * `lead` - The normalized lead.
    /// * `event_type` - Effective event type, used to pick the destination.
    pub async fn forward(
        &self,
        config: &ForwardingConfig,
        lead: &ExtractedLead,
        event_type: &str,
    ) -> ForwardResult {
        let url = config.destination_for(event_type).to_string();

        if !config.api_key_configured() {
            tracing::warn!("⚠️  Skipping forward to {}: API key not configured", url);
            return ForwardResult::failure(url, PipelineError::UnconfiguredCredential);
        }

        match self.post_lead(config, lead, &url).await {
            Ok((code, body)) => {
                tracing::info!("✓ Lead {} forwarded to {} ({})", lead.phone, url, code);
                ForwardResult::success(url, code, body)
            }
            Err(e) => {
                tracing::error!("Failed to forward lead {} to {}: {}", lead.phone, url, e);
                ForwardResult::failure(url, e)
            }
        }
    }

    async fn post_lead(
        &self,
        config: &ForwardingConfig,
        lead: &ExtractedLead,
        url: &str,
    ) -> Result<(u16, String), PipelineError> {
        let body = build_record(config, lead, chrono::Utc::now().timestamp_millis());

        let request = self.client.post(url).json(&body);
        let request = match config.provider {
            CrmProvider::Ipluc => request.header("apikey", &config.api_key),
            CrmProvider::Generic => request
                .header("Authorization", format!("Bearer {}", config.api_key))
                .header("X-API-Key", &config.api_key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::DownstreamUnreachable(e.to_string()))?;

        let status = response.status().as_u16();
        response_outcome(status, response.text().await)
    }
}

/// Turns the CRM status and the attempt to read its body into an outcome.
///
/// A 2xx whose body cannot be read is not a confirmed delivery.
fn response_outcome<E: std::fmt::Display>(
    status: u16,
    text: Result<String, E>,
) -> Result<(u16, String), PipelineError> {
    let is_success = (200..300).contains(&status);
    match text {
        Ok(body) if is_success => Ok((status, body)),
        Ok(body) => Err(PipelineError::DownstreamRejection { status, body }),
        Err(e) if is_success => Err(PipelineError::DownstreamUnreachable(format!(
            "CRM answered {} but the response body could not be read: {}",
            status, e
        ))),
        Err(e) => {
            tracing::warn!("Could not read CRM error body ({}): {}", status, e);
            Err(PipelineError::DownstreamRejection {
                status,
                body: String::new(),
            })
        }
    }
}

/// Builds the fixed-shape record the CRM expects.
///
/// `id` is generated locally; the convênio key name depends on the provider
/// and `utm_campaign` / `referrer` are only sent when known.
pub fn build_record(
    config: &ForwardingConfig,
    lead: &ExtractedLead,
    id: i64,
) -> serde_json::Value {
    let mut record = serde_json::Map::new();
    record.insert("id".to_string(), json!(id));
    record.insert("status_id".to_string(), json!(NEW_LEAD_STATUS_ID));
    record.insert("nome".to_string(), json!(lead.name));
    record.insert("telefone_1".to_string(), json!(lead.phone));
    record.insert("cpf".to_string(), json!(lead.document_id));
    record.insert("utm_source".to_string(), json!(config.utm_source));
    record.insert(
        config.provider.convenio_field().to_string(),
        json!(config.convenio_code),
    );

    if let Some(referrer) = &config.referrer {
        record.insert("referrer".to_string(), json!(referrer));
    }
    if let Some(campaign) = &lead.campaign {
        record.insert("utm_campaign".to_string(), json!(campaign));
    }

    serde_json::Value::Object(record)
}
