use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

/// Value shipped in deployment templates for the downstream API key.
/// A key equal to this (or empty) is treated as not configured.
pub const UNCONFIGURED_API_KEY: &str = "SUA_API_KEY_AQUI";

/// Downstream CRM flavour. Decides the auth headers and the convênio field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrmProvider {
    /// IPLUC: `apikey` header, `cod_convenio` body field.
    Ipluc,
    /// `Authorization: Bearer` + `X-API-Key` headers, `codigo_convenio` body field.
    Generic,
}

impl CrmProvider {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "ipluc" => Ok(CrmProvider::Ipluc),
            "generic" => Ok(CrmProvider::Generic),
            other => anyhow::bail!("CRM_PROVIDER must be 'ipluc' or 'generic', got '{}'", other),
        }
    }

    pub fn convenio_field(&self) -> &'static str {
        match self {
            CrmProvider::Ipluc => "cod_convenio",
            CrmProvider::Generic => "codigo_convenio",
        }
    }
}

/// The part of the configuration that can change at runtime.
///
/// Handlers never mutate this in place: each request works on one snapshot
/// and administrative writes swap in a fresh copy.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardingConfig {
    pub provider: CrmProvider,
    pub default_destination: String,
    /// Destination overrides keyed by effective event type.
    pub destinations: BTreeMap<String, String>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub convenio_code: String,
    pub utm_source: String,
    pub referrer: Option<String>,
}

impl ForwardingConfig {
    /// Resolves the destination URL for an event type, falling back to the default.
    pub fn destination_for(&self, event_type: &str) -> &str {
        self.destinations
            .get(event_type)
            .map(String::as_str)
            .unwrap_or(&self.default_destination)
    }

    pub fn api_key_configured(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != UNCONFIGURED_API_KEY
    }

    pub fn api_key_fingerprint(&self) -> Option<String> {
        self.api_key_configured()
            .then(|| key_fingerprint(&self.api_key))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub admin_token: Option<String>,
    /// DTMF digit assumed for payloads synthesized from query parameters.
    pub default_key: String,
    pub forward_timeout: Duration,
    pub forwarding: ForwardingConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let default_destination = std::env::var("IPLUC_URL")
            .map_err(|_| anyhow::anyhow!("IPLUC_URL environment variable required"))
            .and_then(|url| validate_http_url("IPLUC_URL", &url))?;

        let destinations = match std::env::var("IPLUC_DESTINATIONS") {
            Ok(raw) => parse_destinations(&raw)?,
            Err(_) => BTreeMap::new(),
        };

        let provider = CrmProvider::parse(&std::env::var("CRM_PROVIDER").unwrap_or_default())?;

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            admin_token: std::env::var("ADMIN_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_key: std::env::var("TELEIN_DEFAULT_KEY")
                .unwrap_or_else(|_| "1".to_string())
                .trim()
                .to_string(),
            forward_timeout: Duration::from_secs(
                std::env::var("FORWARD_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .map_err(|_| {
                        anyhow::anyhow!("FORWARD_TIMEOUT_SECS must be a whole number of seconds")
                    })?,
            ),
            forwarding: ForwardingConfig {
                provider,
                default_destination,
                destinations,
                api_key: std::env::var("IPLUC_API_KEY")
                    .unwrap_or_else(|_| UNCONFIGURED_API_KEY.to_string()),
                convenio_code: std::env::var("IPLUC_CONVENIO_CODE").unwrap_or_default(),
                utm_source: std::env::var("IPLUC_UTM_SOURCE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "telein".to_string()),
                referrer: std::env::var("IPLUC_REFERRER")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
        };

        if !is_dtmf_digit(&config.default_key) {
            anyhow::bail!(
                "TELEIN_DEFAULT_KEY must be a single digit 0-9, got '{}'",
                config.default_key
            );
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Default destination: {}", config.forwarding.default_destination);
        for (event_type, url) in &config.forwarding.destinations {
            tracing::debug!("Destination for {}: {}", event_type, url);
        }
        tracing::debug!("CRM provider: {:?}", config.forwarding.provider);
        tracing::debug!("Server Port: {}", config.port);
        if !config.forwarding.api_key_configured() {
            tracing::warn!("IPLUC_API_KEY not configured, leads will not be forwarded");
        }
        if config.admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN not set, configuration endpoints are unprotected");
        }

        Ok(config)
    }
}

/// Parses `event=url` pairs separated by `,` or `;`.
pub fn parse_destinations(raw: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut destinations = BTreeMap::new();

    for entry in raw.split([',', ';']).map(str::trim).filter(|e| !e.is_empty()) {
        let (event_type, url) = entry.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("IPLUC_DESTINATIONS entry '{}' must look like event=url", entry)
        })?;
        let event_type = event_type.trim();
        if event_type.is_empty() {
            anyhow::bail!("IPLUC_DESTINATIONS entry '{}' has an empty event type", entry);
        }
        let url = validate_http_url("IPLUC_DESTINATIONS", url)?;
        destinations.insert(event_type.to_string(), url);
    }

    Ok(destinations)
}

pub fn validate_http_url(name: &str, raw: &str) -> anyhow::Result<String> {
    let url = raw.trim();
    if url.is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    url::Url::parse(url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    Ok(url.to_string())
}

pub fn is_dtmf_digit(key: &str) -> bool {
    key.len() == 1 && key.bytes().all(|b| b.is_ascii_digit())
}

/// Short SHA-256 fingerprint used wherever a secret has to be identified in output.
pub fn key_fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(digest)[..12].to_string()
}
