use crate::errors::PipelineError;
use crate::extraction::ExtractedLead;
use crate::ipluc_client::ForwardResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query parameters Telein sends when configured for GET callbacks.
pub const QUERY_FIELDS: [&str; 8] = [
    "nome", "telefone", "mailing", "campanha", "opcao", "email", "endereco", "cpf",
];

/// Raw decoded Telein payload.
///
/// There is no fixed schema: lead fields can sit under `lead_data`,
/// `client_data`, `call_data` or at the top level, so the event is kept as a
/// JSON object and read through [`InboundEvent::first_non_empty`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InboundEvent(Map<String, Value>);

/// Where a candidate field is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    LeadData,
    ClientData,
    CallData,
    TopLevel,
}

impl FieldSource {
    /// Lookup order shared by every field.
    pub const ORDER: [FieldSource; 4] = [
        FieldSource::LeadData,
        FieldSource::ClientData,
        FieldSource::CallData,
        FieldSource::TopLevel,
    ];

    pub fn key(&self) -> Option<&'static str> {
        match self {
            FieldSource::LeadData => Some("lead_data"),
            FieldSource::ClientData => Some("client_data"),
            FieldSource::CallData => Some("call_data"),
            FieldSource::TopLevel => None,
        }
    }
}

/// One `(source, key)` pair in a fallback list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub source: FieldSource,
    pub key: &'static str,
}

/// Expands field-name synonyms into a source-major candidate list:
/// every synonym under `lead_data`, then under `client_data`, and so on.
pub fn candidates(synonyms: &[&'static str]) -> Vec<Candidate> {
    FieldSource::ORDER
        .iter()
        .flat_map(|&source| synonyms.iter().map(move |&key| Candidate { source, key }))
        .collect()
}

/// Text of a JSON value if it counts as "present": a non-blank string
/// (trimmed) or a number. Everything else is skipped.
pub fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl InboundEvent {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builds the event from whatever transport Telein used.
    ///
    /// JSON object body first, then query parameters, then the raw body as text.
    pub fn acquire(body: &[u8], query: &[(String, String)], default_key: &str) -> Self {
        match Self::decode_json(body) {
            Ok(map) => return Self(map),
            Err(e) => {
                if !body.is_empty() {
                    tracing::debug!("{}, falling back to query parameters", e);
                }
            }
        }

        if let Some(event) = Self::from_query(query, default_key) {
            tracing::debug!("Synthesized key_pressed event from {} query parameter(s)", query.len());
            return event;
        }

        Self::from_raw_body(body)
    }

    fn decode_json(body: &[u8]) -> Result<Map<String, Value>, PipelineError> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(PipelineError::PayloadDecodeFailure(format!(
                "expected an object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(PipelineError::PayloadDecodeFailure(e.to_string())),
        }
    }

    /// Synthesizes a `key_pressed` event from GET-style query parameters.
    ///
    /// Returns `None` when there are no parameters at all.
    pub fn from_query(query: &[(String, String)], default_key: &str) -> Option<Self> {
        if query.is_empty() {
            return None;
        }

        let mut client_data = Map::new();
        for field in QUERY_FIELDS {
            if let Some((_, value)) = query.iter().find(|(name, _)| name == field) {
                client_data.insert(field.to_string(), Value::String(value.clone()));
            }
        }

        let mut map = Map::new();
        map.insert("event_type".to_string(), Value::String("key_pressed".to_string()));
        map.insert("key".to_string(), Value::String(default_key.to_string()));
        map.insert("client_data".to_string(), Value::Object(client_data));
        Some(Self(map))
    }

    pub fn from_raw_body(body: &[u8]) -> Self {
        let mut map = Map::new();
        map.insert(
            "raw_body".to_string(),
            Value::String(String::from_utf8_lossy(body).into_owned()),
        );
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Top-level field exactly as sent: strings are not trimmed, numbers
    /// become decimal text, anything else (or `""`) is `None`.
    pub fn top_level_text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn nested(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    fn has_nested_sources(&self) -> bool {
        FieldSource::ORDER
            .iter()
            .filter_map(FieldSource::key)
            .any(|key| self.nested(key).is_some())
    }

    /// Object a source resolves to.
    ///
    /// For flat payloads (no nested source object at all) every nested alias
    /// resolves to the top level, so one candidate list covers both shapes.
    pub fn source(&self, source: FieldSource) -> Option<&Map<String, Value>> {
        match source.key() {
            None => Some(&self.0),
            Some(_) if !self.has_nested_sources() => Some(&self.0),
            Some(key) => self.nested(key),
        }
    }

    /// First non-empty value over `candidates`, in order.
    pub fn first_non_empty(&self, candidates: &[Candidate]) -> Option<String> {
        candidates.iter().find_map(|candidate| {
            self.source(candidate.source)
                .and_then(|obj| obj.get(candidate.key))
                .and_then(non_empty_text)
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Success,
    Ignored,
    Error,
}

/// Body of every answer to Telein. Always sent with HTTP 200.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: WebhookStatus,
    pub event_type: String,
    pub timestamp: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead: Option<ExtractedLead>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_result: Option<ForwardResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// Typed lead accepted by the legacy `/receber_lead` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Lead {
    pub nome: String,
    pub telefone: String,
    pub mailing: String,
    pub campanha: String,
    pub opcao: String,
    pub email: String,
    pub endereco: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> InboundEvent {
        match value {
            Value::Object(map) => InboundEvent::from_map(map),
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn test_acquire_prefers_json_body() {
        let body = br#"{"event_type": "lead_created", "lead_data": {"nome": "Ana"}}"#;
        let query = vec![("nome".to_string(), "Bia".to_string())];
        let ev = InboundEvent::acquire(body, &query, "1");
        assert_eq!(ev.top_level_text("event_type").as_deref(), Some("lead_created"));
    }

    #[test]
    fn test_acquire_falls_back_to_query() {
        let query = vec![
            ("nome".to_string(), "Ana".to_string()),
            ("telefone".to_string(), "11988887777".to_string()),
            ("utm".to_string(), "ignored".to_string()),
        ];
        let ev = InboundEvent::acquire(b"", &query, "3");
        assert_eq!(ev.top_level_text("event_type").as_deref(), Some("key_pressed"));
        assert_eq!(ev.top_level_text("key").as_deref(), Some("3"));

        let client = ev.as_map()["client_data"].as_object().unwrap();
        assert_eq!(client.len(), 2);
        assert_eq!(client["telefone"], "11988887777");
    }

    #[test]
    fn test_acquire_wraps_raw_body() {
        let ev = InboundEvent::acquire(b"not json at all", &[], "1");
        assert_eq!(ev.top_level_text("raw_body").as_deref(), Some("not json at all"));
        assert_eq!(ev.as_map().len(), 1);
    }

    #[test]
    fn test_non_object_json_is_not_an_event() {
        let ev = InboundEvent::acquire(b"[1, 2, 3]", &[], "1");
        assert_eq!(ev.top_level_text("raw_body").as_deref(), Some("[1, 2, 3]"));
    }

    #[test]
    fn test_candidates_are_source_major() {
        let list = candidates(&["nome", "name"]);
        assert_eq!(list.len(), 8);
        assert_eq!(list[0], Candidate { source: FieldSource::LeadData, key: "nome" });
        assert_eq!(list[1], Candidate { source: FieldSource::LeadData, key: "name" });
        assert_eq!(list[2], Candidate { source: FieldSource::ClientData, key: "nome" });
        assert_eq!(list[7], Candidate { source: FieldSource::TopLevel, key: "name" });
    }

    #[test]
    fn test_first_non_empty_skips_blank_values() {
        let ev = event(json!({
            "lead_data": {"nome": "   ", "name": null},
            "client_data": {"nome": "Carlos"},
            "nome": "Top"
        }));
        assert_eq!(
            ev.first_non_empty(&candidates(&["nome", "name"])).as_deref(),
            Some("Carlos")
        );
    }

    #[test]
    fn test_flat_payload_binds_aliases_to_top_level() {
        let ev = event(json!({"telefone": "11988887777"}));
        assert!(ev.source(FieldSource::CallData).is_some());
        assert_eq!(
            ev.first_non_empty(&candidates(&["telefone"])).as_deref(),
            Some("11988887777")
        );
    }

    #[test]
    fn test_missing_nested_source_resolves_to_none() {
        let ev = event(json!({"call_data": {"numero": 11988887777u64}}));
        assert!(ev.source(FieldSource::LeadData).is_none());
        assert_eq!(
            ev.first_non_empty(&candidates(&["numero"])).as_deref(),
            Some("11988887777")
        );
    }

    #[test]
    fn test_non_object_nested_source_is_absent() {
        let ev = event(json!({"lead_data": "oops", "nome": "Ana"}));
        // lead_data is not an object, so the payload is treated as flat.
        assert_eq!(ev.first_non_empty(&candidates(&["nome"])).as_deref(), Some("Ana"));
    }
}
