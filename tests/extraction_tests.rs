/// Unit tests for the webhook pipeline's decision logic
/// Tests acquisition, classification and extraction together on realistic Telein payloads
use serde_json::{json, Value};
use telein_ipluc_bridge::classification::classify;
use telein_ipluc_bridge::errors::PipelineError;
use telein_ipluc_bridge::extraction::{extract_lead, UNKNOWN_CALLER_NAME};
use telein_ipluc_bridge::webhook_models::InboundEvent;

fn acquire_json(value: Value) -> InboundEvent {
    InboundEvent::acquire(value.to_string().as_bytes(), &[], "1")
}

#[cfg(test)]
mod keypress_tests {
    use super::*;

    #[test]
    fn test_digit_keypress_is_extracted() {
        let event = acquire_json(json!({
            "event_type": "key_pressed",
            "key": "5",
            "client_data": {"nome": "Maria", "telefone": "(11) 99999-9999"}
        }));

        let classification = classify(&event);
        assert!(classification.proceed);
        assert_eq!(classification.event_type, "key_pressed");

        let lead = extract_lead(&event).unwrap();
        assert_eq!(lead.phone, "11999999999");
        assert_eq!(lead.name, "Maria");
    }

    #[test]
    fn test_star_and_missing_key_are_ignored() {
        let star = acquire_json(json!({"event_type": "key_pressed", "key": "*"}));
        assert!(!classify(&star).proceed);

        let missing = acquire_json(json!({"event_type": "key_pressed"}));
        assert!(!classify(&missing).proceed);
    }
}

#[cfg(test)]
mod extraction_tests {
    use super::*;

    #[test]
    fn test_top_level_fallback() {
        let event = acquire_json(json!({
            "event_type": "lead_created",
            "telefone": "11988887777",
            "nome": "Ana"
        }));

        let lead = extract_lead(&event).unwrap();
        assert_eq!(lead.phone, "11988887777");
        assert_eq!(lead.name, "Ana");
    }

    #[test]
    fn test_synonyms_across_sources() {
        let event = acquire_json(json!({
            "event_type": "call_answered",
            "lead_data": {"cliente_nome": "Pedro Alves"},
            "call_data": {"caller_id": "+55 21 99876-5432", "mailing": "Aposentados"},
            "client_data": {"documento": "987.654.321-00"}
        }));

        let lead = extract_lead(&event).unwrap();
        assert_eq!(lead.name, "Pedro Alves");
        assert_eq!(lead.phone, "21998765432");
        assert_eq!(lead.document_id, "98765432100");
        assert_eq!(lead.campaign.as_deref(), Some("Aposentados"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let payload = json!({
            "lead_data": {"phone": "11911112222", "nome": "A"},
            "client_data": {"telefone": "11933334444", "name": "B"},
            "telefone": "11955556666"
        });

        let first = extract_lead(&acquire_json(payload.clone())).unwrap();
        for _ in 0..10 {
            assert_eq!(extract_lead(&acquire_json(payload.clone())).unwrap(), first);
        }
        assert_eq!(first.phone, "11911112222");
        assert_eq!(first.name, "A");
    }

    #[test]
    fn test_every_phone_empty_is_missing_field() {
        let event = acquire_json(json!({
            "event_type": "lead_created",
            "lead_data": {"nome": "Ana", "telefone": ""},
            "client_data": {"phone": null, "celular": "   "},
            "call_data": {"numero": "n/a"}
        }));

        assert_eq!(
            extract_lead(&event).unwrap_err(),
            PipelineError::MissingRequiredField("phone")
        );
    }

    #[test]
    fn test_query_payload_extracts_client_data() {
        let query = vec![
            ("nome".to_string(), "Rita".to_string()),
            ("telefone".to_string(), "5511977776666".to_string()),
            ("campanha".to_string(), "FGTS".to_string()),
            ("cpf".to_string(), "111.222.333-44".to_string()),
        ];
        let event = InboundEvent::acquire(b"", &query, "7");

        let classification = classify(&event);
        assert!(classification.proceed);
        assert_eq!(classification.key.as_deref(), Some("7"));

        let lead = extract_lead(&event).unwrap();
        assert_eq!(lead.phone, "11977776666");
        assert_eq!(lead.document_id, "11122233344");
        assert_eq!(lead.campaign.as_deref(), Some("FGTS"));
    }

    #[test]
    fn test_query_without_name_uses_placeholder() {
        let query = vec![("telefone".to_string(), "11977776666".to_string())];
        let lead = extract_lead(&InboundEvent::acquire(b"", &query, "1")).unwrap();
        assert_eq!(lead.name, UNKNOWN_CALLER_NAME);
    }
}
