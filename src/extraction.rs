//! Lead field extraction and phone normalization.
//!
//! Every field is resolved independently with the same first-non-empty
//! policy over a fixed list of synonyms (see [`InboundEvent::first_non_empty`]).
//! The synonym lists capture the schema variations Telein has sent over time.

use crate::errors::PipelineError;
use crate::webhook_models::{candidates, InboundEvent};
use phonenumber::country::Id as CountryId;
use serde::Serialize;

pub const NAME_KEYS: [&str; 4] = ["nome", "name", "nome_completo", "cliente_nome"];
pub const PHONE_KEYS: [&str; 6] = [
    "telefone",
    "phone",
    "celular",
    "telefone_1",
    "numero",
    "caller_id",
];
pub const DOCUMENT_KEYS: [&str; 4] = ["cpf", "documento", "document", "cpf_cliente"];
pub const CAMPAIGN_KEYS: [&str; 4] = ["campanha", "campaign", "mailing", "campaign_name"];

/// Name sent to the CRM when the caller could not be identified.
pub const UNKNOWN_CALLER_NAME: &str = "Cliente Telein";

/// Normalized lead ready to be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedLead {
    pub name: String,
    /// Digits only, see [`normalize_phone`]. Never empty.
    pub phone: String,
    /// Digits only, empty when absent.
    pub document_id: String,
    pub campaign: Option<String>,
}

/// Pulls name, phone, document and campaign out of a Telein event.
///
/// Fails with `MissingRequiredField("phone")` when no candidate yields a phone
/// with at least one digit. A missing name is replaced by a placeholder.
pub fn extract_lead(event: &InboundEvent) -> Result<ExtractedLead, PipelineError> {
    let raw_phone = event
        .first_non_empty(&candidates(&PHONE_KEYS))
        .unwrap_or_default();
    let phone = normalize_phone(&raw_phone);
    if phone.is_empty() {
        return Err(PipelineError::MissingRequiredField("phone"));
    }

    if !is_plausible_br_phone(&phone) {
        tracing::warn!(
            "⚠️  Phone {} does not look like a Brazilian number, forwarding anyway",
            phone
        );
    }

    let name = event
        .first_non_empty(&candidates(&NAME_KEYS))
        .unwrap_or_else(|| UNKNOWN_CALLER_NAME.to_string());

    // Remove formatting: 123.456.789-01 -> 12345678901
    let document_id = event
        .first_non_empty(&candidates(&DOCUMENT_KEYS))
        .map(|doc| doc.chars().filter(|c| c.is_ascii_digit()).collect())
        .unwrap_or_default();

    let campaign = event.first_non_empty(&candidates(&CAMPAIGN_KEYS));

    Ok(ExtractedLead {
        name,
        phone,
        document_id,
        campaign,
    })
}

/// Canonicalizes a phone number to Brazilian national digits.
///
/// Strips every non-digit. Ten digits (area code + landline) and eleven
/// (area code + mobile) are kept as they are, shorter inputs pass through
/// for the CRM to validate, and longer inputs keep their last eleven digits,
/// dropping a leading country code such as `55`.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() > 11 {
        digits[digits.len() - 11..].to_string()
    } else {
        digits
    }
}

/// Checks a normalized number against Brazilian numbering rules.
///
/// Only used to warn; the CRM is the authority on what it accepts.
pub fn is_plausible_br_phone(digits: &str) -> bool {
    if digits.len() < 10 {
        return false;
    }

    match phonenumber::parse(Some(CountryId::BR), digits) {
        Ok(number) => phonenumber::is_valid(&number),
        Err(e) => {
            tracing::debug!("Failed to parse BR phone '{}': {:?}", digits, e);
            false
        }
    }
}
