//! Message envelope codec.
//!
//! Decoding is two-step: [`Envelope::decode`] fails only when the payload is
//! not a well-formed JSON object (or carries an unusable `lead_id`), while the
//! `into_*` conversions surface a missing identifier as [`Error::EmptyKey`].
//! An empty key is a valid message that can never succeed, not a decode error.
//!
//! Fields other than `lead_id` stay untyped in [`Envelope::extra`]; only the
//! webhook conversion gives `status` a type.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::lead::{LeadEvent, LeadId, WebhookEvent};

/// Decoded but not yet validated message body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "deserialize_lead_id")]
    pub lead_id: Option<LeadId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLeadId {
    Number(i64),
    Text(String),
}

fn deserialize_lead_id<'de, D>(deserializer: D) -> std::result::Result<Option<LeadId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawLeadId>::deserialize(deserializer)
        .map_err(|_| de::Error::custom("lead_id must be an integer or a string of digits"))?;

    match raw {
        None | Some(RawLeadId::Number(0)) => Ok(None),
        Some(RawLeadId::Number(n)) => LeadId::new(n)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("lead_id must be positive, got {}", n))),
        Some(RawLeadId::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<i64>()
                .ok()
                .and_then(|n| if n == 0 { Some(None) } else { LeadId::new(n).map(Some) })
                .ok_or_else(|| de::Error::custom(format!("lead_id is not a valid id: {:?}", text)))
        }
    }
}

impl Envelope {
    /// Parses a raw message body.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;

        if !value.is_object() {
            return Err(Error::malformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&value)
            )));
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Validates the envelope as an enrichment event.
    pub fn into_lead_event(self) -> Result<LeadEvent> {
        let lead_id = self.lead_id.ok_or(Error::EmptyKey)?;
        Ok(LeadEvent {
            lead_id,
            extra: self.extra,
        })
    }

    /// Validates the envelope as a webhook notification.
    ///
    /// `status` must be a string when present.
    pub fn into_webhook_event(mut self) -> Result<WebhookEvent> {
        let lead_id = self.lead_id.ok_or(Error::EmptyKey)?;
        let status = match self.extra.remove("status") {
            None | Some(Value::Null) => None,
            Some(Value::String(status)) => Some(status),
            Some(other) => {
                return Err(Error::malformed(format!(
                    "status must be a string, got {}",
                    json_type_name(&other)
                )))
            }
        };
        Ok(WebhookEvent { lead_id, status })
    }
}

/// Decodes and validates a `leads.enrich` message.
pub fn decode_lead_event(bytes: &[u8]) -> Result<LeadEvent> {
    Envelope::decode(bytes)?.into_lead_event()
}

/// Decodes and validates a `leads.webhook` message.
pub fn decode_webhook_event(bytes: &[u8]) -> Result<WebhookEvent> {
    Envelope::decode(bytes)?.into_webhook_event()
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
