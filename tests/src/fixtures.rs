//! Test fixtures and payload generators.

use uuid::Uuid;

/// `leads.enrich` payload for a lead, with an extra field the worker ignores.
pub fn enrich_payload(lead_id: i64) -> Vec<u8> {
    serde_json::json!({
        "lead_id": lead_id,
        "source": "landing-page"
    })
    .to_string()
    .into_bytes()
}

/// `leads.webhook` payload.
pub fn webhook_payload(lead_id: i64, status: &str) -> Vec<u8> {
    serde_json::json!({
        "lead_id": lead_id,
        "status": status
    })
    .to_string()
    .into_bytes()
}

/// Decodable payload without a `lead_id`.
pub fn empty_payload() -> Vec<u8> {
    b"{}".to_vec()
}

/// Payload that is not JSON.
pub fn malformed_payload() -> Vec<u8> {
    b"{lead_id: 42".to_vec()
}

/// Unique email for a freshly inserted lead.
pub fn unique_email() -> String {
    format!("lead-{}@example.com", Uuid::new_v4())
}
