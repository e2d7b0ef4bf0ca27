//! Receipt validation: structural checks and payload hash verification.

use serde_json::{Map, Value};

use crate::crypto::Digest;
use crate::error::ValidationError;
use crate::receipt::{fields, parse_timestamp, Receipt};

/// Parse a flat JSON record into a receipt.
///
/// Reserved fields are pulled out and checked for presence and type; every
/// other key becomes payload.
pub(crate) fn parse_receipt(mut map: Map<String, Value>) -> Result<Receipt, ValidationError> {
    let receipt_type = take_string(&mut map, fields::RECEIPT_TYPE)?;
    let timestamp = take_string(&mut map, fields::TIMESTAMP)?;
    let tenant_id = take_string(&mut map, fields::TENANT_ID)?;
    let payload_hash = take_string(&mut map, fields::PAYLOAD_HASH)?;
    let payload_hash = Digest::parse(&payload_hash)?;

    let receipt = Receipt::from_parts(receipt_type, timestamp, tenant_id, payload_hash, map);
    validate_receipt_structure(&receipt)?;
    Ok(receipt)
}

fn take_string(map: &mut Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ValidationError::InvalidField {
            field,
            reason: format!("expected string, got {}", type_name(&other)),
        }),
        None => Err(ValidationError::MissingField(field)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a receipt fully.
///
/// This performs:
/// - Structural checks (see [`validate_receipt_structure`])
/// - Payload hash verification
pub fn validate_receipt(receipt: &Receipt) -> Result<(), ValidationError> {
    validate_receipt_structure(receipt)?;

    if !receipt.payload_hash_matches() {
        return Err(ValidationError::PayloadHashMismatch);
    }

    Ok(())
}

/// Validate receipt structure without recomputing the payload hash.
pub fn validate_receipt_structure(receipt: &Receipt) -> Result<(), ValidationError> {
    if receipt.receipt_type().trim().is_empty() {
        return Err(ValidationError::EmptyReceiptType);
    }
    if receipt.tenant_id().trim().is_empty() {
        return Err(ValidationError::EmptyTenantId);
    }
    parse_timestamp(receipt.timestamp())?;

    if let Some(key) = fields::RESERVED
        .iter()
        .find(|k| receipt.payload().contains_key(**k))
    {
        return Err(ValidationError::ReservedField((*key).to_string()));
    }

    Ok(())
}
