//! Receipt: the audit record of one operation.
//!
//! A receipt is immutable once built. Its serialized form is a flat JSON
//! object: the four reserved fields plus every top-level payload key.
//! Building a receipt is pure; writing it anywhere is the caller's job.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::canonical::{canonical_object, to_json_value, CanonicalBytes};
use crate::crypto::{dual_hash, Digest};
use crate::error::{CoreError, EncodingError, ValidationError};

/// Caller-supplied receipt data: string keys to JSON values.
pub type Payload = Map<String, Value>;

/// Field names owned by the receipt itself. Payload keys may not use them.
pub mod fields {
    pub const RECEIPT_TYPE: &str = "receipt_type";
    pub const TIMESTAMP: &str = "timestamp";
    pub const TENANT_ID: &str = "tenant_id";
    pub const PAYLOAD_HASH: &str = "payload_hash";

    pub const RESERVED: [&str; 4] = [RECEIPT_TYPE, TIMESTAMP, TENANT_ID, PAYLOAD_HASH];
}

/// Source of the current time, injected so receipts can be built
/// deterministically in tests and replays.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Freeze at `millis` since the Unix epoch. Out-of-range values clamp to
    /// the epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 0000-01-01T00:00:00Z, the earliest instant with a four-digit year.
const EARLIEST_SECS: i64 = -62_167_219_200;

/// 9999-12-31T23:59:59Z.
const LATEST_SECS: i64 = 253_402_300_799;

/// Format an instant as a receipt timestamp.
///
/// Always microsecond precision with a `Z` suffix, so every timestamp has
/// the same width and lexical order matches chronological order. Instants
/// outside years 0000 to 9999 clamp to the nearest end of that range.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let clamped = if at.timestamp() < EARLIEST_SECS {
        DateTime::from_timestamp(EARLIEST_SECS, 0)
    } else if at.timestamp() > LATEST_SECS {
        DateTime::from_timestamp(LATEST_SECS, 999_999_000)
    } else {
        Some(at)
    };
    clamped
        .unwrap_or(at)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a receipt timestamp. Accepts any RFC 3339 UTC instant written
/// with a `Z` suffix.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    if !s.ends_with('Z') {
        return Err(ValidationError::InvalidField {
            field: fields::TIMESTAMP,
            reason: "must be UTC with a 'Z' suffix".into(),
        });
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidField {
            field: fields::TIMESTAMP,
            reason: e.to_string(),
        })
}

/// Convert any serializable value into a receipt payload.
///
/// Fails with an encoding error if the value has no canonical form or is
/// not a JSON object.
pub fn payload_from<T: Serialize + ?Sized>(value: &T) -> Result<Payload, EncodingError> {
    match to_json_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(EncodingError::NotAnObject("null")),
        Value::Bool(_) => Err(EncodingError::NotAnObject("bool")),
        Value::Number(_) => Err(EncodingError::NotAnObject("number")),
        Value::String(_) => Err(EncodingError::NotAnObject("string")),
        Value::Array(_) => Err(EncodingError::NotAnObject("array")),
    }
}

/// Hash a payload the way receipts commit to it.
pub fn payload_digest(payload: &Payload) -> Digest {
    dual_hash(canonical_object(payload).as_bytes())
}

/// A complete receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    receipt_type: String,
    timestamp: String,
    tenant_id: String,
    payload_hash: Digest,
    payload: Payload,
}

impl Receipt {
    /// Assemble a receipt from already-checked parts.
    pub(crate) fn from_parts(
        receipt_type: String,
        timestamp: String,
        tenant_id: String,
        payload_hash: Digest,
        payload: Payload,
    ) -> Self {
        Self {
            receipt_type,
            timestamp,
            tenant_id,
            payload_hash,
            payload,
        }
    }

    pub fn receipt_type(&self) -> &str {
        &self.receipt_type
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn payload_hash(&self) -> &Digest {
        &self.payload_hash
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Look up one payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// The flat record: reserved fields plus payload keys.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.payload.clone();
        map.insert(
            fields::RECEIPT_TYPE.into(),
            Value::String(self.receipt_type.clone()),
        );
        map.insert(fields::TIMESTAMP.into(), Value::String(self.timestamp.clone()));
        map.insert(fields::TENANT_ID.into(), Value::String(self.tenant_id.clone()));
        map.insert(
            fields::PAYLOAD_HASH.into(),
            Value::String(self.payload_hash.to_string()),
        );
        map
    }

    /// Parse a flat record back into a receipt.
    ///
    /// Checks shape only; use [`crate::validate_receipt`] to also check the
    /// payload hash.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, ValidationError> {
        crate::validation::parse_receipt(map)
    }

    /// Canonical encoding of the whole flat record.
    pub fn canonical_bytes(&self) -> CanonicalBytes {
        canonical_object(&self.to_map())
    }

    /// The receipt's Merkle leaf: the dual hash of its canonical record.
    pub fn leaf_digest(&self) -> Digest {
        dual_hash(self.canonical_bytes().as_bytes())
    }

    /// Whether `payload_hash` matches the payload carried.
    pub fn payload_hash_matches(&self) -> bool {
        payload_digest(&self.payload) == self.payload_hash
    }
}

impl Serialize for Receipt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Receipt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Receipt::from_map(map).map_err(serde::de::Error::custom)
    }
}

/// Build a receipt from caller data and the required metadata.
///
/// Fails without building anything if `receipt_type` or `tenant_id` is
/// blank, or if a payload key would shadow a reserved field.
pub fn build_receipt(
    receipt_type: &str,
    payload: Payload,
    tenant_id: &str,
    clock: &dyn Clock,
) -> Result<Receipt, CoreError> {
    if receipt_type.trim().is_empty() {
        return Err(ValidationError::EmptyReceiptType.into());
    }
    if tenant_id.trim().is_empty() {
        return Err(ValidationError::EmptyTenantId.into());
    }
    if let Some(key) = fields::RESERVED.iter().find(|k| payload.contains_key(**k)) {
        return Err(ValidationError::ReservedField((*key).to_string()).into());
    }

    let payload_hash = payload_digest(&payload);

    Ok(Receipt::from_parts(
        receipt_type.to_string(),
        format_timestamp(clock.now()),
        tenant_id.to_string(),
        payload_hash,
        payload,
    ))
}

/// Builder for receipts.
#[derive(Debug, Clone)]
pub struct ReceiptBuilder {
    receipt_type: String,
    tenant_id: String,
    payload: Payload,
}

impl ReceiptBuilder {
    /// Start building a receipt.
    pub fn new(receipt_type: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            receipt_type: receipt_type.into(),
            tenant_id: tenant_id.into(),
            payload: Payload::new(),
        }
    }

    /// Set one payload field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Merge a whole payload object.
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload.extend(payload);
        self
    }

    /// Build the receipt at the clock's current time.
    pub fn build(self, clock: &dyn Clock) -> Result<Receipt, CoreError> {
        build_receipt(&self.receipt_type, self.payload, &self.tenant_id, clock)
    }
}
