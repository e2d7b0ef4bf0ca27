//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Number, Value};

use proofpack_core::receipt::fields;
use proofpack_core::{build_receipt, FixedClock, Payload, Receipt};

/// Generate a finite JSON number: integer or float.
pub fn json_number() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12f64).prop_filter_map("finite", |f| Number::from_f64(f).map(Value::Number)),
    ]
}

/// Generate a JSON scalar.
pub fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        json_number(),
        any::<String>().prop_map(Value::String),
    ]
}

/// Generate an arbitrary JSON value, nested a few levels deep.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_scalar().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(any::<String>(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate a payload key that does not collide with a reserved field.
pub fn payload_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_filter("reserved field", |k| !fields::RESERVED.contains(&k.as_str()))
}

/// Generate a payload with up to `max_keys` top-level keys.
pub fn payload(max_keys: usize) -> impl Strategy<Value = Payload> {
    prop::collection::btree_map(payload_key(), json_value(), 0..=max_keys)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate a tenant identifier.
pub fn tenant_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate a receipt type.
pub fn receipt_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ingest".to_string()),
        Just("anchor".to_string()),
        Just("verify".to_string()),
        "[a-z][a-z_]{0,15}",
    ]
}

/// Generate a timestamp between 2020 and 2040, in milliseconds.
pub fn timestamp_ms() -> impl Strategy<Value = i64> {
    1_577_836_800_000i64..2_208_988_800_000i64
}

/// Parameters for generating a receipt.
#[derive(Debug, Clone)]
pub struct ReceiptParams {
    pub receipt_type: String,
    pub tenant_id: String,
    pub payload: Payload,
    pub timestamp_ms: i64,
}

impl Arbitrary for ReceiptParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (receipt_type(), tenant_id(), payload(6), timestamp_ms())
            .prop_map(|(receipt_type, tenant_id, payload, timestamp_ms)| ReceiptParams {
                receipt_type,
                tenant_id,
                payload,
                timestamp_ms,
            })
            .boxed()
    }
}

/// Build a receipt from parameters.
///
/// Parameters from [`ReceiptParams::arbitrary`] always build.
pub fn receipt_from_params(params: &ReceiptParams) -> Receipt {
    build_receipt(
        &params.receipt_type,
        params.payload.clone(),
        &params.tenant_id,
        &FixedClock::from_millis(params.timestamp_ms),
    )
    .expect("generated receipt parameters are valid")
}

/// Generate a single-tenant batch of `len` receipts.
pub fn batch(len: impl Into<prop::collection::SizeRange>) -> impl Strategy<Value = Vec<Receipt>> {
    (tenant_id(), prop::collection::vec((payload(3), timestamp_ms()), len)).prop_map(
        |(tenant, items)| {
            items
                .into_iter()
                .map(|(payload, ts)| {
                    receipt_from_params(&ReceiptParams {
                        receipt_type: "ingest".into(),
                        tenant_id: tenant.clone(),
                        payload,
                        timestamp_ms: ts,
                    })
                })
                .collect()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofpack_core::{canonical_object, dual_hash, validate_receipt};

    proptest! {
        #[test]
        fn test_receipt_deterministic(params: ReceiptParams) {
            let r1 = receipt_from_params(&params);
            let r2 = receipt_from_params(&params);

            prop_assert_eq!(r1.leaf_digest(), r2.leaf_digest());
            prop_assert_eq!(r1.canonical_bytes(), r2.canonical_bytes());
        }

        #[test]
        fn test_generated_receipts_validate(params: ReceiptParams) {
            let r = receipt_from_params(&params);
            prop_assert!(validate_receipt(&r).is_ok());
            prop_assert_eq!(*r.payload_hash(), dual_hash(canonical_object(&params.payload).as_bytes()));
        }

        #[test]
        fn test_different_payloads_different_hashes(p1 in payload(4), p2 in payload(4)) {
            prop_assume!(p1 != p2);
            let h1 = dual_hash(canonical_object(&p1).as_bytes());
            let h2 = dual_hash(canonical_object(&p2).as_bytes());
            prop_assert_ne!(h1, h2);
        }

        #[test]
        fn test_batch_is_single_tenant(b in batch(1..8)) {
            let tenant = b[0].tenant_id().to_string();
            prop_assert!(b.iter().all(|r| r.tenant_id() == tenant));
        }
    }
}
