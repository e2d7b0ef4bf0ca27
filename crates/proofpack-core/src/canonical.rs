//! Canonical JSON encoding for deterministic hashing.
//!
//! The canonical form is compact JSON with:
//! - Object keys sorted by their UTF-8 bytes, at every nesting level
//! - No insignificant whitespace
//! - Integers in plain decimal, finite floats in shortest round-trip form
//! - Strings JSON-escaped, non-ASCII characters written as raw UTF-8
//!
//! Non-finite floats (NaN, ±Infinity) have no canonical form and are
//! rejected before encoding. `serde_json` would otherwise turn them into
//! `null`, and two different payloads would share one hash.
//!
//! Every byte that feeds a receipt hash or a Merkle leaf goes through
//! [`CanonicalBytes`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EncodingError;

/// Bytes produced by the canonical encoder.
///
/// The inner buffer is private; the only constructors run the full pipeline,
/// so holding a `CanonicalBytes` means the encoding rules were applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(String);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodingError> {
        let value = to_json_value(value)?;
        Ok(Self::from_value(&value))
    }

    /// Canonicalize an already-parsed JSON value. JSON values cannot hold
    /// non-finite numbers, so this cannot fail.
    pub fn from_value(value: &Value) -> Self {
        let mut out = String::new();
        write_value(&mut out, value);
        Self(out)
    }

    /// Access the canonical bytes for hashing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The canonical text. Always valid UTF-8.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Canonicalize any serializable value.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<CanonicalBytes, EncodingError> {
    CanonicalBytes::new(value)
}

/// Convert a serializable value to JSON, rejecting anything without a
/// canonical form instead of letting `serde_json` coerce it to `null`.
pub fn to_json_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, EncodingError> {
    value.serialize(finite::FiniteCheck)?;
    serde_json::to_value(value).map_err(|e| EncodingError::Serialization(e.to_string()))
}

/// Canonicalize a JSON value.
pub fn canonical_value(value: &Value) -> CanonicalBytes {
    CanonicalBytes::from_value(value)
}

/// Canonicalize a JSON object.
pub fn canonical_object(map: &Map<String, Value>) -> CanonicalBytes {
    let mut out = String::new();
    write_object(&mut out, map);
    CanonicalBytes(out)
}

/// Recursively write a JSON value in canonical form.
fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        // serde_json prints integers in decimal and floats via ryu
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map),
    }
}

/// Write an object with its keys sorted by UTF-8 bytes.
///
/// `serde_json::Map` iterates in key order only without `preserve_order`,
/// and that feature can be switched on by any crate in the build, so the
/// order is imposed here.
fn write_object(out: &mut String, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

/// Same escapes `serde_json` emits: short forms where JSON has them,
/// `\u00XX` for other control characters, everything else verbatim.
fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c < '\u{20}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A serializer that walks a value only to reject non-finite floats and
/// map keys that are not strings.
mod finite {
    use serde::ser::{self, Serialize};
    use std::fmt;

    use crate::error::EncodingError;

    #[derive(Debug)]
    pub(super) enum Rejected {
        NonFinite(f64),
        NonStringKey(&'static str),
        Custom(String),
    }

    impl fmt::Display for Rejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Rejected::NonFinite(v) => write!(f, "non-finite float {v}"),
                Rejected::NonStringKey(kind) => write!(f, "{kind} map key"),
                Rejected::Custom(msg) => f.write_str(msg),
            }
        }
    }

    impl std::error::Error for Rejected {}

    impl ser::Error for Rejected {
        fn custom<T: fmt::Display>(msg: T) -> Self {
            Rejected::Custom(msg.to_string())
        }
    }

    impl From<Rejected> for EncodingError {
        fn from(r: Rejected) -> Self {
            match r {
                Rejected::NonFinite(v) => EncodingError::NonFiniteFloat(v),
                Rejected::NonStringKey(kind) => EncodingError::NonStringKey(kind),
                Rejected::Custom(msg) => EncodingError::Serialization(msg),
            }
        }
    }

    type Checked = Result<(), Rejected>;

    fn check_float(v: f64) -> Checked {
        if v.is_finite() {
            Ok(())
        } else {
            Err(Rejected::NonFinite(v))
        }
    }

    pub(super) struct FiniteCheck;

    impl ser::Serializer for FiniteCheck {
        type Ok = ();
        type Error = Rejected;
        type SerializeSeq = Self;
        type SerializeTuple = Self;
        type SerializeTupleStruct = Self;
        type SerializeTupleVariant = Self;
        type SerializeMap = Self;
        type SerializeStruct = Self;
        type SerializeStructVariant = Self;

        fn serialize_bool(self, _: bool) -> Checked {
            Ok(())
        }
        fn serialize_i8(self, _: i8) -> Checked {
            Ok(())
        }
        fn serialize_i16(self, _: i16) -> Checked {
            Ok(())
        }
        fn serialize_i32(self, _: i32) -> Checked {
            Ok(())
        }
        fn serialize_i64(self, _: i64) -> Checked {
            Ok(())
        }
        fn serialize_i128(self, _: i128) -> Checked {
            Ok(())
        }
        fn serialize_u8(self, _: u8) -> Checked {
            Ok(())
        }
        fn serialize_u16(self, _: u16) -> Checked {
            Ok(())
        }
        fn serialize_u32(self, _: u32) -> Checked {
            Ok(())
        }
        fn serialize_u64(self, _: u64) -> Checked {
            Ok(())
        }
        fn serialize_u128(self, _: u128) -> Checked {
            Ok(())
        }
        fn serialize_f32(self, v: f32) -> Checked {
            check_float(f64::from(v))
        }
        fn serialize_f64(self, v: f64) -> Checked {
            check_float(v)
        }
        fn serialize_char(self, _: char) -> Checked {
            Ok(())
        }
        fn serialize_str(self, _: &str) -> Checked {
            Ok(())
        }
        fn serialize_bytes(self, _: &[u8]) -> Checked {
            Ok(())
        }
        fn serialize_none(self) -> Checked {
            Ok(())
        }
        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Checked {
            value.serialize(self)
        }
        fn serialize_unit(self) -> Checked {
            Ok(())
        }
        fn serialize_unit_struct(self, _: &'static str) -> Checked {
            Ok(())
        }
        fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
            Ok(())
        }
        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            value: &T,
        ) -> Checked {
            value.serialize(self)
        }
        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            value: &T,
        ) -> Checked {
            value.serialize(self)
        }
        fn serialize_seq(self, _: Option<usize>) -> Result<Self, Rejected> {
            Ok(self)
        }
        fn serialize_tuple(self, _: usize) -> Result<Self, Rejected> {
            Ok(self)
        }
        fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, Rejected> {
            Ok(self)
        }
        fn serialize_tuple_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self, Rejected> {
            Ok(self)
        }
        fn serialize_map(self, _: Option<usize>) -> Result<Self, Rejected> {
            Ok(self)
        }
        fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, Rejected> {
            Ok(self)
        }
        fn serialize_struct_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self, Rejected> {
            Ok(self)
        }
    }

    impl ser::SerializeSeq for FiniteCheck {
        type Ok = ();
        type Error = Rejected;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
            value.serialize(FiniteCheck)
        }
        fn end(self) -> Checked {
            Ok(())
        }
    }

    impl ser::SerializeTuple for FiniteCheck {
        type Ok = ();
        type Error = Rejected;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
            value.serialize(FiniteCheck)
        }
        fn end(self) -> Checked {
            Ok(())
        }
    }

    impl ser::SerializeTupleStruct for FiniteCheck {
        type Ok = ();
        type Error = Rejected;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
            value.serialize(FiniteCheck)
        }
        fn end(self) -> Checked {
            Ok(())
        }
    }

    impl ser::SerializeTupleVariant for FiniteCheck {
        type Ok = ();
        type Error = Rejected;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
            value.serialize(FiniteCheck)
        }
        fn end(self) -> Checked {
            Ok(())
        }
    }

    impl ser::SerializeMap for FiniteCheck {
        type Ok = ();
        type Error = Rejected;

        fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Checked {
            key.serialize(KeyCheck)
        }
        fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
            value.serialize(FiniteCheck)
        }
        fn end(self) -> Checked {
            Ok(())
        }
    }

    impl ser::SerializeStruct for FiniteCheck {
        type Ok = ();
        type Error = Rejected;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
            value.serialize(FiniteCheck)
        }
        fn end(self) -> Checked {
            Ok(())
        }
    }

    impl ser::SerializeStructVariant for FiniteCheck {
        type Ok = ();
        type Error = Rejected;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
            value.serialize(FiniteCheck)
        }
        fn end(self) -> Checked {
            Ok(())
        }
    }

    /// Accepts only keys that serialize as strings.
    ///
    /// `serde_json` would quietly print integer and bool keys as strings,
    /// making `{1: x}` and `{"1": x}` share one canonical form.
    struct KeyCheck;

    fn non_string(kind: &'static str) -> Checked {
        Err(Rejected::NonStringKey(kind))
    }

    impl ser::Serializer for KeyCheck {
        type Ok = ();
        type Error = Rejected;
        type SerializeSeq = ser::Impossible<(), Rejected>;
        type SerializeTuple = ser::Impossible<(), Rejected>;
        type SerializeTupleStruct = ser::Impossible<(), Rejected>;
        type SerializeTupleVariant = ser::Impossible<(), Rejected>;
        type SerializeMap = ser::Impossible<(), Rejected>;
        type SerializeStruct = ser::Impossible<(), Rejected>;
        type SerializeStructVariant = ser::Impossible<(), Rejected>;

        fn serialize_str(self, _: &str) -> Checked {
            Ok(())
        }
        fn serialize_char(self, _: char) -> Checked {
            Ok(())
        }
        fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
            Ok(())
        }
        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            value: &T,
        ) -> Checked {
            value.serialize(self)
        }

        fn serialize_bool(self, _: bool) -> Checked {
            non_string("bool")
        }
        fn serialize_i8(self, _: i8) -> Checked {
            non_string("integer")
        }
        fn serialize_i16(self, _: i16) -> Checked {
            non_string("integer")
        }
        fn serialize_i32(self, _: i32) -> Checked {
            non_string("integer")
        }
        fn serialize_i64(self, _: i64) -> Checked {
            non_string("integer")
        }
        fn serialize_i128(self, _: i128) -> Checked {
            non_string("integer")
        }
        fn serialize_u8(self, _: u8) -> Checked {
            non_string("integer")
        }
        fn serialize_u16(self, _: u16) -> Checked {
            non_string("integer")
        }
        fn serialize_u32(self, _: u32) -> Checked {
            non_string("integer")
        }
        fn serialize_u64(self, _: u64) -> Checked {
            non_string("integer")
        }
        fn serialize_u128(self, _: u128) -> Checked {
            non_string("integer")
        }
        fn serialize_f32(self, _: f32) -> Checked {
            non_string("float")
        }
        fn serialize_f64(self, _: f64) -> Checked {
            non_string("float")
        }
        fn serialize_bytes(self, _: &[u8]) -> Checked {
            non_string("bytes")
        }
        fn serialize_none(self) -> Checked {
            non_string("null")
        }
        fn serialize_some<T: ?Sized + Serialize>(self, _: &T) -> Checked {
            non_string("optional")
        }
        fn serialize_unit(self) -> Checked {
            non_string("unit")
        }
        fn serialize_unit_struct(self, _: &'static str) -> Checked {
            non_string("unit struct")
        }
        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: &T,
        ) -> Checked {
            non_string("enum")
        }
        fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, Rejected> {
            Err(Rejected::NonStringKey("sequence"))
        }
        fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, Rejected> {
            Err(Rejected::NonStringKey("tuple"))
        }
        fn serialize_tuple_struct(
            self,
            _: &'static str,
            _: usize,
        ) -> Result<Self::SerializeTupleStruct, Rejected> {
            Err(Rejected::NonStringKey("tuple struct"))
        }
        fn serialize_tuple_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self::SerializeTupleVariant, Rejected> {
            Err(Rejected::NonStringKey("enum"))
        }
        fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, Rejected> {
            Err(Rejected::NonStringKey("map"))
        }
        fn serialize_struct(
            self,
            _: &'static str,
            _: usize,
        ) -> Result<Self::SerializeStruct, Rejected> {
            Err(Rejected::NonStringKey("struct"))
        }
        fn serialize_struct_variant(
            self,
            _: &'static str,
            _: u32,
            _: &'static str,
            _: usize,
        ) -> Result<Self::SerializeStructVariant, Rejected> {
            Err(Rejected::NonStringKey("enum"))
        }
    }
}
