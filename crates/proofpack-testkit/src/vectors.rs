//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the dual hash and the canonical JSON encoding so that
//! every implementation exchanging receipts produces identical digests.

use proofpack_core::{canonical_value, dual_hash};

/// A dual-hash vector over raw bytes.
#[derive(Debug, Clone)]
pub struct HashVector {
    pub name: &'static str,
    pub input: &'static [u8],
    /// Expected `"<sha256>:<blake3>"` string.
    pub expected: &'static str,
}

/// A canonical-encoding vector: JSON in, canonical text and digest out.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    pub name: &'static str,
    /// Input JSON, keys in arbitrary order.
    pub json: &'static str,
    pub expected_canonical: &'static str,
    pub expected_digest: &'static str,
}

/// Raw-byte dual-hash vectors.
pub fn hash_vectors() -> Vec<HashVector> {
    vec![
        HashVector {
            name: "empty input",
            input: b"",
            expected: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855:af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262",
        },
        HashVector {
            name: "abc",
            input: b"abc",
            expected: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad:6437b3ac38465133ffb63b75273a8db548c558465d79db03fd359c6cd5bd9d85",
        },
        HashVector {
            name: "hello world",
            input: b"hello world",
            expected: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9:d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24",
        },
        HashVector {
            name: "empty batch marker",
            input: b"empty",
            expected: "2e1cfa82b035c26cbbbdae632cea070514eb8b773f616aaeaf668e2f0be8f10d:6bdf3fe55052831d222fc6b82b2ba03f32b3599410fafd317642e21925c38f16",
        },
        HashVector {
            name: "1KB of 0x42",
            input: &[0x42; 1024],
            expected: "9b6ce55f379e9771551de6939556a7e6b949814ae27c2f5cfd5dbeb378ce7c2a:eb10230cafaa44571a44261fbcefb51f2d9c536417abbd1b66bfc9b15fb2f3b9",
        },
    ]
}

/// Canonical-encoding vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "sorted keys with mixed scalars",
            json: r#"{"b":1,"a":[true,null,1.5]}"#,
            expected_canonical: r#"{"a":[true,null,1.5],"b":1}"#,
            expected_digest: "f50cd596f206dcb01e326930717aefdc28eb7d0f29df67306f264f1dd20b2eaf:503344991461af026c8a93eb8bc545c8a2ec7ffbb145d3e41012934fc1710e7f",
        },
        GoldenVector {
            name: "nested object and raw UTF-8",
            json: r#"{"z":{"y":2,"x":1},"a":"café"}"#,
            expected_canonical: r#"{"a":"café","z":{"x":1,"y":2}}"#,
            expected_digest: "946f710fdf1b82f79b49211e2b9ba12c615c01d1ec3266fa104e43ace1145654:0d06f8b1f68b818327294d65178e4adee86d70dc38ace881962426f706302d53",
        },
        GoldenVector {
            name: "escaped string",
            json: r#"{"msg":"line\nbreak \"quoted\""}"#,
            expected_canonical: r#"{"msg":"line\nbreak \"quoted\""}"#,
            expected_digest: "08e8106c22fce10c8807d0fa9d6c0040f4cedfee9c7e381a49f62288e4e132b6:4b7771939ba7ab3adb19678b895248bebeb7366cba2c11243bf3e43fc08dd03f",
        },
        GoldenVector {
            name: "realistic inspection payload",
            json: r#"{"entity":"Clayton High School","score":90,"violations":5,"timestamp_ms":1736870400000}"#,
            expected_canonical: r#"{"entity":"Clayton High School","score":90,"timestamp_ms":1736870400000,"violations":5}"#,
            expected_digest: "0fe10efdda3d148743cb8a3daa22337a67ccf0b1dc154343570e9e9e08e85f5d:5c34db527e6eb5b4b23cc9b889e04690088f6b786a42eb1993ad3a043a5d94e8",
        },
    ]
}

/// Check every vector against this build.
///
/// Returns `(name, matches, actual)` per vector, hash vectors first.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let hashes = hash_vectors().into_iter().map(|v| {
        let actual = dual_hash(v.input).to_string();
        (v.name.to_string(), actual == v.expected, actual)
    });

    let encodings = all_vectors().into_iter().map(|v| match serde_json::from_str(v.json) {
        Ok(value) => {
            let canonical = canonical_value(&value);
            let actual = dual_hash(canonical.as_bytes()).to_string();
            let matches = canonical.as_str() == v.expected_canonical && actual == v.expected_digest;
            (v.name.to_string(), matches, actual)
        }
        Err(e) => (v.name.to_string(), false, e.to_string()),
    });

    hashes.chain(encodings).collect()
}
