//! Proptest generators for property-based testing.

use proptest::prelude::*;

use docseal_core::{Algorithm, DocumentHash, KeyStatus, ReportStatus, ReportType};

/// A well-formed lowercase hex SHA-256.
pub fn hash_hex() -> impl Strategy<Value = String> {
    any::<[u8; 32]>().prop_map(hex::encode)
}

/// A parsed document hash.
pub fn document_hash() -> impl Strategy<Value = DocumentHash> {
    hash_hex().prop_map(|hex| DocumentHash::parse(&hex).expect("generated hash parses"))
}

/// A valid hash as a caller might type it: mixed case, padded with spaces.
pub fn sloppy_hash() -> impl Strategy<Value = (String, String)> {
    (hash_hex(), any::<u64>(), 0usize..3, 0usize..3).prop_map(|(hex, mask, lead, trail)| {
        let typed: String = hex
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if (mask >> (i % 64)) & 1 == 1 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect();
        let typed = format!("{}{}{}", " ".repeat(lead), typed, " ".repeat(trail));
        (typed, hex)
    })
}

/// Strings that must never parse as a document hash.
pub fn malformed_hash() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9a-f]{0,63}",
        "[0-9a-f]{65,80}",
        "[0-9a-f]{10}[g-z][0-9a-f]{53}",
    ]
}

/// Raw document content.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len)
}

pub fn algorithm() -> impl Strategy<Value = Algorithm> {
    prop::sample::select(Algorithm::ALL.to_vec())
}

pub fn key_status() -> impl Strategy<Value = KeyStatus> {
    prop::sample::select(KeyStatus::ALL.to_vec())
}

pub fn report_type() -> impl Strategy<Value = ReportType> {
    prop::sample::select(ReportType::ALL.to_vec())
}

pub fn report_status() -> impl Strategy<Value = ReportStatus> {
    prop::sample::select(ReportStatus::ALL.to_vec())
}

/// Offsets (ms) for a series of sweeps, relative to a key's expiry.
pub fn sweep_offsets() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-10_000i64..10_000i64, 1..8)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn sloppy_hashes_normalise(pair in sloppy_hash()) {
            let (typed, canonical) = pair;
            let parsed = DocumentHash::parse(&typed).unwrap();
            prop_assert_eq!(parsed.as_str(), canonical.as_str());
        }

        #[test]
        fn malformed_hashes_rejected(raw in malformed_hash()) {
            prop_assert!(DocumentHash::parse(&raw).is_err());
        }
    }
}
