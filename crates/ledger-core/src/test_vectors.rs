//! Fixed hash vectors
//!
//! Digests below are the expected SHA-256 outputs for hand-picked inputs;
//! any change to the preimage layout or payload encoding breaks them.

use crate::integrity::{compute_hash, hash_entry};
use crate::types::*;
use serde_json::json;
use sha2::{Digest, Sha256};

#[test]
fn test_origin_hash_is_raw_text_digest() {
    // The origin hash predates JSON payload encoding: it digests the payload
    // text without quotes, so it is compared verbatim and never recomputed.
    let digest = Sha256::digest(b"001465154705my genesis block!!");
    assert_eq!(hex::encode(digest), ORIGIN_HASH);
    assert_ne!(hash_entry(&Entry::origin()).unwrap(), ORIGIN_HASH);
}

#[test]
fn test_string_payload_vector() {
    let hash = compute_hash(1, ORIGIN_HASH, 1_465_154_800.0, &Payload::from("A")).unwrap();
    assert_eq!(
        hash,
        "c78a249be5860120871c48b17983a47f1571598f42b96c1b58a53682de89d02f"
    );
}

#[test]
fn test_structured_payload_vector() {
    // Keys given out of order; the hash covers {"a":[true,null],"b":1}
    let payload = Payload::from(json!({"b": 1, "a": [true, null]}));
    let hash = compute_hash(1, ORIGIN_HASH, 1_465_154_800.5, &payload).unwrap();
    assert_eq!(
        hash,
        "31b010ff189f2299f2c972b1deef03755e45a26eb5f32314e6ee73c1a8aaecb8"
    );
}
