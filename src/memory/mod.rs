pub mod chunker;
pub mod ingest;
pub mod search;
pub mod stats;
pub mod store;
pub mod types;

use sha2::{Digest, Sha256};

/// Hex characters kept from the SHA-256 content digest.
const CONTENT_HASH_LEN: usize = 16;

/// Encode a vector as a flat little-endian f32 blob (4 bytes per dimension, no header).
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a blob written by [`encode_vector`]. Returns `None` when the length is not a
/// multiple of 4.
pub fn decode_vector(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Short deterministic digest of chunk text, used for identity and dedup.
pub fn content_hash(content: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
    digest[..CONTENT_HASH_LEN].to_string()
}
