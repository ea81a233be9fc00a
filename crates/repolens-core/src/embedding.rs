//! Vector utilities shared by the stores and the retrieval engine.
//!
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding
//!   used by the SQLite store
//!
//! Provider implementations (OpenAI, Ollama, fastembed) live in the
//! `repolens` app crate.

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use repolens_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB produced by [`vec_to_blob`]. Trailing bytes that do not
/// form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity: `a · b / (‖a‖ × ‖b‖)`.
///
/// Returns `0.0` when either vector has zero magnitude, when either is
/// empty, when the lengths differ, or when the result is not finite. Stored vectors are assumed to share
/// one dimensionality; the length check keeps a mismatch from panicking
/// or silently truncating.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    let score = dot / denom;
    if score.is_finite() {
        score
    } else {
        0.0
    }
}
