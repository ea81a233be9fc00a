//! Sliding-window text chunker.
//!
//! Splits file content into [`Chunk`]s of at most `chunk_size` characters,
//! with consecutive windows overlapping by `overlap_ratio × chunk_size`
//! characters so that context crossing a boundary appears in both chunks.
//!
//! Sizes are counted in Unicode scalar values, never bytes, so a window
//! never cuts a multi-byte character in half.
//!
//! # Guarantees
//!
//! - Empty input yields zero chunks.
//! - Input no longer than `chunk_size` yields exactly one chunk equal to it.
//! - Every character belongs to at least one chunk.
//! - The last chunk is emitted once the window reaches the end of the text,
//!   even if it is shorter than `chunk_size`.
//! - Same input, same settings: same chunks, same indices, same hashes.
//!
//! # Example
//!
//! ```rust
//! use repolens_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 4, 0.5);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "cdef", "efgh", "ghij"]);
//! ```

use sha2::{Digest, Sha256};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default overlap between consecutive windows, as a fraction of the size.
pub const DEFAULT_OVERLAP_RATIO: f64 = 0.3;

/// One window of a file's content.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position in emission order, starting at 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Distance the window advances between chunks. Never zero.
pub fn step_size(chunk_size: usize, overlap_ratio: f64) -> usize {
    let chunk_size = chunk_size.max(1);
    let overlap = (chunk_size as f64 * overlap_ratio.clamp(0.0, 1.0)).floor() as usize;
    chunk_size.saturating_sub(overlap).max(1)
}

/// Split `text` into overlapping windows.
///
/// `chunk_size` of 0 is treated as 1; `overlap_ratio` is clamped to
/// `[0, 1]` and the window always advances by at least one character.
pub fn chunk_text(text: &str, chunk_size: usize, overlap_ratio: f64) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let step = step_size(chunk_size, overlap_ratio);

    // Byte offset of every char start, plus the end of the text.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = bounds.len();
    bounds.push(text.len());

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(char_count);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(chunks.len() as i64, piece));
        if end >= char_count {
            break;
        }
        start += step;
    }

    chunks
}

/// Number of chunks [`chunk_text`] would produce for `char_count` characters.
pub fn chunk_count(char_count: usize, chunk_size: usize, overlap_ratio: f64) -> usize {
    let chunk_size = chunk_size.max(1);
    if char_count == 0 {
        return 0;
    }
    if char_count <= chunk_size {
        return 1;
    }
    let step = step_size(chunk_size, overlap_ratio);
    1 + (char_count - chunk_size).div_ceil(step)
}

/// SHA-256 of a text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(index: i64, text: &str) -> Chunk {
    Chunk {
        chunk_index: index,
        text: text.to_string(),
        hash: content_hash(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> String {
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1024, 0.3).is_empty());
        assert_eq!(chunk_count(0, 1024, 0.3), 0);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1024, 0.3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_exact_size_single_chunk() {
        let text = sample(1024);
        let chunks = chunk_text(&text, 1024, 0.3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_overlap_between_windows() {
        let text = sample(3000);
        let chunks = chunk_text(&text, 1024, 0.3);
        // step = 1024 - 307 = 717; windows start at 0, 717, 1434, 2151
        assert_eq!(step_size(1024, 0.3), 717);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].text, text[717..1741]);
        assert_eq!(chunks[3].text, text[2151..3000]);
        let tail_of_first = &chunks[0].text[717..];
        assert!(chunks[1].text.starts_with(tail_of_first));
    }

    #[test]
    fn test_full_coverage() {
        for len in [1usize, 5, 99, 100, 101, 250, 1000] {
            let text = sample(len);
            let chunks = chunk_text(&text, 100, 0.3);
            let step = step_size(100, 0.3);
            let mut covered = vec![false; len];
            for (i, c) in chunks.iter().enumerate() {
                let start = i * step;
                assert_eq!(&text[start..start + c.text.len()], c.text);
                for slot in covered.iter_mut().skip(start).take(c.text.len()) {
                    *slot = true;
                }
            }
            assert!(covered.iter().all(|c| *c), "gap for len {}", len);
        }
    }

    #[test]
    fn test_count_monotone_in_length() {
        let mut previous = 0;
        for len in 0..600 {
            let count = chunk_text(&sample(len), 64, 0.3).len();
            assert!(count >= previous, "count dropped at len {}", len);
            assert_eq!(count, chunk_count(len, 64, 0.3));
            previous = count;
        }
    }

    #[test]
    fn test_indices_contiguous_and_deterministic() {
        let text = sample(5000);
        let a = chunk_text(&text, 512, 0.3);
        let b = chunk_text(&text, 512, 0.3);
        assert_eq!(a, b);
        for (i, c) in a.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn test_multibyte_characters_not_split() {
        let text = "┌──────────────────┐\n│ héllo wörld      │\n└──────────────────┘";
        let chunks = chunk_text(text, 7, 0.3);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 7);
        }
        assert!(chunks.last().unwrap().text.ends_with('┘'));
    }

    #[test]
    fn test_degenerate_overlap_still_advances() {
        let chunks = chunk_text("abcdef", 3, 1.0);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["abc", "bcd", "cde", "def"]);
    }
}
