//! Text chunking for RAG.
//!
//! Splits extracted document text into overlapping windows sized for the
//! embedding model, and filters out windows too short to carry signal.

use tracing::warn;

/// Splits text into overlapping windows of `chunk_size` characters.
///
/// Each window starts `chunk_size - overlap` characters after the previous
/// one, so neighbours share `overlap` characters. The last window may be
/// shorter. Sizes are counted in `char`s, so multi-byte scripts such as
/// Arabic are never cut inside a character.
///
/// An `overlap` at or above `chunk_size` would never advance; it is clamped
/// to `chunk_size - 1`. A zero `chunk_size` is treated as 1.
///
/// Pure and deterministic: windows are not trimmed or filtered here, so
/// removing each window's overlapping prefix and concatenating gives back
/// `text` exactly.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }

    let chunk_size = chunk_size.max(1);
    let overlap = clamp_overlap(chunk_size, overlap);
    let step = chunk_size - overlap;

    // Byte offset of every char boundary, closed with text.len()
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::with_capacity(char_count / step + 1);
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(char_count);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());

        if end == char_count {
            break;
        }
        start += step;
    }

    chunks
}

/// Returns the overlap actually used for a given chunk size.
pub fn clamp_overlap(chunk_size: usize, overlap: usize) -> usize {
    let chunk_size = chunk_size.max(1);
    if overlap >= chunk_size {
        warn!(
            chunk_size,
            overlap,
            "chunk overlap must be smaller than chunk size, clamping"
        );
        return chunk_size - 1;
    }
    overlap
}

/// Drops windows whose trimmed length is under `min_chars` characters.
///
/// Surviving windows keep their original position as their chunk index, so
/// stored chunks can still be put back in order.
pub fn drop_noise(chunks: Vec<String>, min_chars: usize) -> Vec<(usize, String)> {
    chunks
        .into_iter()
        .enumerate()
        .filter(|(_, chunk)| chunk.trim().chars().count() >= min_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 10, 2).is_empty());
    }

    #[test]
    fn test_chunk_text_small() {
        let chunks = chunk_text("Hello", 10, 2);
        assert_eq!(chunks, vec!["Hello".to_string()]);
    }

    #[test]
    fn test_chunk_text_with_overlap() {
        let chunks = chunk_text("0123456789ABCDEF", 10, 2);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "0123456789");
        assert_eq!(chunks[1], "89ABCDEF");
    }

    #[test]
    fn test_chunk_text_counts_characters_not_bytes() {
        // 2500 Arabic letters: every one is two bytes in UTF-8
        let text: String = "ابتثجحخدذرزسشصضطظعغفقكلمنهوي"
            .chars()
            .cycle()
            .take(2500)
            .collect();
        let chars: Vec<char> = text.chars().collect();

        let chunks = chunk_text(&text, 1000, 200);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], chars[0..1000].iter().collect::<String>());
        assert_eq!(chunks[1], chars[800..1800].iter().collect::<String>());
        assert_eq!(chunks[2], chars[1600..2500].iter().collect::<String>());
    }

    #[test]
    fn test_overlap_clamped_when_too_large() {
        assert_eq!(clamp_overlap(10, 10), 9);
        assert_eq!(clamp_overlap(10, 50), 9);
        assert_eq!(clamp_overlap(10, 3), 3);

        // Advances one character at a time instead of looping forever
        let chunks = chunk_text("abcdef", 3, 3);
        assert_eq!(chunks, vec!["abc", "bcd", "cde", "def"]);
    }

    #[test]
    fn test_zero_chunk_size_treated_as_one() {
        let chunks = chunk_text("abc", 0, 0);
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drop_noise_keeps_original_indices() {
        let chunks = vec![
            "a long enough window of text".to_string(),
            "   tiny   ".to_string(),
            "another long enough window".to_string(),
        ];
        let kept = drop_noise(chunks, 10);
        let indices: Vec<usize> = kept.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
