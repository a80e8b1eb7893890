//! Fixed-size passage splitting with overlap.

/// Target passage length in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between consecutive passages.
pub const CHUNK_OVERLAP: usize = 100;

/// Splits `text` into passages of at most `size` characters.
///
/// Consecutive passages share `overlap` characters. A passage ends at the
/// last whitespace in its window when that keeps it over half of `size`,
/// so words are not cut mid-way. Blank passages are dropped.
#[must_use]
pub fn split_passages(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![text.to_string()];
    }

    // Byte offset of every char boundary, including the end.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut passages = Vec::new();
    let mut start = 0;
    while start < char_count {
        let mut end = (start + size).min(char_count);
        if end < char_count {
            let window = &text[bounds[start]..bounds[end]];
            if let Some(pos) = window.rfind(char::is_whitespace) {
                let split = bounds.partition_point(|&b| b < bounds[start] + pos);
                if split > start + size / 2 {
                    end = split;
                }
            }
        }

        let piece = text[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            passages.push(piece.to_string());
        }
        if end >= char_count {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    passages
}
