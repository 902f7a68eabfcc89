//! Fixed-size character chunking of filtered text.

/// Splits `text` (trimmed first) into spans of `chunk_size` characters.
///
/// Sizes count Unicode scalar values, so a span never splits a character;
/// it may split a line. Empty text yields no chunks and `chunk_size == 0`
/// yields the whole text as a single chunk.
pub fn chunk_text_by_chars(text: &str, chunk_size: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if chunk_size == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(text.len() / chunk_size + 1);
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == chunk_size {
            chunks.push(text[start..offset].to_string());
            start = offset;
            count = 0;
        }
        count += 1;
    }
    chunks.push(text[start..].to_string());
    chunks
}
