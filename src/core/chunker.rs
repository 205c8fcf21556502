use crate::core::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Splits `text` into windows of `size` characters, starting a new window
/// every `size - overlap` characters.
///
/// Whitespace-only windows are dropped; the remaining ones keep their original
/// text (no trimming) and are renumbered densely. `size == 0` yields nothing.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    if size == 0 || text.is_empty() {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);

    // 以字元邊界切割，避免切斷多位元組字元
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < char_count {
        let end = (start + size).min(char_count);
        let slice = &text[boundaries[start]..boundaries[end]];
        if !slice.trim().is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                text: slice.to_string(),
            });
        }
        if end == char_count {
            break;
        }
        start += step;
    }

    chunks
}
