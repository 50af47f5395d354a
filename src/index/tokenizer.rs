//! Word-boundary tokenizer shared by indexing and querying.

/// Tokens longer than this (base64 blobs, long URLs) are not indexed.
pub const MAX_TOKEN_CHARS: usize = 64;

/// Split `text` into lowercase terms.
///
/// A term is a maximal run of Unicode alphanumeric characters. The same rule
/// is applied to documents and queries, so a query term matches exactly the
/// words the document tokenizer produced.
pub fn tokenize(text: &str) -> Vec<String> {
    positioned_tokens(text).map(|(_, term)| term).collect()
}

/// Like [`tokenize`], paired with each term's word position.
///
/// Overlong words are dropped but still occupy a position, so the words on
/// either side of one are not adjacent.
pub fn positioned_tokens(text: &str) -> impl Iterator<Item = (u32, String)> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .enumerate()
        .filter(|(_, word)| word.chars().count() <= MAX_TOKEN_CHARS)
        .map(|(pos, word)| (pos as u32, word.to_lowercase()))
}
