use unicode_segmentation::UnicodeSegmentation;

/// Split a transcript into trimmed sentences. Line breaks inside the input
/// are treated as spaces first, since whisper wraps mid-sentence.
pub fn segment_sentences(text: &str) -> Vec<String> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    flat.unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// One sentence per line.
pub fn sentence_lines(text: &str) -> String {
    segment_sentences(text).join("\n")
}
