//! Bubble splitter — breaks final assistant text into the chunks that are
//! persisted and streamed as separate messages.
//!
//! Rules: two or more paragraphs (blank-line separated) become one bubble
//! each; a single paragraph splits into sentence pairs, unless it has at
//! most two sentences, in which case it stays whole.

/// Split assistant text into bubbles. Empty input yields no bubbles.
pub fn split_bubbles(text: &str) -> Vec<String> {
    let normalized = text.replace('\r', "");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return Vec::new();
    }

    let paragraphs = split_paragraphs(normalized);
    if paragraphs.len() >= 2 {
        return paragraphs;
    }

    let sentences = split_sentences(normalized);
    if sentences.len() <= 2 {
        return vec![normalized.to_string()];
    }

    // Group consecutive sentences into pairs; the last group may be single.
    sentences
        .chunks(2)
        .map(|pair| pair.join(" "))
        .collect()
}

/// Split on runs of two or more newlines.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut newline_run = 0usize;

    for ch in text.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run == 1 {
                current.push(ch);
            }
        } else {
            if newline_run >= 2 {
                let para = current.trim().to_string();
                if !para.is_empty() {
                    out.push(para);
                }
                current.clear();
            }
            newline_run = 0;
            current.push(ch);
        }
    }
    let para = current.trim().to_string();
    if !para.is_empty() {
        out.push(para);
    }
    out
}

/// Split into sentences after `.`, `!`, or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            if chars.peek().is_some_and(|next| next.is_whitespace()) {
                // Consume the whitespace run between sentences.
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                current.clear();
            }
        }
    }
    let sentence = current.trim().to_string();
    if !sentence.is_empty() {
        out.push(sentence);
    }
    out
}
