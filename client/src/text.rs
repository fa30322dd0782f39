//! Splitting long input into request-sized utterances.

use unicode_segmentation::UnicodeSegmentation;

/// Largest text the endpoint accepts in one request, in UTF-8 bytes.
pub const MAX_TEXT_BYTES: usize = 1024;

/// Pack sentences into utterances of at most `max_bytes` bytes.
///
/// Sentences are never split unless one alone exceeds the limit, in which
/// case it is cut on char boundaries.
pub fn split_utterances(text: &str, max_bytes: usize) -> Vec<String> {
    let mut utterances = Vec::new();
    let mut current = String::new();

    for sentence in text.split_sentence_bounds() {
        if current.len() + sentence.len() <= max_bytes {
            current.push_str(sentence);
            continue;
        }

        flush(&mut current, &mut utterances);
        if sentence.len() <= max_bytes {
            current.push_str(sentence);
            continue;
        }

        for ch in sentence.chars() {
            if current.len() + ch.len_utf8() > max_bytes {
                flush(&mut current, &mut utterances);
            }
            current.push(ch);
        }
    }

    flush(&mut current, &mut utterances);
    utterances
}

fn flush(current: &mut String, utterances: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        utterances.push(trimmed.to_string());
    }
    current.clear();
}
