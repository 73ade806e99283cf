// Sanitize a transcript paragraph before normalization.
// Removes invisible Unicode, folds typographic punctuation, normalizes whitespace.

/// Maximum case length processed (characters). Longer input is truncated.
pub const MAX_INPUT_LENGTH: usize = 20_000;

/// Sanitized case text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText {
    pub text: String,
    /// Character count before truncation, when the input was cut.
    pub truncated_from: Option<usize>,
}

/// Sanitize transcript text. Never logs content, only counts.
pub fn sanitize_transcript(raw: &str, input_id: &str) -> SanitizedText {
    let (visible, removed) = remove_invisible_chars(raw);
    if removed > 0 {
        tracing::debug!(
            input_id = %input_id,
            removed_chars = removed,
            "Invisible characters removed from transcript"
        );
    }

    let folded = fold_typography(&visible);
    let normalized = normalize_whitespace(&folded);

    let length = normalized.chars().count();
    if length <= MAX_INPUT_LENGTH {
        return SanitizedText {
            text: normalized,
            truncated_from: None,
        };
    }
    tracing::warn!(
        input_id = %input_id,
        chars = length,
        max_chars = MAX_INPUT_LENGTH,
        "Transcript truncated"
    );
    SanitizedText {
        text: truncate_to_max_length(&normalized, MAX_INPUT_LENGTH),
        truncated_from: Some(length),
    }
}

/// Drop zero-width, bidi and control characters. Keeps space, newline, tab.
fn remove_invisible_chars(text: &str) -> (String, usize) {
    let mut removed = 0usize;
    let kept = text
        .chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t') {
                return true;
            }
            let invisible = matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            ) || c.is_control();
            if invisible {
                removed += 1;
            }
            !invisible
        })
        .collect();
    (kept, removed)
}

/// ASR and word-processor output mixes dash and quote variants.
fn fold_typography(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            '\u{2018}' | '\u{2019}' | '\u{02BC}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect()
}

/// Trim each line, collapse inner runs of spaces, drop blank lines.
fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate to max length, breaking at the last word boundary.
fn truncate_to_max_length(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len).collect();
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => cut[..pos].to_string(),
        _ => cut,
    }
}
