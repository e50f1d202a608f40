//! Post-processing applied to remote model output.
//!
//! Downstream consumers split on blank lines, so the exact shape matters:
//! residual labels are stripped, then every sentence ends up on its own
//! paragraph terminated by a period.

use std::sync::LazyLock;

use regex::Regex;

/// Label patterns removed before sentence splitting, applied in order.
static LABELS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Author:\s*[^\n]*",
        r"Source URL:\s*[^\n]*",
        r"Summary:\s*",
        r"Context:\s*",
        r"Reply Suggestions:\s*",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid label regex"))
    .collect()
});

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("Invalid sentence regex"));

/// Normalize raw model output.
///
/// With more than one non-empty sentence the result is the sentences joined
/// by `".\n\n"` plus a final `"."`; otherwise the trimmed text is returned
/// unchanged (including its original punctuation).
pub fn format_response(raw: &str) -> String {
    let mut text = raw.to_string();
    for label in LABELS.iter() {
        text = label.replace_all(&text, "").into_owned();
    }
    let text = text.trim();

    let sentences: Vec<&str> = SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.len() > 1 {
        format!("{}.", sentences.join(".\n\n"))
    } else {
        text.to_string()
    }
}
