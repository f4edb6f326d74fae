//! Recovers message text from rows where `message.text` is NULL and the
//! content only lives in the archived `attributedBody` blob.

/// Typedstream framing tokens that show up as printable runs but are never
/// the message body.
const BLACKLIST: [&str; 5] = [
    "streamtyped",
    "NSAttributedString",
    "NSObject",
    "NSString",
    "__kIMMessagePartAttributeName",
];

const MIN_RUN_LEN: usize = 4;

/// Scan a binary blob for printable-ASCII runs and return the longest
/// candidate that is not archive framing.
pub fn scan_printable(blob: &[u8]) -> String {
    let mut runs: Vec<String> = Vec::new();
    let mut current = Vec::new();

    for &byte in blob {
        if (32..=126).contains(&byte) {
            current.push(byte);
        } else {
            if current.len() >= MIN_RUN_LEN {
                runs.push(String::from_utf8_lossy(&current).into_owned());
            }
            current.clear();
        }
    }
    if current.len() >= MIN_RUN_LEN {
        runs.push(String::from_utf8_lossy(&current).into_owned());
    }

    runs.iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty() && !BLACKLIST.contains(r))
        .max_by_key(|r| r.len())
        .unwrap_or_default()
        .to_string()
}

/// Extract message text from a raw row: prefer the plain `text` column,
/// fall back to scanning `attributedBody`.
pub fn extract_text(text: Option<&str>, attributed_body: Option<&[u8]>) -> String {
    if let Some(text) = text {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    match attributed_body {
        Some(blob) if !blob.is_empty() => scan_printable(blob),
        _ => String::new(),
    }
}
