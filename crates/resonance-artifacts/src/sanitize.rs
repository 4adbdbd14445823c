//! Filename sanitization for user-supplied metadata (spec §4.2): reject
//! path separators, null bytes and non-printables; truncate to 200 bytes.

const MAX_LEN: usize = 200;

pub fn sanitize_filename(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0' && !c.is_control())
        .collect();

    if cleaned.trim().is_empty() {
        cleaned = "artifact".to_string();
    }

    if cleaned.len() > MAX_LEN {
        let mut truncated = String::new();
        for c in cleaned.chars() {
            if truncated.len() + c.len_utf8() > MAX_LEN {
                break;
            }
            truncated.push(c);
        }
        cleaned = truncated;
    }

    cleaned
}
