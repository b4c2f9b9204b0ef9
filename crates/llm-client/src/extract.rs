//! Tolerant JSON extraction from model text.
//!
//! Models sometimes wrap JSON in markdown fences or surround it with prose
//! despite instructions. This strips fences first, then scans for the first
//! balanced top-level object, tracking string and escape state so braces
//! inside string values don't confuse the depth count.

/// Slice the first JSON object (or a whole-body array) out of raw model
/// output. Returns `None` when nothing parseable-looking is present.
pub fn extract_json(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let body = strip_fences(s).unwrap_or(s).trim();

    if (body.starts_with('{') && body.ends_with('}'))
        || (body.starts_with('[') && body.ends_with(']'))
    {
        return Some(body.to_string());
    }

    let start = body.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut esc = false;
    for (i, ch) in body[start..].char_indices() {
        if in_str {
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(body[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Contents of the first ``` fence, tolerating a `json` language tag.
fn strip_fences(s: &str) -> Option<&str> {
    let open = s.find("```")?;
    let after = &s[open + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let close = after.find("```")?;
    Some(after[..close].trim())
}
