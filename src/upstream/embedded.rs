//! Locate a JSON object embedded in an HTML page by textual scan.
//!
//! The page assigns its state to a global (`window['__espnfitt__']={...};`).
//! We find the marker, then walk braces until the object closes, skipping
//! anything inside string literals.

use serde_json::Value;

use crate::error::ShapeError;

pub const ESPN_STATE_MARKER: &str = "window['__espnfitt__']=";

/// Extract and parse the object that follows `marker` in `html`.
pub fn extract_embedded_json(html: &str, marker: &str) -> Result<Value, ShapeError> {
    let start = html
        .find(marker)
        .map(|i| i + marker.len())
        .ok_or_else(|| ShapeError::missing(format!("embedded marker {marker}")))?;
    let rest = html[start..].trim_start();
    if !rest.starts_with('{') {
        return Err(ShapeError::missing("embedded object opening brace"));
    }
    let end = balanced_object_end(rest).ok_or_else(|| ShapeError::missing("embedded object closing brace"))?;
    serde_json::from_str(&rest[..end]).map_err(|_| ShapeError::missing("embedded object (invalid JSON)"))
}

/// Byte offset just past the `}` that closes the object opening at `text[0]`.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
