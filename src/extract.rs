//! JSON extraction from loosely-structured model responses
//!
//! The inference endpoint is asked for a bare JSON object but routinely wraps
//! it in prose or a fenced code block. Extraction policy, in order: take the
//! contents of the first fenced block, else the first bracket-balanced
//! `{...}` span, then parse that span strictly.

use serde_json::Value;

/// Tagged extraction outcome. Callers decide whether `NoJsonFound` and
/// `InvalidJson` are fatal; here they are just facts about the text.
#[derive(Debug)]
pub enum ExtractedJson {
    Parsed(Value),
    NoJsonFound,
    InvalidJson(serde_json::Error),
}

/// Extract and parse the first JSON object embedded in `text`.
pub fn extract_json(text: &str) -> ExtractedJson {
    // A fenced block may carry leading prose, so narrow it to its object
    // span; a fence holding no object at all is ignored in favor of
    // whole-text bracket matching.
    let span = fenced_block(text)
        .and_then(balanced_object_span)
        .or_else(|| balanced_object_span(text));

    let Some(span) = span else {
        return ExtractedJson::NoJsonFound;
    };

    match serde_json::from_str(span) {
        Ok(value) => ExtractedJson::Parsed(value),
        Err(err) => ExtractedJson::InvalidJson(err),
    }
}

/// Contents of the first ``` fence (with or without a `json` tag), if any.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_ticks = &text[open + 3..];
    let body_start = after_ticks
        .strip_prefix("json")
        .unwrap_or(after_ticks)
        .trim_start_matches([' ', '\t'])
        .trim_start_matches(['\r', '\n']);
    let close = body_start.find("```")?;
    Some(body_start[..close].trim())
}

/// First top-level `{...}` span found by bracket matching. String literals
/// and escapes are honored so braces inside descriptions don't break it.
fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn extracts_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"events\": []}\n```\nHope that helps!";
        let value = assert_matches!(extract_json(text), ExtractedJson::Parsed(v) => v);
        assert_eq!(value["events"], serde_json::json!([]));
    }

    #[test]
    fn extracts_from_untagged_fence() {
        let text = "```\n{\"objects\": [1, 2]}\n```";
        let value = assert_matches!(extract_json(text), ExtractedJson::Parsed(v) => v);
        assert_eq!(value["objects"], serde_json::json!([1, 2]));
    }

    #[test]
    fn falls_back_to_bracket_matching() {
        let text = "The answer is {\"events\": [{\"timestamp\": \"00:05\", \"description\": \"a {weird} one\"}]} thanks";
        let value = assert_matches!(extract_json(text), ExtractedJson::Parsed(v) => v);
        assert_eq!(value["events"][0]["description"], "a {weird} one");
    }

    #[test]
    fn braces_inside_strings_do_not_unbalance() {
        let text = r#"{"description": "open { and escaped \" quote"}"#;
        assert_matches!(extract_json(text), ExtractedJson::Parsed(_));
    }

    #[test]
    fn prose_fence_falls_through_to_a_later_object() {
        let text = "```\nnothing structured in here\n```\nBut also: {\"events\": []}";
        let value = assert_matches!(extract_json(text), ExtractedJson::Parsed(v) => v);
        assert_eq!(value["events"], serde_json::json!([]));
    }

    #[test]
    fn no_object_anywhere() {
        assert_matches!(
            extract_json("nothing to see here"),
            ExtractedJson::NoJsonFound
        );
        assert_matches!(extract_json(""), ExtractedJson::NoJsonFound);
    }

    #[test]
    fn unparseable_span_is_invalid_not_missing() {
        assert_matches!(
            extract_json("{\"events\": [oops]}"),
            ExtractedJson::InvalidJson(_)
        );
    }

    #[test]
    fn unterminated_object_counts_as_missing() {
        assert_matches!(extract_json("{\"events\": ["), ExtractedJson::NoJsonFound);
    }
}
