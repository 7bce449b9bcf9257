//! JSON-with-comments reading for settings documents and `.jsonc` parameter files.

use serde_json::Value;

pub fn parse(text: &str) -> serde_json::Result<Value> {
    serde_json::from_str(&sanitize(text))
}

/// Blanks out `//` and `/* */` comments and drops trailing commas, leaving string
/// literals untouched. Newlines are kept so parse errors still point at the right line.
pub fn sanitize(text: &str) -> String {
    strip_trailing_commas(&strip_comments(text))
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let closes = chars[idx + 1..]
                .iter()
                .find(|next| !next.is_whitespace())
                .is_some_and(|next| *next == '}' || *next == ']');
            if closes {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comments_and_trailing_commas_are_ignored() {
        let text = r#"{
            // line comment
            "a": "http://not-a-comment", /* block
            comment */ "b": [1, 2,],
        }"#;
        assert_eq!(
            parse(text).unwrap(),
            json!({"a": "http://not-a-comment", "b": [1, 2]})
        );
    }

    #[test]
    fn escaped_quotes_stay_inside_strings() {
        let text = r#"{"a": "say \"//hi\", ok", "b": 1}"#;
        assert_eq!(parse(text).unwrap(), json!({"a": "say \"//hi\", ok", "b": 1}));
    }

    #[test]
    fn newlines_survive_comment_removal() {
        let sanitized = sanitize("{\n/* one\ntwo */\n}");
        assert_eq!(sanitized.matches('\n').count(), 3);
    }
}
