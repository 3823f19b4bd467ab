//! String utility functions for text processing

use std::collections::HashMap;

/// Default placeholder rendered for unknown template variables.
pub const MISSING_VAR: &str = "<missing>";

/// Format a `{VAR}` style template against a variable map.
///
/// Unknown variables render as [`MISSING_VAR`] instead of failing; a host
/// path template must never abort a subscription. Doubled braces (`{{`,
/// `}}`) escape to literal braces.
///
/// # Arguments
///
/// * `template` - The template string
/// * `vars` - The variable map
///
/// # Returns
///
/// The formatted string
pub fn format_template(template: &str, vars: &HashMap<String, String>) -> String {
    format_template_with(template, |key| vars.get(key).cloned())
}

/// Format a `{VAR}` style template, resolving each variable through a
/// closure. Unresolved variables render as [`MISSING_VAR`].
pub fn format_template_with<F>(template: &str, resolve: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                if closed {
                    match resolve(&key) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(MISSING_VAR),
                    }
                } else {
                    // Unterminated variable, keep the literal text
                    out.push('{');
                    out.push_str(&key);
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_format_template_basic() {
        let v = vars(&[("USERNAME", "alice"), ("STATUS_EMOJI", "✅")]);
        assert_eq!(
            format_template("/sub/{USERNAME}/{STATUS_EMOJI}", &v),
            "/sub/alice/✅"
        );
    }

    #[test]
    fn test_format_template_missing_key_defaults() {
        let v = vars(&[("USERNAME", "alice")]);
        assert_eq!(
            format_template("{USERNAME}-{NOPE}", &v),
            format!("alice-{}", MISSING_VAR)
        );
    }

    #[test]
    fn test_format_template_escaped_braces() {
        let v = vars(&[("A", "x")]);
        assert_eq!(format_template("{{literal}} {A}", &v), "{literal} x");
    }

    #[test]
    fn test_format_template_unterminated() {
        let v = vars(&[]);
        assert_eq!(format_template("/path/{oops", &v), "/path/{oops");
    }
}
