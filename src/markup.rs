//! Splits a user markup fragment into its non-script markup and its scripts.
//!
//! Scripts are pulled out so the document builder can append them after the
//! markup is attached and the measurement bootstrap is installed.

use regex::Regex;
use std::sync::OnceLock;

/// A script element lifted out of the user's markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserScript {
    /// Raw attribute text of the opening tag (e.g. ` type="module"`), possibly empty.
    pub attributes: String,
    /// Inner text of the element.
    pub body: String,
}

impl UserScript {
    /// Re-emit as a script element. A literal `</script` inside the body is
    /// escaped so it cannot close the element early.
    pub fn to_html(&self) -> String {
        format!(
            "<script{}>{}</script>",
            self.attributes,
            escape_script_body(&self.body)
        )
    }
}

/// Result of [`extract_scripts`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedMarkup {
    /// Markup with every script element removed.
    pub body: String,
    /// Scripts in source order.
    pub scripts: Vec<UserScript>,
}

fn script_regex() -> &'static Regex {
    static SCRIPT_REGEX: OnceLock<Regex> = OnceLock::new();
    SCRIPT_REGEX.get_or_init(|| Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").unwrap())
}

fn open_script_regex() -> &'static Regex {
    static OPEN_SCRIPT_REGEX: OnceLock<Regex> = OnceLock::new();
    OPEN_SCRIPT_REGEX.get_or_init(|| Regex::new(r"(?is)<script\b([^>]*)>").unwrap())
}

/// Extract every `<script>` element from `source`.
///
/// An unterminated script tag would swallow everything the builder appends
/// after the markup, so its remaining text is treated as the script body.
pub fn extract_scripts(source: &str) -> ExtractedMarkup {
    let mut scripts = Vec::new();
    let mut body = String::with_capacity(source.len());
    let mut last = 0;

    for caps in script_regex().captures_iter(source) {
        let whole = caps.get(0).unwrap();
        body.push_str(&source[last..whole.start()]);
        scripts.push(UserScript {
            attributes: caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string(),
            body: caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
        });
        last = whole.end();
    }

    let rest = &source[last..];
    if let Some(caps) = open_script_regex().captures(rest) {
        let open = caps.get(0).unwrap();
        body.push_str(&rest[..open.start()]);
        scripts.push(UserScript {
            attributes: caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string(),
            body: rest[open.end()..].to_string(),
        });
    } else {
        body.push_str(rest);
    }

    ExtractedMarkup { body, scripts }
}

/// Escape `</script` (any case) so a body can be embedded in a script element.
pub fn escape_script_body(body: &str) -> String {
    static CLOSE_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = CLOSE_REGEX.get_or_init(|| Regex::new(r"(?i)</(script)").unwrap());
    re.replace_all(body, "<\\/$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_markup_without_scripts_is_untouched() {
        let out = extract_scripts("<div style='height:500px'></div>");
        assert_eq!(out.body, "<div style='height:500px'></div>");
        assert!(out.scripts.is_empty());
    }

    #[test]
    fn test_extracts_scripts_in_order() {
        let src = "<p>a</p><script>one()</script><p>b</p>\
<SCRIPT type=\"module\">\ntwo()\n</SCRIPT >";
        let out = extract_scripts(src);
        assert_eq!(out.body, "<p>a</p><p>b</p>");
        assert_eq!(
            out.scripts,
            vec![
                UserScript {
                    attributes: String::new(),
                    body: "one()".to_string()
                },
                UserScript {
                    attributes: " type=\"module\"".to_string(),
                    body: "\ntwo()\n".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_keeps_src_attribute() {
        let out = extract_scripts(r#"<script src="https://cdn.example/lib.js"></script>"#);
        assert_eq!(out.scripts[0].attributes, r#" src="https://cdn.example/lib.js""#);
        assert_eq!(
            out.scripts[0].to_html(),
            r#"<script src="https://cdn.example/lib.js"></script>"#
        );
    }

    #[test]
    fn test_unterminated_script_is_captured() {
        let out = extract_scripts("<p>x</p><script>let a = 1;");
        assert_eq!(out.body, "<p>x</p>");
        assert_eq!(out.scripts.len(), 1);
        assert_eq!(out.scripts[0].body, "let a = 1;");
    }

    #[test]
    fn test_escapes_closing_tag_in_body() {
        let script = UserScript {
            attributes: String::new(),
            body: "document.write('</SCRIPT>')".to_string(),
        };
        assert_eq!(script.to_html(), "<script>document.write('<\\/SCRIPT>')</script>");
    }

    #[test]
    fn test_handles_multibyte_text() {
        let out = extract_scripts("<p>높이 — 조절</p><script>x()</script>");
        assert_eq!(out.body, "<p>높이 — 조절</p>");
        assert_eq!(out.scripts[0].body, "x()");
    }
}
