//! Structural HTML queries for templates.
//!
//! Backs the `select(html, selector)` template function: given an HTML
//! string, return the outer HTML of every element matching a small selector
//! grammar — `tag`, `#id`, `.class`, `tag#id`, `tag.class`. Matches are
//! concatenated in document order.
//!
//! This parses with quick-xml events, the same way the build pipeline
//! post-processes its own generated HTML, so it expects the well-formed
//! markup the converters emit. Void elements (`<br>`, `<img>`, …) are
//! handled without requiring closing tags.

use anyhow::{Result, bail};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// HTML elements that never carry a closing tag.
const VOID_ELEMENTS: &[&[u8]] = &[
    b"area", b"base", b"br", b"col", b"embed", b"hr", b"img", b"input", b"link", b"meta",
    b"source", b"track", b"wbr",
];

/// A parsed selector: optional tag name plus at most one of id / class.
#[derive(Debug, PartialEq, Eq)]
struct Selector {
    tag: Option<String>,
    id: Option<String>,
    class: Option<String>,
}

impl Selector {
    fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("empty selector");
        }

        let (tag_part, rest) = match input.find(['#', '.']) {
            Some(i) => (&input[..i], &input[i..]),
            None => (input, ""),
        };

        let tag = (!tag_part.is_empty()).then(|| tag_part.to_ascii_lowercase());
        let (id, class) = if let Some(r) = rest.strip_prefix('#') {
            (Some(r.to_owned()), None)
        } else if let Some(r) = rest.strip_prefix('.') {
            (None, Some(r.to_owned()))
        } else {
            (None, None)
        };

        if tag.is_none() && id.is_none() && class.is_none() {
            bail!("unsupported selector `{input}`");
        }

        Ok(Self { tag, id, class })
    }

    fn matches(&self, elem: &BytesStart<'_>) -> bool {
        if let Some(tag) = &self.tag
            && !elem.name().as_ref().eq_ignore_ascii_case(tag.as_bytes())
        {
            return false;
        }

        if self.id.is_none() && self.class.is_none() {
            return true;
        }

        let mut id_ok = self.id.is_none();
        let mut class_ok = self.class.is_none();

        for attr in elem.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value);
            match attr.key.as_ref() {
                b"id" => {
                    if let Some(id) = &self.id {
                        id_ok = value == *id;
                    }
                }
                b"class" => {
                    if let Some(class) = &self.class {
                        class_ok = value.split_whitespace().any(|c| c == class);
                    }
                }
                _ => {}
            }
        }

        id_ok && class_ok
    }
}

fn is_void(name: &[u8]) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|v| name.eq_ignore_ascii_case(v))
}

/// Return the concatenated outer HTML of all elements matching `selector`.
///
/// No match yields an empty string, not an error.
pub fn select(html: &str, selector: &str) -> Result<String> {
    let sel = Selector::parse(selector)?;

    let mut reader = Reader::from_str(html);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);

    let mut writer = Writer::new(Cursor::new(Vec::new()));

    // Depth inside the element currently being captured; 0 = not capturing.
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                let void = is_void(elem.name().as_ref());
                if depth > 0 {
                    writer.write_event(Event::Start(elem))?;
                    if !void {
                        depth += 1;
                    }
                } else if sel.matches(&elem) {
                    writer.write_event(Event::Start(elem))?;
                    if !void {
                        depth = 1;
                    }
                }
            }
            Ok(Event::Empty(elem)) => {
                if depth > 0 || sel.matches(&elem) {
                    writer.write_event(Event::Empty(elem))?;
                }
            }
            Ok(Event::End(end)) => {
                if depth > 0 && !is_void(end.name().as_ref()) {
                    writer.write_event(Event::End(end))?;
                    depth -= 1;
                }
            }
            Ok(Event::Eof) => break,
            Ok(other) => {
                if depth > 0 {
                    writer.write_event(other)?;
                }
            }
            Err(e) => bail!(
                "HTML parse error at position {}: {e}",
                reader.error_position()
            ),
        }
    }

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parse_forms() {
        assert_eq!(
            Selector::parse("p").unwrap(),
            Selector {
                tag: Some("p".into()),
                id: None,
                class: None
            }
        );
        assert_eq!(
            Selector::parse("#main").unwrap(),
            Selector {
                tag: None,
                id: Some("main".into()),
                class: None
            }
        );
        assert_eq!(
            Selector::parse("div.lead").unwrap(),
            Selector {
                tag: Some("div".into()),
                id: None,
                class: Some("lead".into())
            }
        );
        assert!(Selector::parse("").is_err());
    }

    #[test]
    fn test_select_by_tag() {
        let html = "<div><p>one</p><span>x</span><p>two</p></div>";
        let result = select(html, "p").unwrap();
        assert_eq!(result, "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_select_by_class() {
        let html = r#"<p class="lead big">Hi</p><p>No</p>"#;
        let result = select(html, "p.lead").unwrap();
        assert_eq!(result, r#"<p class="lead big">Hi</p>"#);
    }

    #[test]
    fn test_select_by_id_keeps_nested_content() {
        let html = r#"<div id="a"><div>inner</div>text</div><div>other</div>"#;
        let result = select(html, "#a").unwrap();
        assert_eq!(result, r#"<div id="a"><div>inner</div>text</div>"#);
    }

    #[test]
    fn test_select_handles_void_elements() {
        let html = r#"<div id="x">a<br>b</div>"#;
        let result = select(html, "#x").unwrap();
        assert_eq!(result, r#"<div id="x">a<br>b</div>"#);
    }

    #[test]
    fn test_select_no_match_is_empty() {
        let html = "<p>one</p>";
        assert_eq!(select(html, "#missing").unwrap(), "");
    }
}
