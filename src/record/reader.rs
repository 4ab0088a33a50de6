//! Definition Document Reader
//!
//! Pull reader over a byte slice that yields element start/end events and
//! assembles them into `DefinitionRecord`s. Only elements and their
//! attributes carry meaning in a definition document, so text, CDATA,
//! comments, processing instructions and DOCTYPE are skipped.
//!
//! Delimiter search uses memchr (SIMD when available).

use std::borrow::Cow;
use std::sync::Arc;

use memchr::{memchr, memchr3, memmem};

use super::DefinitionRecord;
use crate::error::{Result, TermError};

/// Deepest element nesting accepted in a definition document
pub const MAX_DEPTH: usize = 1024;

/// A parsed attribute; names are borrowed, values are entity-decoded
#[derive(Debug, Clone)]
pub struct RawAttribute<'a> {
    pub name: &'a [u8],
    pub value: Cow<'a, [u8]>,
}

/// Element event
#[derive(Debug, Clone)]
pub enum RecordEvent<'a> {
    /// `<name attrs...>` or `<name attrs.../>`
    Start {
        name: &'a [u8],
        attributes: Vec<RawAttribute<'a>>,
        empty: bool,
        offset: usize,
    },
    /// `</name>`
    End { name: &'a [u8], offset: usize },
}

/// Zero-copy reader over a definition document
pub struct DefinitionReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> DefinitionReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        DefinitionReader { input, pos: 0 }
    }

    /// Current byte offset
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the next element event, or None at end of input
    pub fn next_event(&mut self) -> Result<Option<RecordEvent<'a>>> {
        let input = self.input;
        loop {
            let start = match memchr(b'<', &input[self.pos..]) {
                Some(rel) => self.pos + rel,
                None => {
                    self.pos = input.len();
                    return Ok(None);
                }
            };
            let rest = &input[start..];

            if rest.starts_with(b"<!--") {
                self.pos = self.skip_past(start + 4, b"-->", start, "unterminated comment")?;
                continue;
            }
            if rest.starts_with(b"<![CDATA[") {
                self.pos = self.skip_past(start + 9, b"]]>", start, "unterminated CDATA section")?;
                continue;
            }
            if rest.starts_with(b"<?") {
                self.pos = self.skip_past(start + 2, b"?>", start, "unterminated processing instruction")?;
                continue;
            }
            if rest.starts_with(b"<!") {
                self.pos = self.skip_declaration(start)?;
                continue;
            }

            let end = self.find_tag_end(start)?;
            self.pos = end + 1;

            if rest.starts_with(b"</") {
                let name = trim(&input[start + 2..end]);
                if name.is_empty() {
                    return Err(TermError::syntax(start, "end tag without a name"));
                }
                return Ok(Some(RecordEvent::End { name, offset: start }));
            }

            let mut content = &input[start + 1..end];
            let empty = content.last() == Some(&b'/');
            if empty {
                content = &content[..content.len() - 1];
            }

            let name_len = content
                .iter()
                .position(|&b| is_whitespace(b))
                .unwrap_or(content.len());
            let name = &content[..name_len];
            if name.is_empty() || !is_name_start_char(name[0]) {
                return Err(TermError::syntax(start, "element name expected after '<'"));
            }
            let attributes = parse_attributes(&content[name_len..], start + 1 + name_len)?;

            return Ok(Some(RecordEvent::Start {
                name,
                attributes,
                empty,
                offset: start,
            }));
        }
    }

    /// Position just after `needle`, searching from `from`
    fn skip_past(&self, from: usize, needle: &[u8], open: usize, message: &str) -> Result<usize> {
        match memmem::find(&self.input[from..], needle) {
            Some(rel) => Ok(from + rel + needle.len()),
            None => Err(TermError::syntax(open, message)),
        }
    }

    /// Skip `<!DOCTYPE ...>` including a bracketed internal subset
    fn skip_declaration(&self, open: usize) -> Result<usize> {
        let mut depth = 0usize;
        for (i, &b) in self.input[open..].iter().enumerate() {
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Ok(open + i + 1),
                _ => {}
            }
        }
        Err(TermError::syntax(open, "unterminated declaration"))
    }

    /// Index of the `>` closing the tag at `open`, ignoring quoted `>`
    fn find_tag_end(&self, open: usize) -> Result<usize> {
        let mut pos = open + 1;
        while let Some(rel) = memchr3(b'>', b'"', b'\'', &self.input[pos..]) {
            let at = pos + rel;
            let b = self.input[at];
            if b == b'>' {
                return Ok(at);
            }
            match memchr(b, &self.input[at + 1..]) {
                Some(close) => pos = at + 1 + close + 1,
                None => return Err(TermError::syntax(at, "attribute value has mismatched quotes")),
            }
        }
        Err(TermError::syntax(open, "unterminated tag"))
    }
}

/// Parse `name="value"` pairs from tag content after the element name
///
/// `base` is the offset of `input` in the document, for error reporting.
pub fn parse_attributes(input: &[u8], base: usize) -> Result<Vec<RawAttribute<'_>>> {
    let mut attrs: Vec<RawAttribute<'_>> = Vec::new();
    let mut pos = 0;

    loop {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }

        if !is_name_start_char(input[pos]) {
            return Err(TermError::syntax(base + pos, "attribute name must start with letter, underscore, or colon"));
        }
        let name_start = pos;
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() || input[pos] != b'=' {
            return Err(TermError::syntax(base + pos, "attribute value required"));
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        let quote = match input.get(pos) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => return Err(TermError::syntax(base + pos, "attribute value must be quoted")),
        };
        pos += 1;
        let value_start = pos;
        let close = memchr(quote, &input[pos..])
            .ok_or_else(|| TermError::syntax(base + value_start, "attribute value has mismatched quotes"))?;
        let raw = &input[value_start..value_start + close];
        if memchr(b'<', raw).is_some() {
            return Err(TermError::syntax(base + value_start, "attribute value cannot contain '<'"));
        }
        pos = value_start + close + 1;

        if attrs.iter().any(|a| a.name == name) {
            return Err(TermError::syntax(
                base + name_start,
                format!("duplicate attribute: {}", String::from_utf8_lossy(name)),
            ));
        }
        attrs.push(RawAttribute {
            name,
            value: decode_text(raw),
        });
    }

    Ok(attrs)
}

/// Decode entity references; borrowed when there are none
pub fn decode_text(input: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }

    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;
    while let Some(amp) = memchr(b'&', &input[pos..]) {
        result.extend_from_slice(&input[pos..pos + amp]);
        pos += amp;
        let decoded = memchr(b';', &input[pos..]).and_then(|semi| {
            decode_entity(&input[pos + 1..pos + semi]).map(|text| (text, semi))
        });
        match decoded {
            Some((text, semi)) => {
                result.extend_from_slice(text.as_bytes());
                pos += semi + 1;
            }
            None => {
                // Unknown or unterminated reference, keep the ampersand
                result.push(b'&');
                pos += 1;
            }
        }
    }
    result.extend_from_slice(&input[pos..]);
    Cow::Owned(result)
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Option<String> {
    match entity {
        b"lt" => Some("<".to_string()),
        b"gt" => Some(">".to_string()),
        b"amp" => Some("&".to_string()),
        b"quot" => Some("\"".to_string()),
        b"apos" => Some("'".to_string()),
        [b'#', b'x' | b'X', hex @ ..] => decode_code_point(hex, 16),
        [b'#', digits @ ..] => decode_code_point(digits, 10),
        _ => None,
    }
}

fn decode_code_point(digits: &[u8], radix: u32) -> Option<String> {
    let text = std::str::from_utf8(digits).ok()?;
    if text.is_empty() {
        return None;
    }
    let code = u32::from_str_radix(text, radix).ok()?;
    char::from_u32(code).map(|c| c.to_string())
}

/// Read a whole document into its root record
pub fn read_record(input: &[u8]) -> Result<DefinitionRecord> {
    let mut reader = DefinitionReader::new(input);
    let mut stack: Vec<DefinitionRecord> = Vec::new();
    let mut root: Option<DefinitionRecord> = None;

    while let Some(event) = reader.next_event()? {
        match event {
            RecordEvent::Start {
                name,
                attributes,
                empty,
                offset,
            } => {
                if stack.is_empty() && root.is_some() {
                    return Err(TermError::syntax(offset, "document has multiple root elements"));
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(TermError::syntax(
                        offset,
                        format!("elements nested deeper than {} levels", MAX_DEPTH),
                    ));
                }
                let mut record = DefinitionRecord::new(utf8(name, offset)?);
                for attr in &attributes {
                    record.set_attribute(utf8(attr.name, offset)?, utf8(&attr.value, offset)?);
                }
                if empty {
                    attach(&mut stack, &mut root, record);
                } else {
                    stack.push(record);
                }
            }
            RecordEvent::End { name, offset } => {
                let record = stack.pop().ok_or_else(|| {
                    TermError::syntax(
                        offset,
                        format!("unexpected end tag </{}>", String::from_utf8_lossy(name)),
                    )
                })?;
                if record.tag().as_bytes() != name {
                    return Err(TermError::syntax(
                        offset,
                        format!(
                            "tag mismatch: <{}> closed with </{}>",
                            record.tag(),
                            String::from_utf8_lossy(name)
                        ),
                    ));
                }
                attach(&mut stack, &mut root, record);
            }
        }
    }

    if let Some(open) = stack.first() {
        return Err(TermError::syntax(input.len(), format!("unclosed tag: <{}>", open.tag())));
    }
    root.ok_or_else(|| TermError::syntax(0, "document has no root element"))
}

fn attach(stack: &mut [DefinitionRecord], root: &mut Option<DefinitionRecord>, record: DefinitionRecord) {
    match stack.last_mut() {
        Some(parent) => parent.push_child(Arc::new(record)),
        None => *root = Some(record),
    }
}

fn utf8(bytes: &[u8], offset: usize) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| TermError::syntax(offset, "invalid UTF-8"))
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !is_whitespace(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !is_whitespace(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// XML NameStartChar (ASCII only, non-ASCII accepted as-is)
#[inline]
fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

#[inline]
fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events() {
        let mut reader = DefinitionReader::new(b"<mapper name=\"a\"><attribute name='x' value=\"1\"/></mapper>");
        match reader.next_event().unwrap() {
            Some(RecordEvent::Start { name, attributes, empty, .. }) => {
                assert_eq!(name, b"mapper");
                assert!(!empty);
                assert_eq!(attributes.len(), 1);
                assert_eq!(attributes[0].name, b"name");
                assert_eq!(attributes[0].value.as_ref(), b"a");
            }
            other => panic!("expected start, got {:?}", other),
        }
        assert!(matches!(
            reader.next_event().unwrap(),
            Some(RecordEvent::Start { empty: true, .. })
        ));
        assert!(matches!(reader.next_event().unwrap(), Some(RecordEvent::End { name: b"mapper", .. })));
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn test_read_nested_record() {
        let input = br#"<?xml version="1.0"?>
            <!-- people terminology -->
            <mapper name="people">
              <mapper name="person">
                <attribute name="title" value="@title"/>
                some ignored text
              </mapper>
            </mapper>"#;
        let record = read_record(input).unwrap();
        assert_eq!(record.tag(), "mapper");
        assert_eq!(record.attribute("name"), Some("people"));
        assert_eq!(record.children().len(), 1);
        let person = &record.children()[0];
        assert_eq!(person.attribute("name"), Some("person"));
        assert_eq!(person.children()[0].attribute("value"), Some("@title"));
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let record = read_record(b"<mapper name=\"a\" path=\"x[@n='1']>y\"/>").unwrap();
        assert_eq!(record.attribute("path"), Some("x[@n='1']>y"));
    }

    #[test]
    fn test_entities_decoded() {
        let record = read_record(b"<mapper name=\"a&amp;b\" path=\"&#65;&#x42;&unknown;\"/>").unwrap();
        assert_eq!(record.attribute("name"), Some("a&b"));
        assert_eq!(record.attribute("path"), Some("AB&unknown;"));
    }

    #[test]
    fn test_doctype_skipped() {
        let input = b"<!DOCTYPE mapper [<!ENTITY x \"y\">]><mapper name=\"a\"/>";
        let record = read_record(input).unwrap();
        assert_eq!(record.attribute("name"), Some("a"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            read_record(b"<mapper name=\"a\"><mapper name=\"b\"></mapper>"),
            Err(TermError::Syntax { .. })
        ));
        assert!(matches!(read_record(b"<a></b>"), Err(TermError::Syntax { .. })));
        assert!(matches!(read_record(b"<a/><b/>"), Err(TermError::Syntax { .. })));
        assert!(matches!(read_record(b"   "), Err(TermError::Syntax { .. })));
        assert!(matches!(read_record(b"<a x=1/>"), Err(TermError::Syntax { .. })));
        assert!(matches!(read_record(b"<a x=\"1\" x=\"2\"/>"), Err(TermError::Syntax { .. })));
        assert!(matches!(read_record(b"<a x=\"1/>"), Err(TermError::Syntax { .. })));
    }

    #[test]
    fn test_nesting_limit() {
        let nest = |depth: usize| {
            let mut doc = "<mapper name=\"a\">".repeat(depth);
            doc.push_str(&"</mapper>".repeat(depth));
            doc
        };
        assert!(read_record(nest(MAX_DEPTH).as_bytes()).is_ok());

        let deep = nest(200_000);
        match read_record(deep.as_bytes()) {
            Err(TermError::Syntax { message, .. }) => assert!(message.contains("nested deeper")),
            other => panic!("expected syntax error, got {:?}", other.map(|r| r.tag().to_string())),
        }
    }

    #[test]
    fn test_error_offset() {
        match read_record(b"<a></b>") {
            Err(TermError::Syntax { offset, message }) => {
                assert_eq!(offset, 3);
                assert!(message.contains("tag mismatch"));
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
