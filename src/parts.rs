use std::fmt::Write;

pub const WRITE_OPEN: &str = "_buffer.WriteString(";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Markup,
    Block,
    Statement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub kind: PartKind,
    pub text: String,
    pub line: usize,
}

impl Part {
    pub fn new(kind: PartKind, text: impl Into<String>, line: usize) -> Self {
        Part {
            kind,
            text: text.into(),
            line,
        }
    }
}

/// Ordered parts; a part of the same kind as the last one is merged into it
/// on insertion, keeping the line of the first.
#[derive(Debug, Default)]
pub struct PartList {
    parts: Vec<Part>,
}

impl PartList {
    pub fn push(&mut self, part: Part) {
        match self.parts.last_mut() {
            Some(last) if last.kind == part.kind => last.text.push_str(&part.text),
            _ => self.parts.push(part),
        }
    }

    pub fn as_slice(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }
}

/// `_buffer.WriteString((name))\n` for a declared parameter of a layout is a
/// section slot, which is a callable rather than a string. Decided per
/// expression, before statements merge.
pub fn layout_slot_call<'a>(text: &str, param_names: &'a [String]) -> Option<&'a str> {
    let inner = text
        .strip_prefix("_buffer.WriteString((")?
        .strip_suffix("))\n")?;
    param_names
        .iter()
        .find(|name| name.as_str() == inner)
        .map(String::as_str)
}

/// `if P == "" {` on a layout slot becomes a nil test.
pub fn layout_emptiness_test(text: &str, param_names: &[String]) -> Option<String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    for name in param_names {
        if compact == format!("if{}==\"\"{{", name) {
            return Some(format!("if {} == nil {{\n", name));
        }
        if compact == format!("if{}!=\"\"{{", name) {
            return Some(format!("if {} != nil {{\n", name));
        }
    }
    None
}

pub fn line_hint(line: usize, enabled: bool) -> String {
    if enabled {
        format!("// Line: {}\n", line)
    } else {
        String::new()
    }
}

pub struct Serializer<'a> {
    /// Parameter names when serializing a layout template.
    pub layout_params: Option<&'a [String]>,
    pub line_hints: bool,
}

impl Serializer<'_> {
    pub fn render(&self, parts: &[Part]) -> String {
        let mut out = String::new();
        for part in parts {
            match part.kind {
                PartKind::Markup => {
                    let text = part.text.trim_end_matches('\n');
                    if text.is_empty() {
                        continue;
                    }
                    if part.line > 0 {
                        out.push_str(&line_hint(part.line, self.line_hints));
                    }
                    let _ = writeln!(out, "{}{})", WRITE_OPEN, go_quote(text));
                }
                PartKind::Block => {
                    match self
                        .layout_params
                        .and_then(|names| layout_emptiness_test(&part.text, names))
                    {
                        Some(test) => out.push_str(&test),
                        None => {
                            out.push_str(&part.text);
                            out.push('\n');
                        }
                    }
                }
                PartKind::Statement => out.push_str(&part.text),
            }
        }
        out
    }
}

/// Quotes `s` as a Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\u{0B}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\u{7F}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
