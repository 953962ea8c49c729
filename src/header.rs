//! Metadata carried by a template's leading code block.
//!
//! The block is ordinary Go: an optional import section followed by `var`
//! declarations naming the template parameters, plus the `layout` and
//! `isLayout` conventions. Imports are read with a small grammar covering
//! only import declarations; the rest is classified line by line.

use regex::Regex;
use std::sync::LazyLock;

pub const WIDGET_TYPE: &str = "gorazor.Widget";

static RE_SHORT_LAYOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^layout\s*:=\s*(.+)$").unwrap());
static RE_IS_LAYOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^isLayout\s*:?=\s*(\w+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
}

impl ImportSpec {
    /// The import as written inside an import block.
    pub fn spec(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} \"{}\"", alias, self.path),
            None => format!("\"{}\"", self.path),
        }
    }

    /// Package identifier the import is referenced by.
    pub fn package_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Param { decl: String, name: String },
    Widget { decl: String, name: String },
    /// Target of `layout := pkg.Name` (the last dotted segment).
    Layout(String),
    IsLayout(bool),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub imports: Vec<ImportSpec>,
    pub declarations: Vec<Declaration>,
}

impl Header {
    pub fn layout_name(&self) -> Option<&str> {
        self.declarations.iter().rev().find_map(|d| match d {
            Declaration::Layout(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// The import whose last path segment is `layout_dir`.
    pub fn layout_import(&self, layout_dir: &str) -> Option<&ImportSpec> {
        self.imports
            .iter()
            .find(|i| i.path.contains('/') && i.path.rsplit('/').next() == Some(layout_dir))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct HeaderError {
    pub line: usize,
    pub message: String,
}

pub fn parse_header(text: &str) -> Result<Header, HeaderError> {
    Ok(Header {
        imports: parse_imports(text)?,
        declarations: scan_declarations(text),
    })
}

/// Classifies header lines. Members of a `var ( ... )` group are read as if
/// each had its own `var`.
pub fn scan_declarations(text: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut in_group = false;
    for line in text.lines() {
        let l = line.trim().trim_end_matches(';').trim_end();
        if in_group {
            if l.starts_with(')') {
                in_group = false;
            } else if !l.is_empty() && !l.starts_with("//") {
                out.extend(var_declaration(l));
            }
        } else if is_var_group(l) {
            in_group = true;
        } else if let Some(vname) = l.strip_prefix("var ") {
            out.extend(var_declaration(vname));
        } else if let Some(caps) = RE_IS_LAYOUT.captures(l) {
            out.push(Declaration::IsLayout(&caps[1] == "true"));
        } else if let Some(caps) = RE_SHORT_LAYOUT.captures(l) {
            out.push(Declaration::Layout(last_segment(caps[1].trim())));
        }
    }
    out
}

fn is_var_group(line: &str) -> bool {
    line.strip_prefix("var")
        .is_some_and(|rest| rest.trim_start() == "(")
}

fn var_declaration(vname: &str) -> Option<Declaration> {
    let vname = vname.trim();
    let name = vname.split_whitespace().next().unwrap_or("").to_string();
    if vname.ends_with(WIDGET_TYPE) {
        Some(Declaration::Widget {
            decl: vname.to_string(),
            name,
        })
    } else if vname.starts_with("layout") {
        Some(Declaration::Layout(last_segment(vname)))
    } else if !name.is_empty() {
        Some(Declaration::Param {
            decl: vname.to_string(),
            name,
        })
    } else {
        None
    }
}

fn last_segment(value: &str) -> String {
    value.rsplit('.').next().unwrap_or(value).trim().to_string()
}

/// Reads the import declarations at the top of `text`, stopping at the first
/// token that does not start one.
pub fn parse_imports(text: &str) -> Result<Vec<ImportSpec>, HeaderError> {
    let mut scanner = Scanner::new(text);
    let mut imports = Vec::new();
    loop {
        scanner.skip_trivia(true)?;
        if scanner.peek() == Some(';') {
            scanner.bump();
            continue;
        }
        if !scanner.eat_keyword("import") {
            break;
        }
        scanner.skip_trivia(false)?;
        if scanner.peek() == Some('(') {
            scanner.bump();
            loop {
                scanner.skip_trivia(true)?;
                match scanner.peek() {
                    Some(')') => {
                        scanner.bump();
                        break;
                    }
                    Some(';') => {
                        scanner.bump();
                    }
                    None => return Err(scanner.error("unterminated import group")),
                    Some(_) => imports.push(scanner.import_spec()?),
                }
            }
        } else {
            imports.push(scanner.import_spec()?);
        }
    }
    Ok(imports)
}

struct Scanner<'s> {
    rest: &'s str,
    line: usize,
}

impl<'s> Scanner<'s> {
    fn new(text: &'s str) -> Self {
        Scanner { rest: text, line: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        if c == '\n' {
            self.line += 1;
        }
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn error(&self, message: &str) -> HeaderError {
        HeaderError {
            line: self.line,
            message: message.to_string(),
        }
    }

    /// Skips spaces and comments; newlines only when `newlines` is set.
    fn skip_trivia(&mut self, newlines: bool) -> Result<(), HeaderError> {
        loop {
            if self.rest.starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.bump();
                }
            } else if self.rest.starts_with("/*") {
                let start = self.line;
                self.bump();
                self.bump();
                while !self.rest.starts_with("*/") {
                    if self.bump().is_none() {
                        return Err(HeaderError {
                            line: start,
                            message: "unterminated comment".to_string(),
                        });
                    }
                }
                self.bump();
                self.bump();
            } else {
                match self.peek() {
                    Some('\n') if newlines => {
                        self.bump();
                    }
                    Some(c) if c != '\n' && c.is_whitespace() => {
                        self.bump();
                    }
                    _ => return Ok(()),
                }
            }
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.rest.strip_prefix(keyword) {
            Some(after) if !after.starts_with(is_ident_char) => {
                self.rest = after;
                true
            }
            _ => false,
        }
    }

    fn ident(&mut self) -> Option<String> {
        let len = self
            .rest
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(self.rest.len());
        if len == 0 || self.rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let ident = self.rest[..len].to_string();
        self.rest = &self.rest[len..];
        Some(ident)
    }

    fn import_spec(&mut self) -> Result<ImportSpec, HeaderError> {
        let alias = match self.peek() {
            Some('.') | Some('_') if !self.rest[1..].starts_with(is_ident_char) => {
                self.bump().map(String::from)
            }
            Some('"') | Some('`') => None,
            _ => Some(
                self.ident()
                    .ok_or_else(|| self.error("expected import path"))?,
            ),
        };
        self.skip_trivia(false)?;
        let path = self.string_literal()?;
        Ok(ImportSpec { alias, path })
    }

    fn string_literal(&mut self) -> Result<String, HeaderError> {
        let quote = match self.peek() {
            Some(q @ '"') | Some(q @ '`') => q,
            _ => return Err(self.error("expected import path")),
        };
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated import path")),
                Some('\n') if quote == '"' => {
                    return Err(self.error("newline in import path"));
                }
                Some('\\') if quote == '"' => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated import path")),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
