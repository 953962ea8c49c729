use crate::error::{Error, Result};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitBody {
    pub text: String,
    /// Section names in declaration order.
    pub sections: Vec<String>,
}

/// The layout a template renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutCall {
    /// Go package identifier of the layout import.
    pub package: String,
    /// Capitalized layout name; the entry point is `Render<function>`.
    pub function: String,
    /// The layout's declared parameters (`name type`), `body` first.
    pub params: Vec<String>,
}

impl LayoutCall {
    pub fn target(&self) -> String {
        format!("{}.Render{}", self.package, self.function)
    }
}

fn section_name(line: &str) -> Option<&str> {
    let name = line.strip_prefix("section ")?.strip_suffix('{')?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Rewrites serialized body text so each `section name { ... }` becomes a
/// `_name` closure. The `_body` closure opened by the caller is closed before
/// the first section, or at the end when a layout is present.
///
/// Sections are found on trimmed lines and their extent by braces at line
/// boundaries, so braces inside string literals on their own line are not
/// understood.
pub fn split_sections(body: &str, has_layout: bool) -> SplitBody {
    let mut out = String::new();
    let mut sections = Vec::new();
    let mut depth = 0usize;
    let mut body_closed = false;

    for line in body.split('\n') {
        let line = line.trim();
        if depth == 0 {
            if let Some(name) = section_name(line) {
                if !body_closed {
                    body_closed = true;
                    out.push_str("\n}\n");
                }
                let _ = write!(out, "\n_{} := func(_buffer io.StringWriter) {{\n", name);
                depth = 1;
                sections.push(name.to_string());
                continue;
            }
            out.push_str(line);
            out.push('\n');
            continue;
        }

        if line.starts_with('}') {
            depth -= 1;
        }
        if line.ends_with('{') {
            depth += 1;
        }
        if depth == 0 {
            out.push_str("\n}\n");
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    if has_layout && !body_closed {
        out.push_str("\n}\n");
    }

    SplitBody {
        text: out,
        sections,
    }
}

/// The call into the layout's render function that ends a child template.
pub fn footer(layout: Option<&LayoutCall>, sections: &[String], template: &str) -> Result<String> {
    let layout = match layout {
        Some(layout) => layout,
        None if sections.is_empty() => return Ok(String::new()),
        None => {
            return Err(Error::SectionsWithoutLayout {
                template: template.to_string(),
            })
        }
    };

    let mut foot = format!("\n{}(_buffer, _body", layout.target());
    if layout.params.is_empty() {
        for section in sections {
            let _ = write!(foot, ", _{}", section);
        }
    } else {
        for param in &layout.params[1..] {
            let slot = param.split_whitespace().next().unwrap_or(param);
            if sections.iter().any(|s| s == slot) {
                let _ = write!(foot, ", _{}", slot);
            } else {
                foot.push_str(", nil");
            }
        }
    }
    foot.push(')');
    Ok(foot)
}
