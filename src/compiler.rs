//! AST to Go source for one template.

use crate::ast::{Ast, Child, Mode, NodeId, Token};
use crate::error::{Error, Result};
use crate::escape::{EscapePolicy, ESCAPE_OPEN, RAW_MARKER};
use crate::header::{self, Declaration, ImportSpec};
use crate::layout;
use crate::parts::{layout_slot_call, line_hint, Part, PartKind, PartList, Serializer, WRITE_OPEN};
use crate::sections::{self, LayoutCall};
use crate::session::Session;
use indexmap::IndexSet;
use std::fmt::Write;
use std::mem;
use std::path::Path;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const WRITER_PARAM: &str = "_buffer io.StringWriter";

/// Generated Go source plus what was learned about the template on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub code: String,
    pub package: String,
    pub function: String,
    /// Declared parameters (`name type`) in declaration order.
    pub params: Vec<String>,
    pub param_names: Vec<String>,
    pub is_layout: bool,
    /// `pkg.RenderName` of the layout this template renders into.
    pub layout: Option<String>,
    pub sections: Vec<String>,
}

pub struct Compiler<'a> {
    ast: &'a Ast,
    session: &'a mut Session,
    template: String,
    package: String,
    function: String,
    in_layout_dir: bool,
    is_layout: bool,
    layout: Option<LayoutCall>,
    first_block_seen: bool,
    params: Vec<String>,
    param_names: Vec<String>,
    parts: PartList,
    imports: IndexSet<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(ast: &'a Ast, path: &Path, session: &'a mut Session) -> Self {
        let config = session.config();
        let template = path.to_string_lossy().replace('\\', "/");
        let template = match template.strip_prefix("./") {
            Some(rest) => rest.to_string(),
            None => template,
        };
        let package = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or("main")
            .to_string();
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let stem = strip_extension(file_name, &config.extension);
        let function = if config.preserve_identifier_case {
            stem.to_string()
        } else {
            capitalize(stem)
        };
        let in_layout_dir = package == config.layout_dir;

        Compiler {
            ast,
            session,
            template,
            package,
            function,
            in_layout_dir,
            is_layout: in_layout_dir,
            layout: None,
            first_block_seen: false,
            params: Vec::new(),
            param_names: Vec::new(),
            parts: PartList::default(),
            imports: IndexSet::new(),
        }
    }

    pub fn compile(mut self) -> Result<Generated> {
        let ast = self.ast;
        self.visit(ast.root())?;
        let parts = mem::take(&mut self.parts).into_parts();
        let body = self.serializer().render(&parts);

        self.imports.insert("\"io\"".to_string());
        self.imports.insert("\"strings\"".to_string());

        let mut code = self.file_header();
        if self.is_layout {
            code.push_str(&self.layout_overload());
        } else {
            code.push_str(&self.value_function());
        }
        code.push_str(&self.render_signature());
        if self.layout.is_some() {
            code.push_str("\n_body := func(_buffer io.StringWriter) {\n");
        }
        let split = sections::split_sections(&body, self.layout.is_some());
        code.push_str(&split.text);
        code.push_str(&sections::footer(
            self.layout.as_ref(),
            &split.sections,
            &self.template,
        )?);
        code.push_str("\n}\n");

        tracing::debug!(
            template = %self.template,
            function = %self.function,
            sections = split.sections.len(),
            "compiled template"
        );

        Ok(Generated {
            code,
            package: self.package,
            function: self.function,
            params: self.params,
            param_names: self.param_names,
            is_layout: self.is_layout,
            layout: self.layout.as_ref().map(LayoutCall::target),
            sections: split.sections,
        })
    }

    fn line_hints(&self) -> bool {
        !self.session.config().suppress_line_hints
    }

    fn serializer(&self) -> Serializer<'_> {
        Serializer {
            layout_params: if self.is_layout {
                Some(self.param_names.as_slice())
            } else {
                None
            },
            line_hints: self.line_hints(),
        }
    }

    fn visit(&mut self, id: NodeId) -> Result<()> {
        let ast = self.ast;
        let node = ast.node(id);
        match node.mode {
            Mode::Program => {
                for child in node.children.iter().filter_map(Child::as_node) {
                    self.visit(child)?;
                }
            }
            Mode::Markup => {
                if !is_blank_markup(ast, id) {
                    self.first_block_seen = true;
                }
                for child in &node.children {
                    match child {
                        Child::Token(t) => {
                            self.parts.push(Part::new(PartKind::Markup, t.value(), t.line))
                        }
                        Child::Node(n) => self.visit(*n)?,
                    }
                }
            }
            Mode::Block => {
                if self.first_block_seen {
                    self.visit_block(id)?;
                } else {
                    self.first_block_seen = true;
                    self.visit_header_block(id)?;
                }
            }
            Mode::Expression => {
                self.first_block_seen = true;
                let homogeneous = ast.is_homogeneous_expression(id);
                for (idx, child) in node.children.iter().enumerate() {
                    match child {
                        Child::Token(t) => self.visit_expression_token(t, id, idx, homogeneous),
                        Child::Node(n) => self.visit(*n)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn visit_block(&mut self, id: NodeId) -> Result<()> {
        let ast = self.ast;
        let children = &ast.node(id).children;
        let is_brace = |child: Option<&Child>, brace: &str| {
            child
                .and_then(Child::as_token)
                .is_some_and(|t| t.value() == brace)
        };
        let inner = if children.len() >= 2
            && is_brace(children.first(), "{")
            && is_brace(children.last(), "}")
        {
            &children[1..children.len() - 1]
        } else {
            &children[..]
        };
        for child in inner {
            match child {
                Child::Token(t) => self.parts.push(Part::new(PartKind::Block, t.value(), t.line)),
                Child::Node(n) => self.visit(*n)?,
            }
        }
        Ok(())
    }

    /// The leading code block is not emitted; its text declares imports,
    /// parameters and the layout.
    fn visit_header_block(&mut self, id: NodeId) -> Result<()> {
        let outer = mem::take(&mut self.parts);
        let visited = self.visit_block(id);
        let inner = mem::replace(&mut self.parts, outer);
        visited?;
        let text = self.serializer().render(inner.as_slice());
        self.apply_header(&text)
    }

    fn apply_header(&mut self, text: &str) -> Result<()> {
        let header = header::parse_header(text).map_err(|e| Error::MalformedHeader {
            template: self.template.clone(),
            message: e.to_string(),
        })?;

        for import in &header.imports {
            self.imports.insert(import.spec());
        }
        for decl in &header.declarations {
            match decl {
                Declaration::Param { decl, name } => {
                    self.params.push(decl.clone());
                    self.param_names.push(name.clone());
                }
                Declaration::Widget { decl, name } => {
                    let helper = self.session.config().helper_import.clone();
                    self.imports.insert(helper);
                    self.params.push(decl.clone());
                    self.param_names.push(name.clone());
                }
                Declaration::IsLayout(value) => self.is_layout = *value,
                Declaration::Layout(_) => {}
            }
        }
        tracing::debug!(template = %self.template, params = ?self.params, "read header block");

        let layout_dir = self.session.config().layout_dir.clone();
        if let Some(import) = header.layout_import(&layout_dir) {
            self.settle_layout(import, header.layout_name().unwrap_or(""))?;
        }
        Ok(())
    }

    fn settle_layout(&mut self, import: &ImportSpec, name: &str) -> Result<()> {
        let config = self.session.config();
        let resolved = layout::resolve(
            self.session.source(),
            &import.path,
            name,
            &config.extension,
            config.namespace_prefix(),
        )
        .map_err(|tried| Error::LayoutNotFound {
            layout: format!("{}/{}", import.path, name),
            template: self.template.clone(),
            tried,
        })?;

        let params = self.session.layout_shape(&resolved.path)?;
        self.layout = Some(LayoutCall {
            package: import.package_name().to_string(),
            function: capitalize(&resolved.name),
            params,
        });
        Ok(())
    }

    fn visit_expression_token(&mut self, token: &Token, parent: NodeId, idx: usize, homogeneous: bool) {
        let ast = self.ast;
        let outermost = !ast.is_nested_expression(parent);
        let last = idx + 1 == ast.node(parent).children.len();
        let value = token.value();

        let mut start = String::new();
        let mut end = String::new();
        if outermost && idx == 0 && homogeneous {
            let policy = EscapePolicy {
                in_layout_dir: self.in_layout_dir,
                params: &self.params,
            };
            if policy.needs_escape(value) {
                start.push_str(ESCAPE_OPEN);
                let helper = self.session.config().helper_import.clone();
                self.imports.insert(helper);
            } else {
                start.push('(');
            }
        }
        if outermost && last && homogeneous {
            end.push(')');
        }

        let mut hint = String::new();
        let mut line = 0;
        if outermost && idx == 0 {
            line = token.line;
            hint = line_hint(line, self.line_hints());
            start.insert_str(0, WRITE_OPEN);
        }
        if outermost && last {
            end.push_str(")\n");
        }

        let text = if value == RAW_MARKER {
            format!("{}{}{}", hint, start, end)
        } else {
            let text = format!("{}{}{}", start, value, end);
            let slot = if self.is_layout {
                layout_slot_call(&text, &self.param_names)
            } else {
                None
            };
            match slot {
                Some(name) => format!("{}{}(_buffer)\n", hint, name),
                None => hint + &text,
            }
        };
        self.parts.push(Part::new(PartKind::Statement, text, line));
    }

    fn file_header(&self) -> String {
        let mut head = format!(
            "// This file is generated by razorc {}\n// DON'T modified manually\n// Should edit source file and re-generate: {}\n\npackage {}\n\nimport (\n",
            VERSION, self.template, self.package
        );
        for import in &self.imports {
            let _ = writeln!(head, "\t{}", import);
        }
        head.push_str(")\n");
        head
    }

    fn value_function(&self) -> String {
        let mut args = vec!["&_b".to_string()];
        args.extend(self.param_names.iter().cloned());
        format!(
            "\n// {f} generates {t}\nfunc {f}({p}) string {{\n\tvar _b strings.Builder\n\tRender{f}({a})\n\treturn _b.String()\n}}\n",
            f = self.function,
            t = self.template,
            p = self.params.join(", "),
            a = args.join(", ")
        )
    }

    /// Value-returning entry point of a layout: string arguments are wrapped
    /// in closures so they can fill the callable slots of `Render<F>`.
    fn layout_overload(&self) -> String {
        let mut out = format!(
            "\n// {f} generates {t}\nfunc {f}({p}) string {{\n\tvar _b strings.Builder\n",
            f = self.function,
            t = self.template,
            p = self.params.join(", ")
        );
        let mut args = vec!["&_b".to_string()];
        for (decl, name) in self.params.iter().zip(&self.param_names) {
            if slot_param(decl).is_some() {
                let _ = write!(
                    out,
                    "\n\t_{n} := func(_buffer io.StringWriter) {{\n\t\t_buffer.WriteString({n})\n\t}}\n",
                    n = name
                );
                args.push(format!("_{}", name));
            } else {
                args.push(name.clone());
            }
        }
        let _ = write!(
            out,
            "\n\tRender{}({})\n\treturn _b.String()\n}}\n",
            self.function,
            args.join(", ")
        );
        out
    }

    fn render_signature(&self) -> String {
        let mut params = vec![WRITER_PARAM.to_string()];
        for decl in &self.params {
            match slot_param(decl) {
                Some(name) if self.is_layout => {
                    params.push(format!("{} func(_buffer io.StringWriter)", name))
                }
                _ => params.push(decl.clone()),
            }
        }
        format!(
            "\n// Render{f} render {t}\nfunc Render{f}({p}) {{\n",
            f = self.function,
            t = self.template,
            p = params.join(", ")
        )
    }
}

/// Markup made only of whitespace text, such as the newline before a header
/// block.
fn is_blank_markup(ast: &Ast, id: NodeId) -> bool {
    ast.node(id).children.iter().all(|child| match child {
        Child::Token(t) => t.value().trim().is_empty(),
        Child::Node(_) => false,
    })
}

/// `file_name` without a trailing `.{extension}`, compared ignoring ASCII case.
fn strip_extension<'f>(file_name: &'f str, extension: &str) -> &'f str {
    let suffix = format!(".{}", extension);
    match file_name.len().checked_sub(suffix.len()) {
        Some(cut)
            if cut > 0
                && file_name.is_char_boundary(cut)
                && file_name[cut..].eq_ignore_ascii_case(&suffix) =>
        {
            &file_name[..cut]
        }
        _ => file_name,
    }
}

/// The name part of a `name string` declaration.
fn slot_param(decl: &str) -> Option<&str> {
    decl.strip_suffix(" string").map(str::trim_end)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
