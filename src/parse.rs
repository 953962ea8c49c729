//! Razor template syntax to [`Ast`].
//!
//! Markup is passed through untouched. `@` switches to code:
//!
//! - `@name`, `@name.field`, `@name(args)`, `@name[i]` and `@(expr)` are expressions
//! - `@{ ... }` is a code block
//! - `@if`, `@for`, `@switch` and `@section` are statements with a braced body
//! - `@@` is a literal `@`, `@* ... *@` a comment
//!
//! Inside code, an HTML element starting at a statement boundary switches back
//! to markup until its matching close tag, `@:` makes the rest of the line
//! markup, and `@name` is an expression written to the output.

use crate::ast::{Ast, Mode, NodeId, Token};
use std::mem;

const STATEMENT_KEYWORDS: [&str; 4] = ["if", "for", "switch", "section"];

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

pub fn parse_template(source: &str) -> Result<Ast, ParseError> {
    let mut parser = Parser {
        src: source,
        pos: 0,
        line: 1,
        prev: None,
        ast: Ast::new(),
    };
    parser.program()?;
    Ok(parser.ast)
}

#[derive(Default)]
struct TextRun {
    text: String,
    line: usize,
}

impl TextRun {
    fn push(&mut self, c: char, line: usize) {
        if self.text.is_empty() {
            self.line = line;
        }
        self.text.push(c);
    }

    fn take(&mut self) -> Option<Token> {
        if self.text.is_empty() {
            None
        } else {
            Some(Token::text(mem::take(&mut self.text), self.line))
        }
    }
}

enum At {
    Construct,
    Escaped,
    Comment,
    Literal,
}

struct Tag {
    closing: bool,
    name: String,
    quote: Option<char>,
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    /// Last consumed character; `None` at the start and after a construct.
    prev: Option<char>,
    ast: Ast,
}

impl<'s> Parser<'s> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        self.prev = Some(c);
        Some(c)
    }

    fn bump_into(&mut self, run: &mut TextRun) {
        let line = self.line;
        if let Some(c) = self.bump() {
            run.push(c, line);
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            message: message.into(),
        }
    }

    fn flush(&mut self, run: &mut TextRun, node: NodeId) {
        if let Some(token) = run.take() {
            self.ast.push_token(node, token);
        }
    }

    fn program(&mut self) -> Result<(), ParseError> {
        let root = self.ast.root();
        let mut run = TextRun::default();
        let mut markup: Option<NodeId> = None;
        while let Some(c) = self.peek() {
            if c != '@' {
                self.bump_into(&mut run);
                continue;
            }
            if self.inline_at(&mut run)? {
                self.flush_program_text(&mut run, &mut markup);
                markup = None;
                self.construct(root)?;
            }
        }
        self.flush_program_text(&mut run, &mut markup);
        Ok(())
    }

    fn flush_program_text(&mut self, run: &mut TextRun, markup: &mut Option<NodeId>) {
        if let Some(token) = run.take() {
            let root = self.ast.root();
            let node = *markup.get_or_insert_with(|| self.ast.add_node(root, Mode::Markup));
            self.ast.push_token(node, token);
        }
    }

    fn classify_at(&self) -> At {
        match self.peek_nth(1) {
            Some('@') => At::Escaped,
            Some('*') => At::Comment,
            _ if self.prev.is_some_and(char::is_alphanumeric) => At::Literal,
            Some('{') | Some('(') => At::Construct,
            Some(c) if is_ident_start(c) => At::Construct,
            _ => At::Literal,
        }
    }

    /// Handles an `@` met in markup. Returns true, consuming nothing, when it
    /// starts a construct; otherwise consumes it as text or comment.
    fn inline_at(&mut self, run: &mut TextRun) -> Result<bool, ParseError> {
        match self.classify_at() {
            At::Construct => return Ok(true),
            At::Escaped => {
                let line = self.line;
                self.bump();
                self.bump();
                run.push('@', line);
            }
            At::Comment => self.skip_comment()?,
            At::Literal => self.bump_into(run),
        }
        Ok(false)
    }

    fn skip_comment(&mut self) -> Result<(), ParseError> {
        let start = self.line;
        self.bump();
        self.bump();
        while !self.rest().starts_with("*@") {
            if self.bump().is_none() {
                return Err(self.error(start, "unterminated comment"));
            }
        }
        self.bump();
        self.bump();
        Ok(())
    }

    fn construct(&mut self, parent: NodeId) -> Result<(), ParseError> {
        self.bump();
        let parsed = self.construct_body(parent);
        // an `@` right after a construct starts another one
        self.prev = None;
        parsed
    }

    fn construct_body(&mut self, parent: NodeId) -> Result<(), ParseError> {
        match self.peek() {
            Some('{') => {
                let node = self.ast.add_node(parent, Mode::Block);
                self.code_body(node)
            }
            Some('(') => {
                let node = self.ast.add_node(parent, Mode::Expression);
                let line = self.line;
                let text = self.balanced('(', ')')?;
                self.ast.push_token(node, Token::text(text, line));
                Ok(())
            }
            _ => {
                let ident = self.peek_ident();
                if STATEMENT_KEYWORDS.contains(&ident) {
                    self.statement(parent, ident)
                } else {
                    self.expression(parent)
                }
            }
        }
    }

    fn peek_ident(&self) -> &'s str {
        let rest = self.rest();
        let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        &rest[..end]
    }

    fn take_ident(&mut self) -> String {
        let ident = self.peek_ident();
        for _ in ident.chars() {
            self.bump();
        }
        ident.to_string()
    }

    fn expression(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let node = self.ast.add_node(parent, Mode::Expression);
        let line = self.line;
        let ident = self.take_ident();
        self.ast.push_token(node, Token::text(ident, line));
        loop {
            let line = self.line;
            let text = match self.peek() {
                Some('.') if self.peek_nth(1).is_some_and(is_ident_start) => {
                    self.bump();
                    format!(".{}", self.take_ident())
                }
                Some('(') => self.balanced('(', ')')?,
                Some('[') => self.balanced('[', ']')?,
                _ => break,
            };
            self.ast.push_token(node, Token::text(text, line));
        }
        Ok(())
    }

    fn balanced(&mut self, open: char, close: char) -> Result<String, ParseError> {
        let start = self.line;
        let mut run = TextRun::default();
        let mut depth = 0usize;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(start, format!("unclosed '{}'", open)));
            };
            match c {
                '"' | '`' | '\'' => {
                    self.copy_quoted(&mut run)?;
                    continue;
                }
                c if c == open => depth += 1,
                c if c == close => depth -= 1,
                _ => {}
            }
            self.bump_into(&mut run);
            if depth == 0 {
                return Ok(run.text);
            }
        }
    }

    fn copy_quoted(&mut self, run: &mut TextRun) -> Result<(), ParseError> {
        let start = self.line;
        let Some(quote) = self.peek() else {
            return Ok(());
        };
        self.bump_into(run);
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated string literal")),
                Some('\n') if quote != '`' => {
                    return Err(self.error(start, "unterminated string literal"));
                }
                Some('\\') if quote != '`' => {
                    self.bump_into(run);
                    self.bump_into(run);
                }
                Some(c) => {
                    self.bump_into(run);
                    if c == quote {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn statement(&mut self, parent: NodeId, keyword: &str) -> Result<(), ParseError> {
        let node = self.ast.add_node(parent, Mode::Block);
        let mut header = TextRun::default();
        loop {
            self.statement_header(&mut header, keyword)?;
            self.flush(&mut header, node);
            self.code_body(node)?;
            if keyword != "if" || !self.else_follows() {
                return Ok(());
            }
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            header.push(' ', self.line);
        }
    }

    /// Copies statement text up to the `{` opening its body.
    fn statement_header(&mut self, run: &mut TextRun, keyword: &str) -> Result<(), ParseError> {
        let start = self.line;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(self.error(start, format!("expected '{{' after @{}", keyword))),
                Some('{') if depth == 0 => return Ok(()),
                Some('\n') if depth == 0 => {
                    return Err(self.error(start, format!("expected '{{' after @{}", keyword)));
                }
                Some('"') | Some('`') | Some('\'') => {
                    self.copy_quoted(run)?;
                    continue;
                }
                Some('(') | Some('[') => depth += 1,
                Some(')') | Some(']') => depth = depth.saturating_sub(1),
                Some(_) => {}
            }
            self.bump_into(run);
        }
    }

    fn else_follows(&self) -> bool {
        self.rest()
            .trim_start()
            .strip_prefix("else")
            .is_some_and(|after| !after.starts_with(is_ident_char))
    }

    /// Parses `{ ... }` at the current position into `node`: the braces as
    /// structural tokens, code as text and embedded markup as child nodes.
    fn code_body(&mut self, node: NodeId) -> Result<(), ParseError> {
        let open_line = self.line;
        self.bump();
        self.ast.push_token(node, Token::structural("{", open_line));
        let mut run = TextRun::default();
        let mut depth = 0usize;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(open_line, "unterminated code block"));
            };
            match c {
                '"' | '`' | '\'' => self.copy_quoted(&mut run)?,
                '/' if self.rest().starts_with("//") => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump_into(&mut run);
                    }
                }
                '/' if self.rest().starts_with("/*") => {
                    while self.peek().is_some() && !self.rest().starts_with("*/") {
                        self.bump_into(&mut run);
                    }
                    self.bump_into(&mut run);
                    self.bump_into(&mut run);
                }
                '{' => {
                    depth += 1;
                    self.bump_into(&mut run);
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    self.bump_into(&mut run);
                }
                '}' => {
                    self.flush(&mut run, node);
                    let line = self.line;
                    self.bump();
                    self.ast.push_token(node, Token::structural("}", line));
                    return Ok(());
                }
                '<' if self.at_tag_start() => {
                    self.flush(&mut run, node);
                    self.element(node)?;
                }
                '@' if self.peek_nth(1) == Some(':') => {
                    self.flush(&mut run, node);
                    self.markup_line(node)?;
                }
                '@' if matches!(self.classify_at(), At::Construct) => {
                    self.flush(&mut run, node);
                    self.construct(node)?;
                }
                _ => self.bump_into(&mut run),
            }
        }
    }

    /// `<` followed by a letter, at a point where code cannot be mid-expression.
    fn at_tag_start(&self) -> bool {
        self.peek_nth(1).is_some_and(|c| c.is_ascii_alphabetic())
            && self
                .prev
                .map_or(true, |p| p.is_whitespace() || matches!(p, '{' | '}' | ';' | '>'))
    }

    fn tag_open(&self) -> Option<Tag> {
        let rest = self.rest().strip_prefix('<')?;
        let (closing, rest) = match rest.strip_prefix('/') {
            Some(r) => (true, r),
            None => (false, rest),
        };
        if !rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return None;
        }
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
            .unwrap_or(rest.len());
        Some(Tag {
            closing,
            name: rest[..end].to_ascii_lowercase(),
            quote: None,
        })
    }

    /// Markup from an opening tag through its matching close tag.
    fn element(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let node = self.ast.add_node(parent, Mode::Markup);
        let open_line = self.line;
        let name = self.tag_open().map(|t| t.name).unwrap_or_default();
        self.ast.set_tag_name(node, name.clone());

        let mut run = TextRun::default();
        let mut depth = 0usize;
        let mut tag: Option<Tag> = None;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(open_line, format!("unterminated element <{}>", name)));
            };
            if c == '@' {
                if self.inline_at(&mut run)? {
                    self.flush(&mut run, node);
                    self.construct(node)?;
                }
                continue;
            }

            let Some(state) = tag.as_mut() else {
                if c == '<' {
                    tag = self.tag_open();
                }
                self.bump_into(&mut run);
                continue;
            };
            if let Some(q) = state.quote {
                if c == q {
                    state.quote = None;
                }
                self.bump_into(&mut run);
                continue;
            }
            if c == '"' || c == '\'' {
                state.quote = Some(c);
                self.bump_into(&mut run);
                continue;
            }
            if c != '>' {
                self.bump_into(&mut run);
                continue;
            }

            let self_closing = self.prev == Some('/');
            let closing = state.closing;
            let void = VOID_ELEMENTS.contains(&state.name.as_str());
            tag = None;
            self.bump_into(&mut run);
            if closing {
                depth = depth.saturating_sub(1);
            } else if !self_closing && !void {
                depth += 1;
            }
            if depth == 0 {
                self.flush(&mut run, node);
                return Ok(());
            }
        }
    }

    /// `@:` and the rest of its line as markup.
    fn markup_line(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let node = self.ast.add_node(parent, Mode::Markup);
        let line = self.line;
        self.bump();
        self.bump();
        self.ast.push_token(node, Token::directive("@:", line));
        let mut run = TextRun::default();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            if c == '@' {
                if self.inline_at(&mut run)? {
                    self.flush(&mut run, node);
                    self.construct(node)?;
                }
                continue;
            }
            self.bump_into(&mut run);
        }
        self.flush(&mut run, node);
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Child, TokenKind};

    fn texts(ast: &Ast, id: NodeId) -> Vec<String> {
        ast.node(id)
            .children
            .iter()
            .filter_map(Child::as_token)
            .map(|t| t.text.clone())
            .collect()
    }

    fn nodes(ast: &Ast, id: NodeId) -> Vec<NodeId> {
        ast.node(id).children.iter().filter_map(Child::as_node).collect()
    }

    #[test]
    fn test_plain_markup() {
        let ast = parse_template("<p>hi</p>\n").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(top.len(), 1);
        assert_eq!(ast.node(top[0]).mode, Mode::Markup);
        assert_eq!(texts(&ast, top[0]), vec!["<p>hi</p>\n"]);
    }

    #[test]
    fn test_escaped_at_and_email() {
        let ast = parse_template("mail me@example.com or @@home").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(top.len(), 1);
        assert_eq!(texts(&ast, top[0]).concat(), "mail me@example.com or @home");
    }

    #[test]
    fn test_expression_chain() {
        let ast = parse_template("Hi @user.Name!").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(top.len(), 3);
        assert_eq!(ast.node(top[1]).mode, Mode::Expression);
        assert_eq!(texts(&ast, top[1]), vec!["user", ".Name"]);
        assert_eq!(texts(&ast, top[2]), vec!["!"]);
    }

    #[test]
    fn test_expression_call_and_index() {
        let ast = parse_template("@raw(fmt.Sprint(\"a)\", x))@items[0].Title.").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(texts(&ast, top[0]), vec!["raw", "(fmt.Sprint(\"a)\", x))"]);
        assert_eq!(texts(&ast, top[1]), vec!["items", "[0]", ".Title"]);
        assert_eq!(texts(&ast, top[2]), vec!["."]);
    }

    #[test]
    fn test_adjacent_expressions() {
        let ast = parse_template("<div>@body@side</div>").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(top.len(), 4);
        assert_eq!(texts(&ast, top[1]), vec!["body"]);
        assert_eq!(ast.node(top[2]).mode, Mode::Expression);
        assert_eq!(texts(&ast, top[2]), vec!["side"]);
        assert_eq!(texts(&ast, top[3]), vec!["</div>"]);

        let ast = parse_template("@a.B@c").unwrap();
        assert_eq!(nodes(&ast, ast.root()).len(), 2);
    }

    #[test]
    fn test_parenthesized_expression() {
        let ast = parse_template("@(a + b)").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(ast.node(top[0]).mode, Mode::Expression);
        assert_eq!(texts(&ast, top[0]), vec!["(a + b)"]);
    }

    #[test]
    fn test_code_block() {
        let ast = parse_template("@{\n\tvar x string\n}\n<p>").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(ast.node(top[0]).mode, Mode::Block);
        let children = &ast.node(top[0]).children;
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], Child::Token(Token::structural("{", 1)));
        assert_eq!(children[1], Child::Token(Token::text("\n\tvar x string\n", 1)));
        assert_eq!(children[2], Child::Token(Token::structural("}", 3)));
        assert_eq!(texts(&ast, top[1]), vec!["\n<p>"]);
    }

    #[test]
    fn test_if_else_with_markup() {
        let ast = parse_template("@if a { <p>yes</p> } else { <b>no</b> }").unwrap();
        let block = nodes(&ast, ast.root())[0];
        assert_eq!(ast.node(block).mode, Mode::Block);
        assert_eq!(
            texts(&ast, block),
            vec!["if a ", "{", " ", " ", "}", " else ", "{", " ", " ", "}"]
        );
        let elements = nodes(&ast, block);
        assert_eq!(elements.len(), 2);
        assert_eq!(ast.node(elements[0]).tag_name.as_deref(), Some("p"));
        assert_eq!(texts(&ast, elements[0]), vec!["<p>yes</p>"]);
        assert_eq!(texts(&ast, elements[1]), vec!["<b>no</b>"]);
    }

    #[test]
    fn test_nested_elements_and_attribute_expression() {
        let src = "@for _, l := range links {\n<li><a href=\"@l.URL\">@l.Name</a><br></li>\n}";
        let ast = parse_template(src).unwrap();
        let block = nodes(&ast, ast.root())[0];
        let li = nodes(&ast, block)[0];
        assert_eq!(ast.node(li).tag_name.as_deref(), Some("li"));
        assert_eq!(texts(&ast, li), vec!["<li><a href=\"", "\">", "</a><br></li>"]);
        let exprs = nodes(&ast, li);
        assert_eq!(texts(&ast, exprs[0]), vec!["l", ".URL"]);
        assert_eq!(texts(&ast, exprs[1]), vec!["l", ".Name"]);
    }

    #[test]
    fn test_section_statement() {
        let ast = parse_template("@section side {\n<p>x</p>\n}\n").unwrap();
        let block = nodes(&ast, ast.root())[0];
        assert_eq!(texts(&ast, block), vec!["section side ", "{", "\n", "\n", "}"]);
    }

    #[test]
    fn test_comparison_is_not_markup() {
        let ast = parse_template("@if a<b { x := 1 }").unwrap();
        let block = nodes(&ast, ast.root())[0];
        assert!(nodes(&ast, block).is_empty());
        assert_eq!(texts(&ast, block), vec!["if a<b ", "{", " x := 1 ", "}"]);
    }

    #[test]
    fn test_markup_line() {
        let ast = parse_template("@{\n@:Hello @name\n}").unwrap();
        let block = nodes(&ast, ast.root())[0];
        let line = nodes(&ast, block)[0];
        assert_eq!(ast.node(line).mode, Mode::Markup);
        let first = ast.node(line).children[0].as_token().unwrap();
        assert_eq!(first.kind, TokenKind::Directive);
        assert_eq!(texts(&ast, line), vec!["@:", "Hello "]);
        assert_eq!(ast.node(nodes(&ast, line)[0]).mode, Mode::Expression);
    }

    #[test]
    fn test_expression_inside_code() {
        let ast = parse_template("@if side != \"\" {\n@side\n}").unwrap();
        let block = nodes(&ast, ast.root())[0];
        assert_eq!(texts(&ast, block), vec!["if side != \"\" ", "{", "\n", "\n", "}"]);
        let exp = nodes(&ast, block)[0];
        assert_eq!(ast.node(exp).mode, Mode::Expression);
        assert_eq!(texts(&ast, exp), vec!["side"]);
    }

    #[test]
    fn test_comment_skipped() {
        let ast = parse_template("a@* note *@b").unwrap();
        let top = nodes(&ast, ast.root());
        assert_eq!(texts(&ast, top[0]), vec!["ab"]);
    }

    #[test]
    fn test_line_numbers() {
        let ast = parse_template("<p>\n\n@name</p>").unwrap();
        let top = nodes(&ast, ast.root());
        let token = ast.node(top[1]).children[0].as_token().unwrap();
        assert_eq!(token.line, 3);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_template("<p>\n@{ var x string").unwrap_err(),
            ParseError {
                line: 2,
                message: "unterminated code block".to_string()
            }
        );
        assert_eq!(parse_template("@* open").unwrap_err().message, "unterminated comment");
        assert_eq!(parse_template("@f(x").unwrap_err().message, "unclosed '('");
        assert_eq!(
            parse_template("@if x\n{ }").unwrap_err().message,
            "expected '{' after @if"
        );
        assert_eq!(
            parse_template("@if x { <div> }").unwrap_err().message,
            "unterminated element <div>"
        );
    }
}
