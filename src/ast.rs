use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Mode-switch marker such as `@:`; contributes no text to generated code.
    Directive,
    Text,
    /// Braces delimiting a code block.
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn text(text: impl Into<String>, line: usize) -> Self {
        Token::new(TokenKind::Text, text, line)
    }

    pub fn structural(text: impl Into<String>, line: usize) -> Self {
        Token::new(TokenKind::Structural, text, line)
    }

    pub fn directive(text: impl Into<String>, line: usize) -> Self {
        Token::new(TokenKind::Directive, text, line)
    }

    /// Literal text this token contributes to generated code.
    pub fn value(&self) -> &str {
        match self.kind {
            TokenKind::Directive => "",
            TokenKind::Text | TokenKind::Structural => &self.text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Program,
    Markup,
    Block,
    Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Token(Token),
    Node(NodeId),
}

impl Child {
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Child::Token(t) => Some(t),
            Child::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Child::Token(_) => None,
            Child::Node(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub mode: Mode,
    pub children: Vec<Child>,
    pub parent: Option<NodeId>,
    pub tag_name: Option<String>,
}

/// Template syntax tree. Nodes live in an arena; the root is always a
/// `Program` node and every other node is reachable from it through
/// `Child::Node` edges. `parent` links are indices, never owners.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Default for Ast {
    fn default() -> Self {
        Ast::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Ast {
            nodes: vec![Node {
                mode: Mode::Program,
                children: Vec::new(),
                parent: None,
                tag_name: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Creates a node and appends it as the last child of `parent`.
    pub fn add_node(&mut self, parent: NodeId, mode: Mode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            mode,
            children: Vec::new(),
            parent: Some(parent),
            tag_name: None,
        });
        self.nodes[parent.0].children.push(Child::Node(id));
        id
    }

    pub fn push_token(&mut self, node: NodeId, token: Token) {
        self.nodes[node.0].children.push(Child::Token(token));
    }

    pub fn set_tag_name(&mut self, node: NodeId, name: impl Into<String>) {
        self.nodes[node.0].tag_name = Some(name.into());
    }

    /// True when `id` and its whole subtree are expression nodes.
    pub fn is_homogeneous_expression(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.mode == Mode::Expression
            && node
                .children
                .iter()
                .filter_map(Child::as_node)
                .all(|child| self.is_homogeneous_expression(child))
    }

    /// True when the parent of `id` is itself an expression node.
    pub fn is_nested_expression(&self, id: NodeId) -> bool {
        self.node(id)
            .parent
            .is_some_and(|p| self.node(p).mode == Mode::Expression)
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root(), 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        let indent = "  ".repeat(depth);
        match &node.tag_name {
            Some(tag) => {
                let _ = writeln!(out, "{}{:?} <{}>", indent, node.mode, tag);
            }
            None => {
                let _ = writeln!(out, "{}{:?}", indent, node.mode);
            }
        }
        for child in &node.children {
            match child {
                Child::Token(t) => {
                    let _ = writeln!(out, "{}  {:?} {:?} @{}", indent, t.kind, t.text, t.line);
                }
                Child::Node(n) => self.dump_node(*n, depth + 1, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_links_parent() {
        let mut ast = Ast::new();
        let root = ast.root();
        let markup = ast.add_node(root, Mode::Markup);
        ast.push_token(markup, Token::text("<p>", 1));
        assert_eq!(ast.node(root).children, vec![Child::Node(markup)]);
        assert_eq!(ast.node(markup).parent, Some(root));
        assert_eq!(ast.node(markup).children[0].as_token().unwrap().text, "<p>");
    }

    #[test]
    fn test_directive_has_no_value() {
        assert_eq!(Token::directive("@:", 3).value(), "");
        assert_eq!(Token::structural("{", 3).value(), "{");
    }

    #[test]
    fn test_homogeneous_expression() {
        let mut ast = Ast::new();
        let root = ast.root();
        let exp = ast.add_node(root, Mode::Expression);
        let inner = ast.add_node(exp, Mode::Expression);
        assert!(ast.is_homogeneous_expression(exp));
        assert!(ast.is_nested_expression(inner));
        assert!(!ast.is_nested_expression(exp));

        ast.add_node(inner, Mode::Markup);
        assert!(!ast.is_homogeneous_expression(exp));
    }

    #[test]
    fn test_dump() {
        let mut ast = Ast::new();
        let root = ast.root();
        let markup = ast.add_node(root, Mode::Markup);
        ast.set_tag_name(markup, "div");
        ast.push_token(markup, Token::text("<div>", 2));
        assert_eq!(ast.dump(), "Program\n  Markup <div>\n    Text \"<div>\" @2\n");
    }
}
