/// Identifiers whose expressions are written without escaping.
pub const BYPASS_IDENTIFIERS: [&str; 3] = ["helper", "html", "raw"];

/// `@raw(x)` writes `x` verbatim; the marker itself emits nothing.
pub const RAW_MARKER: &str = "raw";

pub const ESCAPE_OPEN: &str = "gorazor.HTMLEscape(";

/// Decides whether the write call for an expression escapes its argument.
pub struct EscapePolicy<'a> {
    /// The template lives in the layout directory.
    pub in_layout_dir: bool,
    /// Declared parameters (`name type`).
    pub params: &'a [String],
}

impl EscapePolicy<'_> {
    /// `first` is the literal text of the expression's first token.
    pub fn needs_escape(&self, first: &str) -> bool {
        if BYPASS_IDENTIFIERS.contains(&first) {
            return false;
        }
        // Layout parameters arrive already rendered.
        if self.in_layout_dir && self.params.iter().any(|p| declares(p, first)) {
            return false;
        }
        true
    }
}

fn declares(param: &str, name: &str) -> bool {
    param
        .strip_prefix(name)
        .is_some_and(|rest| rest.starts_with(' '))
}
