use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Log the parsed AST of every compiled template.
    #[serde(default)]
    pub debug_trace: bool,

    /// Omit the `// Line: N` comments in front of emitted statements.
    #[serde(default)]
    pub suppress_line_hints: bool,

    /// Keep the file name as-is for the generated function names instead of
    /// capitalizing it.
    #[serde(default)]
    pub preserve_identifier_case: bool,

    /// Import-path prefix stripped when a layout path does not exist as-is.
    #[serde(default)]
    pub namespace_prefix: String,

    #[serde(default = "default_layout_dir")]
    pub layout_dir: String,

    #[serde(default = "default_extension")]
    pub extension: String,

    /// Quoted import spec of the helper package providing `HTMLEscape` and `Widget`.
    #[serde(default = "default_helper_import")]
    pub helper_import: String,

    /// External command generated code is piped through, e.g. `gofmt`.
    #[serde(default)]
    pub formatter: Option<String>,
}

fn default_layout_dir() -> String {
    "layout".to_string()
}
fn default_extension() -> String {
    "gohtml".to_string()
}
fn default_helper_import() -> String {
    r#""github.com/sipin/gorazor/gorazor""#.to_string()
}

impl Config {
    pub fn namespace_prefix(&self) -> Option<&str> {
        if self.namespace_prefix.is_empty() {
            None
        } else {
            Some(&self.namespace_prefix)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug_trace: false,
            suppress_line_hints: false,
            preserve_identifier_case: false,
            namespace_prefix: String::new(),
            layout_dir: default_layout_dir(),
            extension: default_extension(),
            helper_import: default_helper_import(),
            formatter: None,
        }
    }
}
