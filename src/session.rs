use crate::ast::Ast;
use crate::compiler::{Compiler, Generated};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::layout::{DiskSource, LayoutRegistry, TemplateSource};
use crate::parse;
use std::path::{Path, PathBuf};

/// One compilation run: configuration, where templates are read from, and the
/// parameters of every layout compiled so far. Layout shapes are learned on
/// demand by compiling the layout, so templates may be compiled in any order.
pub struct Session {
    config: Config,
    source: Box<dyn TemplateSource>,
    registry: LayoutRegistry,
    in_progress: Vec<PathBuf>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Session::with_source(config, DiskSource::default())
    }

    pub fn with_source(config: Config, source: impl TemplateSource + 'static) -> Self {
        Session {
            config,
            source: Box::new(source),
            registry: LayoutRegistry::default(),
            in_progress: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &dyn TemplateSource {
        self.source.as_ref()
    }

    pub fn registry(&self) -> &LayoutRegistry {
        &self.registry
    }

    pub fn compile_file(&mut self, path: &Path) -> Result<Generated> {
        let text = self.source.read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_str(path, &text)
    }

    /// Compiles `text` as if read from `path`; the path decides package,
    /// function name and whether the template is a layout.
    pub fn compile_str(&mut self, path: &Path, text: &str) -> Result<Generated> {
        let ast = parse::parse_template(text).map_err(|e| Error::Parse {
            template: path.display().to_string(),
            line: e.line,
            message: e.message,
        })?;
        if self.config.debug_trace {
            tracing::info!(target: "razorc::trace", template = %path.display(), "\n{}", ast.dump());
        }
        self.compile_ast(path, &ast)
    }

    pub fn compile_ast(&mut self, path: &Path, ast: &Ast) -> Result<Generated> {
        tracing::debug!(template = %path.display(), "compiling");
        let generated = Compiler::new(ast, path, self).compile()?;
        if generated.is_layout && self.registry.lookup(path).is_none() {
            self.registry.register(path, generated.params.clone());
        }
        Ok(generated)
    }

    /// Declared parameters of the layout at `path`, compiling it first if it
    /// has not been seen in this session.
    pub(crate) fn layout_shape(&mut self, path: &Path) -> Result<Vec<String>> {
        if let Some(shape) = self.registry.lookup(path) {
            return Ok(shape.to_vec());
        }
        if self.in_progress.iter().any(|p| p == path) {
            let mut chain: Vec<String> = self
                .in_progress
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(path.display().to_string());
            return Err(Error::LayoutCycle { chain });
        }

        tracing::debug!(layout = %path.display(), "layout not registered, compiling it");
        self.in_progress.push(path.to_path_buf());
        let compiled = self.compile_file(path);
        self.in_progress.pop();
        let generated = compiled?;
        self.registry.register(path, generated.params.clone());
        Ok(generated.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    struct MemorySource(HashMap<String, String>);

    impl TemplateSource for MemorySource {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains_key(path.to_str().unwrap())
        }

        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.0
                .get(path.to_str().unwrap())
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such template"))
        }
    }

    fn session(files: &[(&str, &str)]) -> Session {
        let files = files
            .iter()
            .map(|(p, t)| (p.to_string(), t.to_string()))
            .collect();
        let config = Config {
            suppress_line_hints: true,
            ..Config::default()
        };
        Session::with_source(config, MemorySource(files))
    }

    const BASE: &str = "@{\n\tvar body string\n\tvar title string\n\tvar side string\n}\n<title>@title</title>@body@side";

    #[test]
    fn test_child_renders_into_layout() {
        let mut s = session(&[("app/layout/base.gohtml", BASE)]);
        let child = "@{\n\timport \"app/layout\"\n\tlayout := layout.Base\n}\n<h1>x</h1>\n@section side {\n<p>s</p>\n}\n";
        let g = s.compile_str(Path::new("app/home.gohtml"), child).unwrap();

        assert_eq!(g.layout.as_deref(), Some("layout.RenderBase"));
        assert_eq!(g.sections, vec!["side"]);
        assert!(g.code.contains("\t\"app/layout\"\n"));
        assert!(g.code.contains("\n_body := func(_buffer io.StringWriter) {\n"));
        assert!(g.code.contains("\n_side := func(_buffer io.StringWriter) {\n"));
        assert!(g.code.ends_with("\nlayout.RenderBase(_buffer, _body, nil, _side)\n}\n"));
        assert_eq!(s.registry().len(), 1);
    }

    #[test]
    fn test_layout_compiled_once() {
        let mut s = session(&[("app/layout/base.gohtml", BASE)]);
        let child = "@{\n\timport \"app/layout\"\n\tlayout := layout.Base\n}\n<h1>x</h1>\n";
        s.compile_str(Path::new("app/a.gohtml"), child).unwrap();
        s.compile_str(Path::new("app/b.gohtml"), child).unwrap();
        assert_eq!(
            s.registry()
                .lookup(Path::new("app/layout/base.gohtml"))
                .unwrap()
                .to_vec(),
            vec!["body string", "title string", "side string"]
        );
    }

    #[test]
    fn test_compiled_layout_reused_by_children() {
        // the stored file would not parse, so a second compile of it fails
        let mut s = session(&[("app/layout/base.gohtml", "@{ var body string")]);
        s.compile_str(Path::new("app/layout/base.gohtml"), BASE).unwrap();
        assert_eq!(s.registry().len(), 1);

        let child = "@{\n\timport \"app/layout\"\n\tlayout := layout.Base\n}\n<h1>x</h1>\n";
        let g = s.compile_str(Path::new("app/home.gohtml"), child).unwrap();
        assert_eq!(g.layout.as_deref(), Some("layout.RenderBase"));
        assert_eq!(s.registry().len(), 1);
    }

    #[test]
    fn test_missing_layout() {
        let mut s = session(&[]);
        let child = "@{\n\timport \"app/layout\"\n\tlayout := layout.Base\n}\n<h1>x</h1>\n";
        let err = s.compile_str(Path::new("app/home.gohtml"), child).unwrap_err();
        assert_eq!(
            err.to_string(),
            "can't find layout: app/layout/Base [app/home.gohtml] (tried app/layout/Base.gohtml, app/layout/base.gohtml)"
        );
    }

    #[test]
    fn test_layout_cycle() {
        let outer = "@{\n\timport \"app/layout\"\n\tvar body string\n\tlayout := layout.Inner\n}\n@body";
        let inner = "@{\n\timport \"app/layout\"\n\tvar body string\n\tlayout := layout.Outer\n}\n@body";
        let mut s = session(&[
            ("app/layout/outer.gohtml", outer),
            ("app/layout/inner.gohtml", inner),
        ]);
        let child = "@{\n\timport \"app/layout\"\n\tlayout := layout.Outer\n}\nx";
        let err = s.compile_str(Path::new("app/home.gohtml"), child).unwrap_err();
        match err {
            Error::LayoutCycle { chain } => assert_eq!(
                chain,
                vec![
                    "app/layout/outer.gohtml",
                    "app/layout/inner.gohtml",
                    "app/layout/outer.gohtml"
                ]
            ),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_error_names_template() {
        let mut s = session(&[]);
        let err = s.compile_str(Path::new("app/bad.gohtml"), "<p>\n@{ x").unwrap_err();
        assert_eq!(err.to_string(), "app/bad.gohtml:2: unterminated code block");
    }

    #[test]
    fn test_missing_file() {
        let mut s = session(&[]);
        let err = s.compile_file(Path::new("app/none.gohtml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
