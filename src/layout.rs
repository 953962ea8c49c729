use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Where template files come from. Layout resolution only needs `exists`;
/// compiling a layout to learn its parameters also reads it.
pub trait TemplateSource {
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Directory that source paths are relative to, when there is one.
    fn root(&self) -> Option<&Path> {
        None
    }
}

/// Files on disk, relative paths resolved against `root`.
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskSource { root: root.into() }
    }
}

impl Default for DiskSource {
    fn default() -> Self {
        DiskSource::new(".")
    }
}

impl TemplateSource for DiskSource {
    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(path))
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// Declared parameters of compiled layouts, keyed by resolved layout path.
#[derive(Debug, Default)]
pub struct LayoutRegistry {
    shapes: HashMap<PathBuf, Vec<String>>,
}

impl LayoutRegistry {
    pub fn lookup(&self, path: &Path) -> Option<&[String]> {
        self.shapes.get(path).map(Vec::as_slice)
    }

    pub fn register(&mut self, path: impl Into<PathBuf>, declarations: Vec<String>) {
        self.shapes.insert(path.into(), declarations);
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    /// Layout name as found on disk (possibly with a lower-cased first letter).
    pub name: String,
    pub path: PathBuf,
}

/// Candidate files for layout `name` in import directory `dir`, in lookup
/// order: `dir/Name.ext`, the same without the namespace prefix, then both
/// again with the first letter of the name lower-cased.
pub fn candidates(
    dir: &str,
    name: &str,
    extension: &str,
    namespace_prefix: Option<&str>,
) -> Vec<(String, String)> {
    let mut names = vec![name.to_string()];
    let lowered = lower_first(name);
    if lowered != name {
        names.push(lowered);
    }

    let mut out = Vec::new();
    for n in names {
        let path = format!("{}/{}.{}", dir, n, extension);
        if let Some(stripped) = namespace_prefix.and_then(|p| strip_namespace(&path, p)) {
            out.push((n.clone(), path));
            out.push((n, stripped));
        } else {
            out.push((n, path));
        }
    }
    out
}

pub fn resolve(
    source: &dyn TemplateSource,
    dir: &str,
    name: &str,
    extension: &str,
    namespace_prefix: Option<&str>,
) -> Result<ResolvedLayout, Vec<String>> {
    let candidates = candidates(dir, name, extension, namespace_prefix);
    for (n, path) in &candidates {
        if source.exists(Path::new(path)) {
            tracing::debug!(layout = %n, path = %path, "resolved layout");
            return Ok(ResolvedLayout {
                name: n.clone(),
                path: PathBuf::from(path),
            });
        }
    }
    Err(candidates.into_iter().map(|(_, p)| p).collect())
}

fn strip_namespace(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Files(HashSet<String>);

    impl TemplateSource for Files {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains(path.to_str().unwrap())
        }

        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
        }
    }

    fn files(paths: &[&str]) -> Files {
        Files(paths.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_candidate_order() {
        let c = candidates("acme.io/site/tpl/layout", "Base", "gohtml", Some("acme.io/site"));
        let paths: Vec<&str> = c.iter().map(|(_, p)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "acme.io/site/tpl/layout/Base.gohtml",
                "tpl/layout/Base.gohtml",
                "acme.io/site/tpl/layout/base.gohtml",
                "tpl/layout/base.gohtml",
            ]
        );
    }

    #[test]
    fn test_candidates_without_prefix() {
        let c = candidates("tpl/layout", "base", "gohtml", None);
        assert_eq!(c, vec![("base".to_string(), "tpl/layout/base.gohtml".to_string())]);
    }

    #[test]
    fn test_prefers_exact_name() {
        let src = files(&["tpl/layout/Foo.gohtml", "tpl/layout/foo.gohtml"]);
        let r = resolve(&src, "tpl/layout", "Foo", "gohtml", None).unwrap();
        assert_eq!(r.name, "Foo");
        assert_eq!(r.path, PathBuf::from("tpl/layout/Foo.gohtml"));
    }

    #[test]
    fn test_falls_back_to_lower_case() {
        let src = files(&["tpl/layout/foo.gohtml"]);
        let r = resolve(&src, "tpl/layout", "Foo", "gohtml", None).unwrap();
        assert_eq!(r.name, "foo");
    }

    #[test]
    fn test_namespace_prefix_stripped() {
        let src = files(&["tpl/layout/Base.gohtml"]);
        let r = resolve(&src, "acme.io/site/tpl/layout", "Base", "gohtml", Some("acme.io/site")).unwrap();
        assert_eq!(r.path, PathBuf::from("tpl/layout/Base.gohtml"));
    }

    #[test]
    fn test_unresolved_lists_attempts() {
        let src = files(&[]);
        let tried = resolve(&src, "tpl/layout", "Foo", "gohtml", None).unwrap_err();
        assert_eq!(tried, vec!["tpl/layout/Foo.gohtml", "tpl/layout/foo.gohtml"]);
    }

    #[test]
    fn test_registry() {
        let mut reg = LayoutRegistry::default();
        assert!(reg.is_empty());
        assert!(reg.lookup(Path::new("a.gohtml")).is_none());
        reg.register("a.gohtml", vec!["body string".to_string()]);
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.lookup(Path::new("a.gohtml")).unwrap().to_vec(),
            vec!["body string".to_string()]
        );
    }
}
