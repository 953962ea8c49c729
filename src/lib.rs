pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod escape;
pub mod header;
pub mod layout;
pub mod parse;
pub mod parts;
pub mod postprocess;
pub mod sections;
pub mod session;

pub use compiler::Generated;
pub use config::Config;
pub use error::{Error, Result};
pub use session::Session;

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Compiles one template in a fresh session and returns the Go source.
pub fn compile(path: &Path, text: &str, config: &Config) -> Result<String> {
    let mut session = Session::new(config.clone());
    Ok(session.compile_str(path, text)?.code)
}

/// Template files among `inputs`, directories searched recursively, sorted.
pub fn list_templates(inputs: &[PathBuf], extension: &str) -> io::Result<Vec<PathBuf>> {
    let re = Regex::new(&format!(r"(?i)\.{}$", regex::escape(extension))).unwrap();
    let mut out: Vec<PathBuf> = Vec::new();

    for p in inputs {
        if p.is_dir() {
            for entry in fs::read_dir(p)? {
                let sub_path = entry?.path();
                if sub_path.is_dir() {
                    out.extend(list_templates(&[sub_path], extension)?);
                } else if sub_path.is_file() && matches(&re, &sub_path) {
                    out.push(sub_path);
                }
            }
        } else if p.is_file() && matches(&re, p) {
            out.push(p.clone());
        }
    }

    out.sort();
    Ok(out)
}

fn matches(re: &Regex, path: &Path) -> bool {
    path.to_str().is_some_and(|s| re.is_match(s))
}

/// Compiles `input` and writes the (formatted) result to `output`, creating
/// parent directories. Nothing is written when compilation fails.
pub fn generate(session: &mut Session, input: &Path, output: &Path) -> Result<()> {
    let generated = session.compile_file(input)?;
    let code = postprocess::format_source(&generated.code, session.config());
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(output, code).map_err(|source| Error::Io {
        path: output.to_path_buf(),
        source,
    })?;
    tracing::debug!(input = %input.display(), output = %output.display(), "generated");
    Ok(())
}

/// Generates every template under `input_dir` into the same relative location
/// under `output_dir`, with a `.go` extension. Returns the files written.
///
/// `input_dir` is taken relative to the session's source root. Templates are
/// compiled under their source-relative paths, so generated headers and layout
/// registry keys match the paths layouts are resolved by.
pub fn generate_folder(session: &mut Session, input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let extension = session.config().extension.clone();
    let root = session.source().root().map(Path::to_path_buf);
    let scan_dir = match &root {
        Some(root) => root.join(input_dir),
        None => input_dir.to_path_buf(),
    };
    let templates = list_templates(&[scan_dir.clone()], &extension).map_err(|source| Error::Io {
        path: scan_dir.clone(),
        source,
    })?;

    let mut written = Vec::new();
    for template in &templates {
        let relative = template.strip_prefix(&scan_dir).unwrap_or(template);
        let output = output_dir.join(relative).with_extension("go");
        let input = match &root {
            Some(root) => source_relative(root, template),
            None => template.clone(),
        };
        generate(session, &input, &output)?;
        written.push(output);
    }
    Ok(written)
}

/// `path` relative to `root`; a relative root is also tried against the
/// current directory. Paths outside the root come back unchanged.
fn source_relative(root: &Path, path: &Path) -> PathBuf {
    if let Ok(relative) = path.strip_prefix(root) {
        return relative.to_path_buf();
    }
    if root.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            if let Ok(relative) = path.strip_prefix(cwd.join(root)) {
                return relative.to_path_buf();
            }
        }
    }
    path.to_path_buf()
}
