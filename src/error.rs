use std::io;
use std::path::PathBuf;

/// Every way a template compilation can fail. All of these are authoring
/// errors or I/O failures; none are retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{template}:{line}: {message}")]
    Parse {
        template: String,
        line: usize,
        message: String,
    },

    #[error("malformed header block in {template}: {message}")]
    MalformedHeader { template: String, message: String },

    #[error("can't find layout: {layout} [{template}] (tried {})", tried.join(", "))]
    LayoutNotFound {
        layout: String,
        template: String,
        tried: Vec<String>,
    },

    #[error("layout cycle: {}", chain.join(" -> "))]
    LayoutCycle { chain: Vec<String> },

    #[error("expect layout for sections: {template}")]
    SectionsWithoutLayout { template: String },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
