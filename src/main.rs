use clap::Parser;
use razorc::config::Config;
use razorc::Session;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "razorc", version, about = "Razor template compiler — compile .gohtml templates to Go source")]
struct Cli {
    /// Template file, or directory of templates
    input: PathBuf,

    /// Output file, or directory when the input is a directory
    output: PathBuf,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log the parsed syntax tree of every template
    #[arg(long)]
    debug: bool,

    /// Omit `// Line: N` comments from generated code
    #[arg(long)]
    no_line_numbers: bool,

    /// Keep file names as-is for function names instead of capitalizing
    #[arg(long)]
    name_not_change: bool,

    /// Import-path prefix of the project, stripped when resolving layouts
    #[arg(long)]
    prefix: Option<String>,

    /// Command generated code is piped through (e.g. gofmt)
    #[arg(long = "fmt")]
    formatter: Option<String>,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,
}

fn die(msg: &str) -> ! {
    eprintln!("error: {}", msg);
    process::exit(1);
}

fn load_config(path: &PathBuf) -> Config {
    let text = fs::read_to_string(path).unwrap_or_else(|e| die(&format!("cannot read config: {}", e)));
    serde_json::from_str(&text).unwrap_or_else(|e| die(&format!("invalid config JSON: {}", e)))
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else if cli.debug {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    // Load config
    let mut config = if let Some(ref config_path) = cli.config {
        load_config(config_path)
    } else {
        let defaults = ["razorc.config.json", "config/razorc.config.json"];
        let mut loaded = None;
        for p in &defaults {
            let path = PathBuf::from(p);
            if path.is_file() {
                loaded = Some(load_config(&path));
                break;
            }
        }
        loaded.unwrap_or_default()
    };

    // CLI overrides
    if cli.debug {
        config.debug_trace = true;
    }
    if cli.no_line_numbers {
        config.suppress_line_hints = true;
    }
    if cli.name_not_change {
        config.preserve_identifier_case = true;
    }
    if let Some(ref prefix) = cli.prefix {
        config.namespace_prefix = prefix.clone();
    }
    if let Some(ref formatter) = cli.formatter {
        config.formatter = Some(formatter.clone());
    }

    let mut session = Session::new(config);
    if cli.input.is_dir() {
        let written = razorc::generate_folder(&mut session, &cli.input, &cli.output)
            .unwrap_or_else(|e| die(&e.to_string()));
        if written.is_empty() {
            die("no templates found");
        }
        tracing::info!(
            "generated {} file(s) -> {} ({} layout(s))",
            written.len(),
            cli.output.display(),
            session.registry().len()
        );
    } else if cli.input.is_file() {
        razorc::generate(&mut session, &cli.input, &cli.output).unwrap_or_else(|e| die(&e.to_string()));
        tracing::info!("generated {} -> {}", cli.input.display(), cli.output.display());
    } else {
        die(&format!("no such file or directory: {}", cli.input.display()));
    }
}
