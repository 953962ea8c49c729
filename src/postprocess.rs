use crate::config::Config;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Pipes generated code through the configured formatter. A formatter that
/// cannot be run or rejects the code leaves the code as generated.
pub fn format_source(code: &str, config: &Config) -> String {
    let Some(formatter) = config.formatter.as_deref() else {
        return code.to_string();
    };
    match run_formatter(formatter, code) {
        Ok(formatted) => formatted,
        Err(e) => {
            tracing::warn!(formatter, "formatting failed, keeping unformatted output: {}", e);
            code.to_string()
        }
    }
}

fn run_formatter(command: &str, code: &str) -> io::Result<String> {
    let mut words = command.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty formatter command"))?;
    let mut child = Command::new(program)
        .args(words)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "formatter stdin unavailable"))?;
    // stdout is drained concurrently so a streaming formatter cannot block the write
    let input = code.to_string();
    let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));
    let output = child.wait_with_output()?;
    let written = writer
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "formatter input thread panicked"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{}: {}", output.status, stderr.trim()),
        ));
    }
    written?;
    String::from_utf8(output.stdout).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
