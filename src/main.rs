// Entrypoint for the CLI application.
// Fatal errors are printed as a single `<program>: <message>` line.

use std::path::Path;

fn program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "freck".to_string())
}

fn main() {
    if let Err(e) = freck::run() {
        eprintln!("{}: {}", program_name(), e);
        std::process::exit(1);
    }
}
