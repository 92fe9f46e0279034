//! Interactive front-end: wires a line editor and an OS-seeded random source
//! into `rulisp_core::Engine` and drives the REPL until stdin closes.

use std::path::Path;
use std::process::ExitCode;

use rand::Rng;
use rulisp_core::traits::RandomSource;
use rulisp_core::{Engine, LineSource};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_appender::non_blocking::WorkerGuard;

/// Cells per semispace. The reference interpreter sizes its arena at
/// process start and never grows it; we do the same.
const HEAP_CAPACITY: usize = 1 << 16;

/// Reads lines from an interactive `rustyline` editor. Ctrl-D (EOF) and
/// Ctrl-C both end the session cleanly, matching a typical REPL's behavior.
struct RustylineSource {
    editor: DefaultEditor,
}

impl LineSource for RustylineSource {
    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        match self.editor.readline("") {
            Ok(line) => {
                let _ = self.editor.add_history_entry(line.as_str());
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
            Err(err) => Err(std::io::Error::new(std::io::ErrorKind::Other, err)),
        }
    }
}

/// OS-entropy-seeded `RandomSource`, per the reference's `random` primitive
/// drawing from the platform RNG rather than a fixed seed.
struct OsRandom;

impl RandomSource for OsRandom {
    fn bounded(&mut self, n: i64) -> i64 {
        rand::thread_rng().gen_range(0..n)
    }
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let file_appender = tracing_appender::rolling::never(log_dir, "rulisp.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = tracing_subscriber::EnvFilter::try_from_env("RULISP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn main() -> ExitCode {
    let _log_guard = configure_logging();
    tracing::info!("starting rulisp");

    let editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("error: could not start line editor: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut lines = RustylineSource { editor };

    let mut engine = match Engine::new(HEAP_CAPACITY, OsRandom, std::io::stdout()) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("error: could not initialize engine: {err}");
            return ExitCode::FAILURE;
        }
    };

    match engine.run(&mut lines) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
