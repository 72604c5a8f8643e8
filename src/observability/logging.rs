//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Attach per-instance log files after the subscriber is running
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Log level from `RUST_LOG`, falling back to `info` (or `debug` with `--debug`)
//! - File output is plain text without ANSI escapes

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log files every formatted event is copied to.
#[derive(Clone, Default)]
pub struct FileSinks {
    files: Arc<Mutex<Vec<File>>>,
}

impl FileSinks {
    pub fn attach(&self, file: File) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(file);
    }
}

pub struct FileSinksWriter {
    files: Arc<Mutex<Vec<File>>>,
}

impl Write for FileSinksWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        for file in files.iter_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        for file in files.iter_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for FileSinks {
    type Writer = FileSinksWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FileSinksWriter {
            files: self.files.clone(),
        }
    }
}

fn file_sinks() -> &'static FileSinks {
    static SINKS: OnceLock<FileSinks> = OnceLock::new();
    SINKS.get_or_init(FileSinks::default)
}

/// Open (create + append) a log file.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Open `path` and copy all subsequent log output into it.
pub fn attach_log_file(path: &Path) -> io::Result<()> {
    let file = open_log_file(path)?;
    file_sinks().attach(file);
    Ok(())
}

/// Install the global subscriber. Call once, before any instance starts.
pub fn init(debug: bool) {
    let default_filter = if debug {
        "bucketing_proxy=debug,tower_http=debug"
    } else {
        "bucketing_proxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_sinks().clone()),
        )
        .init();
}
