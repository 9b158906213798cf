//! Process-wide logging.
//!
//! `log` records from this crate and its dependencies are bridged into a
//! single `tracing-subscriber` registry, alongside the `tracing` spans of the
//! orchestrator and the HTTP layer. Formatted output goes to the log file
//! and/or stderr, both chosen at runtime.

use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::{LazyLock, OnceLock};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// HTTP client and runtime crates stay at `warn`
const DEFAULT_FILTER: &str = "lessonsmith=debug,tower_http=info,warn";
const VERBOSE_FILTER: &str =
    "lessonsmith=debug,tower_http=debug,reqwest=debug,hyper=debug,hyper_util=debug,h2=info,info";

/// Sink settings read by every write
struct LogState {
    enabled: bool,
    verbose: bool,
    to_console: bool,
    json: bool,
    file: Option<std::fs::File>,
}

static STATE: LazyLock<Mutex<LogState>> = LazyLock::new(|| {
    Mutex::new(LogState {
        enabled: false,
        verbose: false,
        to_console: false,
        json: false,
        file: None,
    })
});

/// Writer for formatted events: log file and/or stderr
#[derive(Clone)]
struct SinkWriter;

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = STATE.lock();
        if !state.enabled {
            return Ok(buf.len());
        }
        if let Some(file) = state.file.as_mut() {
            let _ = file.write_all(buf);
            let _ = file.flush();
        }
        if state.to_console {
            let _ = io::stderr().write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = STATE.lock().file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

impl<'a> fmt::MakeWriter<'a> for SinkWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter
    }
}

fn filter_directives(verbose: bool) -> &'static str {
    if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }
}

/// `RUST_LOG` wins over the built-in directives.
fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(verbose)))
}

/// Install the subscriber and the `log` bridge. Later calls return the
/// outcome of the first.
///
/// Verbosity and output format are fixed here; call the `set_*` functions
/// first. The file and console sinks can change at any time.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    static INSTALLED: OnceLock<Result<(), String>> = OnceLock::new();
    INSTALLED.get_or_init(install).clone().map_err(Into::into)
}

fn install() -> Result<(), String> {
    let (verbose, json) = {
        let mut state = STATE.lock();
        state.enabled = true;
        (state.verbose, state.json)
    };

    let json_layer = json.then(|| {
        fmt::Layer::new()
            .json()
            .with_timer(fmt::time::ChronoUtc::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(SinkWriter)
    });
    let text_layer = (!json).then(|| {
        fmt::Layer::new()
            .with_target(true)
            .with_ansi(false)
            .with_timer(fmt::time::ChronoUtc::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(SinkWriter)
    });

    Registry::default()
        .with(build_filter(verbose))
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {e}"))
}

pub fn enable_logging() {
    STATE.lock().enabled = true;
}

pub fn disable_logging() {
    STATE.lock().enabled = false;
}

/// Let through debug output from HTTP and runtime crates. Read by [`init`].
pub fn set_verbose_logging(enabled: bool) {
    STATE.lock().verbose = enabled;
}

pub fn set_log_file(file_path: &str) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;
    STATE.lock().file = Some(file);
    Ok(())
}

pub fn set_log_to_console(enabled: bool) {
    STATE.lock().to_console = enabled;
}

pub fn set_json_format(enabled: bool) {
    STATE.lock().json = enabled;
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}
