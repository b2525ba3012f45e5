//! Centralized timestamped logging
//!
//! Every shadedit log line is shaped like:
//!     <timestamp> [TAG][thread] message
//!
//! All logs go through `logi!`, `logw!` or `loge!`. stderr is always the primary sink;
//! `init` can add an append-only file sink for audit/debug.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();
static RUN_ID: OnceLock<String> = OnceLock::new();

/// Initialize logging. Call once at startup.
/// - If `log_file` is Some, all log lines are appended to that path.
///
/// Returns the generated run_id.
pub fn init(log_file: Option<PathBuf>) -> String {
    let rid = RUN_ID
        .get_or_init(|| {
            // Short correlation id: time xor pid
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            format!("{:08x}", (now.as_nanos() as u64) ^ (std::process::id() as u64))
        })
        .clone();

    let sink = LOG_FILE.get_or_init(|| Mutex::new(None));

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                if let Ok(mut guard) = sink.lock() {
                    *guard = Some(f);
                }
            }
            Err(e) => {
                // log_line would recurse into the sink we failed to open, so write directly.
                eprintln!(
                    "{} [WARN][{}] failed to open log file sink {}: {e}",
                    log_timestamp(),
                    log_thread_name(),
                    path.display()
                );
            }
        }
    }

    rid
}

/// Current run id (empty if init() wasn't called).
pub fn run_id() -> &'static str {
    RUN_ID.get().map(|s| s.as_str()).unwrap_or("")
}

/// Timestamp used in logs: `YYYY-MM-DD HH:MM:SS.mmm`.
///
/// Local time is used when available; it falls back to UTC.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let Ok(fmt) = time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) else {
        return "<time-format-error>".to_string();
    };
    now.format(&fmt).unwrap_or_else(|_| "<time-format-error>".to_string())
}

/// Best-effort thread name for log prefix.
pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("main").to_string()
}

/// Write one fully formatted line to stderr + optional file sink.
///
/// Public so the exported macros can reach it from other crates.
pub fn log_line(_level: &str, tag: &str, msg: &str) {
    let line = format!("{} [{}][{}] {}", log_timestamp(), tag, log_thread_name(), msg);

    eprintln!("{line}");

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

/// Info log
#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("INFO", $tag, &msg);
    }};
}

/// Warning log
#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("WARN", $tag, &msg);
    }};
}

/// Error log
#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("ERROR", $tag, &msg);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = log_timestamp();
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(ts.len(), 23, "unexpected timestamp shape: {ts}");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn file_sink_receives_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadedit.log");
        let rid = init(Some(path.clone()));
        assert!(!rid.is_empty());
        assert_eq!(run_id(), rid);

        crate::logi!("TEST", "hello {}", 42);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[TEST]"));
        assert!(text.contains("hello 42"));
    }
}
