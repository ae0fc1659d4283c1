/// Structured logging for the bloom forecasting service.
///
/// Provides context-rich logging with module identifiers, timestamps, and
/// severity levels. A `Logger` is built once per run from the logging
/// configuration and passed into the pipeline entry points; there is no
/// process-global logger state. Delivery is handled by pluggable sinks:
/// console, a size-rotated debug file on disk, and an operator notification
/// channel that collects warnings and errors for email delivery at the end
/// of the run. The bloom date evolution file is a separate append-only
/// channel (`EvolutionLog`), not a severity-filtered sink.

use chrono::Local;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Log records and sinks
// ---------------------------------------------------------------------------

/// One log event, as handed to every sink.
pub struct LogRecord<'a> {
    pub level: LogLevel,
    /// Subsystem that emitted the event, e.g. "wind" or "ensemble".
    pub module: &'a str,
    pub message: &'a str,
    /// Local wall-clock time the event was emitted.
    pub timestamp: chrono::NaiveDateTime,
}

/// Delivery mechanism for log records. Sinks decide their own level
/// filtering and formatting.
pub trait LogSink: Send {
    fn write(&mut self, record: &LogRecord<'_>);
    /// Called once at the end of a run, for sinks that batch delivery.
    fn flush(&mut self) {}
}

/// Console sink: `LEVEL:module:message` to stdout, warnings and errors to
/// stderr.
pub struct ConsoleSink {
    min_level: LogLevel,
}

impl ConsoleSink {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl LogSink for ConsoleSink {
    fn write(&mut self, record: &LogRecord<'_>) {
        if record.level < self.min_level {
            return;
        }
        let line = format!("{}:{}:{}", record.level, record.module, record.message);
        match record.level {
            LogLevel::Warning | LogLevel::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

/// Disk sink: full debug detail, one timestamped line per record, with
/// size-based rotation (the previous file is kept as `<path>.1`).
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
}

impl RotatingFileSink {
    pub fn new(path: PathBuf, max_bytes: u64) -> Self {
        Self { path, max_bytes }
    }

    fn rotate_if_needed(&self) {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return;
        };
        if metadata.len() >= self.max_bytes {
            let mut rotated = self.path.clone().into_os_string();
            rotated.push(".1");
            if let Err(e) = std::fs::rename(&self.path, &rotated) {
                eprintln!("Failed to rotate log file {}: {}", self.path.display(), e);
            }
        }
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

impl LogSink for RotatingFileSink {
    fn write(&mut self, record: &LogRecord<'_>) {
        self.rotate_if_needed();
        let entry = format!(
            "{} {} [{}] {}",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.level,
            record.module,
            record.message
        );
        if let Err(e) = self.append(&entry) {
            eprintln!("Failed to write to log file {}: {}", self.path.display(), e);
        }
    }
}

/// Operator notification sink: buffers warnings and errors during the run
/// and hands them to the local `sendmail` as a single message on flush, so
/// data-quality problems are surfaced without anyone tailing logs.
pub struct NotificationSink {
    recipients: Vec<String>,
    from_address: String,
    subject: String,
    buffered: Vec<String>,
}

impl NotificationSink {
    pub fn new(recipients: Vec<String>, from_address: String, subject: String) -> Self {
        Self {
            recipients,
            from_address,
            subject,
            buffered: Vec::new(),
        }
    }

    fn send(&self, body: &str) -> std::io::Result<()> {
        let mut child = Command::new("sendmail")
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(stdin) = child.stdin.as_mut() {
            write!(
                stdin,
                "To: {}\nFrom: {}\nSubject: {}\n\n{}",
                self.recipients.join(", "),
                self.from_address,
                self.subject,
                body
            )?;
        }
        child.wait()?;
        Ok(())
    }
}

impl LogSink for NotificationSink {
    fn write(&mut self, record: &LogRecord<'_>) {
        if record.level < LogLevel::Warning {
            return;
        }
        self.buffered.push(format!(
            "{}:{}:{}",
            record.level, record.module, record.message
        ));
    }

    fn flush(&mut self) {
        if self.buffered.is_empty() || self.recipients.is_empty() {
            return;
        }
        let body = self.buffered.join("\n");
        if let Err(e) = self.send(&body) {
            eprintln!("Failed to send notification email: {}", e);
        }
        self.buffered.clear();
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Run-scoped logger that fans records out to its sinks.
///
/// Methods take `&self`; the sink list sits behind a mutex so the logger can
/// be shared by reference across the pipeline.
pub struct Logger {
    sinks: Mutex<Vec<Box<dyn LogSink>>>,
}

impl Logger {
    pub fn new(sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self {
            sinks: Mutex::new(sinks),
        }
    }

    /// Console-only logger for tests and ad hoc runs.
    pub fn to_console(min_level: LogLevel) -> Self {
        Self::new(vec![Box::new(ConsoleSink::new(min_level))])
    }

    fn log(&self, level: LogLevel, module: &str, message: &str) {
        let record = LogRecord {
            level,
            module,
            message,
            timestamp: Local::now().naive_local(),
        };
        let mut sinks = self.sinks.lock().unwrap();
        for sink in sinks.iter_mut() {
            sink.write(&record);
        }
    }

    pub fn debug(&self, module: &str, message: &str) {
        self.log(LogLevel::Debug, module, message);
    }

    pub fn info(&self, module: &str, message: &str) {
        self.log(LogLevel::Info, module, message);
    }

    pub fn warning(&self, module: &str, message: &str) {
        self.log(LogLevel::Warning, module, message);
    }

    pub fn error(&self, module: &str, message: &str) {
        self.log(LogLevel::Error, module, message);
    }

    /// Flush batching sinks (notification email). Call once per run, after
    /// the pipeline finishes or fails.
    pub fn shutdown(&self) {
        let mut sinks = self.sinks.lock().unwrap();
        for sink in sinks.iter_mut() {
            sink.flush();
        }
    }
}

// ---------------------------------------------------------------------------
// Bloom date evolution log
// ---------------------------------------------------------------------------

/// Append-only, human-readable file of bloom predictions, one line per
/// completed run, keyed by forcing data date. Successive operational runs
/// form a time series of predictions.
pub struct EvolutionLog {
    path: PathBuf,
}

impl EvolutionLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    /// Sink that records everything it is handed, for asserting on log
    /// traffic without touching the console or disk.
    struct CapturingSink {
        records: Arc<StdMutex<Vec<(LogLevel, String, String)>>>,
    }

    impl LogSink for CapturingSink {
        fn write(&mut self, record: &LogRecord<'_>) {
            self.records.lock().unwrap().push((
                record.level,
                record.module.to_string(),
                record.message.to_string(),
            ));
        }
    }

    fn capturing_logger() -> (Logger, Arc<StdMutex<Vec<(LogLevel, String, String)>>>) {
        let records = Arc::new(StdMutex::new(Vec::new()));
        let sink = CapturingSink {
            records: Arc::clone(&records),
        };
        (Logger::new(vec![Box::new(sink)]), records)
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_logger_fans_out_to_sink() {
        let (logger, records) = capturing_logger();
        logger.info("wind", "latest wind obtained");
        logger.warning("meteo", "gap detected");
        let records = records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, LogLevel::Info);
        assert_eq!(records[0].1, "wind");
        assert_eq!(records[1].2, "gap detected");
    }

    #[test]
    fn test_notification_sink_buffers_only_warnings_and_errors() {
        let mut sink = NotificationSink::new(
            vec!["ops@example.com".to_string()],
            "bloomcast@example.com".to_string(),
            "Warning Message from bloomcast".to_string(),
        );
        let now = Local::now().naive_local();
        sink.write(&LogRecord {
            level: LogLevel::Debug,
            module: "wind",
            message: "detail",
            timestamp: now,
        });
        sink.write(&LogRecord {
            level: LogLevel::Info,
            module: "wind",
            message: "progress",
            timestamp: now,
        });
        sink.write(&LogRecord {
            level: LogLevel::Warning,
            module: "wind",
            message: "large gap",
            timestamp: now,
        });
        assert_eq!(sink.buffered.len(), 1, "only the warning should be buffered");
        assert!(sink.buffered[0].contains("large gap"));
    }

    #[test]
    fn test_evolution_log_appends_lines_in_order() {
        let dir = std::env::temp_dir().join("bloomcast_evolution_log_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bloom_date_evolution.log");
        let _ = std::fs::remove_file(&path);
        let log = EvolutionLog::new(&path);
        log.append("  2026-02-10      2026-03-21  4.1354").unwrap();
        log.append("  2026-02-11      2026-03-20  4.2001").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("2026-02-10"));
        assert!(lines[1].contains("2026-02-11"));
        let _ = std::fs::remove_file(&path);
    }
}
