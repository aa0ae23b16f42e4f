//! Load progress reporting.
//!
//! Large criticality-score exports take a while to load, so `bomfactory load`
//! reports how far it has got. Progress goes to **stderr** so stdout stays
//! parseable for scripts.

use std::io::Write;

/// A single progress event for a load.
#[derive(Clone, Debug)]
pub enum LoadProgressEvent {
    /// Header validated; rows are about to be read.
    Started { source: String },
    /// `n` rows have been written so far.
    Loading { source: String, n: u64 },
    /// Load completed with `n` rows written.
    Finished { source: String, n: u64 },
}

/// Reports load progress. Implementations write to stderr (human or JSON).
pub trait LoadProgressReporter: Send + Sync {
    fn report(&self, event: LoadProgressEvent);
}

/// Human-friendly progress on stderr: "load data.csv  12,000 rows".
pub struct StderrProgress;

impl LoadProgressReporter for StderrProgress {
    fn report(&self, event: LoadProgressEvent) {
        let line = match &event {
            LoadProgressEvent::Started { source } => format!("load {}  reading...\n", source),
            LoadProgressEvent::Loading { source, n } => {
                format!("load {}  {} rows\n", source, format_number(*n))
            }
            LoadProgressEvent::Finished { source, n } => {
                format!("load {}  done, {} rows\n", source, format_number(*n))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl LoadProgressReporter for JsonProgress {
    fn report(&self, event: LoadProgressEvent) {
        let obj = match &event {
            LoadProgressEvent::Started { source } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "started"
            }),
            LoadProgressEvent::Loading { source, n } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "loading",
                "n": n
            }),
            LoadProgressEvent::Finished { source, n } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "finished",
                "n": n
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl LoadProgressReporter for NoProgress {
    fn report(&self, _event: LoadProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn LoadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
