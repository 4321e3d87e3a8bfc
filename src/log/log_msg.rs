use std::time::SystemTime;

use crate::log::log_level::LogLevel;

/// One queued log line, as handed from a producer thread to the logger worker.
#[derive(Debug, Clone)]
pub struct LogMsg {
    /// Severity of the line.
    pub level: LogLevel,
    /// Wall-clock time of the call, in milliseconds since the UNIX epoch.
    pub ts_ms: u128,
    /// Already formatted message text.
    pub text: String,
    /// Origin of the line, normally `module_path!()` of the caller.
    pub target: &'static str,
}

impl LogMsg {
    /// Builds a message stamped with the current time.
    ///
    /// ```rust,ignore
    /// let msg = LogMsg::new(LogLevel::Info, "alice joined", module_path!());
    /// ```
    pub fn new(level: LogLevel, text: impl Into<String>, target: &'static str) -> Self {
        Self {
            level,
            ts_ms: now_millis(),
            text: text.into(),
            target,
        }
    }

    /// Renders the line exactly as the worker writes it to the log file.
    pub fn render(&self) -> String {
        format!("[{}] {} {} | {}", self.level, self.ts_ms, self.target, self.text)
    }
}

/// Milliseconds since the UNIX epoch; zero if the clock is before 1970.
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
