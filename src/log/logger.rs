use crate::{
    config::Config,
    log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle},
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, TrySendError},
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

/// Flush every line when debugging so a crash leaves the tail on disk.
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 1;

/// Otherwise batch flushes.
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 64;

/// Default capacity of the producer queue.
pub const DEFAULT_QUEUE_CAP: usize = 1024;

/// Bounded, non-blocking logger writing to a per-process file.
///
/// Producers (connection threads) enqueue through a [`LoggerHandle`]; one
/// worker thread drains the queue into the file and mirrors lines at or above
/// `echo_level` to stderr, so an operator running the server in a terminal
/// still sees warnings.
pub struct Logger {
    handle: LoggerHandle,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Starts the server logger using the `[Logging]` section of `config`.
    #[must_use]
    pub fn start_server(config: &Config) -> Self {
        Self::start(config, "server_log_path", "server_log_filename", "relay_server")
    }

    /// Starts the client logger using the `[Logging]` section of `config`.
    #[must_use]
    pub fn start_client(config: &Config) -> Self {
        Self::start(config, "client_log_path", "client_log_filename", "relay_client")
    }

    fn start(config: &Config, path_key: &str, name_key: &str, fallback_name: &str) -> Self {
        let app_name = config.get_non_empty_or_default("Logging", name_key, fallback_name);
        let echo_level = config
            .get_non_empty("Logging", "echo_level")
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Warn);

        let dir = match config.get_non_empty("Logging", path_key) {
            Some(dir) => expand_home(dir),
            None => exe_dir_fallback_cwd().join("logs"),
        };
        Self::start_in_dir(dir, Some(app_name), DEFAULT_QUEUE_CAP, echo_level)
    }

    /// Starts the logger in `logs/` next to the executable.
    #[must_use]
    pub fn start_default(app_name: Option<&str>, cap: usize, echo_level: LogLevel) -> Self {
        Self::start_in_dir(
            exe_dir_fallback_cwd().join("logs"),
            app_name,
            cap,
            echo_level,
        )
    }

    /// Starts the logger writing to a fresh file inside `dir`.
    ///
    /// The file name is `<app_name>-<unix secs>-pid<pid>.log`. The directory is
    /// created when missing. If the file cannot be opened the worker falls back
    /// to a file in the temp dir, then to discarding output; it never panics.
    pub fn start_in_dir<D: AsRef<Path>>(
        dir: D,
        app_name: Option<&str>,
        cap: usize,
        echo_level: LogLevel,
    ) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let pid = std::process::id();
        let fname = match app_name {
            Some(name) => format!("{name}-{secs}-pid{pid}.log"),
            None => format!("{secs}-pid{pid}.log"),
        };
        let file_path = dir.join(fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let worker_path = file_path.clone();

        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || {
                let mut out = BufWriter::new(open_log_target(&worker_path));
                let mut unflushed: u32 = 0;

                while let Ok(m) = rx.recv() {
                    let line = m.render();
                    let _ = writeln!(out, "{line}");
                    if m.level >= echo_level {
                        eprintln!("{line}");
                    }

                    unflushed += 1;
                    if unflushed >= FLUSH_BATCH_SIZE {
                        let _ = out.flush();
                        unflushed = 0;
                    }
                }

                let _ = out.flush();
            })
            .ok();

        Self {
            handle: LoggerHandle { tx },
            _thread,
            file_path,
        }
    }

    /// Enqueues one line without blocking; see [`LoggerHandle::try_log`].
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    /// A cloneable handle to pass to other threads.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// Path of the active log file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn open_log_target(path: &Path) -> Box<dyn Write + Send> {
    let open = |p: &Path| OpenOptions::new().create(true).append(true).open(p);
    if let Ok(f) = open(path) {
        return Box::new(f);
    }
    match open(&std::env::temp_dir().join("noterelay-fallback.log")) {
        Ok(f) => Box::new(f),
        Err(_) => Box::new(io::sink()),
    }
}

fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Expands a leading `~` to `$HOME` (or `%USERPROFILE%`).
fn expand_home(path: &str) -> PathBuf {
    let Some(rest) = path.strip_prefix('~') else {
        return PathBuf::from(path);
    };
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match home {
        Some(home) => {
            let rest = rest.trim_start_matches(['/', '\\']);
            if rest.is_empty() {
                PathBuf::from(home)
            } else {
                PathBuf::from(home).join(rest)
            }
        }
        None => PathBuf::from(path),
    }
}
