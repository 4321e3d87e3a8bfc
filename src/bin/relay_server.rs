use std::sync::Arc;
use std::{env, process};

use noterelay::config::{Config, ServerSettings};
use noterelay::log::{LogSink, Logger};
use noterelay::relay::run::run_relay_server_with_log;

const DEFAULT_PROPERTIES: &str = "server.properties";

fn main() -> std::io::Result<()> {
    // --- Parse CLI args ----------------------------------------------------
    //
    //   relay_server                     -> reads ./server.properties
    //   relay_server path/to/file        -> reads that file
    let args: Vec<String> = env::args().collect();
    let path = match args.len() {
        1 => DEFAULT_PROPERTIES.to_owned(),
        2 => args[1].clone(),
        _ => {
            eprintln!("Usage: {} [PROPERTIES_FILE]", args[0]);
            process::exit(1);
        }
    };

    // --- Load configuration ------------------------------------------------
    let config = Config::load(&path).unwrap_or_else(|e| {
        eprintln!("[relay_server] {e}; using defaults");
        Config::empty()
    });
    let settings = match ServerSettings::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[relay_server] {e}");
            process::exit(1);
        }
    };

    // --- Start process logger ----------------------------------------------
    let logger = Logger::start_server(&config);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    eprintln!(
        "[relay_server] listening on {} (log: {})",
        settings.bind_addr(),
        logger.file_path().display()
    );

    // --- Run relay (blocks until SIGINT/SIGTERM or SHUTDOWN_ALL) -----------
    run_relay_server_with_log(&settings, log_sink)?;
    eprintln!("[relay_server] stopped");
    Ok(())
}
