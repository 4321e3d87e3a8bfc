use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::ServerSettings;
use crate::log::log_sink::LogSink;
use crate::relay::relay_server::RelayServer;
use crate::sink_warn;

/// Time given to writer threads to push the final BYE frames out before the
/// process is allowed to exit.
pub const EXIT_GRACE: Duration = Duration::from_millis(200);

/// Run the relay on the configured address until SIGINT, SIGTERM or a
/// SHUTDOWN_ALL from a participant.
pub fn run_relay_server_with_log(settings: &ServerSettings, log: Arc<dyn LogSink>) -> io::Result<()> {
    let server = RelayServer::bind(settings.bind_addr(), Arc::clone(&log))?;

    if let Err(e) = server.shutdown_signal().register_os_signals() {
        sink_warn!(log, "signal handlers not installed: {}", e);
    }

    server.run()?;
    thread::sleep(EXIT_GRACE);
    Ok(())
}
