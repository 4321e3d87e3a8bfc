use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::{env, process, thread};

use noterelay::config::{ClientSettings, Config};
use noterelay::log::{LogSink, Logger};
use noterelay::relay_client::{ClientCommand, ClientEvent, RelayClient, RelayClientError};

const DEFAULT_PROPERTIES: &str = "client.properties";

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = match args.len() {
        1 => DEFAULT_PROPERTIES.to_owned(),
        2 => args[1].clone(),
        _ => {
            eprintln!("Usage: {} [PROPERTIES_FILE]", args[0]);
            process::exit(1);
        }
    };

    let config = Config::load(&path).unwrap_or_else(|e| {
        eprintln!("[relay_client] {e}; using defaults");
        Config::empty()
    });
    let settings = match ClientSettings::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[relay_client] {e}");
            process::exit(1);
        }
    };

    let logger = Logger::start_client(&config);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    let (mut client, events) = RelayClient::new(settings.display_name.clone(), log_sink);
    thread::spawn(move || print_events(&events));

    println!(
        "{}: type JOIN [<ip> <port>], LEAVE, SHUTDOWN, SHUTDOWN ALL, or a note",
        settings.display_name
    );

    for line in io::stdin().lock().lines() {
        let line = line?;
        let outcome = match ClientCommand::parse(&line) {
            ClientCommand::Empty => Ok(()),
            ClientCommand::Invalid(why) => {
                eprintln!("{why}");
                Ok(())
            }
            ClientCommand::Join { target } => {
                let addr = match target {
                    Some((host, port)) => format!("{host}:{port}"),
                    None => settings.server_addr(),
                };
                client.join(addr.as_str())
            }
            ClientCommand::Note(text) => client.note(&text),
            ClientCommand::Leave => client.leave(),
            ClientCommand::ShutdownAll => client.shutdown_all(),
            ClientCommand::Shutdown => {
                match client.shutdown() {
                    Ok(()) | Err(RelayClientError::NotConnected) => {}
                    Err(e) => eprintln!("{e}"),
                }
                break;
            }
        };
        if let Err(e) = outcome {
            eprintln!("{e}");
        }
    }
    Ok(())
}

fn print_events(events: &Receiver<ClientEvent>) {
    while let Ok(event) = events.recv() {
        match event {
            ClientEvent::Notice(line) | ClientEvent::Bye(line) => println!("{line}"),
            ClientEvent::Closed => println!("[info] disconnected"),
        }
    }
}
