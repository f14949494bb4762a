use clap::{Parser, Subcommand};
use events::{EventBus, Lifecycle};
use log::*;
use notifications::{NotificationStore, NOTIFICATION_RECEIVED};
use realtime::message::STATUS_CONNECTED;
use realtime::transport::sse::SseTransport;
use realtime::{BackoffConfig, ConnectionConfig, Manager};
use refresh::{Coordinator, Trigger};
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Commands accepted on stdin while running.
#[derive(Debug, Parser)]
#[command(multicall = true)]
struct Console {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Report the app as backgrounded
    Background,
    /// Report the app as foregrounded
    Foreground,
    /// Print connection and notification status
    Status,
    /// Disconnect and exit
    Quit,
}

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting ride_realtime [{}] against {}",
        config.runtime_env(),
        config.realtime_url()
    );

    let bus = EventBus::new();
    let lifecycle = Lifecycle::default();

    let store = NotificationStore::new();
    let _store_subscriptions = store.attach(&bus);

    let mut transport = SseTransport::new(config.realtime_url());
    if let Some(token) = config.auth_token() {
        transport = transport.with_auth_token(token);
    }
    let manager = Manager::new(
        transport,
        bus.clone(),
        Arc::new(lifecycle.clone()),
        connection_config(&config),
    );

    let coordinator = Coordinator::new(bus.clone(), Arc::new(lifecycle.clone()));
    let mut triggers = vec![
        Trigger::AppForegrounded,
        Trigger::topic(STATUS_CONNECTED),
        Trigger::topic(NOTIFICATION_RECEIVED),
    ];
    if let Some(period) = config.refresh_interval() {
        triggers.push(Trigger::Interval(period));
    }
    let summary_store = store.clone();
    let _refresh = match coordinator.register(
        move || {
            let store = summary_store.clone();
            async move {
                info!(
                    "Notifications: {} total, {} unread",
                    store.len(),
                    store.unread_count()
                );
                Ok::<(), refresh::Error>(())
            }
        },
        triggers,
    ) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to register refresh: {e}");
            std::process::exit(1);
        }
    };

    manager.initialize();
    run_console(&manager, &lifecycle, &store).await;
    manager.disconnect();

    info!("Shut down");
}

fn connection_config(config: &Config) -> ConnectionConfig {
    ConnectionConfig {
        connect_timeout: config.connect_timeout(),
        backoff: BackoffConfig {
            initial_delay: config.reconnect_initial_delay(),
            max_delay: config.reconnect_max_delay(),
            multiplier: config.reconnect_multiplier,
        },
    }
}

/// Drive the app lifecycle from stdin until `quit`, end of input or Ctrl-C.
async fn run_console(
    manager: &Manager<SseTransport>,
    lifecycle: &Lifecycle,
    store: &NotificationStore,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                return;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Console input closed");
                        return;
                    }
                    Err(e) => {
                        error!("Failed to read console input: {e}");
                        return;
                    }
                };

                let words: Vec<&str> = line.split_whitespace().collect();
                if words.is_empty() {
                    continue;
                }
                match Console::try_parse_from(words) {
                    Ok(Console { command: Command::Background }) => lifecycle.set_background(),
                    Ok(Console { command: Command::Foreground }) => lifecycle.set_active(),
                    Ok(Console { command: Command::Status }) => {
                        let state = manager.state();
                        info!(
                            "Connection {} (session {}), notifications: {} total, {} unread",
                            state.status(),
                            state.session_id().unwrap_or("-"),
                            store.len(),
                            store.unread_count()
                        );
                        if let Some(last_error) = state.last_error() {
                            warn!("Last connection error: {last_error}");
                        }
                    }
                    Ok(Console { command: Command::Quit }) => return,
                    Err(e) => warn!("{e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<Command> {
        Console::try_parse_from(line.split_whitespace())
            .ok()
            .map(|console| console.command)
    }

    #[test]
    fn test_console_commands() {
        assert_eq!(parse("background"), Some(Command::Background));
        assert_eq!(parse("foreground"), Some(Command::Foreground));
        assert_eq!(parse("status"), Some(Command::Status));
        assert_eq!(parse("quit"), Some(Command::Quit));
    }

    #[test]
    fn test_unknown_console_command_is_rejected() {
        assert_eq!(parse("reboot"), None);
        assert_eq!(parse("status now"), None, "extra arguments are rejected");
    }
}
