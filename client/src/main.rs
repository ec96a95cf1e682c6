use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tether::{display, initiator, input, Config};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("tether: {0}")]
    Tether(#[from] tether::Error),
    #[error("display: {0}")]
    Display(#[from] tokio::task::JoinError),
}

/// Chats with a tether server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address of the server
    server_ip: IpAddr,

    /// Port the server listens on
    #[arg(short, long, env = "TETHER_PORT", default_value_t = tether::PORT)]
    port: u16,

    /// Bytes per chunk on the wire, must match the server
    #[arg(long, env = "TETHER_CHUNK_SIZE", default_value_t = tether::CHUNK_SIZE)]
    chunk_size: usize,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            port: self.port,
            chunk_size: self.chunk_size,
            ..Config::default()
        }
    }
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    const LOG_ENV: &str = "RUST_LOG";
    use std::str::FromStr;
    use tracing::Level;

    let level = match std::env::var(LOG_ENV) {
        Ok(env) => Level::from_str(env.to_uppercase().as_str())
            .map_err(|err| format!("invalid `{}` environment variable {}", LOG_ENV, err))?,
        Err(_) => Level::INFO,
    };

    let log_file_path = xdg::BaseDirectories::with_prefix("tether")?
        .place_cache_file("client.log")?;
    let log_file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_file_path)?;

    tracing_subscriber::fmt()
        .with_writer(move || -> Box<dyn std::io::Write> {
            match log_file.try_clone() {
                Ok(file) => Box::new(file),
                Err(_) => Box::new(std::io::sink()),
            }
        })
        .with_ansi(false)
        .with_max_level(level)
        .init();
    Ok(())
}

async fn run(address: SocketAddr, config: Config) -> Result<(), Error> {
    let (events, rx) = mpsc::unbounded_channel();
    let display = tokio::spawn(display::print_events(rx));
    let exit = initiator::connect(address, config, input::stdin_lines(), events).await?;
    tracing::info!(exit, "Session finished");
    display.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let args = Args::parse();
    let address = SocketAddr::new(args.server_ip, args.port);
    if let Err(err) = run(address, args.config()).await {
        eprintln!("{}", report(&err));
        return Err(err.into());
    }
    Ok(())
}

/// Only transport failures mean the server could not be reached.
fn report(err: &Error) -> String {
    match err {
        Error::Tether(tether::Error::IO(err)) => format!("Failed to connect to server: {}", err),
        err => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn report_connection_failure() {
        let err = Error::Tether(tether::Error::IO(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));
        assert_eq!(report(&err), "Failed to connect to server: connection refused");
    }

    #[test]
    fn report_invalid_config() {
        let err = Error::Tether(tether::Error::Config(tether::config::Error::ZeroChunkSize));
        let message = report(&err);
        assert!(!message.starts_with("Failed to connect"));
        assert!(message.contains("chunk size must be greater than zero"));
    }
}
