use clap::Parser;
use tether::{display, input, Config, Listener};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("tether: {0}")]
    Tether(#[from] tether::Error),
    #[error("display: {0}")]
    Display(#[from] tokio::task::JoinError),
}

/// Waits for one chat client at a time.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TETHER_PORT", default_value_t = tether::PORT)]
    port: u16,

    /// Bytes per chunk on the wire, must match the client
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
    use tracing_subscriber::EnvFilter;

    let filter = match std::env::var(LOG_ENV) {
        Ok(env) => EnvFilter::from_str(env.as_str())
            .map_err(|err| format!("invalid `{}` environment variable {}", LOG_ENV, err))?,
        Err(_) => EnvFilter::default().add_directive(Level::INFO.into()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(config: Config) -> Result<(), Error> {
    let (events, rx) = mpsc::unbounded_channel();
    let display = tokio::spawn(display::print_events(rx));
    let listener = Listener::bind(config).await?;
    tracing::info!("Starting server");
    listener.serve(input::stdin_lines(), events).await?;
    display.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let args = Args::parse();
    run(args.config()).await?;
    Ok(())
}
