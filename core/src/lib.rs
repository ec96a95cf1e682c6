pub mod config;
pub mod display;
pub mod frame;
pub mod initiator;
pub mod input;
pub mod latency;
pub mod listener;
pub mod session;

pub use config::{Config, Markers};
pub use listener::Listener;
pub use session::{ConnectionState, Event, Role, Session};

pub const PORT: u16 = 8888;
pub const CHUNK_SIZE: usize = 16;

/// Line that ends the session instead of being sent.
pub const EXIT_COMMAND: &str = "/exit";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    IO(#[from] std::io::Error),
    #[error("task: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("config: {0}")]
    Config(#[from] config::Error),
}
