use crate::{
    config::Config,
    frame::{Decoder, Framer, Inbound, Marker, Outbound},
    latency::RoundTrip,
    Error, EXIT_COMMAND,
};
use bytes::{Bytes, BytesMut};
use std::{
    fmt, io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tracing::Instrument;

/// Outgoing text lines, one message each.
pub type Lines = mpsc::Receiver<String>;
pub type Events = mpsc::UnboundedSender<Event>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Listener,
    Initiator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Listener => f.write_str("listener"),
            Role::Initiator => f.write_str("initiator"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        *self == ConnectionState::Disconnected
    }
}

/// Everything a session or outer loop reports to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Listening { port: u16 },
    WaitingForConnection,
    Connected { role: Role, peer: SocketAddr },
    Ready,
    MessageStart,
    Payload(Bytes),
    MessageEnd,
    RoundTrip(Duration),
    PeerDisconnected(Role),
    Closing,
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error("failed to send {0:?} marker: {1}")]
    Marker(Marker, #[source] io::Error),
    #[error("failed to send payload at offset {offset}: {source}")]
    Payload { offset: usize, source: io::Error },
}

#[derive(Debug)]
struct Shared {
    role: Role,
    state: watch::Sender<ConnectionState>,
    exit: AtomicBool,
    round_trip: RoundTrip,
}

impl Shared {
    /// Moves to `Disconnected`. Returns true if this ended a live session.
    fn disconnect(&self) -> bool {
        self.state.send_replace(ConnectionState::Disconnected) == ConnectionState::Connected
    }
}

/// One connected stream driven by a sender task and a receiver task.
pub struct Session {
    shared: Arc<Shared>,
    sender: JoinHandle<Lines>,
    receiver: JoinHandle<()>,
}

impl Session {
    /// Takes over `stream` and starts both tasks. Must be called from within
    /// a tokio runtime.
    pub fn new<S>(
        stream: S,
        role: Role,
        config: Config,
        lines: Lines,
        events: Events,
    ) -> Result<Self, Error>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;
        let (state, _) = watch::channel(ConnectionState::Connected);
        let shared = Arc::new(Shared {
            role,
            state,
            exit: AtomicBool::new(false),
            round_trip: RoundTrip::default(),
        });
        let _ = events.send(Event::Ready);

        let (reader, writer) = tokio::io::split(stream);
        let writer = Arc::new(Mutex::new(writer));
        let receiver = tokio::spawn(
            receive(reader, writer.clone(), shared.clone(), config, events.clone())
                .instrument(tracing::info_span!("receiver", %role)),
        );
        let sender = tokio::spawn(
            send(lines, writer, shared.clone(), config, events)
                .instrument(tracing::info_span!("sender", %role)),
        );
        tracing::info!(%role, "Session started");

        Ok(Self {
            shared,
            sender,
            receiver,
        })
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn user_requested_exit(&self) -> bool {
        self.shared.exit.load(Ordering::SeqCst)
    }

    pub async fn poll_until_disconnected(&self, interval: Duration) {
        while self.is_connected() {
            tokio::time::sleep(interval).await;
        }
    }

    /// Waits for both tasks and hands back the line source. Blocks until the
    /// session is disconnected.
    pub async fn join(self) -> Result<Lines, Error> {
        let (lines, received) = tokio::join!(self.sender, self.receiver);
        received?;
        Ok(lines?)
    }
}

async fn disconnected(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state.wait_for(ConnectionState::is_disconnected).await;
}

async fn write_unit<W>(writer: &Mutex<W>, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer.lock().await;
    writer.write_all(bytes).await?;
    writer.flush().await
}

async fn send<W>(
    mut lines: Lines,
    writer: Arc<Mutex<W>>,
    shared: Arc<Shared>,
    config: Config,
    events: Events,
) -> Lines
where
    W: AsyncWrite + Unpin + Send,
{
    let framer = Framer::new(&config);
    let mut state = shared.state.subscribe();
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = disconnected(&mut state) => {
                tracing::debug!("connection closed, stopping");
                return lines;
            }
        };
        let line = match line {
            Some(line) if line != EXIT_COMMAND => line,
            _ => {
                close(&*writer, &shared, &events).await;
                return lines;
            }
        };
        if framer.is_ambiguous(line.as_bytes()) {
            tracing::warn!("message contains a marker code and will be misread by the peer");
        }
        match send_message(&framer, &*writer, &shared.round_trip, line.as_bytes()).await {
            Ok(()) => tracing::debug!(bytes = line.len(), "Sent message"),
            Err(err) => tracing::warn!("{}", err),
        }
    }
}

async fn send_message<W>(
    framer: &Framer,
    writer: &Mutex<W>,
    round_trip: &RoundTrip,
    text: &[u8],
) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    round_trip.start();
    let mut offset = 0;
    for unit in framer.frame(text) {
        match unit {
            Outbound::Marker(marker) => write_unit(writer, &framer.slot(marker))
                .await
                .map_err(|err| SendError::Marker(marker, err))?,
            Outbound::Chunk(chunk) => {
                write_unit(writer, chunk)
                    .await
                    .map_err(|source| SendError::Payload { offset, source })?;
                offset += chunk.len();
            }
        }
    }
    Ok(())
}

async fn close<W>(writer: &Mutex<W>, shared: &Shared, events: &Events)
where
    W: AsyncWrite + Unpin,
{
    tracing::info!("Closing connection");
    let _ = events.send(Event::Closing);
    shared.exit.store(true, Ordering::SeqCst);
    if let Err(err) = writer.lock().await.shutdown().await {
        tracing::debug!("shutdown failed: {}", err);
    }
    shared.disconnect();
}

async fn receive<R, W>(
    mut reader: R,
    writer: Arc<Mutex<W>>,
    shared: Arc<Shared>,
    config: Config,
    events: Events,
) where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let framer = Framer::new(&config);
    let decoder = Decoder::new(&config);
    let mut state = shared.state.subscribe();
    let mut chunk = vec![0; config.chunk_size];
    let mut buf = BytesMut::with_capacity(config.chunk_size * 2);
    loop {
        let read = tokio::select! {
            read = reader.read(&mut chunk) => read,
            _ = disconnected(&mut state) => {
                tracing::debug!("connection closed, stopping");
                return;
            }
        };
        match read {
            Ok(0) => {
                if shared.disconnect() {
                    tracing::info!("Peer disconnected");
                    let _ = events.send(Event::PeerDisconnected(shared.role));
                }
                if !buf.is_empty() {
                    tracing::debug!(bytes = buf.len(), "discarding incomplete unit");
                }
                return;
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(err) => {
                tracing::warn!("failed to read from stream: {}", err);
                shared.disconnect();
                return;
            }
        }

        while let Some(unit) = decoder.decode(&mut buf) {
            match unit {
                Inbound::Marker(Marker::Start) => {
                    let _ = events.send(Event::MessageStart);
                }
                Inbound::Marker(Marker::End) => {
                    let _ = events.send(Event::MessageEnd);
                    if let Err(err) = write_unit(&*writer, &framer.slot(Marker::Ack)).await {
                        tracing::warn!("failed to send acknowledgement: {}", err);
                    }
                }
                Inbound::Marker(Marker::Ack) => match shared.round_trip.finish() {
                    Some(elapsed) => {
                        tracing::debug!(?elapsed, "Received acknowledgement");
                        let _ = events.send(Event::RoundTrip(elapsed));
                    }
                    None => tracing::debug!("ignoring acknowledgement with no message pending"),
                },
                Inbound::Payload(bytes) => {
                    let _ = events.send(Event::Payload(bytes));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_state() {
        assert!(!ConnectionState::Connected.is_disconnected());
        assert!(ConnectionState::Disconnected.is_disconnected());
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Listener.to_string(), "listener");
        assert_eq!(Role::Initiator.to_string(), "initiator");
    }

    #[tokio::test]
    async fn invalid_config() {
        let (stream, _peer) = tokio::io::duplex(64);
        let (_tx, lines) = mpsc::channel(1);
        let (events, _rx) = mpsc::unbounded_channel();
        let config = Config {
            chunk_size: 0,
            ..Config::default()
        };
        let result = Session::new(stream, Role::Initiator, config, lines, events);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
