use crate::session::{Event, Role};
use std::{fmt, io::Write};
use tokio::sync::mpsc;

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Listening { port } => write!(f, "Server is listening on port {}...", port),
            Event::WaitingForConnection => f.write_str("Waiting for connections"),
            Event::Connected { role, .. } => {
                let peer = match role {
                    Role::Listener => "client",
                    Role::Initiator => "server",
                };
                write!(
                    f,
                    "Connected to {}, start chatting!\nType {} to close the app",
                    peer,
                    crate::EXIT_COMMAND
                )
            }
            Event::Ready => f.write_str("Ready to send and receive messages"),
            Event::MessageStart => f.write_str("--start of message--"),
            Event::Payload(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Event::MessageEnd => f.write_str("\n--end of message--"),
            Event::RoundTrip(elapsed) => {
                write!(f, "Roundtrip time: {} microseconds", elapsed.as_micros())
            }
            Event::PeerDisconnected(Role::Listener) => f.write_str(
                "Client disconnected. Please wait for a new client, or type /exit to end this session.",
            ),
            Event::PeerDisconnected(Role::Initiator) => f.write_str("Server disconnected."),
            Event::Closing => f.write_str("Closing connection..."),
        }
    }
}

/// Writes events to stdout until every sender is gone.
pub async fn print_events(mut rx: mpsc::UnboundedReceiver<Event>) {
    let mut term = console::Term::stdout();
    while let Some(event) = rx.recv().await {
        let result = match &event {
            Event::Payload(bytes) => term.write_all(bytes).and_then(|_| term.flush()),
            event => term.write_line(&event.to_string()),
        };
        if let Err(err) = result {
            tracing::warn!("failed to write to terminal: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    #[test]
    fn message_notices() {
        assert_eq!(Event::MessageStart.to_string(), "--start of message--");
        assert_eq!(Event::MessageEnd.to_string(), "\n--end of message--");
        assert_eq!(Event::Payload(Bytes::from_static(b"hi")).to_string(), "hi");
    }

    #[test]
    fn round_trip() {
        let event = Event::RoundTrip(Duration::from_micros(1234));
        assert_eq!(event.to_string(), "Roundtrip time: 1234 microseconds");
    }

    #[test]
    fn disconnect_depends_on_role() {
        assert!(Event::PeerDisconnected(Role::Listener)
            .to_string()
            .starts_with("Client disconnected."));
        assert_eq!(
            Event::PeerDisconnected(Role::Initiator).to_string(),
            "Server disconnected."
        );
    }

    #[test]
    fn connected() {
        let event = Event::Connected {
            role: Role::Initiator,
            peer: "127.0.0.1:8888".parse().unwrap(),
        };
        assert_eq!(
            event.to_string(),
            "Connected to server, start chatting!\nType /exit to close the app"
        );
    }
}
