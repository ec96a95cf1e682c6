use crate::{
    session::{Event, Events, Lines, Role},
    Config, Error, Session,
};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Connects to a listener and chats until either side leaves.
///
/// Returns whether the session ended because the local user asked to exit.
#[tracing::instrument(err, skip(config, lines, events))]
pub async fn connect(
    address: SocketAddr,
    config: Config,
    lines: Lines,
    events: Events,
) -> Result<bool, Error> {
    config.validate()?;
    let stream = TcpStream::connect(address).await?;
    tracing::info!("Connected");
    let _ = events.send(Event::Connected {
        role: Role::Initiator,
        peer: address,
    });

    let session = Session::new(stream, Role::Initiator, config, lines, events)?;
    session.poll_until_disconnected(config.poll_interval).await;
    let exit = session.user_requested_exit();
    session.join().await?;
    Ok(exit)
}
