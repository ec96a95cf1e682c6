use crate::{
    session::{Event, Events, Lines, Role},
    Config, Error, Session, EXIT_COMMAND,
};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::TcpListener;

/// Accepts one client at a time and chats with it until it leaves.
pub struct Listener {
    listener: TcpListener,
    config: Config,
}

impl Listener {
    /// Listens on every interface at the configured port.
    pub async fn bind(config: Config) -> Result<Self, Error> {
        Self::bind_addr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port).into(), config).await
    }

    #[tracing::instrument(err, skip(config))]
    pub async fn bind_addr(address: SocketAddr, config: Config) -> Result<Self, Error> {
        config.validate()?;
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs until the user types the exit command, either during a session
    /// or while waiting for a client.
    pub async fn serve(self, mut lines: Lines, events: Events) -> Result<(), Error> {
        let port = self.local_addr()?.port();
        tracing::info!(port, "Listening");
        let _ = events.send(Event::Listening { port });
        loop {
            let _ = events.send(Event::WaitingForConnection);
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::error!("failed to accept connection: {}", err);
                        continue;
                    }
                },
                line = lines.recv() => match line {
                    Some(line) if line != EXIT_COMMAND => {
                        tracing::warn!("no client connected, dropping message");
                        continue;
                    }
                    _ => {
                        let _ = events.send(Event::Closing);
                        return Ok(());
                    }
                },
            };

            tracing::info!(%peer, "Accepted connection");
            let _ = events.send(Event::Connected {
                role: Role::Listener,
                peer,
            });
            let session = Session::new(stream, Role::Listener, self.config, lines, events.clone())?;
            session.poll_until_disconnected(self.config.poll_interval).await;
            let exit = session.user_requested_exit();
            lines = session.join().await?;
            tracing::info!(%peer, "Session closed");
            if exit {
                return Ok(());
            }
        }
    }
}
