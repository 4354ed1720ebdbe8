//! TCP server implementation

use crate::protocol::Response;
use crate::pubsub::{Broker, Session};
use crate::server::{Connection, Dispatcher};
use crate::storage::SharedStore;
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

/// TCP server handling many concurrent client connections
pub struct TcpServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
    broker: Arc<Broker>,
}

impl TcpServer {
    /// Bind the listening socket. Port 0 binds an ephemeral port; use
    /// `local_addr` to discover it.
    pub async fn bind(addr: &str, store: SharedStore, broker: Arc<Broker>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let dispatcher = Dispatcher::new(store, Arc::clone(&broker));
        Ok(TcpServer {
            listener,
            dispatcher,
            broker,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop
    pub async fn run(&self) -> Result<()> {
        info!("Tidepool server listening on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    info!("New connection from {}", addr);

                    let dispatcher = self.dispatcher.clone();
                    let broker = Arc::clone(&self.broker);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(socket, dispatcher, broker).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        socket: TcpStream,
        dispatcher: Dispatcher,
        broker: Arc<Broker>,
    ) -> Result<()> {
        let mut connection = Connection::new(socket);
        let mut session = broker.session();

        let result = Self::serve(&mut connection, &dispatcher, &mut session).await;

        // Subscriptions die with the connection, on every exit path.
        broker.disconnect(&session).await;
        result
    }

    /// Serve one connection: interleave inbound commands with pub/sub
    /// deliveries queued for this session.
    async fn serve(
        connection: &mut Connection,
        dispatcher: &Dispatcher,
        session: &mut Session,
    ) -> Result<()> {
        loop {
            tokio::select! {
                inbound = connection.read_command() => {
                    match inbound {
                        Ok(Some(command)) => {
                            let response = dispatcher.execute(command, session).await;
                            connection.write_response(response).await?;
                        }
                        Ok(None) => {
                            info!("Connection closed by client");
                            break;
                        }
                        // Malformed request: already answered, keep serving.
                        Err(Error::Protocol(_)) | Err(Error::NotInteger) => continue,
                        Err(e) => {
                            warn!("Connection error: {}", e);
                            break;
                        }
                    }
                }
                Some(event) = session.recv() => {
                    connection
                        .write_response(Response::Event {
                            channel: event.channel,
                            payload: event.payload,
                        })
                        .await?;
                }
            }
        }

        Ok(())
    }
}
