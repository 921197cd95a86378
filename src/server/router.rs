use std::sync::Arc;
use log::{debug, error, info};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use crate::engine::MemStore;
use crate::sdk::resp;
use crate::{Error, Result, Session};

const MAX_CONNECTIONS: usize = 100;

/// Serves one server of a [`MemStore`] over RESP.
pub struct Router {
    store: Arc<MemStore>,
    server: String,
    semaphore: Arc<Semaphore>,
}

impl Router {
    pub fn new(store: Arc<MemStore>, server: &str) -> Self {
        Self {
            store,
            server: server.to_string(),
            semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        }
    }

    pub async fn listen(&self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!("Radish store listening on port {}", port);

        loop {
            let (socket, peer) = listener.accept().await?;
            let store = self.store.clone();
            let server = self.server.clone();
            let sem = self.semaphore.clone();

            tokio::spawn(async move {
                let _permit = match sem.try_acquire() {
                    Ok(p) => p,
                    Err(_) => {
                        error!("Server busy: too many concurrent connections. Rejecting {}", peer);
                        let mut socket = socket;
                        let _ = socket.shutdown().await;
                        return;
                    }
                };

                if let Err(e) = handle_connection(socket, store, &server).await {
                    error!("Connection error: {}", e);
                }
            });
        }
    }
}

/// Runs commands read from `socket` against `server` until the client quits
/// or disconnects. Each connection has its own session, so `SELECT` only
/// affects that connection.
pub async fn handle_connection(mut socket: TcpStream, store: Arc<MemStore>, server: &str) -> Result<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut session = store.open(server, 0)?;
    let mut out = Vec::new();

    loop {
        let command = match resp::read_command(&mut reader).await {
            Ok(Some(command)) => command,
            Ok(None) => break,
            Err(Error::Protocol(msg)) => {
                out.clear();
                resp::encode_error(&format!("ERR Protocol error: {}", msg), &mut out);
                writer.write_all(&out).await?;
                break;
            }
            Err(e) => return Err(e),
        };
        debug!("< {}", command);

        out.clear();
        if command.name() == "QUIT" {
            resp::encode_reply(&crate::Reply::ok(), &mut out);
            writer.write_all(&out).await?;
            break;
        }
        match session.execute(&command).await {
            Ok(reply) => resp::encode_reply(&reply, &mut out),
            Err(Error::Store(msg)) => resp::encode_error(&msg, &mut out),
            Err(e) => resp::encode_error(&format!("ERR {}", e), &mut out),
        }
        writer.write_all(&out).await?;
    }
    Ok(())
}
