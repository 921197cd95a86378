use std::collections::BTreeMap;
use std::time::Duration;
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use crate::config::ServerConfig;
use crate::sdk::resp;
use crate::{Command, Config, Connector, Error, Reply, Result, Session};

const CONNECT_ATTEMPTS: u64 = 3;

/// Connects to Redis servers over TCP, one connection per session.
///
/// Dialing is retried a few times with a growing pause. Commands are never
/// retried: a failed round trip is reported to the caller.
pub struct RespConnector {
    servers: BTreeMap<String, ServerConfig>,
}

impl RespConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            servers: config.servers.clone(),
        }
    }

    async fn dial(addr: &str) -> Result<TcpStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    log::warn!("connecting to {} failed (attempt {}): {}", addr, attempt, e);
                    tokio::time::sleep(Duration::from_millis(attempt * 200)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Connector for RespConnector {
    async fn session(&self, server: &str, db: u8) -> Result<Box<dyn Session>> {
        let config = self
            .servers
            .get(server)
            .ok_or_else(|| Error::ServerNotFound(server.to_string()))?;
        let stream = Self::dial(&config.addr()).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        let mut session = RespSession {
            reader: BufReader::new(reader),
            writer,
        };

        if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
            session.execute(&Command::new("AUTH").arg(password)).await?;
        }
        if db != 0 {
            session.execute(&Command::new("SELECT").int_arg(db as i64)).await?;
        }
        log::debug!("opened session to {} db {}", server, db);
        Ok(Box::new(session))
    }

    fn servers(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }
}

pub struct RespSession {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[async_trait]
impl Session for RespSession {
    async fn execute(&mut self, command: &Command) -> Result<Reply> {
        self.writer.write_all(&resp::encode_command(command)).await?;
        resp::read_reply(&mut self.reader).await
    }
}
