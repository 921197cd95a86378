use std::sync::Arc;
use std::time::Duration;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use radish::engine::MemStore;
use radish::keys::{self, Coordinate, Query, DEFAULT_PAGE_SIZE, MATCH_ALL};
use radish::server::Router;
use radish::{sdk, Config, Connector};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the JSON config file. Defaults to $RADISH_CONFIG or config.json.
    #[arg(short, long)]
    config: Option<String>,

    /// Server to talk to. Defaults to the first configured one.
    #[arg(short, long)]
    server: Option<String>,

    #[arg(short, long, default_value_t = 0)]
    db: u8,

    /// Abandon the operation after this many seconds.
    #[arg(short, long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// List servers with their statistics.
    Servers,
    /// List key names matching a glob.
    Keys {
        #[arg(default_value = MATCH_ALL)]
        mask: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Show one level of the key namespace tree.
    Tree {
        #[arg(default_value = MATCH_ALL)]
        prefix: String,
        #[arg(long, default_value = ":")]
        delimiter: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
    },
    /// Show the type and page count of a key.
    Info {
        key: String,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Show one page of the values of a key.
    Values {
        key: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
        #[arg(long, default_value = MATCH_ALL)]
        mask: String,
    },
    /// Set a string key.
    Set { key: String, value: String },
    /// Delete a key of any type.
    Del { key: String },
    /// Serve an in-memory store over RESP.
    Serve {
        #[arg(short, long, default_value_t = 6379)]
        port: u16,
    },
}

#[derive(Serialize)]
struct ServerEntry {
    name: String,
    databases: Option<u8>,
    stats: Option<radish::ServerStat>,
    keyspace: std::collections::BTreeMap<String, radish::KeyspaceStat>,
}

#[derive(Serialize)]
struct ValuesOutput {
    key: String,
    page: usize,
    pages_count: usize,
    #[serde(flatten)]
    values: keys::Page,
}

/// Unreachable servers are still listed, without statistics.
async fn server_entry(connector: &dyn Connector, name: String) -> ServerEntry {
    let databases = connector
        .max_database_count(&name)
        .await
        .map_err(|e| log::warn!("database count of {} unavailable: {}", name, e))
        .ok();
    let stats = connector
        .server_stats(&name)
        .await
        .map_err(|e| log::warn!("server stats of {} unavailable: {}", name, e))
        .ok();
    let keyspace = connector
        .keyspace_stats(&name)
        .await
        .map_err(|e| log::warn!("keyspace stats of {} unavailable: {}", name, e))
        .unwrap_or_default();
    ServerEntry {
        name,
        databases,
        stats,
        keyspace,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading config from {}", path)),
        None => match Config::from_env() {
            Ok(config) => Ok(config),
            Err(radish::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        },
    }
}

async fn serve(port: u16) -> anyhow::Result<()> {
    let store = Arc::new(MemStore::with_servers(&[sdk::EMBEDDED_SERVER], 16));
    let router = Router::new(store, sdk::EMBEDDED_SERVER);
    println!("Radish store listening on :{} (RESP)", port);
    tokio::select! {
        res = router.listen(port) => res?,
        _ = tokio::signal::ctrl_c() => println!("\nShutdown signal received. Exiting."),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Commands::Serve { port } = cli.command {
        return serve(port).await;
    }

    let config = load_config(cli.config.as_deref())?;
    let connector = sdk::connect(&config);
    let server = match cli.server {
        Some(server) => server,
        None => connector
            .servers()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no server configured"))?,
    };

    let cancel = CancellationToken::new();
    if let Some(secs) = cli.timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            cancel.cancel();
        });
    }

    let key = |name: &str| Coordinate::new(&server, cli.db, name);

    match cli.command {
        Commands::Servers => {
            let mut entries = Vec::new();
            for name in connector.servers() {
                entries.push(server_entry(connector.as_ref(), name).await);
            }
            print_json(&entries)?;
        }
        Commands::Keys { mask, page, page_size } => {
            let found =
                keys::find_keys(connector.as_ref(), &server, cli.db, &mask, page, page_size, &cancel).await?;
            print_json(&found)?;
        }
        Commands::Tree { prefix, delimiter, offset, limit } => {
            let subtree = keys::find_tree_children(
                connector.as_ref(),
                &server,
                cli.db,
                &prefix,
                &delimiter,
                offset,
                limit,
                &cancel,
            )
            .await?;
            print_json(&subtree)?;
        }
        Commands::Info { key: name, page_size } => {
            let info = keys::key_info(connector.clone(), key(&name), page_size, &cancel).await?;
            print_json(&info)?;
        }
        Commands::Values { key: name, page, page_size, mask } => {
            let query = Query::new(page, page_size, &mask)?;
            let mut provider = keys::resolve(connector.clone(), key(&name), query, &cancel).await?;
            let pages_count = provider.page_count(&cancel).await?;
            let values = provider.values(&cancel).await?.redacted();
            print_json(&ValuesOutput {
                key: name,
                page,
                pages_count,
                values,
            })?;
        }
        Commands::Set { key: name, value } => {
            keys::string::set_string(connector.as_ref(), &key(&name), &value, &cancel).await?;
            println!("OK");
        }
        Commands::Del { key: name } => {
            keys::delete_key(connector.as_ref(), &key(&name), &cancel).await?;
            println!("OK");
        }
        Commands::Serve { port } => serve(port).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_server_is_listed_bare() {
        let store = MemStore::with_servers(&["up"], 16);
        let up = server_entry(&store, "up".to_string()).await;
        assert_eq!(up.databases, Some(16));
        assert!(up.stats.is_some());

        let down = server_entry(&store, "down".to_string()).await;
        assert_eq!(down.databases, None);
        assert!(down.stats.is_none());
        assert!(down.keyspace.is_empty());
    }
}
