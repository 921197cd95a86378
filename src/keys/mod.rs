//! Typed key access and pagination.
//!
//! [`resolve`] asks the store for the type of a key and returns the matching
//! [`KeyValues`] provider. Each provider owns a [`Query`] and computes its
//! page of values and its page count lazily, at most once.
//!
//! Providers of collections follow one of two paths. Without a mask the page
//! count comes from a cheap cardinality command (`LLEN`, `HLEN`, `SCARD`,
//! `ZCARD`). With a mask there is no filtered count on the server side, so
//! the whole collection is read once, filtered, and both the page and the
//! filtered total are derived from that single read.

pub mod hash;
pub mod list;
pub mod mask;
pub mod pagination;
pub mod set;
pub mod string;
pub mod tree;
pub mod value;
pub mod zset;

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::{Command, Connector, Error, Reply, Result, Session};

pub use hash::HashValues;
pub use list::ListValues;
pub use mask::{Mask, MATCH_ALL};
pub use pagination::{page_range, pages_count};
pub use set::SetValues;
pub use string::StringValues;
pub use tree::{build_children, find_tree_children, KeysSubtree, NamespaceNode};
pub use value::{is_binary, HashEntry, ListElement, Query, Value, ZSetMember, DEFAULT_PAGE_SIZE};
pub use zset::ZSetValues;

/// Address of one value in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Coordinate {
    pub server: String,
    pub db: u8,
    pub key: String,
}

impl Coordinate {
    pub fn new(server: &str, db: u8, key: &str) -> Self {
        Self {
            server: server.to_string(),
            db,
            key: key.to_string(),
        }
    }
}

/// The store types a key can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    List,
    Hash,
    Set,
    ZSet,
}

impl KeyType {
    /// Maps a `TYPE` reply to a key type. `none` means the key does not exist.
    pub fn from_tag(tag: &str) -> Result<Option<KeyType>> {
        match tag {
            "string" => Ok(Some(KeyType::String)),
            "list" => Ok(Some(KeyType::List)),
            "hash" => Ok(Some(KeyType::Hash)),
            "set" => Ok(Some(KeyType::Set)),
            "zset" => Ok(Some(KeyType::ZSet)),
            "none" => Ok(None),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Hash => "hash",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
        }
    }
}

/// Lazily computed state of a provider: it goes from unloaded to loaded once.
#[derive(Debug)]
pub(crate) enum Memo<T> {
    Unloaded,
    Loaded(T),
}

impl<T> Memo<T> {
    pub(crate) fn is_loaded(&self) -> bool {
        matches!(self, Memo::Loaded(_))
    }

    pub(crate) fn set(&mut self, value: T) {
        if !self.is_loaded() {
            *self = Memo::Loaded(value);
        }
    }

    pub(crate) fn loaded(&self) -> Result<&T> {
        match self {
            Memo::Loaded(value) => Ok(value),
            Memo::Unloaded => Err(Error::Internal("provider read before load".to_string())),
        }
    }
}

/// A page cut once. `None` records that the page starts past the end, so a
/// provider answers [`Error::PageNotFound`] again without a second read.
pub(crate) type PageMemo<T> = Memo<Option<Vec<T>>>;

impl<T> Memo<Option<Vec<T>>> {
    pub(crate) fn page(&self) -> Result<&[T]> {
        match self.loaded()? {
            Some(page) => Ok(page),
            None => Err(Error::PageNotFound),
        }
    }
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}

pub(crate) async fn open(
    connector: &dyn Connector,
    server: &str,
    db: u8,
    cancel: &CancellationToken,
) -> Result<Box<dyn Session>> {
    cancellable(cancel, connector.session(server, db)).await
}

pub(crate) async fn execute(
    session: &mut dyn Session,
    command: Command,
    cancel: &CancellationToken,
) -> Result<Reply> {
    log::debug!("> {}", command);
    cancellable(cancel, session.execute(&command)).await
}

/// Opens a session for `key` and sends one command.
pub(crate) async fn command(
    connector: &dyn Connector,
    key: &Coordinate,
    cmd: Command,
    cancel: &CancellationToken,
) -> Result<Reply> {
    let mut session = open(connector, &key.server, key.db, cancel).await?;
    execute(session.as_mut(), cmd, cancel).await
}

/// A materialized page of values, shaped by key type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "key_type", content = "values", rename_all = "lowercase")]
pub enum Page {
    String(Value),
    List(Vec<ListElement>),
    Hash(Vec<HashEntry>),
    Set(Vec<Value>),
    ZSet(Vec<ZSetMember>),
}

impl Page {
    /// Copy of the page with binary payloads replaced by a placeholder.
    pub fn redacted(&self) -> Page {
        match self {
            Page::String(v) => Page::String(v.redacted()),
            Page::List(items) => Page::List(
                items
                    .iter()
                    .map(|e| ListElement {
                        index: e.index,
                        value: e.value.redacted(),
                    })
                    .collect(),
            ),
            Page::Hash(entries) => Page::Hash(
                entries
                    .iter()
                    .map(|e| HashEntry {
                        field: e.field.clone(),
                        value: e.value.redacted(),
                    })
                    .collect(),
            ),
            Page::Set(members) => Page::Set(members.iter().map(Value::redacted).collect()),
            Page::ZSet(members) => Page::ZSet(
                members
                    .iter()
                    .map(|m| ZSetMember {
                        score: m.score,
                        member: m.member.redacted(),
                    })
                    .collect(),
            ),
        }
    }
}

/// A value provider for one key, one variant per store type.
pub enum KeyValues {
    String(StringValues),
    List(ListValues),
    Hash(HashValues),
    Set(SetValues),
    ZSet(ZSetValues),
}

impl std::fmt::Debug for KeyValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValues")
            .field("key_type", &self.key_type())
            .field("query", self.query())
            .finish()
    }
}

impl KeyValues {
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyValues::String(_) => KeyType::String,
            KeyValues::List(_) => KeyType::List,
            KeyValues::Hash(_) => KeyType::Hash,
            KeyValues::Set(_) => KeyType::Set,
            KeyValues::ZSet(_) => KeyType::ZSet,
        }
    }

    pub fn query(&self) -> &Query {
        match self {
            KeyValues::String(p) => p.query(),
            KeyValues::List(p) => p.query(),
            KeyValues::Hash(p) => p.query(),
            KeyValues::Set(p) => p.query(),
            KeyValues::ZSet(p) => p.query(),
        }
    }

    /// The requested page of values. Loaded on first call, cached afterwards.
    pub async fn values(&mut self, cancel: &CancellationToken) -> Result<Page> {
        Ok(match self {
            KeyValues::String(p) => Page::String(p.value(cancel).await?.clone()),
            KeyValues::List(p) => Page::List(p.values(cancel).await?.to_vec()),
            KeyValues::Hash(p) => Page::Hash(p.values(cancel).await?.to_vec()),
            KeyValues::Set(p) => Page::Set(p.values(cancel).await?.to_vec()),
            KeyValues::ZSet(p) => Page::ZSet(p.values(cancel).await?.to_vec()),
        })
    }

    /// Number of pages under the current mask. Loaded on first call, cached afterwards.
    pub async fn page_count(&mut self, cancel: &CancellationToken) -> Result<usize> {
        match self {
            KeyValues::String(p) => p.page_count(cancel).await,
            KeyValues::List(p) => p.page_count(cancel).await,
            KeyValues::Hash(p) => p.page_count(cancel).await,
            KeyValues::Set(p) => p.page_count(cancel).await,
            KeyValues::ZSet(p) => p.page_count(cancel).await,
        }
    }
}

/// Asks the store for the type of `key` and builds the matching provider.
pub async fn resolve(
    connector: Arc<dyn Connector>,
    key: Coordinate,
    query: Query,
    cancel: &CancellationToken,
) -> Result<KeyValues> {
    let tag = command(connector.as_ref(), &key, Command::new("TYPE").arg(&key.key), cancel)
        .await?
        .into_string()?;
    let key_type = KeyType::from_tag(&tag)?.ok_or_else(|| Error::KeyNotFound(key.key.clone()))?;
    log::debug!("resolved {} on {}/{} as {}", key.key, key.server, key.db, key_type.as_str());

    Ok(match key_type {
        KeyType::String => KeyValues::String(StringValues::new(connector, key, query)),
        KeyType::List => KeyValues::List(ListValues::new(connector, key, query)),
        KeyType::Hash => KeyValues::Hash(HashValues::new(connector, key, query)),
        KeyType::Set => KeyValues::Set(SetValues::new(connector, key, query)),
        KeyType::ZSet => KeyValues::ZSet(ZSetValues::new(connector, key, query)),
    })
}

/// Type and page layout of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub key_type: KeyType,
    pub page_size: usize,
    pub pages_count: usize,
}

pub async fn key_info(
    connector: Arc<dyn Connector>,
    key: Coordinate,
    page_size: usize,
    cancel: &CancellationToken,
) -> Result<KeyInfo> {
    let query = Query::new(1, page_size, MATCH_ALL)?;
    let mut provider = resolve(connector, key, query, cancel).await?;
    Ok(KeyInfo {
        key_type: provider.key_type(),
        page_size,
        pages_count: provider.page_count(cancel).await?,
    })
}

pub async fn key_exists(
    connector: &dyn Connector,
    key: &Coordinate,
    cancel: &CancellationToken,
) -> Result<bool> {
    command(connector, key, Command::new("EXISTS").arg(&key.key), cancel)
        .await?
        .into_bool()
}

/// Deletes a key of any type. Fails with [`Error::KeyNotFound`] if it is absent.
pub async fn delete_key(
    connector: &dyn Connector,
    key: &Coordinate,
    cancel: &CancellationToken,
) -> Result<()> {
    let removed = command(connector, key, Command::new("DEL").arg(&key.key), cancel)
        .await?
        .into_int()?;
    if removed == 0 {
        return Err(Error::KeyNotFound(key.key.clone()));
    }
    Ok(())
}

/// One page of key names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeysPage {
    pub keys: Vec<String>,
    pub page: usize,
    pub pages_count: usize,
}

/// Lists keys matching a store-side glob, sorted by name, one page at a time.
pub async fn find_keys(
    connector: &dyn Connector,
    server: &str,
    db: u8,
    mask: &str,
    page: usize,
    page_size: usize,
    cancel: &CancellationToken,
) -> Result<KeysPage> {
    if page == 0 || page_size == 0 {
        return Err(Error::InvalidArgument("page and page size must be positive".to_string()));
    }
    let mut session = open(connector, server, db, cancel).await?;
    let mut keys = execute(session.as_mut(), Command::new("KEYS").arg(mask), cancel)
        .await?
        .into_strings()?;
    keys.sort();
    let pages_count = pages_count(keys.len(), page_size);
    Ok(KeysPage {
        keys: pagination::page_of(keys, page_size, page)?,
        page,
        pages_count,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;
    use crate::engine::MemStore;
    use crate::{Command, Connector, Reply, Result, Session};
    use super::Coordinate;

    pub const SERVER: &str = "server1";

    pub fn store() -> Arc<MemStore> {
        Arc::new(MemStore::with_servers(&[SERVER], 16))
    }

    pub fn key(name: &str) -> Coordinate {
        Coordinate::new(SERVER, 0, name)
    }

    /// Runs raw commands against database 0, panicking on failure.
    pub async fn seed(store: &MemStore, commands: Vec<Command>) {
        let mut session = store.session(SERVER, 0).await.unwrap();
        for cmd in commands {
            session.execute(&cmd).await.unwrap();
        }
    }

    /// Wraps a store and cancels `token` right after the `after`-th command,
    /// counted over all sessions.
    pub struct CancelAfter {
        store: Arc<MemStore>,
        token: CancellationToken,
        left: Arc<AtomicUsize>,
    }

    impl CancelAfter {
        pub fn new(store: Arc<MemStore>, token: CancellationToken, after: usize) -> Self {
            Self {
                store,
                token,
                left: Arc::new(AtomicUsize::new(after)),
            }
        }
    }

    #[async_trait]
    impl Connector for CancelAfter {
        async fn session(&self, server: &str, db: u8) -> Result<Box<dyn Session>> {
            Ok(Box::new(CancellingSession {
                inner: self.store.session(server, db).await?,
                token: self.token.clone(),
                left: self.left.clone(),
            }))
        }

        fn servers(&self) -> Vec<String> {
            self.store.servers()
        }
    }

    struct CancellingSession {
        inner: Box<dyn Session>,
        token: CancellationToken,
        left: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Session for CancellingSession {
        async fn execute(&mut self, command: &Command) -> Result<Reply> {
            let reply = self.inner.execute(command).await;
            let before = self
                .left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if before == Ok(1) {
                self.token.cancel();
            }
            reply
        }
    }
}
