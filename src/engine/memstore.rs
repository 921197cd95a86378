use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use async_trait::async_trait;
use crate::keys::Mask;
use crate::stats::human_size;
use crate::{Command, Connector, Error, Reply, Result, Session};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-radish");

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Str(Vec<u8>),
    List(Vec<Vec<u8>>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    /// Kept sorted by score, then member.
    ZSet(Vec<(f64, Vec<u8>)>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::Str(_) => "string",
            Entry::List(_) => "list",
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::ZSet(_) => "zset",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::Str(_) => false,
            Entry::List(l) => l.is_empty(),
            Entry::Hash(h) => h.is_empty(),
            Entry::Set(s) => s.is_empty(),
            Entry::ZSet(z) => z.is_empty(),
        }
    }

    fn size(&self) -> usize {
        match self {
            Entry::Str(s) => s.len(),
            Entry::List(l) => l.iter().map(Vec::len).sum(),
            Entry::Hash(h) => h.iter().map(|(f, v)| f.len() + v.len()).sum(),
            Entry::Set(s) => s.iter().map(Vec::len).sum(),
            Entry::ZSet(z) => z.iter().map(|(_, m)| m.len() + 8).sum(),
        }
    }
}

type Database = HashMap<Vec<u8>, Entry>;
type StoreData = HashMap<String, Vec<Database>>;

/// An in-memory store speaking the subset of Redis commands used by this
/// crate. Each named server holds a fixed number of databases.
///
/// Data lives for as long as the store. Clones of the inner state are shared
/// by all sessions, so writes through one session are visible to the others.
pub struct MemStore {
    data: Arc<RwLock<StoreData>>,
    databases: u8,
    started: Instant,
    clients: Arc<AtomicUsize>,
}

impl MemStore {
    /// Creates a store with `databases` empty databases on each server.
    pub fn with_servers(servers: &[&str], databases: u8) -> Self {
        let databases = databases.max(1);
        let data = servers
            .iter()
            .map(|name| (name.to_string(), vec![Database::new(); databases as usize]))
            .collect();
        Self {
            data: Arc::new(RwLock::new(data)),
            databases,
            started: Instant::now(),
            clients: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Opens a session without boxing it.
    pub fn open(&self, server: &str, db: u8) -> Result<MemSession> {
        {
            let data = self.data.read().map_err(|_| poisoned())?;
            if !data.contains_key(server) {
                return Err(Error::ServerNotFound(server.to_string()));
            }
        }
        if db >= self.databases {
            return Err(Error::Store("ERR DB index is out of range".to_string()));
        }
        self.clients.fetch_add(1, Ordering::SeqCst);
        Ok(MemSession {
            data: self.data.clone(),
            server: server.to_string(),
            db,
            databases: self.databases,
            started: self.started,
            clients: self.clients.clone(),
        })
    }
}

#[async_trait]
impl Connector for MemStore {
    async fn session(&self, server: &str, db: u8) -> Result<Box<dyn Session>> {
        Ok(Box::new(self.open(server, db)?))
    }

    fn servers(&self) -> Vec<String> {
        match self.data.read() {
            Ok(data) => {
                let mut names: Vec<String> = data.keys().cloned().collect();
                names.sort();
                names
            }
            Err(_) => Vec::new(),
        }
    }
}

/// A session on one server of a [`MemStore`]. `SELECT` switches its database.
pub struct MemSession {
    data: Arc<RwLock<StoreData>>,
    server: String,
    db: u8,
    databases: u8,
    started: Instant,
    clients: Arc<AtomicUsize>,
}

impl Drop for MemSession {
    fn drop(&mut self) {
        self.clients.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for MemSession {
    async fn execute(&mut self, command: &Command) -> Result<Reply> {
        self.dispatch(command)
    }
}

impl MemSession {
    fn dispatch(&mut self, command: &Command) -> Result<Reply> {
        let name = command.name();
        let params = command.params();

        // Commands that do not touch the data.
        match name.as_str() {
            "PING" => {
                return Ok(match params.first() {
                    Some(msg) => Reply::Bulk(msg.clone()),
                    None => Reply::Status("PONG".to_string()),
                })
            }
            "AUTH" => return Ok(Reply::ok()),
            "SELECT" => {
                arity(&name, params, 1)?;
                let db = int_param(&params[0])?;
                if db < 0 || db >= self.databases as i64 {
                    return Err(Error::Store("ERR DB index is out of range".to_string()));
                }
                self.db = db as u8;
                return Ok(Reply::ok());
            }
            "CONFIG" => {
                arity(&name, params, 2)?;
                let sub = String::from_utf8_lossy(&params[0]).to_uppercase();
                if sub != "GET" {
                    return Err(Error::Store(format!("ERR unknown CONFIG subcommand '{}'", sub)));
                }
                let field = String::from_utf8_lossy(&params[1]).to_lowercase();
                return Ok(if field == "databases" {
                    Reply::Array(vec![Reply::bulk("databases"), Reply::bulk(self.databases.to_string())])
                } else {
                    Reply::Array(Vec::new())
                });
            }
            _ => {}
        }

        let mut data = self.data.write().map_err(|_| poisoned())?;
        let dbs = data
            .get_mut(&self.server)
            .ok_or_else(|| Error::ServerNotFound(self.server.clone()))?;

        if name == "INFO" {
            let section = params.first().map(|s| String::from_utf8_lossy(s).to_lowercase());
            return Ok(Reply::bulk(self.info(dbs, section.as_deref())));
        }

        let db = &mut dbs[self.db as usize];
        execute_data(db, &name, params)
    }

    fn info(&self, dbs: &[Database], section: Option<&str>) -> String {
        let mut keyspace = String::from("# Keyspace\r\n");
        for (i, db) in dbs.iter().enumerate() {
            if !db.is_empty() {
                keyspace.push_str(&format!("db{}:keys={},expires=0,avg_ttl=0\r\n", i, db.len()));
            }
        }
        if section == Some("keyspace") {
            return keyspace;
        }

        let used: usize = dbs
            .iter()
            .flat_map(|db| db.iter())
            .map(|(k, e)| k.len() + e.size())
            .sum();
        format!(
            "# Server\r\nredis_version:{}\r\nuptime_in_seconds:{}\r\n\r\n\
             # Clients\r\nconnected_clients:{}\r\n\r\n\
             # Memory\r\nused_memory:{}\r\nused_memory_human:{}\r\nmaxmemory:0\r\nmaxmemory_human:0B\r\n\r\n{}",
            VERSION,
            self.started.elapsed().as_secs(),
            self.clients.load(Ordering::SeqCst),
            used,
            human_size(used as i64),
            keyspace
        )
    }
}

fn poisoned() -> Error {
    Error::Internal("store lock poisoned".to_string())
}

fn wrong_type() -> Error {
    Error::Store("WRONGTYPE Operation against a key holding the wrong kind of value".to_string())
}

fn syntax_error() -> Error {
    Error::Store("ERR syntax error".to_string())
}

fn wrong_arguments(name: &str) -> Error {
    Error::Store(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_lowercase()
    ))
}

/// Checks that at least `min` parameters were given.
fn arity(name: &str, params: &[Vec<u8>], min: usize) -> Result<()> {
    if params.len() < min {
        return Err(wrong_arguments(name));
    }
    Ok(())
}

fn int_param(param: &[u8]) -> Result<i64> {
    String::from_utf8_lossy(param)
        .parse()
        .map_err(|_| Error::Store("ERR value is not an integer or out of range".to_string()))
}

fn float_param(param: &[u8]) -> Result<f64> {
    let s = String::from_utf8_lossy(param);
    match s.parse::<f64>() {
        Ok(v) if !v.is_nan() => Ok(v),
        _ => Err(Error::Store("ERR value is not a valid float".to_string())),
    }
}

/// Parses a `ZRANGEBYSCORE` bound; a leading `(` makes it exclusive.
fn score_bound(param: &[u8]) -> Result<(f64, bool)> {
    match param.strip_prefix(b"(") {
        Some(rest) => Ok((float_param(rest)?, true)),
        None => Ok((float_param(param)?, false)),
    }
}

/// Formats a score the way Redis prints it: integral values without a fraction.
pub(crate) fn format_score(score: f64) -> String {
    if score.is_infinite() {
        return if score > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if score.fract() == 0.0 && score.abs() < 1e17 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}

/// Resolves a Redis-style inclusive range with negative offsets against `len`.
fn clamp_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { len.saturating_add(start).max(0) } else { start };
    let stop = if stop < 0 { len.saturating_add(stop) } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn list_index(len: usize, index: i64) -> Option<usize> {
    let index = if index < 0 { (len as i64).saturating_add(index) } else { index };
    if index < 0 || index >= len as i64 {
        None
    } else {
        Some(index as usize)
    }
}

fn bulks<I: IntoIterator<Item = Vec<u8>>>(items: I) -> Reply {
    Reply::Array(items.into_iter().map(Reply::Bulk).collect())
}

/// Drops `key` if it holds an empty collection.
fn prune(db: &mut Database, key: &[u8]) {
    if db.get(key).is_some_and(Entry::is_empty) {
        db.remove(key);
    }
}

fn zset_insert(zset: &mut Vec<(f64, Vec<u8>)>, score: f64, member: Vec<u8>) {
    let pos = zset
        .binary_search_by(|(s, m)| {
            s.partial_cmp(&score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| m.cmp(&member))
        })
        .unwrap_or_else(|p| p);
    zset.insert(pos, (score, member));
}

fn execute_data(db: &mut Database, name: &str, params: &[Vec<u8>]) -> Result<Reply> {
    match name {
        "TYPE" => {
            arity(name, params, 1)?;
            let tag = db.get(&params[0]).map(Entry::type_name).unwrap_or("none");
            Ok(Reply::Status(tag.to_string()))
        }
        "EXISTS" => {
            arity(name, params, 1)?;
            Ok(Reply::Integer(params.iter().filter(|k| db.contains_key(*k)).count() as i64))
        }
        "DEL" => {
            arity(name, params, 1)?;
            Ok(Reply::Integer(params.iter().filter(|k| db.remove(*k).is_some()).count() as i64))
        }
        "KEYS" => {
            arity(name, params, 1)?;
            let mask = Mask::new(&String::from_utf8_lossy(&params[0]));
            Ok(bulks(
                db.keys()
                    .filter(|k| mask.matches(&String::from_utf8_lossy(k)))
                    .cloned(),
            ))
        }

        "GET" => {
            arity(name, params, 1)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Nil),
                Some(Entry::Str(v)) => Ok(Reply::Bulk(v.clone())),
                Some(_) => Err(wrong_type()),
            }
        }
        "SET" => {
            arity(name, params, 2)?;
            db.insert(params[0].clone(), Entry::Str(params[1].clone()));
            Ok(Reply::ok())
        }

        "LLEN" => {
            arity(name, params, 1)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::List(l)) => Ok(Reply::Integer(l.len() as i64)),
                Some(_) => Err(wrong_type()),
            }
        }
        "LRANGE" => {
            arity(name, params, 3)?;
            let (start, stop) = (int_param(&params[1])?, int_param(&params[2])?);
            match db.get(&params[0]) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry::List(l)) => Ok(match clamp_range(l.len(), start, stop) {
                    Some((start, stop)) => bulks(l[start..=stop].iter().cloned()),
                    None => Reply::Array(Vec::new()),
                }),
                Some(_) => Err(wrong_type()),
            }
        }
        "LINDEX" => {
            arity(name, params, 2)?;
            let index = int_param(&params[1])?;
            match db.get(&params[0]) {
                None => Ok(Reply::Nil),
                Some(Entry::List(l)) => Ok(list_index(l.len(), index)
                    .map(|i| Reply::Bulk(l[i].clone()))
                    .unwrap_or(Reply::Nil)),
                Some(_) => Err(wrong_type()),
            }
        }
        "LSET" => {
            arity(name, params, 3)?;
            let index = int_param(&params[1])?;
            match db.get_mut(&params[0]) {
                None => Err(Error::Store("ERR no such key".to_string())),
                Some(Entry::List(l)) => {
                    let i = list_index(l.len(), index)
                        .ok_or_else(|| Error::Store("ERR index out of range".to_string()))?;
                    l[i] = params[2].clone();
                    Ok(Reply::ok())
                }
                Some(_) => Err(wrong_type()),
            }
        }
        "LINSERT" => {
            arity(name, params, 4)?;
            let before = match String::from_utf8_lossy(&params[1]).to_uppercase().as_str() {
                "BEFORE" => true,
                "AFTER" => false,
                _ => return Err(syntax_error()),
            };
            match db.get_mut(&params[0]) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::List(l)) => match l.iter().position(|v| *v == params[2]) {
                    Some(pos) => {
                        let at = if before { pos } else { pos + 1 };
                        l.insert(at, params[3].clone());
                        Ok(Reply::Integer(l.len() as i64))
                    }
                    None => Ok(Reply::Integer(-1)),
                },
                Some(_) => Err(wrong_type()),
            }
        }
        "LREM" => {
            arity(name, params, 3)?;
            let count = int_param(&params[1])?;
            let value = &params[2];
            let removed = match db.get_mut(&params[0]) {
                None => 0,
                Some(Entry::List(l)) => {
                    let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
                    let mut removed = 0;
                    if count >= 0 {
                        let mut i = 0;
                        while i < l.len() && removed < limit {
                            if l[i] == *value {
                                l.remove(i);
                                removed += 1;
                            } else {
                                i += 1;
                            }
                        }
                    } else {
                        let mut i = l.len();
                        while i > 0 && removed < limit {
                            i -= 1;
                            if l[i] == *value {
                                l.remove(i);
                                removed += 1;
                            }
                        }
                    }
                    removed
                }
                Some(_) => return Err(wrong_type()),
            };
            prune(db, &params[0]);
            Ok(Reply::Integer(removed as i64))
        }
        "RPUSH" => {
            arity(name, params, 2)?;
            match db
                .entry(params[0].clone())
                .or_insert_with(|| Entry::List(Vec::new()))
            {
                Entry::List(l) => {
                    l.extend(params[1..].iter().cloned());
                    Ok(Reply::Integer(l.len() as i64))
                }
                _ => Err(wrong_type()),
            }
        }

        "HLEN" => {
            arity(name, params, 1)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::Hash(h)) => Ok(Reply::Integer(h.len() as i64)),
                Some(_) => Err(wrong_type()),
            }
        }
        "HGETALL" => {
            arity(name, params, 1)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry::Hash(h)) => Ok(bulks(
                    h.iter().flat_map(|(f, v)| [f.clone(), v.clone()]),
                )),
                Some(_) => Err(wrong_type()),
            }
        }
        "HEXISTS" => {
            arity(name, params, 2)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::Hash(h)) => Ok(Reply::Integer(h.contains_key(&params[1]) as i64)),
                Some(_) => Err(wrong_type()),
            }
        }
        "HSET" => {
            if params.len() < 3 || (params.len() - 1) % 2 != 0 {
                return Err(wrong_arguments(name));
            }
            match db
                .entry(params[0].clone())
                .or_insert_with(|| Entry::Hash(BTreeMap::new()))
            {
                Entry::Hash(h) => {
                    let added = params[1..]
                        .chunks(2)
                        .filter(|pair| h.insert(pair[0].clone(), pair[1].clone()).is_none())
                        .count();
                    Ok(Reply::Integer(added as i64))
                }
                _ => Err(wrong_type()),
            }
        }
        "HDEL" => {
            arity(name, params, 2)?;
            let removed = match db.get_mut(&params[0]) {
                None => 0,
                Some(Entry::Hash(h)) => params[1..].iter().filter(|f| h.remove(*f).is_some()).count(),
                Some(_) => return Err(wrong_type()),
            };
            prune(db, &params[0]);
            Ok(Reply::Integer(removed as i64))
        }

        "SCARD" => {
            arity(name, params, 1)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::Set(s)) => Ok(Reply::Integer(s.len() as i64)),
                Some(_) => Err(wrong_type()),
            }
        }
        "SMEMBERS" => {
            arity(name, params, 1)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry::Set(s)) => Ok(bulks(s.iter().cloned())),
                Some(_) => Err(wrong_type()),
            }
        }
        "SADD" => {
            arity(name, params, 2)?;
            match db
                .entry(params[0].clone())
                .or_insert_with(|| Entry::Set(BTreeSet::new()))
            {
                Entry::Set(s) => {
                    let added = params[1..].iter().filter(|m| s.insert((*m).clone())).count();
                    Ok(Reply::Integer(added as i64))
                }
                _ => Err(wrong_type()),
            }
        }
        "SREM" => {
            arity(name, params, 2)?;
            let removed = match db.get_mut(&params[0]) {
                None => 0,
                Some(Entry::Set(s)) => params[1..].iter().filter(|m| s.remove(*m)).count(),
                Some(_) => return Err(wrong_type()),
            };
            prune(db, &params[0]);
            Ok(Reply::Integer(removed as i64))
        }

        "ZCARD" => {
            arity(name, params, 1)?;
            match db.get(&params[0]) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::ZSet(z)) => Ok(Reply::Integer(z.len() as i64)),
                Some(_) => Err(wrong_type()),
            }
        }
        "ZRANGEBYSCORE" => {
            arity(name, params, 3)?;
            let (min, min_open) = score_bound(&params[1])?;
            let (max, max_open) = score_bound(&params[2])?;
            let with_scores = match params.get(3) {
                None => false,
                Some(flag) if flag.eq_ignore_ascii_case(b"WITHSCORES") => true,
                Some(_) => return Err(syntax_error()),
            };
            match db.get(&params[0]) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry::ZSet(z)) => {
                    let in_range = |s: f64| {
                        (if min_open { s > min } else { s >= min })
                            && (if max_open { s < max } else { s <= max })
                    };
                    let mut out = Vec::new();
                    for (score, member) in z.iter().filter(|(s, _)| in_range(*s)) {
                        out.push(Reply::Bulk(member.clone()));
                        if with_scores {
                            out.push(Reply::bulk(format_score(*score)));
                        }
                    }
                    Ok(Reply::Array(out))
                }
                Some(_) => Err(wrong_type()),
            }
        }
        "ZADD" => {
            arity(name, params, 3)?;
            let mut nx = false;
            let mut xx = false;
            let mut rest = &params[1..];
            while let Some(flag) = rest.first() {
                if flag.eq_ignore_ascii_case(b"NX") {
                    nx = true;
                } else if flag.eq_ignore_ascii_case(b"XX") {
                    xx = true;
                } else {
                    break;
                }
                rest = &rest[1..];
            }
            if rest.is_empty() || rest.len() % 2 != 0 || (nx && xx) {
                return Err(syntax_error());
            }
            let pairs = rest
                .chunks(2)
                .map(|pair| Ok((float_param(&pair[0])?, pair[1].clone())))
                .collect::<Result<Vec<_>>>()?;

            let added = match db
                .entry(params[0].clone())
                .or_insert_with(|| Entry::ZSet(Vec::new()))
            {
                Entry::ZSet(z) => {
                    let mut added = 0;
                    for (score, member) in pairs {
                        let existing = z.iter().position(|(_, m)| *m == member);
                        match existing {
                            Some(_) if nx => {}
                            Some(pos) => {
                                z.remove(pos);
                                zset_insert(z, score, member);
                            }
                            None if xx => {}
                            None => {
                                zset_insert(z, score, member);
                                added += 1;
                            }
                        }
                    }
                    added
                }
                _ => return Err(wrong_type()),
            };
            prune(db, &params[0]);
            Ok(Reply::Integer(added))
        }
        "ZREM" => {
            arity(name, params, 2)?;
            let removed = match db.get_mut(&params[0]) {
                None => 0,
                Some(Entry::ZSet(z)) => {
                    let before = z.len();
                    z.retain(|(_, m)| !params[1..].contains(m));
                    before - z.len()
                }
                Some(_) => return Err(wrong_type()),
            };
            prune(db, &params[0]);
            Ok(Reply::Integer(removed as i64))
        }

        other => Err(Error::Store(format!("ERR unknown command '{}'", other.to_lowercase()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(store: &MemStore) -> MemSession {
        store.open("s1", 0).unwrap()
    }

    async fn run(session: &mut MemSession, parts: &[&str]) -> Result<Reply> {
        let mut cmd = Command::new(parts[0]);
        for p in &parts[1..] {
            cmd = cmd.arg(p);
        }
        session.execute(&cmd).await
    }

    fn strings(reply: Result<Reply>) -> Vec<String> {
        reply.unwrap().into_strings().unwrap()
    }

    #[tokio::test]
    async fn test_types_and_wrongtype() {
        let store = MemStore::with_servers(&["s1"], 4);
        let mut s = session(&store);
        run(&mut s, &["SET", "k", "v"]).await.unwrap();
        run(&mut s, &["RPUSH", "l", "a"]).await.unwrap();
        assert_eq!(run(&mut s, &["TYPE", "k"]).await.unwrap(), Reply::Status("string".into()));
        assert_eq!(run(&mut s, &["TYPE", "l"]).await.unwrap(), Reply::Status("list".into()));
        assert_eq!(run(&mut s, &["TYPE", "nope"]).await.unwrap(), Reply::Status("none".into()));

        let err = run(&mut s, &["LLEN", "k"]).await.unwrap_err();
        assert!(matches!(err, Error::Store(ref m) if m.starts_with("WRONGTYPE")));
        assert!(matches!(run(&mut s, &["GET", "l"]).await, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_list_commands() {
        let store = MemStore::with_servers(&["s1"], 1);
        let mut s = session(&store);
        run(&mut s, &["RPUSH", "l", "a", "b", "c", "b"]).await.unwrap();
        assert_eq!(strings(run(&mut s, &["LRANGE", "l", "1", "2"]).await), vec!["b", "c"]);
        assert_eq!(strings(run(&mut s, &["LRANGE", "l", "0", "-1"]).await).len(), 4);
        assert_eq!(strings(run(&mut s, &["LRANGE", "l", "10", "20"]).await).len(), 0);
        assert_eq!(run(&mut s, &["LINDEX", "l", "-1"]).await.unwrap(), Reply::bulk("b"));
        assert_eq!(run(&mut s, &["LINDEX", "l", "9"]).await.unwrap(), Reply::Nil);

        assert_eq!(run(&mut s, &["LINSERT", "l", "BEFORE", "c", "x"]).await.unwrap(), Reply::Integer(5));
        assert_eq!(run(&mut s, &["LREM", "l", "-1", "b"]).await.unwrap(), Reply::Integer(1));
        assert_eq!(strings(run(&mut s, &["LRANGE", "l", "0", "-1"]).await), vec!["a", "b", "x", "c"]);

        let err = run(&mut s, &["LSET", "l", "10", "z"]).await.unwrap_err();
        assert!(matches!(err, Error::Store(ref m) if m == "ERR index out of range"));
    }

    #[tokio::test]
    async fn test_empty_collections_are_removed() {
        let store = MemStore::with_servers(&["s1"], 1);
        let mut s = session(&store);
        run(&mut s, &["SADD", "s", "m"]).await.unwrap();
        run(&mut s, &["SREM", "s", "m"]).await.unwrap();
        assert_eq!(run(&mut s, &["EXISTS", "s"]).await.unwrap(), Reply::Integer(0));
    }

    #[tokio::test]
    async fn test_zset_order_and_scores() {
        let store = MemStore::with_servers(&["s1"], 1);
        let mut s = session(&store);
        run(&mut s, &["ZADD", "z", "2", "b", "1.5", "a", "2", "a2"]).await.unwrap();
        assert_eq!(run(&mut s, &["ZADD", "z", "NX", "9", "b"]).await.unwrap(), Reply::Integer(0));
        assert_eq!(
            strings(run(&mut s, &["ZRANGEBYSCORE", "z", "-inf", "+inf", "WITHSCORES"]).await),
            vec!["a", "1.5", "a2", "2", "b", "2"]
        );
        assert_eq!(
            strings(run(&mut s, &["ZRANGEBYSCORE", "z", "(1.5", "2"]).await),
            vec!["a2", "b"]
        );
    }

    #[tokio::test]
    async fn test_keys_uses_glob() {
        let store = MemStore::with_servers(&["s1"], 1);
        let mut s = session(&store);
        run(&mut s, &["SET", "user:1", "a"]).await.unwrap();
        run(&mut s, &["SET", "user:2", "b"]).await.unwrap();
        run(&mut s, &["SET", "other", "c"]).await.unwrap();
        let mut keys = strings(run(&mut s, &["KEYS", "user:*"]).await);
        keys.sort();
        assert_eq!(keys, vec!["user:1", "user:2"]);
    }

    #[tokio::test]
    async fn test_select_isolates_databases() {
        let store = MemStore::with_servers(&["s1"], 2);
        let mut s = session(&store);
        run(&mut s, &["SET", "k", "v"]).await.unwrap();
        run(&mut s, &["SELECT", "1"]).await.unwrap();
        assert_eq!(run(&mut s, &["GET", "k"]).await.unwrap(), Reply::Nil);
        assert!(run(&mut s, &["SELECT", "2"]).await.is_err());
    }

    #[tokio::test]
    async fn test_connector_stats() {
        let store = MemStore::with_servers(&["s1", "s2"], 16);
        let mut s = session(&store);
        run(&mut s, &["SET", "a", "1"]).await.unwrap();
        run(&mut s, &["SET", "b", "2"]).await.unwrap();
        drop(s);

        assert_eq!(store.servers(), vec!["s1", "s2"]);
        assert_eq!(store.max_database_count("s1").await.unwrap(), 16);
        let keyspace = store.keyspace_stats("s1").await.unwrap();
        assert_eq!(keyspace.get("db0").map(|k| k.keys), Some(2));
        let stat = store.server_stats("s1").await.unwrap();
        assert!(stat.redis_version.ends_with("-radish"));
        assert_eq!(stat.connected_clients, 1);
        assert!(matches!(store.session("s3", 0).await, Err(Error::ServerNotFound(_))));
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(1.0), "1");
        assert_eq!(format_score(-5.0), "-5");
        assert_eq!(format_score(1.5), "1.5");
        assert_eq!(format_score(f64::NEG_INFINITY), "-inf");
    }
}
