//! Parsing of the `INFO` command output.

use serde::Serialize;
use std::collections::BTreeMap;

/// General statistics of one server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerStat {
    pub connected_clients: i64,
    pub redis_version: String,
    pub uptime_in_seconds: i64,
    pub used_memory_human: String,
    pub used_memory_bytes: i64,
    pub max_memory_human: String,
    pub max_memory_bytes: i64,
}

/// Key counts of one database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeyspaceStat {
    pub keys: i64,
}

/// Parses the full `INFO` output into a [`ServerStat`]. Unknown fields are ignored.
pub fn parse_server_info(info: &str) -> ServerStat {
    let mut stat = ServerStat::default();
    for line in info.lines() {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let int_value = value.parse::<i64>().unwrap_or(0);
        match name {
            "used_memory_human" => stat.used_memory_human = value.to_string(),
            "used_memory" => stat.used_memory_bytes = int_value,
            "maxmemory_human" | "max_memory_human" => stat.max_memory_human = value.to_string(),
            "maxmemory" | "max_memory" => stat.max_memory_bytes = int_value,
            "redis_version" => stat.redis_version = value.to_string(),
            "uptime_in_seconds" => stat.uptime_in_seconds = int_value,
            "connected_clients" => stat.connected_clients = int_value,
            _ => {}
        }
    }
    stat
}

/// Parses `INFO keyspace` output. Rows look like `db0:keys=5,expires=0,avg_ttl=0`.
pub fn parse_keyspace_info(info: &str) -> BTreeMap<String, KeyspaceStat> {
    let mut stats = BTreeMap::new();
    for line in info.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_keyspace_line(line) {
            Some((db, stat)) => {
                stats.insert(db, stat);
            }
            None => log::warn!("skipping malformed keyspace row {:?}", line),
        }
    }
    stats
}

fn parse_keyspace_line(line: &str) -> Option<(String, KeyspaceStat)> {
    let (db, fields) = line.split_once(':')?;
    if !db.starts_with("db") {
        return None;
    }
    let mut stat = KeyspaceStat::default();
    for field in fields.split(',') {
        if let Some(("keys", value)) = field.split_once('=') {
            stat.keys = value.parse().ok()?;
        }
    }
    Some((db.to_string(), stat))
}

/// Formats a byte count with a binary unit suffix, truncating: `10240` is `10K`.
pub fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["K", "MB", "GB", "TB"];
    let mut size = bytes;
    let mut human = format!("{}B", size);
    for unit in UNITS {
        if size / 1024 == 0 {
            break;
        }
        size /= 1024;
        human = format!("{}{}", size, unit);
    }
    human
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyspace_row() {
        let stats = parse_keyspace_info("# Keyspace\r\ndb0:keys=5,expires=0,avg_ttl=0\r\ndb3:keys=12,expires=1,avg_ttl=10\r\n");
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["db0"], KeyspaceStat { keys: 5 });
        assert_eq!(stats["db3"], KeyspaceStat { keys: 12 });
    }

    #[test]
    fn test_malformed_keyspace_row_skipped() {
        let stats = parse_keyspace_info("db0:keys=abc\r\nnonsense\r\ndb1:keys=1");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["db1"].keys, 1);
    }

    #[test]
    fn test_server_info() {
        let info = "# Server\r\nredis_version:7.2.4\r\nuptime_in_seconds:42\r\n# Clients\r\nconnected_clients:3\r\n# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\nmaxmemory:0\r\n";
        let stat = parse_server_info(info);
        assert_eq!(stat.redis_version, "7.2.4");
        assert_eq!(stat.uptime_in_seconds, 42);
        assert_eq!(stat.connected_clients, 3);
        assert_eq!(stat.used_memory_bytes, 1048576);
        assert_eq!(stat.used_memory_human, "1.00M");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0B");
        assert_eq!(human_size(100), "100B");
        assert_eq!(human_size(10240), "10K");
        assert_eq!(human_size(1024 * 1024), "1MB");
        assert_eq!(human_size(1024 * 1024 * 1024), "1GB");
    }
}
