use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::keys::pagination::{page_of, page_range, pages_count};
use crate::keys::{command, execute, open, Coordinate, HashEntry, Memo, PageMemo, Query, Value};
use crate::{Command, Connector, Error, Result};

/// Provider for hash keys. The mask applies to field names and the page size
/// counts field/value pairs.
pub struct HashValues {
    connector: Arc<dyn Connector>,
    key: Coordinate,
    query: Query,
    page: PageMemo<HashEntry>,
    total: Memo<usize>,
}

impl HashValues {
    pub fn new(connector: Arc<dyn Connector>, key: Coordinate, query: Query) -> Self {
        Self {
            connector,
            key,
            query,
            page: Memo::Unloaded,
            total: Memo::Unloaded,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub async fn values(&mut self, cancel: &CancellationToken) -> Result<&[HashEntry]> {
        if !self.page.is_loaded() {
            if self.query.is_masked() {
                self.load_masked(cancel).await?;
            } else {
                let mut flat = self.fetch_all(cancel).await?;
                // The reply is flat, two items per pair.
                let size = self.query.page_size().saturating_mul(2);
                let page = match page_range(flat.len(), size, self.query.page()) {
                    Ok((start, end)) => {
                        flat.truncate(end);
                        Some(into_entries(flat.split_off(start))?)
                    }
                    Err(Error::PageNotFound) => None,
                    Err(e) => return Err(e),
                };
                self.page.set(page);
            }
        }
        self.page.page()
    }

    pub async fn page_count(&mut self, cancel: &CancellationToken) -> Result<usize> {
        if !self.total.is_loaded() {
            if self.query.is_masked() {
                self.load_masked(cancel).await?;
            } else {
                let len = command(
                    self.connector.as_ref(),
                    &self.key,
                    Command::new("HLEN").arg(&self.key.key),
                    cancel,
                )
                .await?
                .into_int()?;
                self.total.set(len.max(0) as usize);
            }
        }
        Ok(pages_count(*self.total.loaded()?, self.query.page_size()))
    }

    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        command(
            self.connector.as_ref(),
            &self.key,
            Command::new("HGETALL").arg(&self.key.key),
            cancel,
        )
        .await?
        .into_strings()
    }

    async fn load_masked(&mut self, cancel: &CancellationToken) -> Result<()> {
        let flat = self.fetch_all(cancel).await?;
        let mask = self.query.mask();
        let matched: Vec<HashEntry> = into_entries(flat)?
            .into_iter()
            .filter(|e| mask.matches(&e.field))
            .collect();
        self.total.set(matched.len());
        self.page.set(page_of(matched, self.query.page_size(), self.query.page()).ok());
        Ok(())
    }
}

/// Pairs an alternating field/value sequence into entries.
fn into_entries(flat: Vec<String>) -> Result<Vec<HashEntry>> {
    if flat.len() % 2 != 0 {
        return Err(Error::Protocol(format!(
            "hash reply has an odd number of elements ({})",
            flat.len()
        )));
    }
    let mut entries = Vec::with_capacity(flat.len() / 2);
    let mut items = flat.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        entries.push(HashEntry {
            field,
            value: Value::new(value),
        });
    }
    Ok(entries)
}

fn field_not_found(key: &Coordinate, field: &str) -> Error {
    Error::KeyNotFound(format!("{} field {}", key.key, field))
}

pub async fn hash_field_exists(
    connector: &dyn Connector,
    key: &Coordinate,
    field: &str,
    cancel: &CancellationToken,
) -> Result<bool> {
    command(connector, key, Command::new("HEXISTS").arg(&key.key).arg(field), cancel)
        .await?
        .into_bool()
}

/// Sets a field, creating or overwriting it.
pub async fn set_hash_field(
    connector: &dyn Connector,
    key: &Coordinate,
    field: &str,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    command(
        connector,
        key,
        Command::new("HSET").arg(&key.key).arg(field).arg(value),
        cancel,
    )
    .await?;
    Ok(())
}

/// Creates a field. Fails with [`Error::Conflict`] if it exists.
pub async fn add_hash_field(
    connector: &dyn Connector,
    key: &Coordinate,
    field: &str,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if hash_field_exists(connector, key, field, cancel).await? {
        return Err(Error::Conflict(format!(
            "hash key {} already exists in hash {}",
            field, key.key
        )));
    }
    set_hash_field(connector, key, field, value, cancel).await
}

/// Updates the value of `field` and optionally renames it to `new_field`.
///
/// A rename fails with [`Error::Conflict`] when `new_field` already exists.
/// It is done as two plain steps, delete then set, without `MULTI`/`EXEC`.
/// A concurrent reader can observe the hash with neither field, and so can
/// the caller when `cancel` fires between the steps.
pub async fn update_hash_field(
    connector: &dyn Connector,
    key: &Coordinate,
    field: &str,
    new_field: &str,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if !hash_field_exists(connector, key, field, cancel).await? {
        return Err(field_not_found(key, field));
    }
    if field == new_field {
        return set_hash_field(connector, key, field, value, cancel).await;
    }
    if hash_field_exists(connector, key, new_field, cancel).await? {
        return Err(Error::Conflict(format!(
            "hash key {} already exists in hash {}",
            new_field, key.key
        )));
    }

    let mut session = open(connector, &key.server, key.db, cancel).await?;
    let session = session.as_mut();
    execute(session, Command::new("HDEL").arg(&key.key).arg(field), cancel).await?;
    execute(
        session,
        Command::new("HSET").arg(&key.key).arg(new_field).arg(value),
        cancel,
    )
    .await?;
    Ok(())
}

/// Deletes a field. Fails with [`Error::KeyNotFound`] if it is absent.
pub async fn delete_hash_field(
    connector: &dyn Connector,
    key: &Coordinate,
    field: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let removed = command(connector, key, Command::new("HDEL").arg(&key.key).arg(field), cancel)
        .await?
        .into_int()?;
    if removed == 0 {
        return Err(field_not_found(key, field));
    }
    Ok(())
}
