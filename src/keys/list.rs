use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::keys::pagination::{page_of, pages_count};
use crate::keys::{command, execute, open, Coordinate, ListElement, Memo, PageMemo, Query, Value};
use crate::{Command, Connector, Error, Result};

/// Placeholder written over a list element so it can be addressed by value.
///
/// Index-based insert and delete rely on it. If a list legitimately holds this
/// exact string, those operations may hit the wrong element.
pub const LIST_SENTINEL: &str = "__radish_list_placeholder__";

/// Provider for list keys.
///
/// Elements keep their offset in the whole list, so an index read from a
/// masked page can be fed back to [`update_list_element`] or
/// [`delete_list_element`].
pub struct ListValues {
    connector: Arc<dyn Connector>,
    key: Coordinate,
    query: Query,
    page: PageMemo<ListElement>,
    total: Memo<usize>,
}

impl ListValues {
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

    pub async fn values(&mut self, cancel: &CancellationToken) -> Result<&[ListElement]> {
        if !self.page.is_loaded() {
            if self.query.is_masked() {
                self.load_masked(cancel).await?;
            } else {
                let page = match self.window() {
                    Some(window) => Some(self.fetch_page(window, cancel).await?),
                    None => None,
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
                    Command::new("LLEN").arg(&self.key.key),
                    cancel,
                )
                .await?
                .into_int()?;
                self.total.set(len.max(0) as usize);
            }
        }
        Ok(pages_count(*self.total.loaded()?, self.query.page_size()))
    }

    /// First offset of the page and the inclusive `LRANGE` bounds. `None` when
    /// the page starts beyond any index a list can have.
    fn window(&self) -> Option<(usize, i64, i64)> {
        let size = self.query.page_size();
        let first = self.query.page().saturating_sub(1).checked_mul(size)?;
        let start = i64::try_from(first).ok()?;
        let last = first.saturating_add(size - 1);
        let stop = i64::try_from(last).unwrap_or(i64::MAX);
        Some((first, start, stop))
    }

    /// Reads just the window of the requested page.
    async fn fetch_page(
        &self,
        (first, start, stop): (usize, i64, i64),
        cancel: &CancellationToken,
    ) -> Result<Vec<ListElement>> {
        let values = command(
            self.connector.as_ref(),
            &self.key,
            Command::new("LRANGE").arg(&self.key.key).int_arg(start).int_arg(stop),
            cancel,
        )
        .await?
        .into_strings()?;
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(i, v)| ListElement {
                index: first + i,
                value: Value::new(v),
            })
            .collect())
    }

    /// Reads the whole list, keeps the elements matching the mask and
    /// fills both the filtered total and the page.
    async fn load_masked(&mut self, cancel: &CancellationToken) -> Result<()> {
        let values = command(
            self.connector.as_ref(),
            &self.key,
            Command::new("LRANGE").arg(&self.key.key).int_arg(0).int_arg(-1),
            cancel,
        )
        .await?
        .into_strings()?;

        let mask = self.query.mask();
        let matched: Vec<ListElement> = values
            .into_iter()
            .enumerate()
            .filter(|(_, v)| mask.matches(v))
            .map(|(index, v)| ListElement {
                index,
                value: Value::new(v),
            })
            .collect();

        self.total.set(matched.len());
        self.page.set(page_of(matched, self.query.page_size(), self.query.page()).ok());
        Ok(())
    }
}

fn list_index(index: usize) -> Result<i64> {
    i64::try_from(index)
        .map_err(|_| Error::InvalidArgument(format!("list index {} is out of range", index)))
}

/// Appends a value to the tail of a list, creating the list if needed.
pub async fn append_to_list(
    connector: &dyn Connector,
    key: &Coordinate,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    command(connector, key, Command::new("RPUSH").arg(&key.key).arg(value), cancel).await?;
    Ok(())
}

/// Inserts `value` before the element currently at `index`, or appends it
/// when `index` is past the end.
///
/// Not atomic. The element at `index` is swapped for [`LIST_SENTINEL`], the
/// value is inserted before the sentinel and the displaced element is written
/// back.
pub async fn insert_into_list(
    connector: &dyn Connector,
    key: &Coordinate,
    index: usize,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let at = list_index(index)?;
    let mut session = open(connector, &key.server, key.db, cancel).await?;
    let session = session.as_mut();

    // Raw bytes: the element is written back and must survive unchanged.
    let pivot = execute(session, Command::new("LINDEX").arg(&key.key).int_arg(at), cancel)
        .await?
        .into_opt_bytes()?;
    let Some(pivot) = pivot else {
        execute(session, Command::new("RPUSH").arg(&key.key).arg(value), cancel).await?;
        return Ok(());
    };

    execute(
        session,
        Command::new("LSET").arg(&key.key).int_arg(at).arg(LIST_SENTINEL),
        cancel,
    )
    .await?;
    execute(
        session,
        Command::new("LINSERT")
            .arg(&key.key)
            .arg("BEFORE")
            .arg(LIST_SENTINEL)
            .arg(value),
        cancel,
    )
    .await?;
    execute(
        session,
        Command::new("LSET")
            .arg(&key.key)
            .int_arg(at.saturating_add(1))
            .arg(pivot),
        cancel,
    )
    .await?;
    Ok(())
}

/// Replaces the element at `index`.
pub async fn update_list_element(
    connector: &dyn Connector,
    key: &Coordinate,
    index: usize,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    command(
        connector,
        key,
        Command::new("LSET").arg(&key.key).int_arg(list_index(index)?).arg(value),
        cancel,
    )
    .await?;
    Ok(())
}

/// Removes the element at `index`.
///
/// Not atomic. The element is overwritten with [`LIST_SENTINEL`] and the
/// first occurrence of the sentinel is removed.
pub async fn delete_list_element(
    connector: &dyn Connector,
    key: &Coordinate,
    index: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let at = list_index(index)?;
    let mut session = open(connector, &key.server, key.db, cancel).await?;
    let session = session.as_mut();
    execute(
        session,
        Command::new("LSET").arg(&key.key).int_arg(at).arg(LIST_SENTINEL),
        cancel,
    )
    .await?;
    execute(
        session,
        Command::new("LREM").arg(&key.key).int_arg(1).arg(LIST_SENTINEL),
        cancel,
    )
    .await?;
    Ok(())
}
