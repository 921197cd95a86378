use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::keys::pagination::{page_of, pages_count};
use crate::keys::{command, execute, open, Coordinate, Memo, PageMemo, Query, Value, ZSetMember};
use crate::{Command, Connector, Error, Result};

/// Provider for sorted-set keys. Members are ordered by ascending score and
/// the mask applies to member text.
pub struct ZSetValues {
    connector: Arc<dyn Connector>,
    key: Coordinate,
    query: Query,
    page: PageMemo<ZSetMember>,
    total: Memo<usize>,
}

impl ZSetValues {
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

    pub async fn values(&mut self, cancel: &CancellationToken) -> Result<&[ZSetMember]> {
        if !self.page.is_loaded() {
            self.load(cancel).await?;
        }
        self.page.page()
    }

    pub async fn page_count(&mut self, cancel: &CancellationToken) -> Result<usize> {
        if !self.total.is_loaded() {
            if self.query.is_masked() {
                self.load(cancel).await?;
            } else {
                let len = command(
                    self.connector.as_ref(),
                    &self.key,
                    Command::new("ZCARD").arg(&self.key.key),
                    cancel,
                )
                .await?
                .into_int()?;
                self.total.set(len.max(0) as usize);
            }
        }
        Ok(pages_count(*self.total.loaded()?, self.query.page_size()))
    }

    async fn load(&mut self, cancel: &CancellationToken) -> Result<()> {
        let flat = command(
            self.connector.as_ref(),
            &self.key,
            Command::new("ZRANGEBYSCORE")
                .arg(&self.key.key)
                .arg("-inf")
                .arg("+inf")
                .arg("WITHSCORES"),
            cancel,
        )
        .await?
        .into_strings()?;

        let mut members = into_members(flat)?;
        if self.query.is_masked() {
            let mask = self.query.mask();
            members.retain(|m| mask.matches(&m.member.value));
            self.total.set(members.len());
        }
        self.page.set(page_of(members, self.query.page_size(), self.query.page()).ok());
        Ok(())
    }
}

/// Pairs an alternating member/score sequence. A score that is not an
/// integer aborts the whole conversion.
fn into_members(flat: Vec<String>) -> Result<Vec<ZSetMember>> {
    if flat.len() % 2 != 0 {
        return Err(Error::Protocol(format!(
            "sorted set reply has an odd number of elements ({})",
            flat.len()
        )));
    }
    let mut members = Vec::with_capacity(flat.len() / 2);
    let mut items = flat.into_iter();
    while let (Some(member), Some(score)) = (items.next(), items.next()) {
        let score = score.parse::<i64>().map_err(|_| {
            Error::Corruption(format!("score {:?} of member {:?} is not an integer", score, member))
        })?;
        members.push(ZSetMember {
            score,
            member: Value::new(member),
        });
    }
    Ok(members)
}

/// Adds a member unless it is already present.
pub async fn add_zset_member(
    connector: &dyn Connector,
    key: &Coordinate,
    member: &str,
    score: i64,
    cancel: &CancellationToken,
) -> Result<()> {
    command(
        connector,
        key,
        Command::new("ZADD").arg(&key.key).arg("NX").int_arg(score).arg(member),
        cancel,
    )
    .await?;
    Ok(())
}

/// Replaces `member` by `new_member` with `score`.
///
/// Done as two steps, remove then add, and not atomic.
pub async fn update_zset_member(
    connector: &dyn Connector,
    key: &Coordinate,
    member: &str,
    new_member: &str,
    score: i64,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut session = open(connector, &key.server, key.db, cancel).await?;
    let session = session.as_mut();
    execute(session, Command::new("ZREM").arg(&key.key).arg(member), cancel).await?;
    execute(
        session,
        Command::new("ZADD").arg(&key.key).arg("NX").int_arg(score).arg(new_member),
        cancel,
    )
    .await?;
    Ok(())
}

pub async fn delete_zset_member(
    connector: &dyn Connector,
    key: &Coordinate,
    member: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    command(connector, key, Command::new("ZREM").arg(&key.key).arg(member), cancel).await?;
    Ok(())
}
