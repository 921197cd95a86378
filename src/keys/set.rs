use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::keys::pagination::{page_of, pages_count};
use crate::keys::{command, execute, open, Coordinate, Memo, PageMemo, Query, Value};
use crate::{Command, Connector, Result};

/// Provider for set keys. Members come back in the store's own order.
pub struct SetValues {
    connector: Arc<dyn Connector>,
    key: Coordinate,
    query: Query,
    page: PageMemo<Value>,
    total: Memo<usize>,
}

impl SetValues {
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

    pub async fn values(&mut self, cancel: &CancellationToken) -> Result<&[Value]> {
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
                    Command::new("SCARD").arg(&self.key.key),
                    cancel,
                )
                .await?
                .into_int()?;
                self.total.set(len.max(0) as usize);
            }
        }
        Ok(pages_count(*self.total.loaded()?, self.query.page_size()))
    }

    /// Reads all members, filters them when masked and cuts the page. The
    /// filtered total is recorded before the page is cut.
    async fn load(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut members = self.fetch_members(cancel).await?;
        if self.query.is_masked() {
            let mask = self.query.mask();
            members.retain(|m| mask.matches(m));
            self.total.set(members.len());
        }
        let page = page_of(members, self.query.page_size(), self.query.page()).ok();
        self.page.set(page.map(|page| page.into_iter().map(Value::new).collect()));
        Ok(())
    }

    async fn fetch_members(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        command(
            self.connector.as_ref(),
            &self.key,
            Command::new("SMEMBERS").arg(&self.key.key),
            cancel,
        )
        .await?
        .into_strings()
    }
}

pub async fn add_set_member(
    connector: &dyn Connector,
    key: &Coordinate,
    member: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    command(connector, key, Command::new("SADD").arg(&key.key).arg(member), cancel).await?;
    Ok(())
}

/// Replaces `member` with `new_member`.
///
/// Done as two steps, remove then add, and not atomic.
pub async fn replace_set_member(
    connector: &dyn Connector,
    key: &Coordinate,
    member: &str,
    new_member: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut session = open(connector, &key.server, key.db, cancel).await?;
    let session = session.as_mut();
    execute(session, Command::new("SREM").arg(&key.key).arg(member), cancel).await?;
    execute(session, Command::new("SADD").arg(&key.key).arg(new_member), cancel).await?;
    Ok(())
}

pub async fn delete_set_member(
    connector: &dyn Connector,
    key: &Coordinate,
    member: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    command(connector, key, Command::new("SREM").arg(&key.key).arg(member), cancel).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::testing::*;
    use crate::Error;

    async fn seeded(members: &[&str]) -> Arc<crate::engine::MemStore> {
        let store = store();
        let mut cmd = Command::new("SADD").arg("set");
        for m in members {
            cmd = cmd.arg(m);
        }
        seed(&store, vec![cmd]).await;
        store
    }

    fn names(values: &[Value]) -> Vec<&str> {
        values.iter().map(|v| v.value.as_str()).collect()
    }

    #[tokio::test]
    async fn test_unmasked_paging() {
        let store = seeded(&["a", "b", "c"]).await;
        let cancel = CancellationToken::new();
        let mut provider = SetValues::new(store.clone(), key("set"), Query::new(2, 2, "*").unwrap());
        assert_eq!(names(provider.values(&cancel).await.unwrap()), vec!["c"]);
        assert_eq!(provider.page_count(&cancel).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_masked_paging() {
        let store = seeded(&["apple", "avocado", "banana", "apricot"]).await;
        let cancel = CancellationToken::new();
        let mut provider = SetValues::new(store.clone(), key("set"), Query::new(1, 2, "a*").unwrap());
        assert_eq!(provider.page_count(&cancel).await.unwrap(), 2);
        assert_eq!(names(provider.values(&cancel).await.unwrap()), vec!["apple", "apricot"]);
    }

    #[tokio::test]
    async fn test_masked_page_count_survives_page_past_end() {
        let store = seeded(&["apple", "banana"]).await;
        let cancel = CancellationToken::new();
        let mut provider = SetValues::new(store.clone(), key("set"), Query::new(5, 2, "a*").unwrap());
        assert_eq!(provider.page_count(&cancel).await.unwrap(), 1);
        assert!(matches!(provider.values(&cancel).await, Err(Error::PageNotFound)));
    }

    #[tokio::test]
    async fn test_mutations() {
        let store = seeded(&["a", "b"]).await;
        let cancel = CancellationToken::new();
        let set = key("set");
        add_set_member(store.as_ref(), &set, "c", &cancel).await.unwrap();
        replace_set_member(store.as_ref(), &set, "a", "z", &cancel).await.unwrap();
        delete_set_member(store.as_ref(), &set, "b", &cancel).await.unwrap();
        let mut provider = SetValues::new(store.clone(), set, Query::default());
        assert_eq!(names(provider.values(&cancel).await.unwrap()), vec!["c", "z"]);
    }

    #[tokio::test]
    async fn test_page_past_end_is_not_reread() {
        let store = seeded(&["apple", "banana"]).await;
        let cancel = CancellationToken::new();
        let mut provider = SetValues::new(store.clone(), key("set"), Query::new(3, 1, "a*").unwrap());
        assert_eq!(provider.page_count(&cancel).await.unwrap(), 1);
        assert!(matches!(provider.values(&cancel).await, Err(Error::PageNotFound)));

        add_set_member(store.as_ref(), &key("set"), "avocado", &cancel).await.unwrap();
        add_set_member(store.as_ref(), &key("set"), "apricot", &cancel).await.unwrap();
        assert!(matches!(provider.values(&cancel).await, Err(Error::PageNotFound)));
        assert_eq!(provider.page_count(&cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_mask_yields_empty_page() {
        let store = seeded(&["abc", "abc\\"]).await;
        let cancel = CancellationToken::new();
        let query = Query::new(1, 10, "abc\\").unwrap();
        let mut provider = SetValues::new(store.clone(), key("set"), query);
        assert!(provider.values(&cancel).await.unwrap().is_empty());
        assert_eq!(provider.page_count(&cancel).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_cancelled_between_steps() {
        let store = seeded(&["a", "b"]).await;
        let token = CancellationToken::new();
        let connector = CancelAfter::new(store.clone(), token.clone(), 1);
        let res = replace_set_member(&connector, &key("set"), "a", "z", &token).await;
        assert!(matches!(res, Err(Error::Cancelled)));

        // The removal went through, the addition never ran.
        let mut provider = SetValues::new(store.clone(), key("set"), Query::default());
        let cancel = CancellationToken::new();
        assert_eq!(names(provider.values(&cancel).await.unwrap()), vec!["b"]);
    }
}
