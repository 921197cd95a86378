use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::keys::{command, key_exists, Coordinate, Memo, Query, Value};
use crate::{Command, Connector, Error, Result};

/// Provider for string keys. A string is a single value: one page, no masking.
pub struct StringValues {
    connector: Arc<dyn Connector>,
    key: Coordinate,
    query: Query,
    value: Memo<Value>,
}

impl StringValues {
    pub fn new(connector: Arc<dyn Connector>, key: Coordinate, query: Query) -> Self {
        Self {
            connector,
            key,
            query,
            value: Memo::Unloaded,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub async fn value(&mut self, cancel: &CancellationToken) -> Result<&Value> {
        if !self.value.is_loaded() {
            let raw = command(
                self.connector.as_ref(),
                &self.key,
                Command::new("GET").arg(&self.key.key),
                cancel,
            )
            .await?
            .into_opt_string()?
            .ok_or_else(|| Error::KeyNotFound(self.key.key.clone()))?;
            self.value.set(Value::new(raw));
        }
        self.value.loaded()
    }

    pub async fn page_count(&mut self, _cancel: &CancellationToken) -> Result<usize> {
        Ok(1)
    }
}

/// Sets a string value, creating or overwriting the key.
pub async fn set_string(
    connector: &dyn Connector,
    key: &Coordinate,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    command(connector, key, Command::new("SET").arg(&key.key).arg(value), cancel).await?;
    Ok(())
}

/// Creates a string key. Fails with [`Error::Conflict`] if the key exists.
pub async fn add_string(
    connector: &dyn Connector,
    key: &Coordinate,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if key_exists(connector, key, cancel).await? {
        return Err(Error::Conflict(format!("key {} already exists", key.key)));
    }
    set_string(connector, key, value, cancel).await
}

/// Overwrites an existing key with a string. Fails with [`Error::KeyNotFound`] if absent.
pub async fn update_string(
    connector: &dyn Connector,
    key: &Coordinate,
    value: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if !key_exists(connector, key, cancel).await? {
        return Err(Error::KeyNotFound(key.key.clone()));
    }
    set_string(connector, key, value, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::testing::*;

    #[tokio::test]
    async fn test_string_value() {
        let store = store();
        let cancel = CancellationToken::new();
        set_string(store.as_ref(), &key("greeting"), "hello", &cancel)
            .await
            .unwrap();

        let mut provider = StringValues::new(store.clone(), key("greeting"), Query::default());
        let value = provider.value(&cancel).await.unwrap();
        assert_eq!(value, &Value::from("hello"));
        assert!(!value.is_binary);
        assert_eq!(provider.page_count(&cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_string_value_is_memoized() {
        let store = store();
        let cancel = CancellationToken::new();
        set_string(store.as_ref(), &key("k"), "first", &cancel).await.unwrap();

        let mut provider = StringValues::new(store.clone(), key("k"), Query::default());
        assert_eq!(provider.value(&cancel).await.unwrap().value, "first");

        set_string(store.as_ref(), &key("k"), "second", &cancel).await.unwrap();
        assert_eq!(provider.value(&cancel).await.unwrap().value, "first");
    }

    #[tokio::test]
    async fn test_binary_string() {
        let store = store();
        let cancel = CancellationToken::new();
        set_string(store.as_ref(), &key("bin"), "\u{0}\u{ff}", &cancel)
            .await
            .unwrap();
        let mut provider = StringValues::new(store.clone(), key("bin"), Query::default());
        assert!(provider.value(&cancel).await.unwrap().is_binary);
    }

    #[tokio::test]
    async fn test_add_and_update_guards() {
        let store = store();
        let cancel = CancellationToken::new();
        assert!(matches!(
            update_string(store.as_ref(), &key("k"), "v", &cancel).await,
            Err(Error::KeyNotFound(_))
        ));
        add_string(store.as_ref(), &key("k"), "v", &cancel).await.unwrap();
        assert!(matches!(
            add_string(store.as_ref(), &key("k"), "w", &cancel).await,
            Err(Error::Conflict(_))
        ));
        update_string(store.as_ref(), &key("k"), "w", &cancel).await.unwrap();

        let mut provider = StringValues::new(store.clone(), key("k"), Query::default());
        assert_eq!(provider.value(&cancel).await.unwrap().value, "w");
    }
}
