use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::StoreResult;

/// Raw key-value payload read from or written to a store address.
pub type SecretPayload = Map<String, Value>;

/// Blocking interface to a hierarchical secret store.
///
/// Addresses are logical paths such as `secret/data/app/db`. Entry names
/// returned by [`SecretStore::list`] that end with `/` denote containers.
/// `Ok(None)` means "nothing at this address" and is distinct from a failure.
pub trait SecretStore: Send + Sync {
    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>>;
    fn read(&self, path: &str) -> StoreResult<Option<SecretPayload>>;
    fn write(&self, path: &str, payload: SecretPayload) -> StoreResult<()>;
    fn delete(&self, path: &str) -> StoreResult<()>;

    /// Check that the store is reachable and the configured credentials work.
    fn probe(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl<T> SecretStore for Arc<T>
where
    T: SecretStore + ?Sized,
{
    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        (**self).list(path)
    }

    fn read(&self, path: &str) -> StoreResult<Option<SecretPayload>> {
        (**self).read(path)
    }

    fn write(&self, path: &str, payload: SecretPayload) -> StoreResult<()> {
        (**self).write(path, payload)
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        (**self).delete(path)
    }

    fn probe(&self) -> StoreResult<()> {
        (**self).probe()
    }
}

impl<T> SecretStore for Box<T>
where
    T: SecretStore + ?Sized,
{
    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        (**self).list(path)
    }

    fn read(&self, path: &str) -> StoreResult<Option<SecretPayload>> {
        (**self).read(path)
    }

    fn write(&self, path: &str, payload: SecretPayload) -> StoreResult<()> {
        (**self).write(path, payload)
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        (**self).delete(path)
    }

    fn probe(&self) -> StoreResult<()> {
        (**self).probe()
    }
}
