pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

/// Logical keys used by the core components.
pub const USERS_KEY: &str = "users";
pub const ORDERS_KEY: &str = "orders";
pub const SESSION_KEY: &str = "session";

/// Key-value blob persistence with whole-collection semantics: no partial
/// updates, no transactions. Blobs are JSON documents.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, blob: &str) -> Result<(), AppError>;
}

/// Decode a stored collection. A missing or unparseable blob fails closed
/// as the default (empty) value rather than crashing.
pub fn load_or_default<T>(store: &dyn BlobStore, key: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    let Some(blob) = store.get(key)? else {
        return Ok(T::default());
    };

    match serde_json::from_str(&blob) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "corrupt blob; treating collection as empty");
            Ok(T::default())
        }
    }
}

pub fn save<T>(store: &dyn BlobStore, key: &str, value: &T) -> Result<(), AppError>
where
    T: Serialize,
{
    let blob = serde_json::to_string(value)
        .map_err(|err| AppError::Internal(format!("failed to encode {key}: {err}")))?;
    store.set(key, &blob)
}
