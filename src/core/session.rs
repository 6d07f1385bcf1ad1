use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::error::AppError;
use crate::models::account::Account;
use crate::models::session::Session;
use crate::store::{load_or_default, save, BlobStore, SESSION_KEY};

/// Holds the single process-wide session, persisted under the `session`
/// key as either a one-element record or absent.
pub struct SessionHolder {
    store: Arc<dyn BlobStore>,
    write_lock: Mutex<()>,
}

impl SessionHolder {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.write_lock
            .lock()
            .map_err(|_| AppError::Internal("session lock poisoned".to_string()))
    }

    /// Replaces any existing session unconditionally.
    pub fn login(&self, account: &Account) -> Result<Session, AppError> {
        let _guard = self.lock()?;
        let session = Session::from(account);
        save(self.store.as_ref(), SESSION_KEY, &Some(session.clone()))?;
        info!(username = %session.username, role = ?session.role, "logged in");
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), AppError> {
        let _guard = self.lock()?;
        save(self.store.as_ref(), SESSION_KEY, &None::<Session>)?;
        info!("logged out");
        Ok(())
    }

    pub fn current(&self) -> Result<Option<Session>, AppError> {
        load_or_default(self.store.as_ref(), SESSION_KEY)
    }
}
