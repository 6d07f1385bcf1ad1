use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::error::AppError;
use crate::models::account::{Account, Role};
use crate::store::{load_or_default, save, BlobStore, USERS_KEY};

/// Registered accounts, projected from the `users` key. Accounts are only
/// ever appended; register is the sole mutation.
pub struct Directory {
    store: Arc<dyn BlobStore>,
    // Serializes the read-modify-write of the whole account list.
    write_lock: Mutex<()>,
}

impl Directory {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.write_lock
            .lock()
            .map_err(|_| AppError::Internal("directory lock poisoned".to_string()))
    }

    fn accounts(&self) -> Result<Vec<Account>, AppError> {
        load_or_default(self.store.as_ref(), USERS_KEY)
    }

    pub fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
        display_name: &str,
    ) -> Result<Account, AppError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "username and password are required".to_string(),
            ));
        }

        let _guard = self.lock()?;
        let mut accounts = self.accounts()?;

        if accounts.iter().any(|a| a.username == username) {
            return Err(AppError::DuplicateUsername(username.to_string()));
        }

        let display_name = display_name.trim();
        let account = Account {
            username: username.to_string(),
            password: password.to_string(),
            role,
            display_name: if display_name.is_empty() {
                username.to_string()
            } else {
                display_name.to_string()
            },
        };

        accounts.push(account.clone());
        save(self.store.as_ref(), USERS_KEY, &accounts)?;

        info!(username = %account.username, role = ?account.role, "account registered");
        Ok(account)
    }

    /// Exact match on username, password, and role. A role mismatch fails
    /// the same way as a wrong password.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, AppError> {
        self.accounts()?
            .into_iter()
            .find(|a| a.username == username && a.password == password && a.role == role)
            .ok_or(AppError::InvalidCredentials)
    }

    pub fn accounts_by_role(&self, role: Role) -> Result<Vec<Account>, AppError> {
        Ok(self
            .accounts()?
            .into_iter()
            .filter(|a| a.role == role)
            .collect())
    }

    pub fn find(&self, username: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts()?
            .into_iter()
            .find(|a| a.username == username))
    }

    /// Seeds the demo trio when no accounts exist. No-op otherwise.
    pub fn seed_demo(&self) -> Result<(), AppError> {
        let _guard = self.lock()?;
        let mut accounts = self.accounts()?;
        if !accounts.is_empty() {
            return Ok(());
        }

        for (username, password, role, name) in [
            ("alice", "alice123", Role::Customer, "Alice"),
            ("vendor", "vendor123", Role::Vendor, "ZAR Admin"),
            ("baba", "baba123", Role::Delivery, "Baba Delivery"),
        ] {
            accounts.push(Account {
                username: username.to_string(),
                password: password.to_string(),
                role,
                display_name: name.to_string(),
            });
        }

        save(self.store.as_ref(), USERS_KEY, &accounts)?;
        info!("demo accounts seeded");
        Ok(())
    }
}
