use serde::{Deserialize, Serialize};

use crate::models::account::{Account, Role};

/// The single currently-authenticated principal, or absent. There is at
/// most one session process-wide; login overwrites it unconditionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub display_name: String,
}

impl From<&Account> for Session {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
            display_name: account.display_name.clone(),
        }
    }
}

/// Authenticated identity passed into every mutating ledger call. The
/// ledger enforces role checks against it rather than trusting callers.
#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    pub display_name: String,
}

impl From<&Session> for Principal {
    fn from(session: &Session) -> Self {
        Self {
            username: session.username.clone(),
            role: session.role,
            display_name: session.display_name.clone(),
        }
    }
}
