use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Vendor,
    Delivery,
}

/// A registered user. Accounts are append-only: created on register,
/// never modified or deleted afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub display_name: String,
}

/// Account as exposed over the API, with the password stripped.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub username: String,
    pub role: Role,
    pub display_name: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            username: account.username,
            role: account.role,
            display_name: account.display_name,
        }
    }
}
