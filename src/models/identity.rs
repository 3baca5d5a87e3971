//! Store and manager identities plus the directory rows they come from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::de;

/// A signed-in store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreIdentity {
    #[serde(deserialize_with = "de::lenient_string")]
    pub id: String,
    pub name: String,
}

/// A signed-in regional manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerIdentity {
    #[serde(deserialize_with = "de::lenient_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// Store row as kept by the user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreAccount {
    #[serde(deserialize_with = "de::lenient_string")]
    pub id: String,
    pub name: String,
    pub password_hash: String,
}

impl StoreAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, password: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            password_hash: hash_password(password),
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        self.password_hash.eq_ignore_ascii_case(&hash_password(password))
    }

    pub fn identity(&self) -> StoreIdentity {
        StoreIdentity {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Manager row as kept by the user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerAccount {
    #[serde(deserialize_with = "de::lenient_string")]
    pub id: String,
    pub name: String,
    pub password_hash: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl ManagerAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, password: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            password_hash: hash_password(password),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn verify(&self, password: &str) -> bool {
        self.password_hash.eq_ignore_ascii_case(&hash_password(password))
    }

    pub fn identity(&self) -> ManagerIdentity {
        ManagerIdentity {
            id: self.id.clone(),
            name: self.name.clone(),
            region: self.region.clone(),
        }
    }
}

/// Result of a manager lookup. The two failure cases get different messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerLookup {
    NotFound,
    WrongPassword,
    Found(ManagerIdentity),
}

/// Hex SHA-256 digest stored in the directory's `password_hash` column.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
