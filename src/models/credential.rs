use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::models::generate_id;

/// Decrypted marketplace access for one seller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub merchant_id: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("api_key", &"<redacted>")
            .field("merchant_id", &self.merchant_id)
            .finish()
    }
}

/// Persisted marketplace key, one per seller.
#[derive(Clone, FromRow)]
pub struct MarketplaceKey {
    pub id: String,
    pub user_id: String,
    pub api_key: String,
    pub merchant_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketplaceKey {
    pub fn new(user_id: String, api_key: String, merchant_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            user_id,
            api_key,
            merchant_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_credential(&self) -> Credential {
        Credential {
            user_id: self.user_id.clone(),
            api_key: self.api_key.clone(),
            merchant_id: self.merchant_id.clone(),
        }
    }
}

impl fmt::Debug for MarketplaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketplaceKey")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("merchant_id", &self.merchant_id)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}
