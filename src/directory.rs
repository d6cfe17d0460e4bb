use async_trait::async_trait;

use crate::models::Id;

#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Resolves a user id to the address we can mail them at. Backed by the auth
/// user table; a user without a confirmed email resolves to `None`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn email_for(&self, user_id: Id) -> Result<Option<String>, DirectoryError>;
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    #[derive(Clone, Default)]
    pub struct InMemDirectory {
        emails: Arc<RwLock<HashMap<Id, String>>>,
    }

    impl InMemDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, user_id: Id, email: impl Into<String>) {
            self.emails.write().unwrap().insert(user_id, email.into());
        }
    }

    #[async_trait]
    impl UserDirectory for InMemDirectory {
        async fn email_for(&self, user_id: Id) -> Result<Option<String>, DirectoryError> {
            Ok(self.emails.read().unwrap().get(&user_id).cloned())
        }
    }
}

#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgDirectory {
        pool: Pool<Postgres>,
    }

    impl PgDirectory {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl UserDirectory for PgDirectory {
        async fn email_for(&self, user_id: Id) -> Result<Option<String>, DirectoryError> {
            sqlx::query_scalar::<_, Option<String>>("SELECT email FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map(Option::flatten)
                .map_err(|e| DirectoryError::Lookup(e.to_string()))
        }
    }
}
