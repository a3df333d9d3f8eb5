// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{User, UserRepository};
use crate::error::{ErrorCode, RelayError};

/// `UserRepository` backed by a `sqlx` SQLite pool.
///
/// Migrations (`migrations/`) are applied once at server bring-up via
/// [`SqliteUserRepository::migrate`]; this type performs no schema
/// management of its own.
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RelayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::internal("failed to run database migrations", anyhow::anyhow!(e)))
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> Result<(), RelayError> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, password, require_change_password, refresh_token_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.require_change_password)
        .bind(&user.refresh_token_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RelayError::already_exists(format!("user '{}' already exists", user.name)))
            }
            Err(e) => Err(RelayError::from(e)),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RelayError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, password, require_change_password, refresh_token_id FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RelayError::from)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RelayError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, password, require_change_password, refresh_token_id FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(RelayError::from)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_refresh_token_id(&self, refresh_token_id: &str) -> Result<Option<User>, RelayError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, password, require_change_password, refresh_token_id FROM users WHERE refresh_token_id = ?",
        )
        .bind(refresh_token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RelayError::from)?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<User>, RelayError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, password, require_change_password, refresh_token_id FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RelayError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, user: &User) -> Result<(), RelayError> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, password = ?, require_change_password = ?, refresh_token_id = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.require_change_password)
        .bind(&user.refresh_token_id)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        if result.rows_affected() == 0 {
            return Err(RelayError::new(ErrorCode::NotFound, format!("user '{}' not found", user.id)));
        }
        Ok(())
    }

    async fn compare_and_update(&self, expected: &User, user: &User) -> Result<(), RelayError> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, password = ?, require_change_password = ?, refresh_token_id = ? \
             WHERE id = ? AND name = ? AND password = ? AND require_change_password = ? AND refresh_token_id IS ?",
        )
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.require_change_password)
        .bind(&user.refresh_token_id)
        .bind(&expected.id)
        .bind(&expected.name)
        .bind(&expected.password)
        .bind(expected.require_change_password)
        .bind(&expected.refresh_token_id)
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        if result.rows_affected() == 0 {
            return Err(RelayError::new(ErrorCode::OptimisticLock, format!("user '{}' changed concurrently", expected.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RelayError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RelayError::from)?;

        if result.rows_affected() == 0 {
            return Err(RelayError::new(ErrorCode::NotFound, format!("user '{id}' not found")));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    password: String,
    require_change_password: bool,
    refresh_token_id: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            password: row.password,
            require_change_password: row.require_change_password,
            refresh_token_id: row.refresh_token_id,
        }
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
