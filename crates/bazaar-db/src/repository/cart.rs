//! # Cart Repository
//!
//! Per-user cart rows in `user_cart`, read back joined with `products`.
//!
//! ## Upsert Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  upsert("u-1", "p-1", 3)                                                │
//! │                                                                         │
//! │  INSERT INTO user_cart (user_id, product_id, quantity, ...)             │
//! │  ON CONFLICT (user_id, product_id)                                      │
//! │  DO UPDATE SET quantity = excluded.quantity                             │
//! │                                                                         │
//! │  no row     → row created with quantity 3                               │
//! │  row (q=1)  → quantity replaced with 3 (not incremented)                │
//! │  row (q=3)  → unchanged                                                 │
//! │                                                                         │
//! │  One statement, one row per (user, product), so repeating the call or  │
//! │  racing it from another device never produces a duplicate line.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::validation::validate_quantity;
use bazaar_core::{LineItem, Money, ProductSnapshot};
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

// =============================================================================
// Row
// =============================================================================

/// A `user_cart` row joined with its product's display fields.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CartRow {
    pub product_id: String,
    pub quantity: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub discount_price_cents: Option<i64>,
}

impl CartRow {
    /// Builds the line item the engine publishes.
    pub fn into_line_item(self) -> LineItem {
        let product = ProductSnapshot {
            id: self.product_id.into(),
            name: self.name,
            image_url: self.image_url,
            price: Money::from_cents(self.price_cents),
            discount_price: self.discount_price_cents.map(Money::from_cents),
        };
        LineItem::new(product, self.quantity)
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for `user_cart`.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// All of a user's rows, oldest first.
    ///
    /// Returns an empty vector when the user has no cart.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<CartRow>> {
        let rows = sqlx::query_as::<_, CartRow>(
            r#"
            SELECT
                c.product_id,
                c.quantity,
                p.name,
                p.image_url,
                p.price_cents,
                p.discount_price_cents
            FROM user_cart c
            INNER JOIN products p ON p.id = c.product_id
            WHERE c.user_id = ?1
            ORDER BY c.created_at, c.product_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(user_id = %user_id, rows = rows.len(), "Loaded cart rows");
        Ok(rows)
    }

    /// Sets the quantity of one product in a user's cart.
    ///
    /// ## Returns
    /// * `Err(DbError::CheckViolation)` - quantity out of range, nothing sent
    /// * `Err(DbError::ForeignKeyViolation)` - unknown product
    pub async fn upsert(&self, user_id: &str, product_id: &str, quantity: i64) -> DbResult<()> {
        validate_quantity(quantity).map_err(|e| DbError::check(e.to_string()))?;

        debug!(user_id = %user_id, product_id = %product_id, quantity, "Upserting cart row");

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO user_cart (user_id, product_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes one row. Returns whether a row existed.
    pub async fn remove(&self, user_id: &str, product_id: &str) -> DbResult<bool> {
        debug!(user_id = %user_id, product_id = %product_id, "Removing cart row");

        let result = sqlx::query("DELETE FROM user_cart WHERE user_id = ?1 AND product_id = ?2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes all of a user's rows. Returns how many were deleted.
    pub async fn clear(&self, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM user_cart WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        debug!(user_id = %user_id, deleted = result.rows_affected(), "Cleared cart rows");
        Ok(result.rows_affected())
    }

    pub async fn count_rows(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_cart WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
