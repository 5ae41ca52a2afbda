//! # Product Repository
//!
//! Catalog rows. The cart only ever reads these through a join; this
//! repository exists to populate and maintain them.

use bazaar_core::validation::{validate_price_cents, validate_product_id, validate_product_name};
use bazaar_core::{Money, ProductSnapshot};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

// =============================================================================
// Record
// =============================================================================

/// A row of the `products` table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub discount_price_cents: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Creates an active product with no image and no discount.
    pub fn new(id: impl Into<String>, name: impl Into<String>, price_cents: i64) -> Self {
        let now = Utc::now();
        ProductRecord {
            id: id.into(),
            name: name.into(),
            image_url: None,
            price_cents,
            discount_price_cents: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_discount(mut self, discount_price_cents: i64) -> Self {
        self.discount_price_cents = Some(discount_price_cents);
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// The fields a cart line or wishlist entry carries.
    pub fn to_snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id.as_str().into(),
            name: self.name.clone(),
            image_url: self.image_url.clone(),
            price: Money::from_cents(self.price_cents),
            discount_price: self.discount_price_cents.map(Money::from_cents),
        }
    }

    fn validate(&self) -> DbResult<()> {
        validate_product_id(&self.id).map_err(|e| DbError::check(e.to_string()))?;
        validate_product_name(&self.name).map_err(|e| DbError::check(e.to_string()))?;
        validate_price_cents(self.price_cents).map_err(|e| DbError::check(e.to_string()))?;
        if let Some(discount) = self.discount_price_cents {
            validate_price_cents(discount).map_err(|e| DbError::check(e.to_string()))?;
        }
        Ok(())
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(())` - Inserted
    /// * `Err(DbError::UniqueViolation)` - id already exists
    /// * `Err(DbError::CheckViolation)` - blank name, negative price, ...
    pub async fn insert(&self, product: &ProductRecord) -> DbResult<()> {
        product.validate()?;

        debug!(id = %product.id, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, image_url, price_cents, discount_price_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.image_url)
        .bind(product.price_cents)
        .bind(product.discount_price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(ProductRecord))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductRecord>> {
        let product = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, name, image_url, price_cents, discount_price_cents,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, name, image_url, price_cents, discount_price_cents,
                   is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Activates or deactivates a product.
    ///
    /// Deactivated products disappear from the catalog listing but stay
    /// joinable, so existing cart rows keep rendering.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting product active flag");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
