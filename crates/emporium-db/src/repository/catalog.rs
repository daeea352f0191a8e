//! # Catalog Repository
//!
//! Database operations for products. Read-only from the purchase flow;
//! writes exist for seeding and administration.

use sqlx::PgExecutor;
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporium_core::{NewProduct, Product, ProductId};

/// Repository for product database operations.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRepository;

impl CatalogRepository {
    /// Gets a product by id.
    ///
    /// ## Arguments
    /// * `include_inactive` - When false, inactive products read as absent
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Not found (or inactive and excluded)
    pub async fn get<'e, E>(
        executor: E,
        product_id: ProductId,
        include_inactive: bool,
    ) -> DbResult<Option<Product>>
    where
        E: PgExecutor<'e>,
    {
        debug!(product_id = %product_id, include_inactive, "Getting product");

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price, product_type, is_active
            FROM products
            WHERE id = $1 AND (is_active OR $2)
            "#,
        )
        .bind(product_id)
        .bind(include_inactive)
        .fetch_optional(executor)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    pub async fn insert<'e, E>(executor: E, product: &NewProduct) -> DbResult<Product>
    where
        E: PgExecutor<'e>,
    {
        debug!(name = %product.name, price = product.price, "Inserting product");

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, price, product_type, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, price, product_type, is_active
            "#,
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(product.product_type)
        .bind(product.is_active)
        .fetch_one(executor)
        .await?;

        Ok(product)
    }

    /// Activates or retires a product.
    pub async fn set_active<'e, E>(executor: E, product_id: ProductId, active: bool) -> DbResult<()>
    where
        E: PgExecutor<'e>,
    {
        debug!(product_id = %product_id, active, "Setting product active flag");

        let result = sqlx::query("UPDATE products SET is_active = $2 WHERE id = $1")
            .bind(product_id)
            .bind(active)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id.to_string()));
        }

        Ok(())
    }

    /// Counts products (active and inactive).
    pub async fn count<'e, E>(executor: E) -> DbResult<i64>
    where
        E: PgExecutor<'e>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
