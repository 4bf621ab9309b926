use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::repo_types::{
    Category, CategoryChanges, NewCategory, NewProduct, Product, ProductChanges, ProductQuery,
};
use crate::error::StoreError;

/// Categories and products. Category names are unique (`Conflict`); a product
/// pointing at a missing category is `InvalidReference`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError>;
    async fn create_category(&self, new: NewCategory) -> Result<Category, StoreError>;
    async fn update_category(
        &self,
        id: i64,
        changes: CategoryChanges,
    ) -> Result<Option<Category>, StoreError>;
    async fn delete_category(&self, id: i64) -> Result<bool, StoreError>;

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>, StoreError>;
    async fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError>;
    async fn create_product(&self, new: NewProduct) -> Result<Product, StoreError>;
    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<Option<Product>, StoreError>;
    async fn delete_product(&self, id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgCatalogStore {
    db: PgPool,
}

impl PgCatalogStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, created_at
            FROM categories
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, created_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category, StoreError> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(new.name)
        .bind(new.description)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_category(
        &self,
        id: i64,
        changes: CategoryChanges,
    ) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
               SET name = COALESCE($2, name),
                   description = CASE WHEN $3 THEN $4 ELSE description END
             WHERE id = $1
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_category(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price_cents, stock, category_id, created_at
            FROM products
            WHERE ($1::BIGINT IS NULL OR category_id = $1)
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(query.category_id)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price_cents, stock, category_id, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, price_cents, stock, category_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, price_cents, stock, category_id, created_at
            "#,
        )
        .bind(new.name)
        .bind(new.description)
        .bind(new.price_cents)
        .bind(new.stock)
        .bind(new.category_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name = COALESCE($2, name),
                   description = CASE WHEN $3 THEN $4 ELSE description END,
                   price_cents = COALESCE($5, price_cents),
                   stock = COALESCE($6, stock),
                   category_id = CASE WHEN $7 THEN $8 ELSE category_id END
             WHERE id = $1
            RETURNING id, name, description, price_cents, stock, category_id, created_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.price_cents)
        .bind(changes.stock)
        .bind(changes.category_id.is_some())
        .bind(changes.category_id.flatten())
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_product(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
