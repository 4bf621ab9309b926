use serde::{Deserialize, Deserializer};

use super::repo_types::{CategoryChanges, NewCategory, NewProduct, ProductChanges, ProductQuery};
use crate::error::AppError;

const MAX_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Absent fields are left unchanged; an explicit `null` clears a nullable field.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub price_cents: Option<i64>,
    pub stock: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListParams {
    pub category_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }

// Only runs when the key is present, so `null` lands as `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn clean_name(name: String) -> Result<String, AppError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    Ok(name)
}

fn non_negative<T: PartialOrd + Default>(field: &str, v: T) -> Result<T, AppError> {
    if v < T::default() {
        return Err(AppError::Validation(format!("{field} must not be negative")));
    }
    Ok(v)
}

impl CategoryRequest {
    pub fn validate(self) -> Result<NewCategory, AppError> {
        Ok(NewCategory {
            name: clean_name(self.name)?,
            description: self.description,
        })
    }
}

impl CategoryPatch {
    pub fn validate(self) -> Result<CategoryChanges, AppError> {
        Ok(CategoryChanges {
            name: self.name.map(clean_name).transpose()?,
            description: self.description,
        })
    }
}

impl ProductRequest {
    pub fn validate(self) -> Result<NewProduct, AppError> {
        Ok(NewProduct {
            name: clean_name(self.name)?,
            description: self.description,
            price_cents: non_negative("price_cents", self.price_cents)?,
            stock: non_negative("stock", self.stock)?,
            category_id: self.category_id,
        })
    }
}

impl ProductPatch {
    pub fn validate(self) -> Result<ProductChanges, AppError> {
        Ok(ProductChanges {
            name: self.name.map(clean_name).transpose()?,
            description: self.description,
            price_cents: self
                .price_cents
                .map(|v| non_negative("price_cents", v))
                .transpose()?,
            stock: self.stock.map(|v| non_negative("stock", v)).transpose()?,
            category_id: self.category_id,
        })
    }
}

impl ProductListParams {
    pub fn query(&self) -> ProductQuery {
        ProductQuery {
            category_id: self.category_id,
            limit: self.limit.clamp(1, MAX_PAGE),
            offset: self.offset.max(0),
        }
    }
}
