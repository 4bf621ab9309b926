use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put, MethodRouter},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CategoryPatch, CategoryRequest, ProductListParams, ProductPatch, ProductRequest},
    repo_types::{Category, Product},
};
use crate::{
    auth::middleware::{admin_only, require_auth, CurrentUser},
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

/// Reads are public; every write goes through the token gate and the admin gate.
pub fn catalog_routes(state: &AppState) -> Router<AppState> {
    let gate = |route: MethodRouter<AppState>| {
        route
            .route_layer(middleware::from_fn(admin_only))
            .route_layer(middleware::from_fn_with_state(state.keys.clone(), require_auth))
    };

    Router::new()
        .route(
            "/categories",
            get(list_categories).merge(gate(post(create_category))),
        )
        .route(
            "/categories/:id",
            get(get_category).merge(gate(
                put(update_category).delete(delete_category),
            )),
        )
        .route(
            "/products",
            get(list_products).merge(gate(post(create_product))),
        )
        .route(
            "/products/:id",
            get(get_product).merge(gate(
                put(update_product).delete(delete_product),
            )),
        )
}

// --- categories ---

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.catalog.list_categories().await?))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Category>, AppError> {
    let category = state
        .catalog
        .get_category(id)
        .await?
        .ok_or(AppError::NotFound("category"))?;
    Ok(Json(category))
}

#[instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiJson(payload): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state.catalog.create_category(payload.validate()?).await?;
    info!(category_id = category.id, by = %identity.subject, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, payload))]
pub async fn update_category(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CategoryPatch>,
) -> Result<Json<Category>, AppError> {
    let category = state
        .catalog
        .update_category(id, payload.validate()?)
        .await?
        .ok_or(AppError::NotFound("category"))?;
    info!(category_id = id, by = %identity.subject, "category updated");
    Ok(Json(category))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, AppError> {
    if !state.catalog.delete_category(id).await? {
        return Err(AppError::NotFound("category"));
    }
    info!(category_id = id, by = %identity.subject, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- products ---

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ProductListParams>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.catalog.list_products(params.query()).await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .catalog
        .get_product(id)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    Ok(Json(product))
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiJson(payload): ApiJson<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.catalog.create_product(payload.validate()?).await?;
    info!(product_id = product.id, by = %identity.subject, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .catalog
        .update_product(id, payload.validate()?)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    info!(product_id = id, by = %identity.subject, "product updated");
    Ok(Json(product))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, AppError> {
    if !state.catalog.delete_product(id).await? {
        return Err(AppError::NotFound("product"));
    }
    info!(product_id = id, by = %identity.subject, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}
