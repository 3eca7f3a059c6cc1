use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::services::categories::{CategoryInput, CategoryResponse};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List categories",
    responses(
        (status = 200, description = "Categories with product counts", body = ApiResponse<Vec<CategoryResponse>>),
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ServiceError> {
    let categories = state.services.categories.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    summary = "Create category",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid name", body = crate::errors::ErrorResponse),
    ),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state.services.categories.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(category))))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    summary = "Rename category",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategoryResponse>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryInput>,
) -> Result<Json<ApiResponse<CategoryResponse>>, ServiceError> {
    let category = state
        .services
        .categories
        .update_category(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(category)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    summary = "Delete category",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category still has products", body = crate::errors::ErrorResponse),
    ),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.categories.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
