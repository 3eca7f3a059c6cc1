use axum::{extract::State, response::Json};

use crate::services::orders::SalesReport;
use crate::{errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/sales/report",
    summary = "Sales report",
    description = "Total revenue of paid orders plus ongoing and completed order counts",
    responses(
        (status = 200, description = "Sales report", body = ApiResponse<SalesReport>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Reports"
)]
pub async fn sales_report(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SalesReport>>, ServiceError> {
    let report = state.services.order.get_sales_report().await?;
    Ok(Json(ApiResponse::success(report)))
}
