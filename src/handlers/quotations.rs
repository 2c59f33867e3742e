use super::ApiState;
use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{
    NewOrderParameter, NewQuotation, OrderParameterId, ParameterId, QuotationId, ResultUpdate,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Router,
};
use serde_json::json;

async fn list_quotations(State(api): State<ApiState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.list_quotations().await?))
}

async fn create_quotation(
    State(api): State<ApiState>,
    Json(quotation): Json<NewQuotation>,
) -> Result<impl IntoResponse, ServiceError> {
    if quotation.parameter_info.is_empty() {
        return Err(ServiceError::validation("parameter_info must not be empty"));
    }
    let id = api.create_quotation(&quotation).await?;
    Ok((StatusCode::CREATED, Json(json!({ "quotation_id": id }))))
}

async fn delete_quotation(
    State(api): State<ApiState>,
    Path(id): Path<QuotationId>,
) -> Result<impl IntoResponse, ServiceError> {
    api.delete_quotation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_all_order_parameters(
    State(api): State<ApiState>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.all_order_parameters().await))
}

async fn order_parameters_for_quotation(
    State(api): State<ApiState>,
    Path(quotation_id): Path<QuotationId>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.order_parameters(quotation_id).await?))
}

async fn create_order_parameter(
    State(api): State<ApiState>,
    Json(entry): Json<NewOrderParameter>,
) -> Result<impl IntoResponse, ServiceError> {
    api.create_order_parameter(&entry).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "quotation_id": entry.quotation_id, "parameter_id": entry.parameter_id })),
    ))
}

async fn update_result(
    State(api): State<ApiState>,
    Path((quotation_id, parameter_id)): Path<(QuotationId, ParameterId)>,
    Json(update): Json<ResultUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    api.update_result(quotation_id, parameter_id, &update).await?;
    Ok(Json(json!({ "message": "Result updated" })))
}

async fn delete_order_parameter(
    State(api): State<ApiState>,
    Path(id): Path<OrderParameterId>,
) -> Result<impl IntoResponse, ServiceError> {
    api.delete_order_parameter(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn quotation_routes() -> Router<ApiState> {
    Router::new()
        .route("/quotations/", get(list_quotations).post(create_quotation))
        .route("/quotations/:id", delete(delete_quotation))
        .route(
            "/order_parameters/",
            get(list_all_order_parameters).post(create_order_parameter),
        )
        .route(
            "/order_parameters/op_id/:quotation_id",
            get(order_parameters_for_quotation),
        )
        .route(
            "/order_parameters/result/:quotation_id/:parameter_id",
            put(update_result),
        )
        .route("/order_parameters/:id", delete(delete_order_parameter))
}
