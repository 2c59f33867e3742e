use super::ApiState;
use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{CustomerId, CustomerInput};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use validator::Validate;

async fn list_customers(State(api): State<ApiState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.list_customers().await?))
}

async fn get_customer(
    State(api): State<ApiState>,
    Path(id): Path<CustomerId>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = api
        .get_customer(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer request {} not found", id)))?;
    Ok(Json(customer))
}

async fn create_customer(
    State(api): State<ApiState>,
    Json(input): Json<CustomerInput>,
) -> Result<impl IntoResponse, ServiceError> {
    input.validate()?;
    let created = api.create_customer(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_customer(
    State(api): State<ApiState>,
    Path(id): Path<CustomerId>,
    Json(input): Json<CustomerInput>,
) -> Result<impl IntoResponse, ServiceError> {
    input.validate()?;
    api.update_customer(id, &input).await?;
    let updated = api
        .get_customer(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer request {} not found", id)))?;
    Ok(Json(updated))
}

async fn delete_customer(
    State(api): State<ApiState>,
    Path(id): Path<CustomerId>,
) -> Result<impl IntoResponse, ServiceError> {
    api.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn customer_routes() -> Router<ApiState> {
    Router::new()
        .route(
            "/customer_request/",
            get(list_customers).post(create_customer),
        )
        .route(
            "/customer_request/:id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
}
