use super::ApiState;
use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{ParameterId, ParameterInput};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Router,
};

async fn list_parameters(State(api): State<ApiState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.list_parameters().await?))
}

async fn get_parameter(
    State(api): State<ApiState>,
    Path(id): Path<ParameterId>,
) -> Result<impl IntoResponse, ServiceError> {
    let parameter = api
        .get_parameter(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Parameter {} not found", id)))?;
    Ok(Json(parameter))
}

async fn create_parameter(
    State(api): State<ApiState>,
    Json(input): Json<ParameterInput>,
) -> Result<impl IntoResponse, ServiceError> {
    input.validate_all()?;
    let created = api.create_parameter(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_parameter(
    State(api): State<ApiState>,
    Path(id): Path<ParameterId>,
    Json(input): Json<ParameterInput>,
) -> Result<impl IntoResponse, ServiceError> {
    input.validate_all()?;
    api.update_parameter(id, &input).await?;
    let updated = api
        .get_parameter(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Parameter {} not found", id)))?;
    Ok(Json(updated))
}

async fn delete_parameter(
    State(api): State<ApiState>,
    Path(id): Path<ParameterId>,
) -> Result<impl IntoResponse, ServiceError> {
    api.delete_parameter(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn parameter_routes() -> Router<ApiState> {
    Router::new()
        .route("/parameter/", get(list_parameters).post(create_parameter))
        .route("/parameter/p_id/:id", get(get_parameter))
        .route("/parameter/:id", put(update_parameter).delete(delete_parameter))
}
