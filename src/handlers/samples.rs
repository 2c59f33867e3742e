use super::ApiState;
use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{SampleId, SampleInput};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use validator::Validate;

async fn list_samples(State(api): State<ApiState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.list_samples().await?))
}

async fn create_sample(
    State(api): State<ApiState>,
    Json(input): Json<SampleInput>,
) -> Result<impl IntoResponse, ServiceError> {
    input.validate()?;
    let created = api.create_sample(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_sample(
    State(api): State<ApiState>,
    Path(id): Path<SampleId>,
    Json(input): Json<SampleInput>,
) -> Result<impl IntoResponse, ServiceError> {
    input.validate()?;
    api.update_sample(id, &input).await?;
    Ok(StatusCode::OK)
}

async fn delete_sample(
    State(api): State<ApiState>,
    Path(id): Path<SampleId>,
) -> Result<impl IntoResponse, ServiceError> {
    api.delete_sample(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn sample_routes() -> Router<ApiState> {
    Router::new()
        .route("/samples/", post(create_sample))
        .route("/samples/get_sample", get(list_samples))
        .route("/samples/:id", put(update_sample).delete(delete_sample))
}
