use super::ApiState;
use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{Attachment, CustomerId, OrderForm, OrderId};
use axum::{
    extract::{Json, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use tracing::debug;

/// Reads the order form fields and the optional `docfile` upload.
async fn read_order_form(
    mut multipart: Multipart,
) -> Result<(OrderForm, Option<Attachment>), ServiceError> {
    let mut customer_id: Option<CustomerId> = None;
    let mut comment: Option<String> = None;
    let mut status = String::new();
    let mut order_number = String::new();
    let mut document: Option<Attachment> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "docfile" {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServiceError::validation(format!("Unreadable document: {}", e)))?;
            if let Some(file_name) = file_name.filter(|f| !f.is_empty()) {
                document = Some(Attachment::new(file_name, bytes.to_vec())?);
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ServiceError::validation(format!("Unreadable field {}: {}", name, e)))?;
        match name.as_str() {
            "customer_id" => {
                customer_id = Some(value.trim().parse().map_err(|_| {
                    ServiceError::validation(format!("customer_id '{}' is not a number", value))
                })?)
            }
            "order_req_comment" => comment = Some(value).filter(|c| !c.trim().is_empty()),
            "status" => status = value,
            "order_number" => order_number = value,
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    let customer_id =
        customer_id.ok_or_else(|| ServiceError::validation("customer_id is required"))?;
    Ok((
        OrderForm {
            customer_id,
            order_req_comment: comment,
            status,
            order_number,
        },
        document,
    ))
}

async fn list_orders(State(api): State<ApiState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.list_orders().await?))
}

async fn get_order(
    State(api): State<ApiState>,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = api
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
    Ok(Json(order))
}

async fn orders_for_customer(
    State(api): State<ApiState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(api.orders_for_customer(customer_id).await?))
}

async fn create_order(
    State(api): State<ApiState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let (form, document) = read_order_form(multipart).await?;
    let created = api.create_order(&form, document.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_order(
    State(api): State<ApiState>,
    Path(id): Path<OrderId>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let (form, document) = read_order_form(multipart).await?;
    api.update_order(id, &form, document.as_ref()).await?;
    let updated = api
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
    Ok(Json(updated))
}

async fn delete_order(
    State(api): State<ApiState>,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, ServiceError> {
    api.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn order_routes() -> Router<ApiState> {
    Router::new()
        .route("/order/", get(list_orders).post(create_order))
        .route("/order/order_id/:id", get(get_order))
        .route("/order/c_id/:customer_id", get(orders_for_customer))
        .route("/order/:id", put(update_order).delete(delete_order))
}
