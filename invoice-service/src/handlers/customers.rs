use crate::dtos::{CustomerRequest, CustomerResponse, PageParams};
use crate::models::CustomerInput;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn create_customer(
    State(state): State<AppState>,
    Json(req): Json<CustomerRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let input = CustomerInput::from(req);
    let customer = state.db.create_customer(&input).await?;

    Ok((StatusCode::CREATED, Json(CustomerResponse::from(customer))))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let customer = state
        .db
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(CustomerResponse::from(customer)))
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let customers = state
        .db
        .list_customers(params.page(), params.limit())
        .await?;

    let response: Vec<CustomerResponse> =
        customers.into_iter().map(CustomerResponse::from).collect();

    Ok(Json(response))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<CustomerRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let input = CustomerInput::from(req);
    let customer = state
        .db
        .update_customer(customer_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(CustomerResponse::from(customer)))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_customer(customer_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Customer not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
