use crate::dtos::{ItemRequest, ItemResponse, PageParams};
use crate::models::ItemInput;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

fn check_price(price: Decimal) -> Result<(), AppError> {
    if price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "price must not be negative"
        )));
    }
    Ok(())
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<ItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    check_price(req.price)?;

    let input = ItemInput::from(req);
    let item = state.db.create_item(&input).await?;

    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = state
        .db
        .get_item(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Item not found")))?;

    Ok(Json(ItemResponse::from(item)))
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let items = state.db.list_items(params.page(), params.limit()).await?;

    let response: Vec<ItemResponse> = items.into_iter().map(ItemResponse::from).collect();

    Ok(Json(response))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<ItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    check_price(req.price)?;

    let input = ItemInput::from(req);
    let item = state
        .db
        .update_item(item_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Item not found")))?;

    Ok(Json(ItemResponse::from(item)))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_item(item_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Item not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
