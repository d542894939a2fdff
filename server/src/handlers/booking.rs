use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::UserId;
use crate::models::booking::{item_tokens, CreateBookingRequest};
use crate::models::Booking;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub tokens: Vec<String>,
}

pub async fn create_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Response, AppError> {
    let booking = state.bookings.create_booking(user_id, request).await?;
    Ok(created(booking, "Booking created"))
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = state.bookings.confirm_booking(user_id, booking_id).await?;
    Ok(success(booking, "Booking confirmed"))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = state.bookings.cancel_booking(user_id, booking_id).await?;
    Ok(success(booking, "Booking canceled"))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = state.bookings.get_booking_by_id(booking_id).await?;
    let items = state.bookings.get_booking_items(booking_id).await?;
    Ok(success(
        BookingDetail {
            booking,
            tokens: item_tokens(&items),
        },
        "Booking retrieved",
    ))
}
