use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::UserId;
use crate::models::event::{CreateEventRequest, UpdateEventRequest};
use crate::models::{EventQuery, TokenAvailability};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub event_id: Uuid,
    #[serde(flatten)]
    pub counts: TokenAvailability,
    pub claimable: i64,
}

pub async fn create_event(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    let event = state.events.create_event(user_id, request).await?;
    Ok(created(event, "Event created"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.events.retrieve_event_detail(event_id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn search_events(
    State(state): State<AppState>,
    Json(query): Json<EventQuery>,
) -> Result<Response, AppError> {
    let events = state.events.query_events(&query).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn update_event_status(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(event_id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .update_event_status(user_id, event_id, request)
        .await?;
    Ok(success(event, "Event updated"))
}

pub async fn get_availability(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let counts = state.events.get_availability(event_id).await?;
    Ok(success(
        AvailabilityResponse {
            event_id,
            claimable: counts.claimable(),
            counts,
        },
        "Availability retrieved",
    ))
}
