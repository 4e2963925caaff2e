//! Finance incident endpoints.

use api_types::incident::{
    CollectiveOverpaymentNew, CommercialGestureNew, IncidentCancel, IncidentValidate,
    IncidentView, OverpaymentNew,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{IncidentType, MoneyCents, finance_incidents, users};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn incident_view(incident: &finance_incidents::Model) -> IncidentView {
    IncidentView {
        id: incident.id,
        kind: incident.kind.clone(),
        status: incident.status.clone(),
        venue_id: incident.venue_id,
        force_debit_note: incident.force_debit_note,
        validation_date: incident.validation_date,
    }
}

pub async fn overpayment_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<OverpaymentNew>,
) -> Result<(StatusCode, Json<IncidentView>), ServerError> {
    let incident = state
        .engine
        .create_overpayment_incident(
            &payload.booking_ids,
            user.id,
            &payload.origin,
            payload.amount_cents.map(MoneyCents::new),
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(incident_view(&incident))))
}

pub async fn collective_overpayment_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CollectiveOverpaymentNew>,
) -> Result<(StatusCode, Json<IncidentView>), ServerError> {
    let incident = state
        .engine
        .create_collective_overpayment_incident(
            payload.collective_booking_id,
            user.id,
            &payload.origin,
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(incident_view(&incident))))
}

pub async fn commercial_gesture_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CommercialGestureNew>,
) -> Result<(StatusCode, Json<IncidentView>), ServerError> {
    let incident = state
        .engine
        .create_commercial_gesture(
            &payload.booking_ids,
            MoneyCents::new(payload.amount_cents),
            user.id,
            &payload.origin,
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(incident_view(&incident))))
}

pub async fn validate(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(incident_id): Path<Uuid>,
    Json(payload): Json<IncidentValidate>,
) -> Result<Json<IncidentView>, ServerError> {
    let incident = state.engine.finance_incident(incident_id).await?;
    let now = Utc::now();
    let incident = match incident.kind()? {
        IncidentType::CommercialGesture => {
            state
                .engine
                .validate_commercial_gesture(incident_id, user.id, now)
                .await?
        }
        _ => {
            state
                .engine
                .validate_overpayment_incident(incident_id, payload.force_debit_note, user.id, now)
                .await?
        }
    };
    Ok(Json(incident_view(&incident)))
}

pub async fn cancel(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(incident_id): Path<Uuid>,
    Json(payload): Json<IncidentCancel>,
) -> Result<Json<IncidentView>, ServerError> {
    let incident = state
        .engine
        .cancel_incident(incident_id, &payload.comment, user.id)
        .await?;
    Ok(Json(incident_view(&incident)))
}
