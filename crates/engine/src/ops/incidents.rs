use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    BookingStatus, CancellationReason, CollectiveBookingStatus, EngineError, FinanceEventMotive,
    IncidentStatus, IncidentType, MoneyCents, ResultEngine, UserRole, booking_finance_incidents,
    bookings, collective_bookings,
    finance_incidents::{self, IncidentDetails},
    stocks,
};

use super::{Engine, access::require_role, finance::add_incident_event, require, with_tx};

fn serialize_details(details: &IncidentDetails) -> ResultEngine<String> {
    serde_json::to_string(details)
        .map_err(|err| EngineError::InvalidState(format!("invalid incident details: {err}")))
}

/// Per-booking new totals of a commercial gesture of `amount`, spread by
/// quantity.
fn commercial_gesture_totals(
    bookings: &[bookings::Model],
    amount: MoneyCents,
) -> ResultEngine<Vec<MoneyCents>> {
    let total_quantity: i64 = bookings.iter().map(|booking| booking.quantity).sum();
    let total_amount: MoneyCents = bookings.iter().map(bookings::Model::total_amount).sum();
    if amount <= MoneyCents::ZERO || amount > total_amount || total_quantity == 0 {
        return Err(EngineError::InvalidAmount(format!(
            "the commercial gesture must be between 0 and {total_amount}, got {amount}"
        )));
    }
    Ok(bookings
        .iter()
        .map(|booking| {
            let share = MoneyCents::new(amount.cents() * booking.quantity / total_quantity);
            booking.total_amount() - share
        })
        .collect())
}

async fn ensure_no_open_incident(
    db_tx: &DatabaseTransaction,
    booking_ids: &[Uuid],
    collective: bool,
) -> ResultEngine<()> {
    let column = if collective {
        booking_finance_incidents::Column::CollectiveBookingId
    } else {
        booking_finance_incidents::Column::BookingId
    };
    let rows = booking_finance_incidents::Entity::find()
        .filter(column.is_in(booking_ids.to_vec()))
        .find_also_related(finance_incidents::Entity)
        .all(db_tx)
        .await?;
    if rows.iter().any(|(_, incident)| {
        incident
            .as_ref()
            .is_some_and(|incident| incident.status == IncidentStatus::Created.as_str())
    }) {
        return Err(EngineError::InvalidState(
            "a booking already has an incident in progress".to_string(),
        ));
    }
    Ok(())
}

async fn insert_incident(
    db_tx: &DatabaseTransaction,
    kind: IncidentType,
    venue_id: Uuid,
    details: &IncidentDetails,
) -> ResultEngine<finance_incidents::Model> {
    let incident = finance_incidents::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        kind: ActiveValue::Set(kind.as_str().to_string()),
        status: ActiveValue::Set(IncidentStatus::Created.as_str().to_string()),
        venue_id: ActiveValue::Set(venue_id),
        details: ActiveValue::Set(serialize_details(details)?),
        force_debit_note: ActiveValue::Set(false),
        validation_date: ActiveValue::Set(None),
    }
    .insert(db_tx)
    .await?;
    tracing::info!(incident_id = %incident.id, kind = %kind, "Created finance incident");
    Ok(incident)
}

async fn insert_booking_incident(
    db_tx: &DatabaseTransaction,
    incident_id: Uuid,
    booking_id: Option<Uuid>,
    collective_booking_id: Option<Uuid>,
    beneficiary_id: Option<Uuid>,
    new_total: MoneyCents,
) -> ResultEngine<()> {
    booking_finance_incidents::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        incident_id: ActiveValue::Set(incident_id),
        booking_id: ActiveValue::Set(booking_id),
        collective_booking_id: ActiveValue::Set(collective_booking_id),
        beneficiary_id: ActiveValue::Set(beneficiary_id),
        new_total_amount: ActiveValue::Set(new_total.cents()),
    }
    .insert(db_tx)
    .await?;
    Ok(())
}

async fn load_bookings(
    db_tx: &DatabaseTransaction,
    booking_ids: &[Uuid],
) -> ResultEngine<Vec<bookings::Model>> {
    if booking_ids.is_empty() {
        return Err(EngineError::InvalidState(
            "an incident needs at least one booking".to_string(),
        ));
    }
    let mut loaded = Vec::with_capacity(booking_ids.len());
    for id in booking_ids {
        loaded.push(require::<bookings::Entity>(db_tx, *id, "booking").await?);
    }
    Ok(loaded)
}

async fn load_open_incident(
    db_tx: &DatabaseTransaction,
    incident_id: Uuid,
    kind: IncidentType,
) -> ResultEngine<finance_incidents::Model> {
    let incident =
        require::<finance_incidents::Entity>(db_tx, incident_id, "finance incident").await?;
    if incident.kind()? != kind {
        return Err(EngineError::InvalidState(format!(
            "incident {incident_id} is a {} incident",
            incident.kind
        )));
    }
    if incident.status()? != IncidentStatus::Created {
        return Err(EngineError::InvalidState(format!(
            "incident {incident_id} is already {}",
            incident.status
        )));
    }
    Ok(incident)
}

async fn mark_validated(
    db_tx: &DatabaseTransaction,
    incident: &finance_incidents::Model,
    force_debit_note: bool,
    author_id: Uuid,
    now: DateTime<Utc>,
) -> ResultEngine<finance_incidents::Model> {
    let mut details = incident.details()?;
    details.validated_by = Some(author_id);
    finance_incidents::ActiveModel {
        id: ActiveValue::Set(incident.id),
        status: ActiveValue::Set(IncidentStatus::Validated.as_str().to_string()),
        force_debit_note: ActiveValue::Set(force_debit_note),
        validation_date: ActiveValue::Set(Some(now)),
        details: ActiveValue::Set(serialize_details(&details)?),
        ..Default::default()
    }
    .update(db_tx)
    .await
    .map_err(Into::into)
}

/// A total overpayment cancels the booking, even when it was reimbursed.
async fn cancel_overpaid_booking(
    db_tx: &DatabaseTransaction,
    booking_incident: &booking_finance_incidents::Model,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    if let Some(booking_id) = booking_incident.booking_id {
        let booking = require::<bookings::Entity>(db_tx, booking_id, "booking").await?;
        if booking.is_cancelled() {
            return Ok(());
        }
        bookings::ActiveModel {
            id: ActiveValue::Set(booking.id),
            status: ActiveValue::Set(BookingStatus::Cancelled.as_str().to_string()),
            cancellation_date: ActiveValue::Set(Some(now)),
            cancellation_reason: ActiveValue::Set(Some(
                CancellationReason::FinanceIncident.as_str().to_string(),
            )),
            ..Default::default()
        }
        .update(db_tx)
        .await?;
        stocks::Entity::update_many()
            .col_expr(
                stocks::Column::DnBookedQuantity,
                Expr::col(stocks::Column::DnBookedQuantity).sub(booking.quantity),
            )
            .filter(stocks::Column::Id.eq(booking.stock_id))
            .exec(db_tx)
            .await?;
    }
    if let Some(collective_booking_id) = booking_incident.collective_booking_id {
        collective_bookings::ActiveModel {
            id: ActiveValue::Set(collective_booking_id),
            status: ActiveValue::Set(CollectiveBookingStatus::Cancelled.as_str().to_string()),
            cancellation_date: ActiveValue::Set(Some(now)),
            cancellation_reason: ActiveValue::Set(Some(
                CancellationReason::FinanceIncident.as_str().to_string(),
            )),
            ..Default::default()
        }
        .update(db_tx)
        .await?;
    }
    Ok(())
}

impl Engine {
    /// Opens an overpayment incident. A single booking may be partially
    /// overpaid by `amount`; several bookings are always fully overpaid.
    pub async fn create_overpayment_incident(
        &self,
        booking_ids: &[Uuid],
        author_id: Uuid,
        origin: &str,
        amount: Option<MoneyCents>,
        now: DateTime<Utc>,
    ) -> ResultEngine<finance_incidents::Model> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let bookings = load_bookings(&db_tx, booking_ids).await?;
            let venue_id = bookings[0].venue_id;
            if bookings.iter().any(|booking| booking.venue_id != venue_id) {
                return Err(EngineError::InvalidState(
                    "the bookings must belong to the same venue".to_string(),
                ));
            }
            if let Some(booking) = bookings
                .iter()
                .find(|booking| !booking.is_used_or_reimbursed())
            {
                return Err(EngineError::InvalidState(format!(
                    "booking {} is {}, only used or reimbursed bookings can be overpaid",
                    booking.id, booking.status
                )));
            }
            ensure_no_open_incident(&db_tx, booking_ids, false).await?;

            let new_totals: Vec<MoneyCents> = match (bookings.as_slice(), amount) {
                ([booking], Some(amount)) => {
                    if amount <= MoneyCents::ZERO || amount > booking.total_amount() {
                        return Err(EngineError::InvalidAmount(format!(
                            "the overpaid amount must be between 0 and {}, got {amount}",
                            booking.total_amount()
                        )));
                    }
                    vec![booking.total_amount() - amount]
                }
                _ => vec![MoneyCents::ZERO; bookings.len()],
            };

            let details = IncidentDetails {
                origin: origin.to_string(),
                author_id: Some(author_id),
                created_at: Some(now),
                ..Default::default()
            };
            let incident =
                insert_incident(&db_tx, IncidentType::Overpayment, venue_id, &details).await?;
            for (booking, new_total) in bookings.iter().zip(new_totals) {
                insert_booking_incident(
                    &db_tx,
                    incident.id,
                    Some(booking.id),
                    None,
                    Some(booking.user_id),
                    new_total,
                )
                .await?;
            }
            Ok(incident)
        })
    }

    pub async fn create_collective_overpayment_incident(
        &self,
        collective_booking_id: Uuid,
        author_id: Uuid,
        origin: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<finance_incidents::Model> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let booking = require::<collective_bookings::Entity>(
                &db_tx,
                collective_booking_id,
                "collective booking",
            )
            .await?;
            if !matches!(
                booking.status()?,
                CollectiveBookingStatus::Used | CollectiveBookingStatus::Reimbursed
            ) {
                return Err(EngineError::InvalidState(format!(
                    "collective booking {} is {}",
                    booking.id, booking.status
                )));
            }
            ensure_no_open_incident(&db_tx, &[booking.id], true).await?;
            let details = IncidentDetails {
                origin: origin.to_string(),
                author_id: Some(author_id),
                created_at: Some(now),
                ..Default::default()
            };
            let incident =
                insert_incident(&db_tx, IncidentType::Overpayment, booking.venue_id, &details)
                    .await?;
            insert_booking_incident(
                &db_tx,
                incident.id,
                None,
                Some(booking.id),
                None,
                MoneyCents::ZERO,
            )
            .await?;
            Ok(incident)
        })
    }

    /// Opens a commercial gesture of `amount` spread over cancelled bookings
    /// of one stock.
    pub async fn create_commercial_gesture(
        &self,
        booking_ids: &[Uuid],
        amount: MoneyCents,
        author_id: Uuid,
        origin: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<finance_incidents::Model> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let bookings = load_bookings(&db_tx, booking_ids).await?;
            let stock_id = bookings[0].stock_id;
            if bookings.iter().any(|booking| booking.stock_id != stock_id) {
                return Err(EngineError::InvalidState(
                    "the bookings must belong to the same stock".to_string(),
                ));
            }
            if let Some(booking) = bookings.iter().find(|booking| !booking.is_cancelled()) {
                return Err(EngineError::InvalidState(format!(
                    "booking {} is {}, only cancelled bookings can get a commercial gesture",
                    booking.id, booking.status
                )));
            }
            ensure_no_open_incident(&db_tx, booking_ids, false).await?;
            let new_totals = commercial_gesture_totals(&bookings, amount)?;

            let details = IncidentDetails {
                origin: origin.to_string(),
                author_id: Some(author_id),
                created_at: Some(now),
                ..Default::default()
            };
            let incident = insert_incident(
                &db_tx,
                IncidentType::CommercialGesture,
                bookings[0].venue_id,
                &details,
            )
            .await?;
            for (booking, new_total) in bookings.iter().zip(new_totals) {
                insert_booking_incident(
                    &db_tx,
                    incident.id,
                    Some(booking.id),
                    None,
                    Some(booking.user_id),
                    new_total,
                )
                .await?;
            }
            Ok(incident)
        })
    }

    /// Validates an overpayment: the original pricing is reversed and, for a
    /// partial overpayment, the booking is priced again at its new total.
    pub async fn validate_overpayment_incident(
        &self,
        incident_id: Uuid,
        force_debit_note: bool,
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<finance_incidents::Model> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let incident = load_open_incident(&db_tx, incident_id, IncidentType::Overpayment).await?;
            let booking_incidents = booking_finance_incidents::Entity::find()
                .filter(booking_finance_incidents::Column::IncidentId.eq(incident_id))
                .all(&db_tx)
                .await?;
            for booking_incident in &booking_incidents {
                add_incident_event(
                    &db_tx,
                    FinanceEventMotive::IncidentReversalOfOriginalEvent,
                    booking_incident,
                    incident.venue_id,
                    now,
                )
                .await?;
                if booking_incident.new_total_amount().is_zero() {
                    cancel_overpaid_booking(&db_tx, booking_incident, now).await?;
                } else {
                    add_incident_event(
                        &db_tx,
                        FinanceEventMotive::IncidentNewPrice,
                        booking_incident,
                        incident.venue_id,
                        now,
                    )
                    .await?;
                }
            }
            let incident =
                mark_validated(&db_tx, &incident, force_debit_note, author_id, now).await?;
            tracing::info!(incident_id = %incident.id, "Validated overpayment incident");
            Ok(incident)
        })
    }

    pub async fn validate_commercial_gesture(
        &self,
        incident_id: Uuid,
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<finance_incidents::Model> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let incident =
                load_open_incident(&db_tx, incident_id, IncidentType::CommercialGesture).await?;
            let booking_incidents = booking_finance_incidents::Entity::find()
                .filter(booking_finance_incidents::Column::IncidentId.eq(incident_id))
                .all(&db_tx)
                .await?;
            for booking_incident in &booking_incidents {
                add_incident_event(
                    &db_tx,
                    FinanceEventMotive::IncidentCommercialGesture,
                    booking_incident,
                    incident.venue_id,
                    now,
                )
                .await?;
            }
            let incident = mark_validated(&db_tx, &incident, false, author_id, now).await?;
            tracing::info!(incident_id = %incident.id, "Validated commercial gesture");
            Ok(incident)
        })
    }

    pub async fn cancel_incident(
        &self,
        incident_id: Uuid,
        comment: &str,
        author_id: Uuid,
    ) -> ResultEngine<finance_incidents::Model> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let incident =
                require::<finance_incidents::Entity>(&db_tx, incident_id, "finance incident")
                    .await?;
            match incident.status()? {
                IncidentStatus::Cancelled => {
                    return Err(EngineError::InvalidState(
                        "the incident is already cancelled".to_string(),
                    ));
                }
                IncidentStatus::Validated => {
                    return Err(EngineError::InvalidState(
                        "the incident has already been validated".to_string(),
                    ));
                }
                IncidentStatus::Created => {}
            }
            let mut details = incident.details()?;
            details.cancellation_comment = Some(comment.to_string());
            let incident = finance_incidents::ActiveModel {
                id: ActiveValue::Set(incident_id),
                status: ActiveValue::Set(IncidentStatus::Cancelled.as_str().to_string()),
                details: ActiveValue::Set(serialize_details(&details)?),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            tracing::info!(incident_id = %incident_id, author_id = %author_id, "Cancelled incident");
            Ok(incident)
        })
    }

    pub async fn finance_incident(
        &self,
        incident_id: Uuid,
    ) -> ResultEngine<finance_incidents::Model> {
        with_tx!(self, |db_tx| {
            require::<finance_incidents::Entity>(&db_tx, incident_id, "incident").await
        })
    }

    /// Booking rows of an incident.
    pub async fn incident_bookings(
        &self,
        incident_id: Uuid,
    ) -> ResultEngine<Vec<booking_finance_incidents::Model>> {
        booking_finance_incidents::Entity::find()
            .filter(booking_finance_incidents::Column::IncidentId.eq(incident_id))
            .all(&self.database)
            .await
            .map_err(Into::into)
    }
}
