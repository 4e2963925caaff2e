//! Backoffice endpoints on collective offers.

use api_types::{
    collective::{
        CollectiveOfferList, CollectiveOfferQuery, CollectiveOfferView, CollectivePriceEdit,
        CollectiveStockView,
    },
    offer::OfferIds,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use engine::{
    CollectiveOfferRow, CollectiveOfferSearch, CollectiveOfferStatus, MoneyCents,
    OfferValidation, SortOrder, collective_offers, collective_stocks, users,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn bad_request(err: impl std::fmt::Display) -> ServerError {
    ServerError::Generic(err.to_string())
}

fn search_from_query(query: &CollectiveOfferQuery) -> Result<CollectiveOfferSearch, ServerError> {
    let ids = split_list(query.ids.as_deref())
        .iter()
        .map(|id| Uuid::parse_str(id).map_err(bad_request))
        .collect::<Result<Vec<_>, _>>()?;
    let statuses = split_list(query.statuses.as_deref())
        .iter()
        .map(|status| CollectiveOfferStatus::try_from(status.as_str()).map_err(bad_request))
        .collect::<Result<Vec<_>, _>>()?;
    let validation = query
        .validation
        .as_deref()
        .map(|validation| OfferValidation::try_from(validation).map_err(bad_request))
        .transpose()?;
    let sort = match query.sort.as_deref() {
        None | Some("desc") => SortOrder::Descending,
        Some("asc") => SortOrder::Ascending,
        Some(other) => return Err(bad_request(format!("invalid sort order: {other}"))),
    };

    let mut search = CollectiveOfferSearch {
        ids,
        name: query.name.clone(),
        venue_id: query.venue_id,
        offerer_id: query.offerer_id,
        validation,
        statuses,
        price_min: query.price_min_cents.map(MoneyCents::new),
        price_max: query.price_max_cents.map(MoneyCents::new),
        event_from: query.event_from,
        event_to: query.event_to,
        department_codes: split_list(query.departments.as_deref()),
        formats: split_list(query.formats.as_deref()),
        only_validated_offerers: query.only_validated_offerers.unwrap_or(false),
        sort,
        ..Default::default()
    };
    if let Some(limit) = query.limit {
        search.limit = limit;
    }
    Ok(search)
}

fn offer_view(row: &CollectiveOfferRow) -> Result<CollectiveOfferView, ServerError> {
    Ok(CollectiveOfferView {
        id: row.offer.id,
        venue_id: row.offer.venue_id,
        name: row.offer.name.clone(),
        formats: row.offer.formats()?,
        validation: row.offer.validation.clone(),
        status: row.status.as_str().to_string(),
        price_cents: row.stock.as_ref().map(|stock| stock.price),
        number_of_tickets: row.stock.as_ref().map(|stock| stock.number_of_tickets),
        beginning_datetime: row.stock.as_ref().map(|stock| stock.beginning_datetime),
    })
}

async fn moderated_views(
    state: &ServerState,
    offers: Vec<collective_offers::Model>,
) -> Result<Vec<CollectiveOfferView>, ServerError> {
    let now = Utc::now();
    let mut views = Vec::with_capacity(offers.len());
    for offer in offers {
        let status = state.engine.collective_offer_status(offer.id, now).await?;
        views.push(offer_view(&CollectiveOfferRow {
            offer,
            stock: None,
            status,
        })?);
    }
    Ok(views)
}

fn stock_view(stock: &collective_stocks::Model) -> CollectiveStockView {
    CollectiveStockView {
        id: stock.id,
        collective_offer_id: stock.collective_offer_id,
        price_cents: stock.price,
        number_of_tickets: stock.number_of_tickets,
        beginning_datetime: stock.beginning_datetime,
        booking_limit_datetime: stock.booking_limit_datetime,
    }
}

pub async fn search(
    State(state): State<ServerState>,
    Query(query): Query<CollectiveOfferQuery>,
) -> Result<Json<CollectiveOfferList>, ServerError> {
    let search = search_from_query(&query)?;
    let (rows, truncated) = state
        .engine
        .search_collective_offers(&search, Utc::now())
        .await?;
    let offers = rows.iter().map(offer_view).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(CollectiveOfferList { offers, truncated }))
}

pub async fn validate(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<OfferIds>,
) -> Result<Json<Vec<CollectiveOfferView>>, ServerError> {
    let offers = state
        .engine
        .validate_collective_offers(&payload.ids, user.id, Utc::now())
        .await?;
    Ok(Json(moderated_views(&state, offers).await?))
}

pub async fn reject(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<OfferIds>,
) -> Result<Json<Vec<CollectiveOfferView>>, ServerError> {
    let offers = state
        .engine
        .reject_collective_offers(&payload.ids, user.id, Utc::now())
        .await?;
    Ok(Json(moderated_views(&state, offers).await?))
}

pub async fn edit_price(
    State(state): State<ServerState>,
    Path(offer_id): Path<Uuid>,
    Json(payload): Json<CollectivePriceEdit>,
) -> Result<Json<CollectiveStockView>, ServerError> {
    let stock = state
        .engine
        .edit_collective_offer_price(
            offer_id,
            MoneyCents::new(payload.price_cents),
            payload.number_of_tickets,
            Utc::now(),
        )
        .await?;
    Ok(Json(stock_view(&stock)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_lists_are_comma_separated() {
        let query = CollectiveOfferQuery {
            statuses: Some("active, sold_out".to_string()),
            departments: Some("75,,93".to_string()),
            sort: Some("asc".to_string()),
            limit: Some(10),
            ..Default::default()
        };
        let search = search_from_query(&query).unwrap();
        assert_eq!(
            search.statuses,
            vec![CollectiveOfferStatus::Active, CollectiveOfferStatus::SoldOut]
        );
        assert_eq!(search.department_codes, vec!["75", "93"]);
        assert_eq!(search.sort, SortOrder::Ascending);
        assert_eq!(search.limit, 10);
    }

    #[test]
    fn unknown_status_is_a_bad_request() {
        let query = CollectiveOfferQuery {
            statuses: Some("sleeping".to_string()),
            ..Default::default()
        };
        assert!(matches!(search_from_query(&query), Err(ServerError::Generic(_))));
    }
}
