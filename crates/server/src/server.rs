use axum::{
    Extension, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};

use std::sync::Arc;

use crate::{ServerError, backoffice, bookings, collective, finance, incidents, pro, wallet};
use engine::{Engine, EngineError, UserRole, users};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// Resolves the Basic credentials to a user and stores it as an `Extension`.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(credentials)) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if credentials.username().is_empty() || credentials.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user = match state
        .engine
        .authenticate(credentials.username(), credentials.password())
        .await
    {
        Ok(user) => user,
        Err(EngineError::Database(err)) => {
            tracing::error!("failed to authenticate user: {err}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(_) => return Err(StatusCode::UNAUTHORIZED),
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn check_role(user: &users::Model, roles: &[UserRole]) -> Result<(), ServerError> {
    let role = user.role()?;
    if roles.contains(&role) {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!("role {role} cannot access this resource")).into())
    }
}

async fn require_pro(
    Extension(user): Extension<users::Model>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    check_role(&user, &[UserRole::Pro, UserRole::Admin])?;
    Ok(next.run(request).await)
}

async fn require_admin(
    Extension(user): Extension<users::Model>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    check_role(&user, &[UserRole::Admin])?;
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let beneficiary = Router::new()
        .route("/bookings", post(bookings::book).get(bookings::list))
        .route("/bookings/{id}/cancel", post(bookings::cancel))
        .route("/wallet", get(wallet::get));

    let pro = Router::new()
        .route("/bookings/token/{token}", get(pro::booking_by_token))
        .route("/bookings/token/{token}/use", patch(pro::use_booking))
        .route("/bookings/token/{token}/unuse", patch(pro::unuse_booking))
        .route("/bookings/token/{token}/cancel", patch(pro::cancel_booking))
        .route("/offers", post(pro::offer_new))
        .route("/offers/{id}/publish", post(pro::offer_publish))
        .route("/offers/{id}/stocks", post(pro::stock_new))
        .route(
            "/stocks/{id}",
            patch(pro::stock_update).delete(pro::stock_delete),
        )
        .route_layer(middleware::from_fn(require_pro));

    let backoffice = Router::new()
        .route("/offers/validate", post(backoffice::validate_offers))
        .route("/offers/reject", post(backoffice::reject_offers))
        .route("/bookings/{id}/cancel", post(backoffice::cancel_booking))
        .route("/bookings/{id}/uncancel", post(backoffice::uncancel_booking))
        .route("/collective-offers", get(collective::search))
        .route("/collective-offers/validate", post(collective::validate))
        .route("/collective-offers/reject", post(collective::reject))
        .route("/collective-offers/{id}/price", post(collective::edit_price))
        .route("/incidents/overpayment", post(incidents::overpayment_new))
        .route(
            "/incidents/collective-overpayment",
            post(incidents::collective_overpayment_new),
        )
        .route(
            "/incidents/commercial-gesture",
            post(incidents::commercial_gesture_new),
        )
        .route("/incidents/{id}/validate", post(incidents::validate))
        .route("/incidents/{id}/cancel", post(incidents::cancel))
        .route("/reimbursement-rules", post(backoffice::rule_new))
        .route("/finance/price-events", post(finance::price_events))
        .route("/finance/cashflows", post(finance::cashflows))
        .route("/finance/batches/{id}/invoices", post(finance::invoices))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .merge(beneficiary)
        .nest("/pro", pro)
        .nest("/backoffice", backoffice)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}
