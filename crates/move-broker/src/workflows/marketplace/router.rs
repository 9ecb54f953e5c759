use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{BidSubmission, MoveRequestId, PaymentId, PaymentView, QuoteId};
use super::lifecycle::{ArbitrationDecision, ChargeOutcome, LifecycleError};
use super::repository::{
    NotificationSink, PaymentGateway, PaymentRepository, QuoteRepository, RepositoryError,
};
use super::service::{MarketplaceError, MarketplaceService};
use crate::workflows::pricing::{assess_bid, refund_for_cancellation, split, EscrowError, MoveRequest};

type SharedService<S, G, N> = Arc<MarketplaceService<S, G, N>>;

/// Router exposing the pricing engines, contact screening, quote desk and mission endpoints.
pub fn marketplace_router<S, G, N>(service: SharedService<S, G, N>) -> Router
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/api/v1/pricing/estimate", post(estimate_handler::<S, G, N>))
        .route("/api/v1/pricing/assess", post(assess_handler::<S, G, N>))
        .route("/api/v1/pricing/escrow", post(escrow_handler))
        .route(
            "/api/v1/pricing/cancellation-refund",
            post(cancellation_refund_handler),
        )
        .route("/api/v1/screening/contact", post(screening_handler::<S, G, N>))
        .route("/api/v1/requests", post(create_request_handler::<S, G, N>))
        .route(
            "/api/v1/requests/:request_id",
            put(edit_request_handler::<S, G, N>),
        )
        .route(
            "/api/v1/requests/:request_id/quotes",
            get(request_quotes_handler::<S, G, N>),
        )
        .route("/api/v1/quotes", post(submit_bid_handler::<S, G, N>))
        .route("/api/v1/quotes/:quote_id", get(quote_handler::<S, G, N>))
        .route(
            "/api/v1/quotes/:quote_id/accept",
            post(accept_quote_handler::<S, G, N>),
        )
        .route("/api/v1/payments/:payment_id", get(payment_handler::<S, G, N>))
        .route(
            "/api/v1/payments/:payment_id/deposit",
            post(collect_deposit_handler::<S, G, N>),
        )
        .route(
            "/api/v1/payments/:payment_id/deposit/confirmation",
            post(confirm_deposit_handler::<S, G, N>),
        )
        .route(
            "/api/v1/payments/:payment_id/complete",
            post(complete_handler::<S, G, N>),
        )
        .route(
            "/api/v1/payments/:payment_id/arbitration",
            post(arbitration_handler::<S, G, N>),
        )
        .route("/api/v1/reviews/due", get(reviews_due_handler::<S, G, N>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssessBody {
    pub request: MoveRequest,
    pub proposed_price: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EscrowBody {
    pub client_display_price: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefundBody {
    pub amount_paid: i64,
    pub days_before_move: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScreeningBody {
    pub text: String,
}

pub(crate) async fn estimate_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Json(request): Json<MoveRequest>,
) -> Response
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    Json(service.estimator().estimate(&request)).into_response()
}

pub(crate) async fn assess_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Json(body): Json<AssessBody>,
) -> Result<Response, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let assessment = assess_bid(service.estimator(), &body.request, body.proposed_price)?;
    Ok(Json(assessment).into_response())
}

pub(crate) async fn escrow_handler(
    Json(body): Json<EscrowBody>,
) -> Result<Response, MarketplaceError> {
    let split = split(body.client_display_price)?;
    Ok(Json(split).into_response())
}

pub(crate) async fn cancellation_refund_handler(
    Json(body): Json<RefundBody>,
) -> Result<Response, MarketplaceError> {
    let refund = refund_for_cancellation(body.amount_paid, body.days_before_move)?;
    Ok(Json(refund).into_response())
}

pub(crate) async fn screening_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Json(body): Json<ScreeningBody>,
) -> Response
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    Json(service.scanner().scan(&body.text)).into_response()
}

pub(crate) async fn create_request_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Json(details): Json<MoveRequest>,
) -> Result<Response, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let record = service.create_move_request(details)?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

pub(crate) async fn edit_request_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(request_id): Path<String>,
    Json(details): Json<MoveRequest>,
) -> Result<Response, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let edit = service.edit_move_request(&MoveRequestId(request_id), details)?;
    Ok(Json(edit).into_response())
}

pub(crate) async fn request_quotes_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(request_id): Path<String>,
) -> Result<Response, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let quotes = service.quotes_for_request(&MoveRequestId(request_id))?;
    Ok(Json(quotes).into_response())
}

pub(crate) async fn submit_bid_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Json(submission): Json<BidSubmission>,
) -> Result<Response, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let quote = service.submit_bid(submission)?;
    Ok((StatusCode::CREATED, Json(quote)).into_response())
}

pub(crate) async fn quote_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(quote_id): Path<String>,
) -> Result<Response, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let quote = service.quote(&QuoteId(quote_id))?;
    Ok(Json(quote).into_response())
}

pub(crate) async fn accept_quote_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(quote_id): Path<String>,
) -> Result<Response, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let accepted = service.accept_quote(&QuoteId(quote_id), Utc::now().date_naive())?;
    Ok(Json(json!({
        "quote": accepted.quote,
        "payment": accepted.payment.view(),
    }))
    .into_response())
}

pub(crate) async fn payment_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentView>, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let record = service.payment(&PaymentId(payment_id))?;
    Ok(Json(record.view()))
}

pub(crate) async fn collect_deposit_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentView>, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let record = service.collect_deposit(&PaymentId(payment_id), Utc::now())?;
    Ok(Json(record.view()))
}

pub(crate) async fn confirm_deposit_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(payment_id): Path<String>,
    Json(outcome): Json<ChargeOutcome>,
) -> Result<Json<PaymentView>, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let record = service.confirm_deposit(&PaymentId(payment_id), outcome, Utc::now())?;
    Ok(Json(record.view()))
}

pub(crate) async fn complete_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentView>, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let record = service.mark_mission_complete(&PaymentId(payment_id), Utc::now())?;
    Ok(Json(record.view()))
}

pub(crate) async fn arbitration_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
    Path(payment_id): Path<String>,
    Json(decision): Json<ArbitrationDecision>,
) -> Result<Json<PaymentView>, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let record = service.record_arbitration(&PaymentId(payment_id), decision, Utc::now())?;
    Ok(Json(record.view()))
}

pub(crate) async fn reviews_due_handler<S, G, N>(
    State(service): State<SharedService<S, G, N>>,
) -> Result<Json<Vec<PaymentView>>, MarketplaceError>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let due = service.reviews_due(Utc::now())?;
    Ok(Json(due.iter().map(|record| record.view()).collect()))
}

impl MarketplaceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketplaceError::RequestNotFound { .. }
            | MarketplaceError::QuoteNotFound { .. }
            | MarketplaceError::PaymentNotFound { .. }
            | MarketplaceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            MarketplaceError::BlockedContent { .. }
            | MarketplaceError::Pricing(_)
            | MarketplaceError::Escrow(EscrowError::InvalidPrice(_))
            | MarketplaceError::QuoteValidityElapsed { .. }
            | MarketplaceError::Lifecycle(LifecycleError::ReleaseOutOfRange { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            MarketplaceError::QuoteNotPending { .. }
            | MarketplaceError::RequestLocked { .. }
            | MarketplaceError::StateTransitionConflict { .. }
            | MarketplaceError::Lifecycle(_)
            | MarketplaceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            MarketplaceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            MarketplaceError::Escrow(EscrowError::NegativeGuarantee { .. })
            | MarketplaceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            MarketplaceError::BlockedContent { reasons } => json!({
                "error": "submission contains contact information",
                "blocked_reasons": reasons,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
