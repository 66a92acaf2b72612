//! Payment handlers

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{
    AccountId, BatchId, Currency, JournalId, Money, PartyId, PaymentId, PaymentMethodId, StatementLineId,
};
use domain_payment::{NewPayment, PaymentQuery};

use super::action_context;
use crate::auth::{permissions, Claims};
use crate::dto::payments::*;
use crate::{error::ApiError, AppState};

/// Creates a draft payment
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    request.validate()?;
    let ctx = action_context(&claims, &ActionParams::default())?;

    let mut service = state.service.write().await;
    let currency = match &request.currency {
        Some(code) => Currency::from_str(code).map_err(core_kernel::CoreError::from)?,
        None => service.book().ledger().currency(),
    };

    let input = NewPayment {
        method_id: PaymentMethodId::from_uuid(request.method_id),
        journal_id: JournalId::from_uuid(request.journal_id),
        partner_id: PartyId::from_uuid(request.partner_id),
        direction: request.direction,
        amount: Money::new(request.amount, currency),
        counterpart_account: AccountId::from_uuid(request.counterpart_account),
        transaction_number: request.transaction_number,
        due_date: request.due_date,
        certified: request.certified,
        banknote_type: request.banknote_type,
    };

    let id = service.create_payment(input, &ctx)?;
    let payment = service.payment(&id)?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

/// Lists payments matching the filters
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filters): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    claims.require(permissions::PAYMENT_READ)?;

    let mut query = PaymentQuery {
        partner_id: filters.partner_id.map(PartyId::from_uuid),
        method_id: filters.method_id.map(PaymentMethodId::from_uuid),
        direction: filters.direction,
        state: filters.state,
        batch_id: filters.batch_id.map(BatchId::from_uuid),
        ..Default::default()
    };
    if let Some(kind) = filters.exception {
        query = query.with_active_exception(kind);
    }
    if filters.originals_only {
        query = query.originals();
    }

    let service = state.service.read().await;
    let payments = service.search(&query).into_iter().map(PaymentResponse::from).collect();
    Ok(Json(payments))
}

/// Gets a payment by ID
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    claims.require(permissions::PAYMENT_READ)?;
    let service = state.service.read().await;
    let payment = service.payment(&PaymentId::from_uuid(id))?;
    Ok(Json(PaymentResponse::from(payment)))
}

/// Posts a draft payment at its first stage
pub async fn post_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<EntryRefResponse>, ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    let ctx = action_context(&claims, &params)?;
    let entry = state.service.write().await.post_payment(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(EntryRefResponse { entry_id: Some(*entry.as_uuid()) }))
}

/// Moves a payment to its next stage
pub async fn advance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    let ctx = action_context(&claims, &params)?;
    let outcome = state.service.write().await.advance(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(outcome.into()))
}

pub async fn set_butterfly(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<ExceptionResponse>, ApiError> {
    claims.require(permissions::PAYMENT_EXCEPTION)?;
    let ctx = action_context(&claims, &params)?;
    let outcome = state.service.write().await.set_butterfly(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(outcome.into()))
}

pub async fn set_prior_notice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<ExceptionResponse>, ApiError> {
    claims.require(permissions::PAYMENT_EXCEPTION)?;
    let ctx = action_context(&claims, &params)?;
    let outcome = state.service.write().await.set_prior_notice(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(outcome.into()))
}

pub async fn set_unpaid(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<ExceptionResponse>, ApiError> {
    claims.require(permissions::PAYMENT_EXCEPTION)?;
    let ctx = action_context(&claims, &params)?;
    let outcome = state.service.write().await.set_unpaid(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(outcome.into()))
}

/// Regularizes the active exception back to the in-bank stage
pub async fn set_paid(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<EntryRefResponse>, ApiError> {
    claims.require(permissions::PAYMENT_EXCEPTION)?;
    let ctx = action_context(&claims, &params)?;
    let entry = state.service.write().await.set_paid(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(EntryRefResponse { entry_id: entry.map(|e| *e.as_uuid()) }))
}

/// Resets a payment to draft
pub async fn action_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<EntryRefResponse>, ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    let ctx = action_context(&claims, &params)?;
    let entry = state.service.write().await.action_draft(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(EntryRefResponse { entry_id: Some(*entry.as_uuid()) }))
}

pub async fn action_cancel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<EntryRefResponse>, ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    let ctx = action_context(&claims, &params)?;
    let entry = state.service.write().await.action_cancel(PaymentId::from_uuid(id), &ctx)?;
    Ok(Json(EntryRefResponse { entry_id: entry.map(|e| *e.as_uuid()) }))
}

/// Links a bank statement line to the payment
pub async fn link_statement_line(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<LinkStatementRequest>,
) -> Result<StatusCode, ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    let ctx = action_context(&claims, &ActionParams::default())?;
    state.service.write().await.link_statement_line(
        PaymentId::from_uuid(id),
        StatementLineId::from_uuid(request.statement_line_id),
        &ctx,
    )?;
    Ok(StatusCode::NO_CONTENT)
}
