//! Bank statement line handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{JournalId, Money, StatementLineId};
use domain_payment::StatementLine;

use super::action_context;
use crate::auth::{permissions, Claims};
use crate::dto::payments::ActionParams;
use crate::dto::statements::*;
use crate::{error::ApiError, AppState};

pub async fn register_line(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<RegisterStatementLineRequest>,
) -> Result<(StatusCode, Json<StatementLineResponse>), ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    request.validate()?;
    let ctx = action_context(&claims, &ActionParams::default())?;

    let mut service = state.service.write().await;
    let amount = Money::new(request.amount, service.book().ledger().currency());
    let line = StatementLine::new(
        JournalId::from_uuid(request.journal_id),
        amount,
        request.date.unwrap_or_else(|| Utc::now().date_naive()),
        request.reference,
    );
    let id = service.register_statement_line(line, &ctx)?;
    Ok((StatusCode::CREATED, Json(StatementLineResponse { id: *id.as_uuid() })))
}

/// Marks the line reconciled, which lets its payment clear a bank-statement stage
pub async fn mark_reconciled(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    claims.require(permissions::PAYMENT_WRITE)?;
    let ctx = action_context(&claims, &ActionParams::default())?;
    state
        .service
        .write()
        .await
        .mark_statement_reconciled(StatementLineId::from_uuid(id), &ctx)?;
    Ok(StatusCode::NO_CONTENT)
}
