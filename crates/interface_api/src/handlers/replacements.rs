//! Replacement handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::PaymentId;

use super::action_context;
use crate::auth::{permissions, Claims};
use crate::dto::payments::ActionParams;
use crate::dto::replacements::*;
use crate::{error::ApiError, AppState};

/// Settles defaulted payments with a draft replacement
pub async fn replace(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ActionParams>,
    Json(request): Json<ReplaceRequest>,
) -> Result<(StatusCode, Json<ReplacementResponse>), ApiError> {
    claims.require(permissions::REPLACEMENT_WRITE)?;
    request.validate()?;
    let ctx = action_context(&claims, &params)?;

    let originals: Vec<PaymentId> = request.original_ids.into_iter().map(PaymentId::from_uuid).collect();
    let outcome = state
        .service
        .write()
        .await
        .replace(&originals, PaymentId::from_uuid(request.replacement_id), &ctx)?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Unwinds the replacement posted by `payment_id`
pub async fn unwind(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(payment_id): Path<Uuid>,
    Query(params): Query<ActionParams>,
) -> Result<Json<UnwindResponse>, ApiError> {
    claims.require(permissions::REPLACEMENT_WRITE)?;
    let ctx = action_context(&claims, &params)?;
    let entry = state
        .service
        .write()
        .await
        .unwind_replacement(PaymentId::from_uuid(payment_id), &ctx)?;
    Ok(Json(UnwindResponse {
        replacement_id: payment_id,
        reversal_entry_id: *entry.as_uuid(),
    }))
}

/// Lists replacement links, newest last
pub async fn list_links(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<ListLinksQuery>,
) -> Result<Json<Vec<ReplacementLinkResponse>>, ApiError> {
    claims.require(permissions::PAYMENT_READ)?;
    let payment = filter.payment_id.map(PaymentId::from_uuid);

    let service = state.service.read().await;
    let links = service
        .links()
        .iter()
        .filter(|l| !filter.active_only || l.is_active())
        .filter(|l| payment.map_or(true, |p| l.original == p || l.replacement == p))
        .map(ReplacementLinkResponse::from)
        .collect();
    Ok(Json(links))
}
