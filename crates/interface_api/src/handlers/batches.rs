//! Batch handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BatchId, JournalId, PaymentId};
use domain_payment::NewBatch;

use super::action_context;
use crate::auth::{permissions, Claims};
use crate::dto::batches::*;
use crate::dto::payments::ActionParams;
use crate::{error::ApiError, AppState};

pub async fn create_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    claims.require(permissions::BATCH_WRITE)?;
    request.validate()?;
    let ctx = action_context(&claims, &ActionParams::default())?;

    let input = NewBatch {
        name: request.name,
        journal_id: JournalId::from_uuid(request.journal_id),
        destination_journal_id: JournalId::from_uuid(request.destination_journal_id),
        external_ref: request.external_ref,
        banknote_type: request.banknote_type,
        payment_ids: request.payment_ids.into_iter().map(PaymentId::from_uuid).collect(),
        move_to_next_stage: request.move_to_next_stage,
    };

    let mut service = state.service.write().await;
    let id = service.create_batch(input, &ctx)?;
    let batch = service.batch(&id)?;
    Ok((StatusCode::CREATED, Json(BatchResponse::from(batch))))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, ApiError> {
    claims.require(permissions::PAYMENT_READ)?;
    let service = state.service.read().await;
    let batch = service.batch(&BatchId::from_uuid(id))?;
    Ok(Json(BatchResponse::from(batch)))
}

/// Sets the bank remittance reference of an unsent batch
pub async fn set_reference(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetReferenceRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    claims.require(permissions::BATCH_WRITE)?;
    request.validate()?;
    let ctx = action_context(&claims, &ActionParams::default())?;

    let batch_id = BatchId::from_uuid(id);
    let mut service = state.service.write().await;
    service.set_batch_reference(batch_id, request.external_ref, &ctx)?;
    Ok(Json(BatchResponse::from(service.batch(&batch_id)?)))
}

pub async fn validate_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchResponse>, ApiError> {
    claims.require(permissions::BATCH_WRITE)?;
    let ctx = action_context(&claims, &ActionParams::default())?;

    let batch_id = BatchId::from_uuid(id);
    let mut service = state.service.write().await;
    service.validate_batch(batch_id, &ctx)?;
    Ok(Json(BatchResponse::from(service.batch(&batch_id)?)))
}

/// Hands the batch over to its destination journal
pub async fn switch_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchSwitchResponse>, ApiError> {
    claims.require(permissions::BATCH_WRITE)?;
    let ctx = action_context(&claims, &ActionParams::default())?;

    let report = state.service.write().await.switch_batch(BatchId::from_uuid(id), &ctx)?;
    info!(batch = %report.batch_id, switched = report.switched.len(), "Batch switched");
    Ok(Json(report.into()))
}
