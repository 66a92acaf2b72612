//! Journal entry handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use core_kernel::JournalEntryId;

use crate::auth::{permissions, Claims};
use crate::dto::entries::EntryResponse;
use crate::{error::ApiError, AppState};

/// Gets a journal entry with the open residual of each line
pub async fn get_entry(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryResponse>, ApiError> {
    claims.require(permissions::LEDGER_READ)?;
    let service = state.service.read().await;
    let ledger = service.book().ledger();
    let entry = ledger.require_entry(&JournalEntryId::from_uuid(id))?;
    Ok(Json(EntryResponse::from_entry(entry, ledger)))
}
