//! Stage catalog handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use core_kernel::PaymentMethodId;

use crate::auth::{permissions, Claims};
use crate::dto::catalog::{MethodResponse, StageResponse};
use crate::seed::SeedIndex;
use crate::{error::ApiError, AppState};

#[derive(Serialize)]
pub struct CatalogResponse {
    /// Ids of the seeded accounts, journals and methods by code
    pub index: SeedIndex,
    pub methods: Vec<MethodResponse>,
}

pub async fn get_catalog(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<CatalogResponse>, ApiError> {
    claims.require(permissions::PAYMENT_READ)?;
    let service = state.service.read().await;
    let mut methods: Vec<MethodResponse> = service.book().catalogs().map(MethodResponse::from).collect();
    methods.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(Json(CatalogResponse {
        index: state.index.as_ref().clone(),
        methods,
    }))
}

/// Stages of a payment method in sequence order
pub async fn get_stages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(method_id): Path<Uuid>,
) -> Result<Json<Vec<StageResponse>>, ApiError> {
    claims.require(permissions::PAYMENT_READ)?;
    let service = state.service.read().await;
    let stages = service.get_available_stages(&PaymentMethodId::from_uuid(method_id))?;
    Ok(Json(stages.iter().map(StageResponse::from).collect()))
}
