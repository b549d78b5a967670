// src/handlers/tax.rs

use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    models::{BracketQuery, SetTaxConfigRequest, StatutoryPreview, TaxConfig},
    services::tax,
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
};

/// Replace the tenant's current tax settings. Payslips in open runs are
/// recomputed tenant-wide once the write has committed.
#[utoipa::path(
    put,
    path = "/api/v1/tax-settings/",
    request_body = SetTaxConfigRequest,
    responses(
        (status = 200, description = "Tax settings saved", body = TaxConfig),
        (status = 400, description = "Malformed bands or rates"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tax Settings"
)]
pub async fn set_tax_settings(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SetTaxConfigRequest>,
) -> AppResult<Json<TaxConfig>> {
    auth.require_manager()?;
    let config = tax::set_config(
        &state.db,
        &state.events,
        auth.tenant_id,
        &auth.tenant_name,
        body,
    )
    .await?;
    Ok(Json(config))
}

/// Get the tenant's current tax settings
#[utoipa::path(
    get,
    path = "/api/v1/tax-settings/",
    responses(
        (status = 200, description = "Current tax settings", body = TaxConfig),
        (status = 404, description = "Not configured, the built-in preset applies"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tax Settings"
)]
pub async fn get_tax_settings(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<TaxConfig>> {
    auth.require_payroll_operator()?;
    let config = tax::current_config(&state.db, auth.tenant_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "Tax settings not configured, the built-in Uganda preset is in use".to_string(),
            )
        })?;
    Ok(Json(config))
}

/// All tax settings the tenant has had, newest first
#[utoipa::path(
    get,
    path = "/api/v1/tax-settings/history/",
    responses((status = 200, description = "Tax settings history", body = Vec<TaxConfig>)),
    security(("bearer_auth" = [])),
    tag = "Tax Settings"
)]
pub async fn tax_settings_history(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TaxConfig>>> {
    auth.require_payroll_operator()?;
    Ok(Json(tax::history(&state.db, auth.tenant_id).await?))
}

/// PAYE bracket and statutory deductions for a gross amount
#[utoipa::path(
    get,
    path = "/api/v1/tax-settings/bracket/",
    params(BracketQuery),
    responses(
        (status = 200, description = "Statutory breakdown", body = StatutoryPreview),
        (status = 400, description = "Negative gross"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tax Settings"
)]
pub async fn tax_bracket(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<BracketQuery>,
) -> AppResult<Json<StatutoryPreview>> {
    auth.require_payroll_operator()?;
    let preview = tax::preview(
        &state.db,
        auth.tenant_id,
        query.gross,
        &state.config.default_currency,
    )
    .await?;
    Ok(Json(preview))
}
