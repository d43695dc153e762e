use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::pagination::{
    collect_warnings, LayoutWarning, Measurements, PaginationConfig, PaginationEngine,
    PaginationMetrics, PaginationState, SectionId,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CalculateRequest {
    pub config: Option<PaginationConfig>,
    pub measurements: Measurements,
    pub section_order: Vec<SectionId>,
}

#[derive(Serialize)]
pub struct CalculateResponse {
    pub state: PaginationState,
    pub metrics: PaginationMetrics,
    pub warnings: Vec<LayoutWarning>,
}

/// POST /api/v1/pagination
/// Paginates caller-supplied measurements without keeping any state.
pub async fn handle_calculate(
    State(state): State<AppState>,
    Json(req): Json<CalculateRequest>,
) -> Result<Json<CalculateResponse>, AppError> {
    let config = req.config.unwrap_or_else(|| state.page_config.clone());
    let mut engine = PaginationEngine::new(config)?;
    engine.update_section_order(req.section_order)?;
    engine.update_measurements(req.measurements);

    let outcome = engine.calculate_pagination();
    let warnings = collect_warnings(&outcome.state, engine.section_order());
    info!(
        pages = outcome.metrics.total_pages,
        sections = outcome.metrics.total_sections,
        "Stateless pagination calculated"
    );
    Ok(Json(CalculateResponse {
        state: outcome.state,
        metrics: outcome.metrics,
        warnings,
    }))
}

/// GET /api/v1/pagination/defaults
pub async fn handle_defaults(State(state): State<AppState>) -> Json<PaginationConfig> {
    Json(state.page_config.clone())
}
