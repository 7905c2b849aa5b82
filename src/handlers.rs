use crate::config::Config;
use crate::dataset::{
    ApprovalBreakdown, ApprovalGroup, BoxSummary, Dataset, DatasetOverview, Dimension, Histogram,
    HistogramBin, NumericField, OutcomeBoxes, Scatter, ScatterPoint, DEFAULT_HISTOGRAM_BINS,
    DEFAULT_SCATTER_POINTS,
};
use crate::derivation;
use crate::errors::AppError;
use crate::features::{ScoreScale, FEATURE_NAMES};
use crate::models::*;
use crate::prediction::PredictionService;
use crate::validation::{FieldViolation, ValidatedApplicant};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Maximum accepted request body. An applicant record is well under 2 KiB.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state injected into handlers.
///
/// Built once at start-up; the model and dataset are read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Prediction workflow around the loaded model (`None` if the model failed to load).
    pub predictor: Option<PredictionService>,
    /// Historical applications (`None` if the dataset failed to load).
    pub dataset: Option<Dataset>,
}

impl AppState {
    fn predictor(&self) -> Result<&PredictionService, AppError> {
        self.predictor
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Model not loaded".to_string()))
    }

    fn dataset(&self) -> Result<&Dataset, AppError> {
        self.dataset
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Dataset not loaded".to_string()))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_schema,
        derive_fields,
        predict,
        stats_overview,
        approval_rates,
        histogram,
        box_summary,
        scatter
    ),
    components(schemas(
        ApplicantInput,
        MaritalStatus,
        EducationLevel,
        HomeOwnershipStatus,
        EmploymentStatus,
        LoanPurpose,
        DerivedFields,
        Decision,
        Rating,
        RiskBand,
        ApplicationSummary,
        ModelInfo,
        PredictionResponse,
        SchemaResponse,
        HealthResponse,
        ServiceLimits,
        ScoreScale,
        FieldViolation,
        DatasetOverview,
        ApprovalGroup,
        ApprovalBreakdown,
        Dimension,
        NumericField,
        HistogramBin,
        Histogram,
        BoxSummary,
        OutcomeBoxes,
        ScatterPoint,
        Scatter
    )),
    tags(
        (name = "prediction", description = "Loan approval predictions"),
        (name = "statistics", description = "Historical dataset statistics")
    )
)]
pub struct ApiDoc;

/// Routes that bypass rate limiting: health check and API docs.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// API routes subject to rate limiting.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/schema", get(get_schema))
        .route("/api/v1/derive", post(derive_fields))
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/stats/overview", get(stats_overview))
        .route(
            "/api/v1/stats/approval-rates/:dimension",
            get(approval_rates),
        )
        .route("/api/v1/stats/histogram/:field", get(histogram))
        .route("/api/v1/stats/box/:field", get(box_summary))
        .route("/api/v1/stats/scatter", get(scatter))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Full application without the rate limiter, which needs peer addresses.
pub fn router(state: Arc<AppState>) -> Router {
    public_routes().merge(api_routes()).with_state(state)
}

/// Health check endpoint.
///
/// Returns the service status and version, which start-up resources loaded,
/// and the limits in force.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let model = state.predictor.as_ref().map(|p| p.model_info());
    let status = if model.is_some() { "healthy" } else { "degraded" };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model,
            dataset_loaded: state.dataset.is_some(),
            limits: ServiceLimits {
                max_body_bytes: MAX_BODY_BYTES,
                prediction_cache_ttl_secs: state.config.prediction_cache_ttl_secs,
                prediction_cache_capacity: state.config.prediction_cache_capacity,
                rate_limit_per_second: state.config.rate_limit_per_second,
                rate_limit_burst: state.config.rate_limit_burst,
            },
        }),
    )
}

/// GET /api/v1/schema
///
/// Lists the feature columns, in the order the model consumes them.
#[utoipa::path(
    get,
    path = "/api/v1/schema",
    tag = "prediction",
    responses((status = 200, description = "Feature schema", body = SchemaResponse))
)]
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<SchemaResponse> {
    Json(SchemaResponse {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        payment_score_scale: state.predictor.as_ref().map(|p| p.score_scale()),
        loan_durations_months: LOAN_DURATIONS_MONTHS.to_vec(),
    })
}

/// POST /api/v1/derive
///
/// Computes the derived financial fields for an applicant without scoring
/// it. Works without a loaded model.
#[utoipa::path(
    post,
    path = "/api/v1/derive",
    tag = "prediction",
    request_body = ApplicantInput,
    responses(
        (status = 200, description = "Derived fields", body = DerivedFields),
        (status = 422, description = "Input outside accepted ranges")
    )
)]
pub async fn derive_fields(
    Json(input): Json<ApplicantInput>,
) -> Result<Json<DerivedFields>, AppError> {
    let applicant = ValidatedApplicant::new(input)?;
    let derived = derivation::derive(applicant.input())?;
    tracing::debug!(
        "Derived fields: income={:.2}, dti={:.4}, rate={:.2}%, payment={:.2}",
        derived.monthly_income,
        derived.debt_to_income_ratio,
        derived.adjusted_interest_rate,
        derived.monthly_loan_payment
    );
    Ok(Json(derived))
}

/// POST /api/v1/predict
///
/// Validates the applicant, builds the feature record and returns the model's
/// decision with its approval probability.
#[utoipa::path(
    post,
    path = "/api/v1/predict",
    tag = "prediction",
    request_body = ApplicantInput,
    responses(
        (status = 200, description = "Prediction", body = PredictionResponse),
        (status = 422, description = "Input outside accepted ranges"),
        (status = 502, description = "Model inference failed"),
        (status = 503, description = "Model not loaded")
    )
)]
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ApplicantInput>,
) -> Result<Json<PredictionResponse>, AppError> {
    tracing::info!("POST /predict");

    let predictor = state.predictor()?;
    let applicant = ValidatedApplicant::new(input)?;
    let response = predictor.predict(&applicant).await?;

    Ok(Json(response))
}

/// GET /api/v1/stats/overview
#[utoipa::path(
    get,
    path = "/api/v1/stats/overview",
    tag = "statistics",
    responses(
        (status = 200, description = "Dataset overview", body = DatasetOverview),
        (status = 503, description = "Dataset not loaded")
    )
)]
pub async fn stats_overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatasetOverview>, AppError> {
    Ok(Json(state.dataset()?.overview()))
}

/// GET /api/v1/stats/approval-rates/:dimension
///
/// Approval rate per group of a categorical column. The dimension may be
/// given as `loan-purpose`, `loan_purpose` or `LoanPurpose`.
#[utoipa::path(
    get,
    path = "/api/v1/stats/approval-rates/{dimension}",
    tag = "statistics",
    params(("dimension" = String, Path, description = "Categorical column, e.g. employment-status")),
    responses(
        (status = 200, description = "Approval rate by group", body = ApprovalBreakdown),
        (status = 404, description = "Unknown dimension"),
        (status = 503, description = "Dataset not loaded")
    )
)]
pub async fn approval_rates(
    State(state): State<Arc<AppState>>,
    Path(dimension): Path<String>,
) -> Result<Json<ApprovalBreakdown>, AppError> {
    let dimension: Dimension = dimension.parse().map_err(AppError::NotFound)?;
    Ok(Json(state.dataset()?.approval_rate_by(dimension)))
}

#[derive(Debug, Deserialize)]
pub struct HistogramParams {
    pub bins: Option<usize>,
}

/// GET /api/v1/stats/histogram/:field?bins=N
#[utoipa::path(
    get,
    path = "/api/v1/stats/histogram/{field}",
    tag = "statistics",
    params(
        ("field" = String, Path, description = "Numeric column, e.g. credit-score"),
        ("bins" = Option<usize>, Query, description = "Number of bins (1-200, default 30)")
    ),
    responses(
        (status = 200, description = "Approved/rejected histogram", body = Histogram),
        (status = 400, description = "Invalid bin count"),
        (status = 404, description = "Unknown field"),
        (status = 503, description = "Dataset not loaded")
    )
)]
pub async fn histogram(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
    Query(params): Query<HistogramParams>,
) -> Result<Json<Histogram>, AppError> {
    let field: NumericField = field.parse().map_err(AppError::NotFound)?;
    let bins = params.bins.unwrap_or(DEFAULT_HISTOGRAM_BINS);
    Ok(Json(state.dataset()?.histogram(field, bins)?))
}

/// GET /api/v1/stats/box/:field
///
/// Min, quartiles and max of a numeric column for approved and rejected
/// applications.
#[utoipa::path(
    get,
    path = "/api/v1/stats/box/{field}",
    tag = "statistics",
    params(("field" = String, Path, description = "Numeric column, e.g. net-worth")),
    responses(
        (status = 200, description = "Box-plot figures by outcome", body = OutcomeBoxes),
        (status = 404, description = "Unknown field"),
        (status = 503, description = "Dataset not loaded")
    )
)]
pub async fn box_summary(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
) -> Result<Json<OutcomeBoxes>, AppError> {
    let field: NumericField = field.parse().map_err(AppError::NotFound)?;
    Ok(Json(state.dataset()?.box_summary(field)))
}

#[derive(Debug, Deserialize)]
pub struct ScatterParams {
    pub x: Option<String>,
    pub y: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/v1/stats/scatter?x=annual-income&y=loan-amount&limit=N
///
/// Defaults to annual income against loan amount.
#[utoipa::path(
    get,
    path = "/api/v1/stats/scatter",
    tag = "statistics",
    params(
        ("x" = Option<String>, Query, description = "Numeric column on the x axis (default annual-income)"),
        ("y" = Option<String>, Query, description = "Numeric column on the y axis (default loan-amount)"),
        ("limit" = Option<usize>, Query, description = "Maximum points returned (1-20000, default 2000)")
    ),
    responses(
        (status = 200, description = "Points split by outcome", body = Scatter),
        (status = 400, description = "Invalid limit or column"),
        (status = 503, description = "Dataset not loaded")
    )
)]
pub async fn scatter(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScatterParams>,
) -> Result<Json<Scatter>, AppError> {
    let axis = |raw: Option<String>, default: NumericField| match raw {
        Some(raw) => raw.parse::<NumericField>().map_err(AppError::BadRequest),
        None => Ok(default),
    };
    let x = axis(params.x, NumericField::AnnualIncome)?;
    let y = axis(params.y, NumericField::LoanAmount)?;
    let limit = params.limit.unwrap_or(DEFAULT_SCATTER_POINTS);
    Ok(Json(state.dataset()?.scatter(x, y, limit)?))
}
