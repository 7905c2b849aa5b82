/// HTTP tests against the full router
/// Uses the bundled demo model and a small CSV fixture; no network involved
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use loan_approval_api::classifier::GbdtClassifier;
use loan_approval_api::config::Config;
use loan_approval_api::dataset::Dataset;
use loan_approval_api::features::ScoreScale;
use loan_approval_api::handlers::{router, AppState};
use loan_approval_api::models::ApplicantInput;
use loan_approval_api::prediction::PredictionService;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const FIXTURE_CSV: &str = "\
ApplicationDate,Age,AnnualIncome,CreditScore,EmploymentStatus,EducationLevel,Experience,LoanAmount,LoanDuration,MaritalStatus,HomeOwnershipStatus,BankruptcyHistory,LoanPurpose,PreviousLoanDefaults,DebtToIncomeRatio,NetWorth,LoanApproved
2018-01-01,45,90000,680,Employed,Master,20,15000,36,Married,Own,0,Home,0,0.12,120000,1
2018-01-02,23,24000,480,Unemployed,High School,1,30000,60,Single,Rent,1,Auto,1,0.45,-2000,0
2018-01-03,38,65000,610,Employed,Bachelor,12,22000,48,Married,Mortgage,0,Home,0,0.20,40000,1
2018-01-04,52,41000,560,Self-Employed,Associate,28,40000,120,Divorced,Rent,0,Business,1,0.38,8000,0
";

fn demo_predictor() -> PredictionService {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/models/loan_gbdt.json");
    let model = GbdtClassifier::from_path(path).expect("demo model should load");
    PredictionService::new(
        Arc::new(model),
        ScoreScale::Fraction,
        Duration::from_secs(60),
        100,
    )
}

fn fixture_dataset() -> Dataset {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE_CSV.as_bytes()).unwrap();
    Dataset::load(file.path()).unwrap()
}

fn app(predictor: Option<PredictionService>, dataset: Option<Dataset>) -> Router {
    router(Arc::new(AppState {
        config: Config::default(),
        predictor,
        dataset,
    }))
}

fn full_app() -> Router {
    app(Some(demo_predictor()), Some(fixture_dataset()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn applicant_json() -> Value {
    let input = ApplicantInput {
        loan_duration_months: 60,
        ..ApplicantInput::default()
    };
    serde_json::to_value(input).unwrap()
}

#[tokio::test]
async fn test_health_reports_loaded_resources() {
    let (status, body) = get(full_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["datasetLoaded"], true);
    assert_eq!(body["model"]["name"], "catboost-loan-demo");
}

#[tokio::test]
async fn test_health_reports_configured_limits() {
    let config = Config {
        prediction_cache_ttl_secs: 42,
        rate_limit_burst: 7,
        ..Config::default()
    };
    let app = router(Arc::new(AppState {
        config,
        predictor: None,
        dataset: None,
    }));

    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limits"]["predictionCacheTtlSecs"], 42);
    assert_eq!(body["limits"]["rateLimitBurst"], 7);
    assert_eq!(body["limits"]["maxBodyBytes"], 64 * 1024);
}

#[tokio::test]
async fn test_health_degraded_without_model() {
    let (status, body) = get(app(None, None), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["datasetLoaded"], false);
}

#[tokio::test]
async fn test_schema_lists_features_in_order() {
    let (status, body) = get(full_app(), "/api/v1/schema").await;
    assert_eq!(status, StatusCode::OK);

    let names = body["featureNames"].as_array().unwrap();
    assert_eq!(names.len(), 33);
    assert_eq!(names[0], "Age");
    assert_eq!(names[32], "TotalDebtToIncomeRatio");
    assert_eq!(body["paymentScoreScale"], "fraction");
}

#[tokio::test]
async fn test_derive_returns_derived_fields() {
    let (status, body) = post_json(full_app(), "/api/v1/derive", &applicant_json()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["monthlyIncome"], 5000.0);
    assert_eq!(body["netWorth"], 30000.0);
    assert_eq!(body["adjustedInterestRate"], 7.0);
    let payment = body["monthlyLoanPayment"].as_f64().unwrap();
    assert!((payment - 495.03).abs() < 0.01);
}

#[tokio::test]
async fn test_derive_works_without_model() {
    let (status, _) = post_json(app(None, None), "/api/v1/derive", &applicant_json()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_predict_approves_reference_applicant() {
    let (status, body) = post_json(full_app(), "/api/v1/predict", &applicant_json()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "approved");
    assert_eq!(body["label"], 1);
    assert_eq!(body["cached"], false);

    let p = body["approvalProbability"].as_f64().unwrap();
    assert!(p > 0.5 && p < 1.0);
    assert_eq!(body["summary"]["riskBand"], "Low");
    assert_eq!(body["summary"]["monthlyPayment"], 495.0);
}

#[tokio::test]
async fn test_predict_rejects_out_of_range_input() {
    let mut input = applicant_json();
    input["age"] = 17.into();
    input["loanDurationMonths"] = 7.into();

    let (status, body) = post_json(full_app(), "/api/v1/predict", &input).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let fields: Vec<&str> = body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["age", "loanDurationMonths"]);
}

#[tokio::test]
async fn test_predict_without_model_is_unavailable() {
    let (status, body) = post_json(app(None, None), "/api/v1/predict", &applicant_json()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Model not loaded");
}

#[tokio::test]
async fn test_unknown_enum_spelling_is_client_error() {
    let mut input = applicant_json();
    input["loanPurpose"] = "Vacation".into();

    let (status, _) = post_json(full_app(), "/api/v1/predict", &input).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_stats_overview() {
    let (status, body) = get(full_app(), "/api/v1/stats/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRecords"], 4);
    assert_eq!(body["approved"], 2);
    assert_eq!(body["approvalRatePercent"], 50.0);
}

#[tokio::test]
async fn test_approval_rates_by_dimension() {
    let (status, body) = get(full_app(), "/api/v1/stats/approval-rates/employment-status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dimension"], "EmploymentStatus");

    let employed = body["groups"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["group"] == "Employed")
        .unwrap();
    assert_eq!(employed["count"], 2);
    assert_eq!(employed["approvalRatePercent"], 100.0);
}

#[tokio::test]
async fn test_unknown_dimension_is_not_found() {
    let (status, _) = get(full_app(), "/api/v1/stats/approval-rates/favourite-color").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_histogram_bins() {
    let (status, body) = get(full_app(), "/api/v1/stats/histogram/credit-score?bins=4").await;
    assert_eq!(status, StatusCode::OK);

    let bins = body["bins"].as_array().unwrap();
    assert_eq!(bins.len(), 4);
    let total: u64 = bins
        .iter()
        .map(|b| b["approved"].as_u64().unwrap() + b["rejected"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_histogram_rejects_zero_bins() {
    let (status, _) = get(full_app(), "/api/v1/stats/histogram/credit-score?bins=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_net_worth_box_by_outcome() {
    let (status, body) = get(full_app(), "/api/v1/stats/box/net-worth").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["field"], "NetWorth");
    assert_eq!(body["approved"]["count"], 2);
    assert_eq!(body["approved"]["median"], 80000.0);
    assert_eq!(body["rejected"]["min"], -2000.0);
    assert_eq!(body["rejected"]["median"], 3000.0);
}

#[tokio::test]
async fn test_box_unknown_field_is_not_found() {
    let (status, _) = get(full_app(), "/api/v1/stats/box/shoe-size").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scatter_defaults_to_income_and_loan_amount() {
    let (status, body) = get(full_app(), "/api/v1/stats/scatter").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["x"], "AnnualIncome");
    assert_eq!(body["y"], "LoanAmount");
    assert_eq!(body["totalPoints"], 4);

    let first = &body["points"][0];
    assert_eq!(first["x"], 90000.0);
    assert_eq!(first["y"], 15000.0);
    assert_eq!(first["approved"], true);
}

#[tokio::test]
async fn test_scatter_rejects_bad_parameters() {
    let (status, _) = get(full_app(), "/api/v1/stats/scatter?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(full_app(), "/api/v1/stats/scatter?x=shoe-size").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(full_app(), "/api/v1/stats/scatter?x=age&y=credit-score&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stats_without_dataset_are_unavailable() {
    let (status, _) = get(app(Some(demo_predictor()), None), "/api/v1/stats/overview").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (status, body) = get(full_app(), "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/predict"].is_object());
}
