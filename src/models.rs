use crate::features::ScoreScale;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============ Categorical Inputs ============

/// Marital status of the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
}

impl MaritalStatus {
    /// Spelling used by the dataset and the trained model.
    pub fn as_str(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "Single",
            MaritalStatus::Married => "Married",
            MaritalStatus::Divorced => "Divorced",
        }
    }
}

/// Highest education level reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum EducationLevel {
    #[serde(rename = "High School", alias = "HighSchool")]
    HighSchool,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

impl EducationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::HighSchool => "High School",
            EducationLevel::Associate => "Associate",
            EducationLevel::Bachelor => "Bachelor",
            EducationLevel::Master => "Master",
            EducationLevel::Doctorate => "Doctorate",
        }
    }
}

/// Home ownership status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum HomeOwnershipStatus {
    Rent,
    Own,
    Mortgage,
}

impl HomeOwnershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HomeOwnershipStatus::Rent => "Rent",
            HomeOwnershipStatus::Own => "Own",
            HomeOwnershipStatus::Mortgage => "Mortgage",
        }
    }
}

/// Employment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum EmploymentStatus {
    Employed,
    #[serde(rename = "Self-Employed", alias = "SelfEmployed")]
    SelfEmployed,
    Unemployed,
}

impl EmploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentStatus::Employed => "Employed",
            EmploymentStatus::SelfEmployed => "Self-Employed",
            EmploymentStatus::Unemployed => "Unemployed",
        }
    }
}

/// What the loan is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum LoanPurpose {
    Home,
    Auto,
    Education,
    Business,
    Other,
}

impl LoanPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanPurpose::Home => "Home",
            LoanPurpose::Auto => "Auto",
            LoanPurpose::Education => "Education",
            LoanPurpose::Business => "Business",
            LoanPurpose::Other => "Other",
        }
    }
}

/// Loan durations offered by the application form, in months.
pub const LOAN_DURATIONS_MONTHS: [i32; 10] = [12, 24, 36, 48, 60, 72, 84, 96, 108, 120];

// ============ Applicant Input ============

/// Raw values supplied by the applicant.
///
/// Deserialization only checks types and enum spellings. Numeric ranges are
/// checked by [`crate::validation::validate`] before any derivation happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantInput {
    /// Age in years (18-80).
    pub age: i32,
    pub marital_status: MaritalStatus,
    /// Number of dependents (0-5).
    pub number_of_dependents: i32,
    pub education_level: EducationLevel,
    pub home_ownership_status: HomeOwnershipStatus,
    pub employment_status: EmploymentStatus,
    /// Years of work experience (0-61).
    pub experience_years: i32,
    /// Years at the current job (0-40).
    pub job_tenure_years: i32,
    /// Gross annual income (15000-500000).
    pub annual_income: f64,
    pub savings_balance: f64,
    pub checking_balance: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    /// Credit score (343-712).
    pub credit_score: i32,
    /// Credit card utilization as a fraction (0.0-1.0).
    pub credit_card_utilization_rate: f64,
    pub number_of_open_credit_lines: i32,
    /// Monthly debt payments (50-3000).
    pub monthly_debt_payments: f64,
    pub number_of_credit_inquiries: i32,
    pub length_of_credit_history_years: i32,
    /// Payment history score (0-100).
    pub payment_history_score: i32,
    /// Utility bills payment score (0-100).
    pub utility_bills_payment_score: i32,
    pub bankruptcy_history: bool,
    pub previous_loan_defaults: bool,
    /// Requested principal (3674-200000).
    pub loan_amount: f64,
    /// One of 12, 24, ..., 120.
    pub loan_duration_months: i32,
    pub loan_purpose: LoanPurpose,
    /// Base interest rate in percent (3.0-15.0).
    pub base_interest_rate_percent: f64,
}

impl Default for ApplicantInput {
    /// The values the application form starts with.
    fn default() -> Self {
        Self {
            age: 35,
            marital_status: MaritalStatus::Single,
            number_of_dependents: 0,
            education_level: EducationLevel::HighSchool,
            home_ownership_status: HomeOwnershipStatus::Rent,
            employment_status: EmploymentStatus::Employed,
            experience_years: 10,
            job_tenure_years: 5,
            annual_income: 60_000.0,
            savings_balance: 10_000.0,
            checking_balance: 5_000.0,
            total_assets: 50_000.0,
            total_liabilities: 20_000.0,
            credit_score: 600,
            credit_card_utilization_rate: 0.3,
            number_of_open_credit_lines: 3,
            monthly_debt_payments: 400.0,
            number_of_credit_inquiries: 2,
            length_of_credit_history_years: 10,
            payment_history_score: 85,
            utility_bills_payment_score: 90,
            bankruptcy_history: false,
            previous_loan_defaults: false,
            loan_amount: 25_000.0,
            loan_duration_months: 12,
            loan_purpose: LoanPurpose::Home,
            base_interest_rate_percent: 6.5,
        }
    }
}

// ============ Derived Fields ============

/// Financial fields computed from an [`ApplicantInput`].
///
/// Always recomputed with [`crate::derivation::derive`], never edited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFields {
    pub monthly_income: f64,
    pub net_worth: f64,
    pub debt_to_income_ratio: f64,
    pub total_debt_to_income_ratio: f64,
    pub interest_rate_adjustment: f64,
    /// Base rate plus the credit-score adjustment, in percent. Not clamped.
    pub adjusted_interest_rate: f64,
    pub monthly_payment_rate: f64,
    pub monthly_loan_payment: f64,
}

// ============ Prediction Output ============

/// Binary model decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Rejected,
    Approved,
}

impl Decision {
    /// Class label as produced by the model (1 = approved).
    pub fn label(&self) -> u8 {
        match self {
            Decision::Rejected => 0,
            Decision::Approved => 1,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved)
    }
}

/// Qualitative badge next to a summary metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Rating {
    Good,
    Fair,
    High,
    Positive,
    Negative,
}

/// Risk band derived from the approval probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

/// Key figures shown next to a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub credit_score: i32,
    pub credit_score_rating: Rating,
    pub debt_to_income_ratio: f64,
    pub debt_to_income_rating: Rating,
    pub net_worth: f64,
    pub net_worth_rating: Rating,
    /// Monthly loan payment rounded to whole dollars.
    pub monthly_payment: f64,
    /// Approval probability in percent (0-100).
    pub approval_probability_percent: f64,
    pub risk_band: RiskBand,
}

/// Identifies the model that produced a prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
}

/// Response body of `POST /api/v1/predict`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub prediction_id: Uuid,
    pub decision: Decision,
    /// 1 when approved, 0 when rejected.
    pub label: u8,
    /// Probability of approval, `p1` of the model output.
    pub approval_probability: f64,
    /// `[p0, p1]` as returned by the model.
    pub class_probabilities: Vec<f64>,
    pub derived: DerivedFields,
    pub summary: ApplicationSummary,
    pub model: ModelInfo,
    /// Whether the result came from the prediction cache.
    pub cached: bool,
    pub predicted_at: DateTime<Utc>,
}

/// Response body of `GET /api/v1/schema`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaResponse {
    pub feature_names: Vec<String>,
    /// `None` while no model is loaded.
    pub payment_score_scale: Option<ScoreScale>,
    pub loan_durations_months: Vec<i32>,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub model: Option<ModelInfo>,
    pub dataset_loaded: bool,
    pub limits: ServiceLimits,
}

/// Operational limits currently in force, as configured at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLimits {
    pub max_body_bytes: usize,
    pub prediction_cache_ttl_secs: u64,
    pub prediction_cache_capacity: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}
