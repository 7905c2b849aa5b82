/// Prediction workflow shared by the HTTP handlers
///
/// 1. Derive financial fields from a validated applicant
/// 2. Assemble the feature record at the model's payment score scale
/// 3. Look up the record fingerprint in the prediction cache
/// 4. On a miss, ask the classifier for a decision and class probabilities
/// 5. Summarize the result the way the application form displays it
use crate::classifier::LoanClassifier;
use crate::derivation;
use crate::errors::{AppError, ResultExt};
use crate::features::{FeatureRecord, ScoreScale};
use crate::models::{
    ApplicantInput, ApplicationSummary, Decision, DerivedFields, ModelInfo, PredictionResponse,
    Rating, RiskBand,
};
use crate::validation::ValidatedApplicant;
use chrono::Utc;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Credit scores at or above this are shown as `Good`.
pub const GOOD_CREDIT_SCORE: i32 = 600;
/// Debt-to-income ratios below this are shown as `Good`.
pub const GOOD_DEBT_TO_INCOME: f64 = 0.36;
/// Approval probability (percent) from which the risk band is `Low`.
pub const LOW_RISK_FROM_PERCENT: f64 = 70.0;
/// Approval probability (percent) from which the risk band is `Medium`.
pub const MEDIUM_RISK_FROM_PERCENT: f64 = 40.0;

/// Raw classifier answer for one feature record.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ModelOutput {
    decision: Decision,
    probabilities: [f64; 2],
}

#[derive(Clone)]
pub struct PredictionService {
    classifier: Arc<dyn LoanClassifier>,
    score_scale: ScoreScale,
    /// Feature record fingerprint -> model output.
    cache: Cache<String, ModelOutput>,
}

impl PredictionService {
    pub fn new(
        classifier: Arc<dyn LoanClassifier>,
        score_scale: ScoreScale,
        cache_ttl: Duration,
        cache_capacity: u64,
    ) -> Self {
        let cache = Cache::builder()
            .time_to_live(cache_ttl)
            .max_capacity(cache_capacity)
            .build();

        Self {
            classifier,
            score_scale,
            cache,
        }
    }

    pub fn score_scale(&self) -> ScoreScale {
        self.score_scale
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: self.classifier.name().to_string(),
            version: self.classifier.version().to_string(),
        }
    }

    /// Builds the exact record the classifier will see for an applicant.
    pub fn feature_record(
        &self,
        applicant: &ValidatedApplicant,
    ) -> Result<(DerivedFields, FeatureRecord), AppError> {
        let input = applicant.input();
        let derived = derivation::derive(input)?;
        let record = FeatureRecord::assemble(input, &derived, self.score_scale);
        Ok((derived, record))
    }

    /// Scores one applicant.
    ///
    /// Classifier failures are returned as a single [`AppError::ModelError`];
    /// nothing is retried and no partial result is produced.
    pub async fn predict(
        &self,
        applicant: &ValidatedApplicant,
    ) -> Result<PredictionResponse, AppError> {
        let (derived, record) = self
            .feature_record(applicant)
            .context("Building feature record")?;
        let key = record.fingerprint();

        let (output, cached) = match self.cache.get(&key).await {
            Some(output) => {
                tracing::debug!("Prediction cache hit for {}", &key[..12]);
                (output, true)
            }
            None => {
                let output = self.run_model(&record)?;
                self.cache.insert(key, output).await;
                (output, false)
            }
        };

        let approval_probability = output.probabilities[1];
        let summary = summarize(applicant.input(), &derived, approval_probability);

        tracing::info!(
            "Prediction: {:?} (p_approved={:.4}, cached={}, model={})",
            output.decision,
            approval_probability,
            cached,
            self.classifier.name()
        );

        Ok(PredictionResponse {
            prediction_id: Uuid::new_v4(),
            decision: output.decision,
            label: output.decision.label(),
            approval_probability,
            class_probabilities: output.probabilities.to_vec(),
            derived,
            summary,
            model: self.model_info(),
            cached,
            predicted_at: Utc::now(),
        })
    }

    fn run_model(&self, record: &FeatureRecord) -> Result<ModelOutput, AppError> {
        let (decision, probabilities) = self
            .classifier
            .classify(record)
            .context("Classifying loan application")?;

        let [p0, p1] = probabilities;
        let well_formed = [p0, p1]
            .iter()
            .all(|p| p.is_finite() && (0.0..=1.0).contains(p))
            && ((p0 + p1) - 1.0).abs() < 1e-6;
        if !well_formed {
            return Err(AppError::ModelError(format!(
                "classifier returned invalid probabilities [{}, {}]",
                p0, p1
            )));
        }

        Ok(ModelOutput {
            decision,
            probabilities,
        })
    }
}

pub fn risk_band(approval_probability_percent: f64) -> RiskBand {
    if approval_probability_percent >= LOW_RISK_FROM_PERCENT {
        RiskBand::Low
    } else if approval_probability_percent >= MEDIUM_RISK_FROM_PERCENT {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

/// Key figures and badges displayed next to a prediction.
pub fn summarize(
    input: &ApplicantInput,
    derived: &DerivedFields,
    approval_probability: f64,
) -> ApplicationSummary {
    let percent = approval_probability * 100.0;

    ApplicationSummary {
        credit_score: input.credit_score,
        credit_score_rating: if input.credit_score >= GOOD_CREDIT_SCORE {
            Rating::Good
        } else {
            Rating::Fair
        },
        debt_to_income_ratio: derived.debt_to_income_ratio,
        debt_to_income_rating: if derived.debt_to_income_ratio < GOOD_DEBT_TO_INCOME {
            Rating::Good
        } else {
            Rating::High
        },
        net_worth: derived.net_worth,
        net_worth_rating: if derived.net_worth > 0.0 {
            Rating::Positive
        } else {
            Rating::Negative
        },
        monthly_payment: derived.monthly_loan_payment.round(),
        approval_probability_percent: percent,
        risk_band: risk_band(percent),
    }
}
