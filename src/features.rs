/// Feature record assembly
///
/// Combines an applicant with its derived fields into the fixed 33-field
/// record the classifier was trained on. Field order is part of the contract:
/// positional consumers index by [`FEATURE_NAMES`].
use crate::models::{ApplicantInput, DerivedFields};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub const FEATURE_COUNT: usize = 33;

/// Model column names, in training order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Age",
    "AnnualIncome",
    "CreditScore",
    "EmploymentStatus",
    "EducationLevel",
    "Experience",
    "LoanAmount",
    "LoanDuration",
    "MaritalStatus",
    "NumberOfDependents",
    "HomeOwnershipStatus",
    "MonthlyDebtPayments",
    "CreditCardUtilizationRate",
    "NumberOfOpenCreditLines",
    "NumberOfCreditInquiries",
    "DebtToIncomeRatio",
    "BankruptcyHistory",
    "LoanPurpose",
    "PreviousLoanDefaults",
    "PaymentHistory",
    "LengthOfCreditHistory",
    "SavingsAccountBalance",
    "CheckingAccountBalance",
    "TotalAssets",
    "TotalLiabilities",
    "MonthlyIncome",
    "UtilityBillsPaymentHistory",
    "JobTenure",
    "NetWorth",
    "BaseInterestRate",
    "InterestRate",
    "MonthlyLoanPayment",
    "TotalDebtToIncomeRatio",
];

/// Columns holding categorical values.
pub const CATEGORICAL_FEATURES: [&str; 5] = [
    "EmploymentStatus",
    "EducationLevel",
    "MaritalStatus",
    "HomeOwnershipStatus",
    "LoanPurpose",
];

/// Position of a feature in [`FEATURE_NAMES`].
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

/// Scale at which payment-history scores reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScoreScale {
    /// 0-100 scores divided by 100.
    Fraction,
    /// Raw 0-100 scores.
    Percent,
}

impl ScoreScale {
    pub fn apply(&self, score: i32) -> f64 {
        match self {
            ScoreScale::Fraction => f64::from(score) / 100.0,
            ScoreScale::Percent => f64::from(score),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreScale::Fraction => "fraction",
            ScoreScale::Percent => "percent",
        }
    }
}

impl FromStr for ScoreScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fraction" => Ok(ScoreScale::Fraction),
            "percent" => Ok(ScoreScale::Percent),
            other => Err(format!(
                "unknown payment score scale '{}', expected 'fraction' or 'percent'",
                other
            )),
        }
    }
}

/// A single feature value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(&'static str),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&'static str> {
        match self {
            FeatureValue::Category(c) => Some(c),
            FeatureValue::Number(_) => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<i32> for FeatureValue {
    fn from(v: i32) -> Self {
        FeatureValue::Number(f64::from(v))
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Number(if v { 1.0 } else { 0.0 })
    }
}

/// Record whose field names do not match [`FEATURE_NAMES`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    pub message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feature schema mismatch: {}", self.message)
    }
}

impl std::error::Error for SchemaError {}

/// The 33 named values consumed by one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    values: [FeatureValue; FEATURE_COUNT],
}

impl FeatureRecord {
    /// Builds the record for an applicant and its derived fields.
    ///
    /// Payment-history scores are scaled by `scale`; every other value is
    /// passed through unchanged.
    pub fn assemble(input: &ApplicantInput, derived: &DerivedFields, scale: ScoreScale) -> Self {
        use FeatureValue::Category;

        let values: [FeatureValue; FEATURE_COUNT] = [
            input.age.into(),
            input.annual_income.into(),
            input.credit_score.into(),
            Category(input.employment_status.as_str()),
            Category(input.education_level.as_str()),
            input.experience_years.into(),
            input.loan_amount.into(),
            input.loan_duration_months.into(),
            Category(input.marital_status.as_str()),
            input.number_of_dependents.into(),
            Category(input.home_ownership_status.as_str()),
            input.monthly_debt_payments.into(),
            input.credit_card_utilization_rate.into(),
            input.number_of_open_credit_lines.into(),
            input.number_of_credit_inquiries.into(),
            derived.debt_to_income_ratio.into(),
            input.bankruptcy_history.into(),
            Category(input.loan_purpose.as_str()),
            input.previous_loan_defaults.into(),
            scale.apply(input.payment_history_score).into(),
            input.length_of_credit_history_years.into(),
            input.savings_balance.into(),
            input.checking_balance.into(),
            input.total_assets.into(),
            input.total_liabilities.into(),
            derived.monthly_income.into(),
            scale.apply(input.utility_bills_payment_score).into(),
            input.job_tenure_years.into(),
            derived.net_worth.into(),
            input.base_interest_rate_percent.into(),
            derived.adjusted_interest_rate.into(),
            derived.monthly_loan_payment.into(),
            derived.total_debt_to_income_ratio.into(),
        ];

        Self { values }
    }

    /// Builds a record from explicit `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Fails when the pairs do not list exactly [`FEATURE_NAMES`] in order.
    pub fn from_pairs(pairs: Vec<(&str, FeatureValue)>) -> Result<Self, SchemaError> {
        if pairs.len() != FEATURE_COUNT {
            return Err(SchemaError {
                message: format!("expected {} fields, got {}", FEATURE_COUNT, pairs.len()),
            });
        }

        let mut values = Vec::with_capacity(FEATURE_COUNT);
        for (position, (name, value)) in pairs.into_iter().enumerate() {
            if name != FEATURE_NAMES[position] {
                return Err(SchemaError {
                    message: format!(
                        "field {} is '{}', expected '{}'",
                        position, name, FEATURE_NAMES[position]
                    ),
                });
            }
            let categorical = CATEGORICAL_FEATURES.contains(&name);
            if categorical != value.as_category().is_some() {
                return Err(SchemaError {
                    message: format!("field '{}' has the wrong value kind", name),
                });
            }
            values.push(value);
        }

        let values: [FeatureValue; FEATURE_COUNT] =
            values.try_into().map_err(|_| SchemaError {
                message: "field count changed during assembly".to_string(),
            })?;
        Ok(Self { values })
    }

    pub fn names(&self) -> &'static [&'static str; FEATURE_COUNT] {
        &FEATURE_NAMES
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        feature_index(name).map(|i| &self.values[i])
    }

    /// `(name, value)` pairs in training order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FeatureValue)> {
        FEATURE_NAMES.iter().copied().zip(self.values.iter())
    }

    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.iter()
            .map(|(name, value)| {
                let json = match value {
                    FeatureValue::Number(v) => serde_json::json!(v),
                    FeatureValue::Category(c) => serde_json::json!(c),
                };
                (name.to_string(), json)
            })
            .collect()
    }

    /// SHA-256 (hex) of the record's canonical JSON form.
    ///
    /// Equal records always produce equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::Value::Object(self.to_json_map()).to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::derive;
    use std::collections::BTreeSet;

    fn default_record(scale: ScoreScale) -> FeatureRecord {
        let input = ApplicantInput::default();
        let derived = derive(&input).unwrap();
        FeatureRecord::assemble(&input, &derived, scale)
    }

    #[test]
    fn test_feature_names_are_unique() {
        let unique: BTreeSet<&str> = FEATURE_NAMES.iter().copied().collect();
        assert_eq!(unique.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_assemble_produces_full_schema() {
        let record = default_record(ScoreScale::Fraction);
        assert_eq!(record.len(), FEATURE_COUNT);
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());
    }

    #[test]
    fn test_categorical_values_use_dataset_spelling() {
        let record = default_record(ScoreScale::Fraction);
        assert_eq!(
            record.get("EducationLevel").and_then(|v| v.as_category()),
            Some("High School")
        );
        for name in CATEGORICAL_FEATURES {
            assert!(record.get(name).unwrap().as_category().is_some());
        }
    }

    #[test]
    fn test_score_scale_applies_only_to_payment_scores() {
        let fraction = default_record(ScoreScale::Fraction);
        let percent = default_record(ScoreScale::Percent);

        assert_eq!(fraction.get("PaymentHistory").unwrap().as_number(), Some(0.85));
        assert_eq!(percent.get("PaymentHistory").unwrap().as_number(), Some(85.0));
        assert_eq!(
            fraction.get("UtilityBillsPaymentHistory").unwrap().as_number(),
            Some(0.9)
        );
        assert_eq!(
            percent.get("UtilityBillsPaymentHistory").unwrap().as_number(),
            Some(90.0)
        );

        let differing: Vec<&str> = fraction
            .iter()
            .zip(percent.iter())
            .filter(|((_, a), (_, b))| a != b)
            .map(|((n, _), _)| n)
            .collect();
        assert_eq!(differing, vec!["PaymentHistory", "UtilityBillsPaymentHistory"]);
    }

    #[test]
    fn test_booleans_become_zero_or_one() {
        let input = ApplicantInput {
            bankruptcy_history: true,
            ..ApplicantInput::default()
        };
        let derived = derive(&input).unwrap();
        let record = FeatureRecord::assemble(&input, &derived, ScoreScale::Fraction);
        assert_eq!(record.get("BankruptcyHistory").unwrap().as_number(), Some(1.0));
        assert_eq!(record.get("PreviousLoanDefaults").unwrap().as_number(), Some(0.0));
    }

    #[test]
    fn test_from_pairs_round_trips_assembled_record() {
        let record = default_record(ScoreScale::Fraction);
        let pairs: Vec<(&str, FeatureValue)> =
            record.iter().map(|(n, v)| (n, v.clone())).collect();
        assert_eq!(FeatureRecord::from_pairs(pairs).unwrap(), record);
    }

    #[test]
    fn test_from_pairs_rejects_missing_or_reordered_fields() {
        let record = default_record(ScoreScale::Fraction);
        let mut pairs: Vec<(&str, FeatureValue)> =
            record.iter().map(|(n, v)| (n, v.clone())).collect();

        let mut short = pairs.clone();
        short.pop();
        assert!(FeatureRecord::from_pairs(short).is_err());

        pairs.swap(0, 1);
        let err = FeatureRecord::from_pairs(pairs).unwrap_err();
        assert!(err.message.contains("expected 'Age'"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = default_record(ScoreScale::Fraction);
        let b = default_record(ScoreScale::Fraction);
        let c = default_record(ScoreScale::Percent);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
