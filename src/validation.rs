/// Boundary validation for applicant input
///
/// Every numeric field is checked against the inclusive range the
/// application form allows. All violations are collected so a client can fix
/// the whole form in one round trip.
use crate::models::{ApplicantInput, LOAN_DURATIONS_MONTHS};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldViolation {
    /// camelCase wire name of the field.
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// An [`ApplicantInput`] that passed [`validate`].
///
/// Only constructible through [`ValidatedApplicant::new`], so holders can rely
/// on every range check having run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedApplicant(ApplicantInput);

impl ValidatedApplicant {
    pub fn new(input: ApplicantInput) -> Result<Self, Vec<FieldViolation>> {
        validate(&input)?;
        Ok(Self(input))
    }

    pub fn input(&self) -> &ApplicantInput {
        &self.0
    }
}

struct Checker {
    violations: Vec<FieldViolation>,
}

impl Checker {
    fn int(&mut self, field: &str, value: i32, min: i32, max: i32) {
        if value < min || value > max {
            self.violations.push(FieldViolation::new(
                field,
                format!("must be between {} and {}, got {}", min, max, value),
            ));
        }
    }

    fn float(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !value.is_finite() {
            self.violations
                .push(FieldViolation::new(field, "must be a finite number"));
        } else if value < min || value > max {
            self.violations.push(FieldViolation::new(
                field,
                format!("must be between {} and {}, got {}", min, max, value),
            ));
        }
    }
}

/// Checks every range and enum constraint on an applicant.
///
/// # Returns
///
/// * `Ok(())` when the input is within all bounds.
/// * `Err(violations)` listing every offending field otherwise.
pub fn validate(input: &ApplicantInput) -> Result<(), Vec<FieldViolation>> {
    let mut c = Checker {
        violations: Vec::new(),
    };

    // Personal
    c.int("age", input.age, 18, 80);
    c.int("numberOfDependents", input.number_of_dependents, 0, 5);
    c.int("experienceYears", input.experience_years, 0, 61);
    c.int("jobTenureYears", input.job_tenure_years, 0, 40);

    // Income & balances
    c.float("annualIncome", input.annual_income, 15_000.0, 500_000.0);
    c.float("savingsBalance", input.savings_balance, 0.0, 500_000.0);
    c.float("checkingBalance", input.checking_balance, 0.0, 200_000.0);
    c.float("totalAssets", input.total_assets, 0.0, 1_000_000.0);
    c.float("totalLiabilities", input.total_liabilities, 0.0, 500_000.0);

    // Credit & debt
    c.int("creditScore", input.credit_score, 343, 712);
    c.float(
        "creditCardUtilizationRate",
        input.credit_card_utilization_rate,
        0.0,
        1.0,
    );
    c.int("numberOfOpenCreditLines", input.number_of_open_credit_lines, 0, 20);
    c.float("monthlyDebtPayments", input.monthly_debt_payments, 50.0, 3_000.0);
    c.int("numberOfCreditInquiries", input.number_of_credit_inquiries, 0, 20);
    c.int(
        "lengthOfCreditHistoryYears",
        input.length_of_credit_history_years,
        0,
        50,
    );
    c.int("paymentHistoryScore", input.payment_history_score, 0, 100);
    c.int(
        "utilityBillsPaymentScore",
        input.utility_bills_payment_score,
        0,
        100,
    );

    // Loan
    c.float("loanAmount", input.loan_amount, 3_674.0, 200_000.0);
    if !LOAN_DURATIONS_MONTHS.contains(&input.loan_duration_months) {
        c.violations.push(FieldViolation::new(
            "loanDurationMonths",
            format!(
                "must be one of {:?}, got {}",
                LOAN_DURATIONS_MONTHS, input.loan_duration_months
            ),
        ));
    }
    c.float(
        "baseInterestRatePercent",
        input.base_interest_rate_percent,
        3.0,
        15.0,
    );

    if c.violations.is_empty() {
        Ok(())
    } else {
        tracing::warn!(
            "Applicant input rejected: {} violation(s): {:?}",
            c.violations.len(),
            c.violations.iter().map(|v| &v.field).collect::<Vec<_>>()
        );
        Err(c.violations)
    }
}
