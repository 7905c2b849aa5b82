/// Derived financial fields for a loan application
///
/// Pure arithmetic over [`ApplicantInput`] values:
/// 1. Monthly income and net worth
/// 2. Debt-to-income ratios (zero when there is no income)
/// 3. Credit-score adjusted interest rate
/// 4. Fixed-rate amortized monthly payment
///
/// Nothing here clamps or rounds. Degenerate inputs saturate to 0 or take the
/// zero-rate amortization branch.
use crate::models::{ApplicantInput, DerivedFields};
use std::fmt;

/// Credit score at which the interest rate adjustment is zero.
pub const REFERENCE_CREDIT_SCORE: f64 = 700.0;

/// Percentage points added per 100 credit-score points below the reference.
pub const RATE_ADJUSTMENT_PER_100_POINTS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum DerivationError {
    /// Amortization over zero payments.
    ZeroPayments,
}

impl fmt::Display for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationError::ZeroPayments => {
                write!(f, "number of payments must be at least 1")
            }
        }
    }
}

impl std::error::Error for DerivationError {}

pub fn monthly_income(annual_income: f64) -> f64 {
    if annual_income == 0.0 {
        return 0.0;
    }
    annual_income / 12.0
}

/// Assets minus liabilities. Negative values are a valid signal.
pub fn net_worth(total_assets: f64, total_liabilities: f64) -> f64 {
    total_assets - total_liabilities
}

/// Monthly debt payments over monthly income, 0 when there is no income.
pub fn debt_to_income_ratio(monthly_debt_payments: f64, annual_income: f64) -> f64 {
    if annual_income == 0.0 {
        return 0.0;
    }
    monthly_debt_payments / (annual_income / 12.0)
}

/// Annualized debt payments over annual income, 0 when there is no income.
pub fn total_debt_to_income_ratio(monthly_debt_payments: f64, annual_income: f64) -> f64 {
    if annual_income == 0.0 {
        return 0.0;
    }
    (monthly_debt_payments * 12.0) / annual_income
}

/// Percentage points added to the base rate for a given credit score.
///
/// Scores above the reference yield a negative adjustment.
pub fn interest_rate_adjustment(credit_score: i32) -> f64 {
    (REFERENCE_CREDIT_SCORE - f64::from(credit_score)) / 100.0 * RATE_ADJUSTMENT_PER_100_POINTS
}

/// Base rate plus the credit-score adjustment, in percent.
///
/// The result is passed through as-is, even when it leaves the base rate's
/// input bounds.
pub fn adjusted_interest_rate(base_rate_percent: f64, credit_score: i32) -> f64 {
    base_rate_percent + interest_rate_adjustment(credit_score)
}

/// Annual percentage rate to monthly fractional rate.
pub fn monthly_payment_rate(adjusted_rate_percent: f64) -> f64 {
    adjusted_rate_percent / 100.0 / 12.0
}

/// Fixed payment that repays `principal` over `num_payments` periods.
///
/// Uses the annuity formula when `monthly_rate > 0` and a straight
/// `principal / num_payments` split otherwise. The two branches are not
/// continuous at zero; a rate of exactly 0 always takes the split.
///
/// # Errors
///
/// * [`DerivationError::ZeroPayments`] when `num_payments == 0`.
pub fn amortized_monthly_payment(
    principal: f64,
    monthly_rate: f64,
    num_payments: u32,
) -> Result<f64, DerivationError> {
    if num_payments == 0 {
        return Err(DerivationError::ZeroPayments);
    }

    let n = f64::from(num_payments);
    if monthly_rate > 0.0 {
        let growth = (1.0 + monthly_rate).powf(n);
        Ok(principal * (monthly_rate * growth) / (growth - 1.0))
    } else {
        Ok(principal / n)
    }
}

/// Computes every derived field for an applicant.
///
/// # Errors
///
/// * [`DerivationError::ZeroPayments`] when the loan duration is not positive.
///   Validated inputs never hit this.
pub fn derive(input: &ApplicantInput) -> Result<DerivedFields, DerivationError> {
    let num_payments =
        u32::try_from(input.loan_duration_months).map_err(|_| DerivationError::ZeroPayments)?;

    let adjustment = interest_rate_adjustment(input.credit_score);
    let adjusted_rate = input.base_interest_rate_percent + adjustment;
    let monthly_rate = monthly_payment_rate(adjusted_rate);
    let monthly_loan_payment =
        amortized_monthly_payment(input.loan_amount, monthly_rate, num_payments)?;

    Ok(DerivedFields {
        monthly_income: monthly_income(input.annual_income),
        net_worth: net_worth(input.total_assets, input.total_liabilities),
        debt_to_income_ratio: debt_to_income_ratio(
            input.monthly_debt_payments,
            input.annual_income,
        ),
        total_debt_to_income_ratio: total_debt_to_income_ratio(
            input.monthly_debt_payments,
            input.annual_income,
        ),
        interest_rate_adjustment: adjustment,
        adjusted_interest_rate: adjusted_rate,
        monthly_payment_rate: monthly_rate,
        monthly_loan_payment,
    })
}
