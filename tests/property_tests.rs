/// Property-based tests using proptest
/// Tests invariants of the derivation formulas and input validation
use loan_approval_api::derivation::{
    adjusted_interest_rate, amortized_monthly_payment, debt_to_income_ratio, derive,
    monthly_income, net_worth, total_debt_to_income_ratio,
};
use loan_approval_api::features::{FeatureRecord, ScoreScale, FEATURE_COUNT};
use loan_approval_api::models::{ApplicantInput, LOAN_DURATIONS_MONTHS};
use loan_approval_api::validation::validate;
use proptest::prelude::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// Property: income and debt ratios
proptest! {
    #[test]
    fn monthly_income_is_a_twelfth(annual in 0.0f64..1_000_000.0) {
        prop_assert!(close(monthly_income(annual) * 12.0, annual));
    }

    #[test]
    fn ratios_are_zero_without_income(debt in 0.0f64..10_000.0) {
        prop_assert_eq!(debt_to_income_ratio(debt, 0.0), 0.0);
        prop_assert_eq!(total_debt_to_income_ratio(debt, 0.0), 0.0);
    }

    #[test]
    fn debt_to_income_is_debt_over_monthly_income(
        debt in 0.0f64..10_000.0,
        annual in 1.0f64..1_000_000.0
    ) {
        prop_assert_eq!(debt_to_income_ratio(debt, annual), debt / monthly_income(annual));
        prop_assert_eq!(total_debt_to_income_ratio(debt, annual), (debt * 12.0) / annual);
    }

    #[test]
    fn monthly_and_annual_ratios_agree(
        debt in 50.0f64..3_000.0,
        annual in 15_000.0f64..500_000.0
    ) {
        let monthly = debt_to_income_ratio(debt, annual);
        let total = total_debt_to_income_ratio(debt, annual);
        prop_assert!(close(monthly, total));
        prop_assert!(monthly > 0.0);
    }

    #[test]
    fn net_worth_sign_follows_balance(assets in 0.0f64..1_000_000.0, liabilities in 0.0f64..500_000.0) {
        let nw = net_worth(assets, liabilities);
        prop_assert_eq!(nw > 0.0, assets > liabilities);
    }
}

// Property: interest and amortization
proptest! {
    #[test]
    fn rate_adjustment_is_monotonic(base in 3.0f64..15.0, score in 343i32..712) {
        prop_assert!(adjusted_interest_rate(base, score + 1) < adjusted_interest_rate(base, score));
    }

    #[test]
    fn zero_rate_splits_principal_evenly(principal in 0.0f64..200_000.0, n in 1u32..=360) {
        let payment = amortized_monthly_payment(principal, 0.0, n).unwrap();
        prop_assert!(close(payment * f64::from(n), principal));
    }

    #[test]
    fn positive_rate_costs_more_than_even_split(
        principal in 3_674.0f64..200_000.0,
        rate in 0.0001f64..0.02,
        n in 1u32..=360
    ) {
        let payment = amortized_monthly_payment(principal, rate, n).unwrap();
        prop_assert!(payment.is_finite());
        prop_assert!(payment * f64::from(n) >= principal);
    }
}

fn applicant_strategy() -> impl Strategy<Value = ApplicantInput> {
    (
        -100i32..200,
        -1_000.0f64..600_000.0,
        0i32..900,
        -1.0f64..2.0,
        0.0f64..4_000.0,
        prop::sample::select(vec![0, 6, 12, 24, 36, 48, 60, 72, 120, 360, 400]),
        0.0f64..20.0,
        -10i32..120,
    )
        .prop_map(
            |(age, income, score, util, debt, months, rate, payment_score)| ApplicantInput {
                age,
                annual_income: income,
                credit_score: score,
                credit_card_utilization_rate: util,
                monthly_debt_payments: debt,
                loan_duration_months: months,
                base_interest_rate_percent: rate,
                payment_history_score: payment_score,
                ..ApplicantInput::default()
            },
        )
}

// Property: validation guards derivation
proptest! {
    #[test]
    fn validation_never_panics(input in applicant_strategy()) {
        let _ = validate(&input);
    }

    #[test]
    fn validated_inputs_always_derive(input in applicant_strategy()) {
        if validate(&input).is_ok() {
            prop_assert!(LOAN_DURATIONS_MONTHS.contains(&input.loan_duration_months));
            let derived = derive(&input).unwrap();
            prop_assert!(derived.monthly_loan_payment.is_finite());
            prop_assert!(derived.monthly_loan_payment > 0.0);

            let record = FeatureRecord::assemble(&input, &derived, ScoreScale::Fraction);
            prop_assert_eq!(record.len(), FEATURE_COUNT);
        }
    }

    #[test]
    fn validation_reports_each_offending_field_once(input in applicant_strategy()) {
        if let Err(violations) = validate(&input) {
            prop_assert!(!violations.is_empty());
            let mut fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
            let before = fields.len();
            fields.dedup();
            prop_assert_eq!(before, fields.len());
        }
    }
}
