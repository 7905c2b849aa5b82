/// Historical loan applications and their descriptive statistics
///
/// The dataset is read once at start-up and never modified. Statistics are
/// recomputed on demand with a single pass over the rows.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use utoipa::ToSchema;

pub const DEFAULT_HISTOGRAM_BINS: usize = 30;
pub const MAX_HISTOGRAM_BINS: usize = 200;
pub const DEFAULT_SCATTER_POINTS: usize = 2_000;
pub const MAX_SCATTER_POINTS: usize = 20_000;

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    Io(String),
    Csv(String),
    InvalidBins(usize),
    InvalidLimit(usize),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io(msg) => write!(f, "Dataset I/O error: {}", msg),
            DatasetError::Csv(msg) => write!(f, "Dataset parse error: {}", msg),
            DatasetError::InvalidBins(n) => write!(
                f,
                "bins must be between 1 and {}, got {}",
                MAX_HISTOGRAM_BINS, n
            ),
            DatasetError::InvalidLimit(n) => write!(
                f,
                "limit must be between 1 and {}, got {}",
                MAX_SCATTER_POINTS, n
            ),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        DatasetError::Csv(err.to_string())
    }
}

/// One historical application. Columns not listed here are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatasetRow {
    pub age: f64,
    pub annual_income: f64,
    pub credit_score: f64,
    pub employment_status: String,
    pub education_level: String,
    pub experience: f64,
    pub loan_amount: f64,
    pub marital_status: String,
    pub home_ownership_status: String,
    pub bankruptcy_history: f64,
    pub loan_purpose: String,
    pub previous_loan_defaults: f64,
    pub debt_to_income_ratio: f64,
    pub net_worth: f64,
    pub loan_approved: f64,
}

impl DatasetRow {
    pub fn is_approved(&self) -> bool {
        self.loan_approved >= 0.5
    }
}

/// Categorical column to break approval rates down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Dimension {
    EmploymentStatus,
    EducationLevel,
    MaritalStatus,
    HomeOwnershipStatus,
    LoanPurpose,
    BankruptcyHistory,
    PreviousLoanDefaults,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::EmploymentStatus,
        Dimension::EducationLevel,
        Dimension::MaritalStatus,
        Dimension::HomeOwnershipStatus,
        Dimension::LoanPurpose,
        Dimension::BankruptcyHistory,
        Dimension::PreviousLoanDefaults,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Dimension::EmploymentStatus => "EmploymentStatus",
            Dimension::EducationLevel => "EducationLevel",
            Dimension::MaritalStatus => "MaritalStatus",
            Dimension::HomeOwnershipStatus => "HomeOwnershipStatus",
            Dimension::LoanPurpose => "LoanPurpose",
            Dimension::BankruptcyHistory => "BankruptcyHistory",
            Dimension::PreviousLoanDefaults => "PreviousLoanDefaults",
        }
    }

    fn group_of(&self, row: &DatasetRow) -> String {
        let yes_no = |v: f64| String::from(if v >= 0.5 { "Yes" } else { "No" });
        match self {
            Dimension::EmploymentStatus => row.employment_status.clone(),
            Dimension::EducationLevel => row.education_level.clone(),
            Dimension::MaritalStatus => row.marital_status.clone(),
            Dimension::HomeOwnershipStatus => row.home_ownership_status.clone(),
            Dimension::LoanPurpose => row.loan_purpose.clone(),
            Dimension::BankruptcyHistory => yes_no(row.bankruptcy_history),
            Dimension::PreviousLoanDefaults => yes_no(row.previous_loan_defaults),
        }
    }
}

/// Lowercase with separators removed, so `loan-purpose`, `loan_purpose` and
/// `LoanPurpose` all match.
fn normalize_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| normalize_key(d.column()) == key)
            .ok_or_else(|| format!("unknown dimension '{}'", s))
    }
}

/// Numeric column that can be histogrammed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum NumericField {
    Age,
    CreditScore,
    AnnualIncome,
    LoanAmount,
    NetWorth,
    DebtToIncomeRatio,
}

impl NumericField {
    pub const ALL: [NumericField; 6] = [
        NumericField::Age,
        NumericField::CreditScore,
        NumericField::AnnualIncome,
        NumericField::LoanAmount,
        NumericField::NetWorth,
        NumericField::DebtToIncomeRatio,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            NumericField::Age => "Age",
            NumericField::CreditScore => "CreditScore",
            NumericField::AnnualIncome => "AnnualIncome",
            NumericField::LoanAmount => "LoanAmount",
            NumericField::NetWorth => "NetWorth",
            NumericField::DebtToIncomeRatio => "DebtToIncomeRatio",
        }
    }

    fn value_of(&self, row: &DatasetRow) -> f64 {
        match self {
            NumericField::Age => row.age,
            NumericField::CreditScore => row.credit_score,
            NumericField::AnnualIncome => row.annual_income,
            NumericField::LoanAmount => row.loan_amount,
            NumericField::NetWorth => row.net_worth,
            NumericField::DebtToIncomeRatio => row.debt_to_income_ratio,
        }
    }
}

impl FromStr for NumericField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        NumericField::ALL
            .iter()
            .copied()
            .find(|f| normalize_key(f.column()) == key)
            .ok_or_else(|| format!("unknown numeric field '{}'", s))
    }
}

/// Headline figures over the whole dataset.
///
/// Averages and the approval rate are `None` for an empty dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatasetOverview {
    pub total_records: usize,
    pub approved: usize,
    pub rejected: usize,
    pub approval_rate_percent: Option<f64>,
    pub avg_loan_amount: Option<f64>,
    pub avg_annual_income: Option<f64>,
    pub avg_credit_score: Option<f64>,
    pub avg_age: Option<f64>,
    pub avg_experience: Option<f64>,
    pub avg_debt_to_income_ratio: Option<f64>,
    pub avg_net_worth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalGroup {
    pub group: String,
    pub count: usize,
    pub approved: usize,
    pub approval_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalBreakdown {
    pub dimension: Dimension,
    pub groups: Vec<ApprovalGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    pub field: NumericField,
    pub bins: Vec<HistogramBin>,
}

/// Five-number summary of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoxSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxSummary {
    /// `None` for an empty slice. Quartiles interpolate linearly between
    /// the closest ranks.
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let quantile = |q: f64| {
            let pos = q * (values.len() - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
        };

        Some(Self {
            count: values.len(),
            min: values[0],
            q1: quantile(0.25),
            median: quantile(0.5),
            q3: quantile(0.75),
            max: values[values.len() - 1],
        })
    }
}

/// Box-plot figures for a numeric column, per outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBoxes {
    pub field: NumericField,
    pub approved: Option<BoxSummary>,
    pub rejected: Option<BoxSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub approved: bool,
}

/// Paired values of two numeric columns, thinned to at most `limit` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scatter {
    pub x: NumericField,
    pub y: NumericField,
    /// Rows with both values finite, before thinning.
    pub total_points: usize,
    pub points: Vec<ScatterPoint>,
}

/// Read-only historical dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| DatasetError::Io(format!("{}: {}", path.display(), e)))?;
        let dataset = Self::from_reader(file)?;
        tracing::info!(
            "Loaded dataset from {} ({} records)",
            path.display(),
            dataset.len()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let rows = csv_reader
            .deserialize::<DatasetRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<DatasetRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    fn mean(&self, f: impl Fn(&DatasetRow) -> f64) -> Option<f64> {
        let (sum, n) = self
            .rows
            .iter()
            .map(f)
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if n == 0 {
            None
        } else {
            Some(sum / n as f64)
        }
    }

    pub fn overview(&self) -> DatasetOverview {
        let total = self.rows.len();
        let approved = self.rows.iter().filter(|r| r.is_approved()).count();

        DatasetOverview {
            total_records: total,
            approved,
            rejected: total - approved,
            approval_rate_percent: if total == 0 {
                None
            } else {
                Some(approved as f64 / total as f64 * 100.0)
            },
            avg_loan_amount: self.mean(|r| r.loan_amount),
            avg_annual_income: self.mean(|r| r.annual_income),
            avg_credit_score: self.mean(|r| r.credit_score),
            avg_age: self.mean(|r| r.age),
            avg_experience: self.mean(|r| r.experience),
            avg_debt_to_income_ratio: self.mean(|r| r.debt_to_income_ratio),
            avg_net_worth: self.mean(|r| r.net_worth),
        }
    }

    /// Approval rate per group of `dimension`, groups sorted by name.
    pub fn approval_rate_by(&self, dimension: Dimension) -> ApprovalBreakdown {
        let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for row in &self.rows {
            let entry = counts.entry(dimension.group_of(row)).or_insert((0, 0));
            entry.0 += 1;
            if row.is_approved() {
                entry.1 += 1;
            }
        }

        let groups = counts
            .into_iter()
            .map(|(group, (count, approved))| ApprovalGroup {
                group,
                count,
                approved,
                approval_rate_percent: approved as f64 / count as f64 * 100.0,
            })
            .collect();

        ApprovalBreakdown { dimension, groups }
    }

    /// Equal-width histogram of `field`, split by approval.
    ///
    /// The maximum lands in the last bin. A constant column yields a single
    /// bin; an empty dataset yields none.
    ///
    /// # Errors
    ///
    /// * [`DatasetError::InvalidBins`] unless `1 <= bins <= MAX_HISTOGRAM_BINS`.
    pub fn histogram(&self, field: NumericField, bins: usize) -> Result<Histogram, DatasetError> {
        if bins == 0 || bins > MAX_HISTOGRAM_BINS {
            return Err(DatasetError::InvalidBins(bins));
        }

        let values: Vec<(f64, bool)> = self
            .rows
            .iter()
            .map(|r| (field.value_of(r), r.is_approved()))
            .filter(|(v, _)| v.is_finite())
            .collect();

        if values.is_empty() {
            return Ok(Histogram {
                field,
                bins: Vec::new(),
            });
        }

        let min = values.iter().map(|(v, _)| *v).fold(f64::INFINITY, f64::min);
        let max = values
            .iter()
            .map(|(v, _)| *v)
            .fold(f64::NEG_INFINITY, f64::max);

        let bin_count = if max > min { bins } else { 1 };
        let width = if max > min {
            (max - min) / bin_count as f64
        } else {
            0.0
        };

        let mut out: Vec<HistogramBin> = (0..bin_count)
            .map(|i| HistogramBin {
                lower: min + width * i as f64,
                upper: if i + 1 == bin_count {
                    max
                } else {
                    min + width * (i + 1) as f64
                },
                approved: 0,
                rejected: 0,
            })
            .collect();

        for (value, approved) in values {
            let index = if width > 0.0 {
                (((value - min) / width).floor() as usize).min(bin_count - 1)
            } else {
                0
            };
            if approved {
                out[index].approved += 1;
            } else {
                out[index].rejected += 1;
            }
        }

        Ok(Histogram { field, bins: out })
    }

    /// Min, quartiles and max of `field` for approved and rejected rows.
    ///
    /// A group without finite values has no summary.
    pub fn box_summary(&self, field: NumericField) -> OutcomeBoxes {
        let mut approved = Vec::new();
        let mut rejected = Vec::new();
        for row in &self.rows {
            let value = field.value_of(row);
            if !value.is_finite() {
                continue;
            }
            if row.is_approved() {
                approved.push(value);
            } else {
                rejected.push(value);
            }
        }

        OutcomeBoxes {
            field,
            approved: BoxSummary::from_values(approved),
            rejected: BoxSummary::from_values(rejected),
        }
    }

    /// `(x, y)` pairs with their outcome, in dataset order.
    ///
    /// Beyond `limit` rows an evenly spaced subset is returned, always
    /// starting with the first row.
    ///
    /// # Errors
    ///
    /// * [`DatasetError::InvalidLimit`] unless `1 <= limit <= MAX_SCATTER_POINTS`.
    pub fn scatter(
        &self,
        x: NumericField,
        y: NumericField,
        limit: usize,
    ) -> Result<Scatter, DatasetError> {
        if limit == 0 || limit > MAX_SCATTER_POINTS {
            return Err(DatasetError::InvalidLimit(limit));
        }

        let all: Vec<ScatterPoint> = self
            .rows
            .iter()
            .map(|r| ScatterPoint {
                x: x.value_of(r),
                y: y.value_of(r),
                approved: r.is_approved(),
            })
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();

        let total_points = all.len();
        let points = if total_points <= limit {
            all
        } else {
            (0..limit).map(|i| all[i * total_points / limit]).collect()
        };

        Ok(Scatter {
            x,
            y,
            total_points,
            points,
        })
    }
}
