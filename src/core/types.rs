use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use super::error::ConfigError;

/// Name of the fixed bucket carved out of the initial corpus.
pub const EMERGENCY_BUCKET: &str = "emergency";

// Allocation names that would collide with keys of a serialized `ProjectionPoint`.
const RESERVED_BUCKETS: [&str; 4] = [EMERGENCY_BUCKET, "year", "total", "target"];

const SHARE_SUM_TOLERANCE: f64 = 1e-6;

pub type Allocation = BTreeMap<String, f64>;

/// Annual growth rate in percent per bucket name, including the emergency bucket.
pub type RateSet = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalConfig {
    pub target_multiple: f64,
    pub initial_corpus: f64,
    pub emergency_corpus: f64,
    pub annual_income: f64,
    pub annual_expense: f64,
    pub allocation: Allocation,
    pub rates: RateSet,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            target_multiple: 25.0,
            initial_corpus: 250.0,
            emergency_corpus: 40.0,
            annual_income: 150.0,
            annual_expense: 60.0,
            allocation: BTreeMap::from([("highRisk".to_string(), 32.0), ("safe".to_string(), 68.0)]),
            rates: BTreeMap::from([
                (EMERGENCY_BUCKET.to_string(), 1.0),
                ("highRisk".to_string(), 10.0),
                ("safe".to_string(), 6.0),
            ]),
        }
    }
}

impl GoalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("targetMultiple", self.target_multiple),
            ("initialCorpus", self.initial_corpus),
            ("emergencyCorpus", self.emergency_corpus),
            ("annualIncome", self.annual_income),
            ("annualExpense", self.annual_expense),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        for (field, value) in [
            ("initialCorpus", self.initial_corpus),
            ("emergencyCorpus", self.emergency_corpus),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }

        if self.allocation.is_empty() {
            return Err(ConfigError::EmptyAllocation);
        }

        let mut sum = 0.0;
        for (bucket, &share) in &self.allocation {
            if RESERVED_BUCKETS.contains(&bucket.as_str()) {
                return Err(ConfigError::ReservedBucket(bucket.clone()));
            }
            if !share.is_finite() || !(0.0..=100.0).contains(&share) {
                return Err(ConfigError::ShareOutOfRange {
                    bucket: bucket.clone(),
                    share,
                });
            }
            self.rate_for(bucket)?;
            sum += share;
        }
        if (sum - 100.0).abs() > SHARE_SUM_TOLERANCE {
            return Err(ConfigError::AllocationSum { sum });
        }

        self.rate_for(EMERGENCY_BUCKET)?;
        Ok(())
    }

    pub fn rate_for(&self, bucket: &str) -> Result<f64, ConfigError> {
        match self.rates.get(bucket) {
            Some(&rate) if rate.is_finite() => Ok(rate),
            Some(_) => Err(ConfigError::NonFiniteRate {
                bucket: bucket.to_string(),
            }),
            None => Err(ConfigError::MissingRate {
                bucket: bucket.to_string(),
            }),
        }
    }
}

/// A partially specified goal.
///
/// Scalars override the base configuration, `rates` merge key by key and
/// `allocation` replaces the base allocation as a whole so stale bucket names
/// never leak into the split.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalPatch {
    pub target_multiple: Option<f64>,
    pub initial_corpus: Option<f64>,
    pub emergency_corpus: Option<f64>,
    pub annual_income: Option<f64>,
    pub annual_expense: Option<f64>,
    pub allocation: Option<Allocation>,
    pub rates: Option<RateSet>,
}

impl GoalPatch {
    pub fn apply_to(self, mut base: GoalConfig) -> GoalConfig {
        if let Some(v) = self.target_multiple {
            base.target_multiple = v;
        }
        if let Some(v) = self.initial_corpus {
            base.initial_corpus = v;
        }
        if let Some(v) = self.emergency_corpus {
            base.emergency_corpus = v;
        }
        if let Some(v) = self.annual_income {
            base.annual_income = v;
        }
        if let Some(v) = self.annual_expense {
            base.annual_expense = v;
        }
        if let Some(allocation) = self.allocation {
            base.allocation = allocation;
        }
        if let Some(rates) = self.rates {
            base.rates.extend(rates);
        }
        base
    }

    pub fn into_complete(self) -> Option<GoalConfig> {
        Some(GoalConfig {
            target_multiple: self.target_multiple?,
            initial_corpus: self.initial_corpus?,
            emergency_corpus: self.emergency_corpus?,
            annual_income: self.annual_income?,
            annual_expense: self.annual_expense?,
            allocation: self.allocation?,
            rates: self.rates?,
        })
    }
}

/// One simulated year. Bucket values are flattened next to `year` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub year: u32,
    #[serde(flatten)]
    pub buckets: BTreeMap<String, f64>,
    pub total: f64,
    pub target: f64,
}

impl ProjectionPoint {
    pub fn bucket(&self, name: &str) -> Option<f64> {
        self.buckets.get(name).copied()
    }

    pub fn reaches_target(&self) -> bool {
        self.total >= self.target
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProjectionSeries {
    points: Vec<ProjectionPoint>,
}

impl ProjectionSeries {
    pub(crate) fn new(points: Vec<ProjectionPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[ProjectionPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&ProjectionPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&ProjectionPoint> {
        self.points.last()
    }

    pub fn at_year(&self, year: u32) -> Option<&ProjectionPoint> {
        self.points.iter().find(|point| point.year == year)
    }

    pub fn years_to_target(&self) -> YearsToTarget {
        self.points
            .iter()
            .find(|point| point.reaches_target())
            .map(|point| YearsToTarget::Within(f64::from(point.year)))
            .unwrap_or(YearsToTarget::Unreachable)
    }
}

/// Elapsed years until the target is met. Serializes as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YearsToTarget {
    Within(f64),
    Unreachable,
}

impl YearsToTarget {
    pub fn years(self) -> Option<f64> {
        match self {
            YearsToTarget::Within(years) => Some(years),
            YearsToTarget::Unreachable => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.years().unwrap_or(f64::INFINITY)
    }

    pub fn is_reachable(self) -> bool {
        matches!(self, YearsToTarget::Within(_))
    }

    /// Calendar year the target is met, rounding partial years up.
    pub fn fire_year(self, current_year: i32) -> Option<i32> {
        self.years()
            .map(|years| current_year.saturating_add(years.ceil() as i32))
    }
}

impl Serialize for YearsToTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            YearsToTarget::Within(years) => serializer.serialize_f64(*years),
            YearsToTarget::Unreachable => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current: f64,
    pub target: f64,
    pub percentage: f64,
    pub remaining: f64,
}

impl Progress {
    pub fn new(current: f64, target: f64) -> Self {
        let percentage = if target > 0.0 {
            (current / target * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        Self {
            current,
            target,
            percentage,
            remaining: (target - current).max(0.0),
        }
    }
}
