use std::collections::BTreeMap;

use serde::Serialize;

use super::compounding::{PERIODS_PER_YEAR, future_value};
use super::error::ConfigError;
use super::types::{
    EMERGENCY_BUCKET, GoalConfig, Progress, ProjectionPoint, ProjectionSeries, YearsToTarget,
};

pub const MAX_YEARS: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct BucketPlan {
    pub name: String,
    pub initial: f64,
    pub monthly_contribution: f64,
    pub annual_rate: f64,
}

impl BucketPlan {
    pub fn value_at(&self, year: u32) -> f64 {
        future_value(
            self.initial,
            self.monthly_contribution,
            self.annual_rate,
            f64::from(year),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionPlan {
    pub buckets: Vec<BucketPlan>,
    pub target: f64,
}

impl ProjectionPlan {
    pub fn from_goal(
        goal: &GoalConfig,
        monthly_contribution: f64,
        target_number: f64,
    ) -> Result<Self, ConfigError> {
        goal.validate()?;

        let investable = (goal.initial_corpus - goal.emergency_corpus).max(0.0);
        let mut buckets = Vec::with_capacity(goal.allocation.len() + 1);
        buckets.push(BucketPlan {
            name: EMERGENCY_BUCKET.to_string(),
            initial: goal.emergency_corpus,
            monthly_contribution: 0.0,
            annual_rate: goal.rate_for(EMERGENCY_BUCKET)? / 100.0,
        });
        for (name, &share) in &goal.allocation {
            buckets.push(BucketPlan {
                name: name.clone(),
                initial: investable * share / 100.0,
                monthly_contribution: monthly_contribution * share / 100.0,
                annual_rate: goal.rate_for(name)? / 100.0,
            });
        }

        Ok(Self {
            buckets,
            target: target_number,
        })
    }

    pub fn initial_total(&self) -> f64 {
        self.buckets.iter().map(|bucket| bucket.initial).sum()
    }
}

/// Advances every bucket a year at a time until the total meets the target
/// (that point included) or year `MAX_YEARS` has been emitted.
pub fn project(plan: &ProjectionPlan) -> ProjectionSeries {
    let mut points = Vec::new();
    for year in 0..=MAX_YEARS {
        let point = evaluate_year(plan, year);
        let reached = point.reaches_target();
        points.push(point);
        if reached {
            break;
        }
    }
    ProjectionSeries::new(points)
}

fn evaluate_year(plan: &ProjectionPlan, year: u32) -> ProjectionPoint {
    let mut buckets = BTreeMap::new();
    let mut total = 0.0;
    for bucket in &plan.buckets {
        let value = bucket.value_at(year);
        total += value;
        buckets.insert(bucket.name.clone(), value);
    }
    ProjectionPoint {
        year,
        buckets,
        total,
        target: plan.target,
    }
}

pub fn generate_projection_data(
    goal: &GoalConfig,
    monthly_contribution: f64,
    target_number: f64,
) -> Result<ProjectionSeries, ConfigError> {
    let plan = ProjectionPlan::from_goal(goal, monthly_contribution, target_number)?;
    Ok(project(&plan))
}

/// Surplus income spread over the year; never negative.
pub fn monthly_contribution(goal: &GoalConfig) -> f64 {
    (goal.annual_income - goal.annual_expense).max(0.0) / PERIODS_PER_YEAR
}

pub fn target_number(goal: &GoalConfig) -> f64 {
    goal.target_multiple * goal.annual_expense
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outlook {
    pub monthly_contribution: f64,
    pub target_number: f64,
    pub years_to_fire: YearsToTarget,
    pub fire_year: Option<i32>,
    pub progress: Progress,
    pub data: ProjectionSeries,
}

pub fn build_outlook(
    goal: &GoalConfig,
    current_corpus: f64,
    current_year: i32,
) -> Result<Outlook, ConfigError> {
    let monthly_contribution = monthly_contribution(goal);
    let target_number = target_number(goal);
    let data = generate_projection_data(goal, monthly_contribution, target_number)?;
    let years_to_fire = data.years_to_target();

    Ok(Outlook {
        monthly_contribution,
        target_number,
        years_to_fire,
        fire_year: years_to_fire.fire_year(current_year),
        progress: Progress::new(current_corpus, target_number),
        data,
    })
}
