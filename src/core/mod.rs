mod compounding;
mod engine;
mod error;
mod solver;
mod types;

pub use compounding::{PERIODS_PER_YEAR, future_value};
pub use engine::{
    BucketPlan, MAX_YEARS, Outlook, ProjectionPlan, build_outlook, generate_projection_data,
    monthly_contribution, project, target_number,
};
pub use error::ConfigError;
pub use solver::solve_years_to_target;
pub use types::{
    Allocation, EMERGENCY_BUCKET, GoalConfig, GoalPatch, Progress, ProjectionPoint,
    ProjectionSeries, RateSet, YearsToTarget,
};
