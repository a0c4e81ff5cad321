use super::compounding::PERIODS_PER_YEAR;
use super::types::YearsToTarget;

// Log-domain noise tolerated before a negative result counts as moving away from the target.
const NEGATIVE_YEARS_TOLERANCE: f64 = 1e-9;

/// Inverts the compounding formula for a single blended `annual_rate` (decimal).
pub fn solve_years_to_target(
    principal: f64,
    monthly_contribution: f64,
    annual_rate: f64,
    target: f64,
) -> YearsToTarget {
    if principal >= target {
        return YearsToTarget::Within(0.0);
    }

    if annual_rate == 0.0 {
        if monthly_contribution <= 0.0 {
            return YearsToTarget::Unreachable;
        }
        return YearsToTarget::Within(
            (target - principal) / (monthly_contribution * PERIODS_PER_YEAR),
        );
    }

    let periodic_rate = annual_rate / PERIODS_PER_YEAR;
    let growth_base = 1.0 + periodic_rate;
    if growth_base <= 0.0 {
        return YearsToTarget::Unreachable;
    }

    let ratio = (target * periodic_rate + monthly_contribution)
        / (principal * periodic_rate + monthly_contribution);
    if !ratio.is_finite() || ratio <= 0.0 {
        return YearsToTarget::Unreachable;
    }

    let years = ratio.ln() / (PERIODS_PER_YEAR * growth_base.ln());
    if !years.is_finite() || years < -NEGATIVE_YEARS_TOLERANCE {
        return YearsToTarget::Unreachable;
    }
    YearsToTarget::Within(years.max(0.0))
}
