pub const PERIODS_PER_YEAR: f64 = 12.0;

/// Future value of a single bucket after `years` of monthly compounding with a
/// constant end-of-month contribution.
///
/// `annual_rate` is a decimal (0.07 for 7%). A zero rate degenerates to linear
/// accumulation; negative rates are evaluated as decay. At `years == 0` the
/// result is exactly `principal` in both branches.
pub fn future_value(principal: f64, monthly_contribution: f64, annual_rate: f64, years: f64) -> f64 {
    if annual_rate == 0.0 {
        return principal + monthly_contribution * PERIODS_PER_YEAR * years;
    }

    let periodic_rate = annual_rate / PERIODS_PER_YEAR;
    let growth = (1.0 + periodic_rate).powf(PERIODS_PER_YEAR * years);
    // Zero terms are skipped so an overflowing growth factor never yields `0 * inf`.
    let mut value = 0.0;
    if principal != 0.0 {
        value += principal * growth;
    }
    if monthly_contribution != 0.0 {
        value += monthly_contribution * (growth - 1.0) / periodic_rate;
    }
    value
}
