use chrono::{Datelike, NaiveDate};

use super::domain::{DailySummary, RollingMetrics, RuleCategory, RuleLevel, RuleOutcome};
use super::policy::CompliancePolicy;

/// Grade one driver-day: one outcome per category, in `RuleCategory::ALL`
/// order. Categories never look at each other; a windowed figure whose
/// history fell short grades `normal` with `insufficient_data` set.
pub fn classify(
    daily: &DailySummary,
    rolling: &RollingMetrics,
    policy: &CompliancePolicy,
) -> Vec<RuleOutcome> {
    let month_anchor = first_of_month(daily.date);

    RuleCategory::ALL
        .iter()
        .map(|&category| {
            let (date, actual, insufficient) = match category {
                RuleCategory::BindingTimeDaily => (daily.date, daily.binding_minutes, false),
                RuleCategory::BindingTimeMonthly => {
                    (month_anchor, rolling.month_binding_minutes, false)
                }
                RuleCategory::DrivingTimeDaily => (daily.date, daily.driving_minutes, false),
                RuleCategory::DrivingTimeTwoDayAvg => (
                    daily.date,
                    rolling.two_day_avg_driving.minutes,
                    !rolling.two_day_avg_driving.complete,
                ),
                RuleCategory::DrivingTimeTwoWeekAvg => (
                    daily.date,
                    rolling.two_week_avg_driving.minutes,
                    !rolling.two_week_avg_driving.complete,
                ),
                RuleCategory::RestPeriod => match rolling.rest_gap_minutes {
                    Some(gap) => (daily.date, gap, false),
                    None => (daily.date, 0, true),
                },
                RuleCategory::ContinuousDriving => {
                    (daily.date, rolling.longest_continuous_driving, false)
                }
            };

            outcome(daily, category, date, actual, insufficient, policy)
        })
        .collect()
}

fn outcome(
    daily: &DailySummary,
    category: RuleCategory,
    date: NaiveDate,
    actual: u32,
    insufficient: bool,
    policy: &CompliancePolicy,
) -> RuleOutcome {
    let thresholds = policy.thresholds(category);
    let level = if insufficient {
        RuleLevel::Normal
    } else {
        thresholds.grade(actual)
    };

    RuleOutcome {
        driver_id: daily.driver_id.clone(),
        date,
        category,
        level,
        threshold_value: thresholds.recorded_for(level),
        actual_value: actual,
        insufficient_data: insufficient,
    }
}

/// Monthly outcomes anchor to the first of the month so the dedup key
/// admits one monthly alert per driver per month.
fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}
