use std::collections::HashSet;

use chrono::NaiveDate;

use super::domain::{
    Alert, DriverId, NewAlert, RollingMetrics, RuleCategory, RuleLevel, RuleOutcome, Severity,
};
use super::policy::{CompliancePolicy, ThresholdDirection};

/// Split of graded outcomes into drafts to persist and outcomes already
/// covered by an existing alert.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub to_create: Vec<NewAlert>,
    pub unchanged: Vec<Alert>,
}

/// Decide which graded outcomes become new alerts.
///
/// The dedup key is `(driver, alert date, category)`: an outcome at
/// warning or above drafts an alert only when no existing alert carries
/// its key. Normal outcomes and insufficient-data outcomes never draft.
pub fn reconcile(
    outcomes: &[RuleOutcome],
    existing: &[Alert],
    rolling: &RollingMetrics,
    policy: &CompliancePolicy,
) -> Reconciliation {
    let covered: HashSet<(DriverId, NaiveDate, RuleCategory)> = existing
        .iter()
        .map(|alert| (alert.driver_id.clone(), alert.alert_date, alert.alert_type))
        .collect();

    let mut reconciliation = Reconciliation::default();
    for outcome in outcomes {
        let Some(severity) = outcome.level.severity() else {
            continue;
        };
        if outcome.insufficient_data {
            continue;
        }

        let key = (outcome.driver_id.clone(), outcome.date, outcome.category);
        if covered.contains(&key) {
            if let Some(alert) = existing.iter().find(|alert| {
                alert.driver_id == outcome.driver_id
                    && alert.alert_date == outcome.date
                    && alert.alert_type == outcome.category
            }) {
                reconciliation.unchanged.push(alert.clone());
            }
            continue;
        }

        reconciliation
            .to_create
            .push(draft(outcome, severity, rolling, policy));
    }

    reconciliation
}

fn draft(
    outcome: &RuleOutcome,
    severity: Severity,
    rolling: &RollingMetrics,
    policy: &CompliancePolicy,
) -> NewAlert {
    NewAlert {
        driver_id: outcome.driver_id.clone(),
        alert_date: outcome.date,
        alert_type: outcome.category,
        alert_level: severity,
        threshold_value: outcome.threshold_value,
        actual_value: outcome.actual_value,
        threshold_label: threshold_label(outcome, policy),
        description: description(outcome, rolling, policy),
    }
}

/// Short label for the boundary that fired: the warning band carries the
/// configured percentage, everything else the boundary in hours.
fn threshold_label(outcome: &RuleOutcome, policy: &CompliancePolicy) -> String {
    let direction = policy.thresholds(outcome.category).direction;
    match (direction, outcome.level) {
        (ThresholdDirection::AboveLimit, RuleLevel::Warning) => {
            format!("{}%", policy.warning_threshold_percent)
        }
        _ => hours_label(outcome.threshold_value),
    }
}

fn description(outcome: &RuleOutcome, rolling: &RollingMetrics, policy: &CompliancePolicy) -> String {
    let noun = match outcome.category {
        RuleCategory::BindingTimeDaily => "daily binding time",
        RuleCategory::BindingTimeMonthly => "monthly binding time",
        RuleCategory::DrivingTimeDaily => "daily driving time",
        RuleCategory::DrivingTimeTwoDayAvg => "2-day average driving time",
        RuleCategory::DrivingTimeTwoWeekAvg => "2-week average driving time",
        RuleCategory::RestPeriod => "daily rest period",
        RuleCategory::ContinuousDriving => "continuous driving",
    };
    let actual = hours_label(outcome.actual_value);
    let boundary = hours_label(outcome.threshold_value);
    let direction = policy.thresholds(outcome.category).direction;

    let mut text = match (direction, outcome.level) {
        (ThresholdDirection::AboveLimit, RuleLevel::Warning) => format!(
            "{noun} {actual} reached {}% of the {boundary} limit",
            policy.warning_threshold_percent
        ),
        (ThresholdDirection::AboveLimit, RuleLevel::Critical) => {
            format!("{noun} {actual} exceeded the {boundary} ceiling")
        }
        (ThresholdDirection::AboveLimit, _) => {
            format!("{noun} {actual} exceeded the {boundary} limit")
        }
        (ThresholdDirection::BelowMinimum, RuleLevel::Warning) => {
            format!("{noun} {actual} fell below the recommended {boundary}")
        }
        (ThresholdDirection::BelowMinimum, RuleLevel::Critical) => {
            format!("{noun} {actual} fell below the {boundary} floor")
        }
        (ThresholdDirection::BelowMinimum, _) => {
            format!("{noun} {actual} fell below the statutory minimum {boundary}")
        }
    };

    if outcome.category == RuleCategory::BindingTimeDaily
        && matches!(outcome.level, RuleLevel::Violation | RuleLevel::Critical)
        && rolling.extended_days_in_week >= policy.extended_days_per_week
    {
        text.push_str(&format!(
            "; {} extended days already this week (allowance {})",
            rolling.extended_days_in_week, policy.extended_days_per_week
        ));
    }

    text
}

/// Render minutes as an `NhMMm` figure, e.g. `13h00m`.
pub fn hours_label(minutes: u32) -> String {
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}
