use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for fleet drivers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverId(pub String);

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for duty records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkRecordId(pub String);

/// Identifier wrapper for persisted alerts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub String);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roster entry for a driver subject to compliance monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverProfile {
    pub id: DriverId,
    pub name: String,
    pub employee_number: String,
    pub active: bool,
}

/// A rest break taken inside a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One duty record: a shift with clock-in, optional clock-out, breaks, and
/// the driving minutes reported by telematics or a manual timecard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub id: WorkRecordId,
    pub driver_id: DriverId,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub breaks: Vec<BreakInterval>,
    pub reported_driving_minutes: Option<u32>,
}

impl WorkRecord {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Per-day rollup derived from a duty record. Never persisted; always
/// recomputed from the record so amendments take effect retroactively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub driver_id: DriverId,
    pub date: NaiveDate,
    pub binding_minutes: u32,
    pub driving_minutes: u32,
    pub break_minutes: u32,
    pub is_extended_day: bool,
    pub has_violation: bool,
}

/// A windowed figure plus whether history covered the whole window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowedMinutes {
    pub minutes: u32,
    pub complete: bool,
}

/// Rolling measurements feeding the rule grading for one driver-day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingMetrics {
    pub two_day_avg_driving: WindowedMinutes,
    pub two_week_avg_driving: WindowedMinutes,
    pub month_binding_minutes: u32,
    pub extended_days_in_week: u32,
    pub rest_gap_minutes: Option<u32>,
    pub longest_continuous_driving: u32,
}

/// Severity scale for persisted alerts, ordered least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Violation,
    Critical,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Violation => "violation",
            Severity::Critical => "critical",
        }
    }
}

/// Graded level of a single rule outcome, ordered least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RuleLevel {
    Normal,
    Warning,
    Violation,
    Critical,
}

impl RuleLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RuleLevel::Normal => "normal",
            RuleLevel::Warning => "warning",
            RuleLevel::Violation => "violation",
            RuleLevel::Critical => "critical",
        }
    }

    /// The alert severity this level maps to; `Normal` maps to none.
    pub const fn severity(self) -> Option<Severity> {
        match self {
            RuleLevel::Normal => None,
            RuleLevel::Warning => Some(Severity::Warning),
            RuleLevel::Violation => Some(Severity::Violation),
            RuleLevel::Critical => Some(Severity::Critical),
        }
    }
}

/// The seven rule categories the engine grades every driver-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    BindingTimeDaily,
    BindingTimeMonthly,
    DrivingTimeDaily,
    #[serde(rename = "driving_time_2day_avg")]
    DrivingTimeTwoDayAvg,
    #[serde(rename = "driving_time_2week_avg")]
    DrivingTimeTwoWeekAvg,
    RestPeriod,
    ContinuousDriving,
}

impl RuleCategory {
    /// Grading order; also the order outcomes appear in reports.
    pub const ALL: [RuleCategory; 7] = [
        RuleCategory::BindingTimeDaily,
        RuleCategory::BindingTimeMonthly,
        RuleCategory::DrivingTimeDaily,
        RuleCategory::DrivingTimeTwoDayAvg,
        RuleCategory::DrivingTimeTwoWeekAvg,
        RuleCategory::RestPeriod,
        RuleCategory::ContinuousDriving,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            RuleCategory::BindingTimeDaily => "binding_time_daily",
            RuleCategory::BindingTimeMonthly => "binding_time_monthly",
            RuleCategory::DrivingTimeDaily => "driving_time_daily",
            RuleCategory::DrivingTimeTwoDayAvg => "driving_time_2day_avg",
            RuleCategory::DrivingTimeTwoWeekAvg => "driving_time_2week_avg",
            RuleCategory::RestPeriod => "rest_period",
            RuleCategory::ContinuousDriving => "continuous_driving",
        }
    }
}

/// One graded rule result for a driver-day.
///
/// `date` is the alert anchor: the duty day for daily and rolling rules,
/// the first of the month for the monthly rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub driver_id: DriverId,
    pub date: NaiveDate,
    pub category: RuleCategory,
    pub level: RuleLevel,
    pub threshold_value: u32,
    pub actual_value: u32,
    pub insufficient_data: bool,
}

/// Draft of an alert the reconciler wants persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlert {
    pub driver_id: DriverId,
    pub alert_date: NaiveDate,
    pub alert_type: RuleCategory,
    pub alert_level: Severity,
    pub threshold_value: u32,
    pub actual_value: u32,
    pub threshold_label: String,
    pub description: String,
}

/// A persisted compliance alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub driver_id: DriverId,
    pub alert_date: NaiveDate,
    pub alert_type: RuleCategory,
    pub alert_level: Severity,
    pub threshold_value: u32,
    pub actual_value: u32,
    pub threshold_label: String,
    pub description: String,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        let year = year.parse::<i32>().ok()?;
        let month = month.parse::<u32>().ok()?;
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// First and last day of the month, `None` for out-of-range years.
    pub fn days(self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.first_day()?;
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)?
        };
        Some((first, next.pred_opt()?))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
