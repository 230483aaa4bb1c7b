use serde::{Deserialize, Serialize};

use super::domain::{RuleCategory, RuleLevel};

/// Regulatory thresholds the engine grades against. All figures are
/// minutes unless the name says otherwise.
///
/// Defaults follow the Japanese trucking work-hour standard: 13 h daily
/// binding extendable to 16 h, 284 h monthly binding (310 h under a labor
/// agreement), 9 h daily driving extendable to 10 h, 44 h weekly driving
/// averaged over two weeks, and 4 h continuous driving between breaks of
/// at least 30 minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompliancePolicy {
    pub daily_binding_limit: u32,
    pub daily_binding_ceiling: u32,
    pub extended_days_per_week: u32,
    pub monthly_binding_limit: u32,
    pub monthly_binding_agreement: u32,
    pub has_labor_agreement: bool,
    pub daily_driving_limit: u32,
    pub daily_driving_ceiling: u32,
    pub two_day_avg_driving_limit: u32,
    pub two_week_avg_driving_limit: u32,
    pub two_week_avg_driving_ceiling: u32,
    pub rest_recommended: u32,
    pub rest_standard: u32,
    pub rest_floor: u32,
    pub continuous_driving_limit: u32,
    pub continuous_driving_ceiling: u32,
    pub break_time_minimum: u32,
    pub warning_threshold_percent: u32,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            daily_binding_limit: 780,
            daily_binding_ceiling: 960,
            extended_days_per_week: 2,
            monthly_binding_limit: 17_040,
            monthly_binding_agreement: 18_600,
            has_labor_agreement: false,
            daily_driving_limit: 540,
            daily_driving_ceiling: 600,
            two_day_avg_driving_limit: 540,
            two_week_avg_driving_limit: 2_640,
            two_week_avg_driving_ceiling: 2_880,
            rest_recommended: 660,
            rest_standard: 540,
            rest_floor: 480,
            continuous_driving_limit: 240,
            continuous_driving_ceiling: 270,
            break_time_minimum: 30,
            warning_threshold_percent: 90,
        }
    }
}

impl CompliancePolicy {
    /// Clamp inconsistent figures so every category's thresholds stay
    /// ordered and grading stays monotonic.
    pub fn sanitized(mut self) -> Self {
        self.warning_threshold_percent = self.warning_threshold_percent.clamp(1, 100);
        self.daily_binding_ceiling = self.daily_binding_ceiling.max(self.daily_binding_limit);
        self.monthly_binding_agreement = self
            .monthly_binding_agreement
            .max(self.monthly_binding_limit);
        self.daily_driving_ceiling = self.daily_driving_ceiling.max(self.daily_driving_limit);
        self.two_week_avg_driving_ceiling = self
            .two_week_avg_driving_ceiling
            .max(self.two_week_avg_driving_limit);
        self.continuous_driving_ceiling = self
            .continuous_driving_ceiling
            .max(self.continuous_driving_limit);
        self.rest_standard = self.rest_standard.min(self.rest_recommended);
        self.rest_floor = self.rest_floor.min(self.rest_standard);
        self
    }

    /// The monthly binding cap in force for this fleet.
    pub fn monthly_binding_cap(&self) -> u32 {
        if self.has_labor_agreement {
            self.monthly_binding_agreement
        } else {
            self.monthly_binding_limit
        }
    }

    fn warning_floor(&self, limit: u32) -> u32 {
        (u64::from(limit) * u64::from(self.warning_threshold_percent) / 100) as u32
    }

    /// The three graduated boundaries for a category.
    pub fn thresholds(&self, category: RuleCategory) -> RuleThresholds {
        match category {
            RuleCategory::BindingTimeDaily => RuleThresholds::above(
                self.warning_floor(self.daily_binding_limit),
                self.daily_binding_limit,
                self.daily_binding_ceiling,
            ),
            RuleCategory::BindingTimeMonthly => {
                let cap = self.monthly_binding_cap();
                RuleThresholds::above(self.warning_floor(cap), cap, self.monthly_binding_agreement)
            }
            RuleCategory::DrivingTimeDaily => RuleThresholds::above(
                self.warning_floor(self.daily_driving_limit),
                self.daily_driving_limit,
                self.daily_driving_ceiling,
            ),
            RuleCategory::DrivingTimeTwoDayAvg => RuleThresholds::above(
                self.warning_floor(self.two_day_avg_driving_limit),
                self.two_day_avg_driving_limit,
                self.daily_driving_ceiling.max(self.two_day_avg_driving_limit),
            ),
            RuleCategory::DrivingTimeTwoWeekAvg => RuleThresholds::above(
                self.warning_floor(self.two_week_avg_driving_limit),
                self.two_week_avg_driving_limit,
                self.two_week_avg_driving_ceiling,
            ),
            RuleCategory::RestPeriod => RuleThresholds::below(
                self.rest_recommended,
                self.rest_standard,
                self.rest_floor,
            ),
            RuleCategory::ContinuousDriving => RuleThresholds::above(
                self.warning_floor(self.continuous_driving_limit),
                self.continuous_driving_limit,
                self.continuous_driving_ceiling,
            ),
        }
    }
}

/// Which side of the boundary counts as a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDirection {
    AboveLimit,
    BelowMinimum,
}

/// Direction plus the three graduated boundaries for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleThresholds {
    pub direction: ThresholdDirection,
    pub warning: u32,
    pub violation: u32,
    pub critical: u32,
}

impl RuleThresholds {
    pub const fn above(warning: u32, violation: u32, critical: u32) -> Self {
        Self {
            direction: ThresholdDirection::AboveLimit,
            warning,
            violation,
            critical,
        }
    }

    pub const fn below(warning: u32, violation: u32, critical: u32) -> Self {
        Self {
            direction: ThresholdDirection::BelowMinimum,
            warning,
            violation,
            critical,
        }
    }

    /// Grade an actual figure: the highest boundary crossed wins.
    /// Reaching a boundary exactly counts as crossing it.
    pub fn grade(&self, actual: u32) -> RuleLevel {
        match self.direction {
            ThresholdDirection::AboveLimit => {
                if actual >= self.critical {
                    RuleLevel::Critical
                } else if actual >= self.violation {
                    RuleLevel::Violation
                } else if actual >= self.warning {
                    RuleLevel::Warning
                } else {
                    RuleLevel::Normal
                }
            }
            ThresholdDirection::BelowMinimum => {
                if actual < self.critical {
                    RuleLevel::Critical
                } else if actual < self.violation {
                    RuleLevel::Violation
                } else if actual < self.warning {
                    RuleLevel::Warning
                } else {
                    RuleLevel::Normal
                }
            }
        }
    }

    /// The threshold recorded on an outcome at the given level: the
    /// statutory limit, except critical records the ceiling.
    pub fn recorded_for(&self, level: RuleLevel) -> u32 {
        match level {
            RuleLevel::Critical => self.critical,
            _ => self.violation,
        }
    }
}
