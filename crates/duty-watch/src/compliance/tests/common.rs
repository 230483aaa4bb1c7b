use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::compliance::domain::{
    Alert, AlertId, BreakInterval, DailySummary, DriverId, DriverProfile, NewAlert,
    RollingMetrics, WindowedMinutes, WorkRecord, WorkRecordId,
};
use crate::compliance::policy::CompliancePolicy;
use crate::compliance::repository::{
    AlertPage, AlertQuery, AlertStore, DriverDirectory, SeverityTally, StoreError,
    WorkRecordStore, DEFAULT_ALERT_PAGE,
};
use crate::compliance::service::ComplianceService;

static TEST_RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(super) fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    date.and_hms_opt(hour, minute, 0)
        .expect("valid time")
        .and_utc()
}

pub(super) fn record_id() -> WorkRecordId {
    let id = TEST_RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    WorkRecordId(format!("test-rec-{id:04}"))
}

pub(super) fn policy() -> CompliancePolicy {
    CompliancePolicy::default()
}

/// Closed 09:00-18:00 shift split by two half-hour breaks: 480 bound
/// minutes, no stretch past the continuous-driving limit.
pub(super) fn workday(driver: &str, date: NaiveDate) -> WorkRecord {
    WorkRecord {
        id: record_id(),
        driver_id: DriverId(driver.to_string()),
        date,
        start: at(date, 9, 0),
        end: Some(at(date, 18, 0)),
        breaks: vec![
            BreakInterval {
                start: at(date, 11, 30),
                end: at(date, 12, 0),
            },
            BreakInterval {
                start: at(date, 15, 0),
                end: at(date, 15, 30),
            },
        ],
        reported_driving_minutes: None,
    }
}

/// Workday with an explicit tachograph driving figure.
pub(super) fn driving_day(driver: &str, date: NaiveDate, driving: u32) -> WorkRecord {
    let mut record = workday(driver, date);
    record.reported_driving_minutes = Some(driving);
    record
}

/// Closed shift starting 06:00 with a one-hour midday break, ending at
/// the given time the same day.
pub(super) fn long_day(driver: &str, date: NaiveDate, end: (u32, u32)) -> WorkRecord {
    WorkRecord {
        id: record_id(),
        driver_id: DriverId(driver.to_string()),
        date,
        start: at(date, 6, 0),
        end: Some(at(date, end.0, end.1)),
        breaks: vec![BreakInterval {
            start: at(date, 12, 0),
            end: at(date, 13, 0),
        }],
        reported_driving_minutes: None,
    }
}

/// Hand-built daily summary for window and rule tests; extended and
/// violation flags follow the default policy boundaries.
pub(super) fn day_summary(driver: &str, date: NaiveDate, binding: u32, driving: u32) -> DailySummary {
    DailySummary {
        driver_id: DriverId(driver.to_string()),
        date,
        binding_minutes: binding,
        driving_minutes: driving,
        break_minutes: 60,
        is_extended_day: binding > 780,
        has_violation: binding > 960,
    }
}

/// Rolling figures that grade normal in every category under the
/// default policy.
pub(super) fn quiet_rolling() -> RollingMetrics {
    RollingMetrics {
        two_day_avg_driving: WindowedMinutes {
            minutes: 300,
            complete: true,
        },
        two_week_avg_driving: WindowedMinutes {
            minutes: 1500,
            complete: true,
        },
        month_binding_minutes: 4800,
        extended_days_in_week: 0,
        rest_gap_minutes: Some(720),
        longest_continuous_driving: 180,
    }
}

/// Still-open shift with no breaks logged yet.
pub(super) fn open_shift(driver: &str, date: NaiveDate, start_hour: u32) -> WorkRecord {
    WorkRecord {
        id: record_id(),
        driver_id: DriverId(driver.to_string()),
        date,
        start: at(date, start_hour, 0),
        end: None,
        breaks: Vec::new(),
        reported_driving_minutes: None,
    }
}

#[derive(Default)]
pub(super) struct MemoryRecordStore {
    records: Mutex<Vec<WorkRecord>>,
}

impl MemoryRecordStore {
    pub(super) fn insert(&self, record: WorkRecord) {
        self.records
            .lock()
            .expect("record mutex poisoned")
            .push(record);
    }
}

impl WorkRecordStore for MemoryRecordStore {
    fn open_record(&self, driver: &DriverId) -> Result<Option<WorkRecord>, StoreError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        Ok(guard
            .iter()
            .find(|record| &record.driver_id == driver && record.end.is_none())
            .cloned())
    }

    fn closed_records(
        &self,
        driver: &DriverId,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<WorkRecord>, StoreError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        let mut matched: Vec<WorkRecord> = guard
            .iter()
            .filter(|record| {
                &record.driver_id == driver
                    && record.end.is_some()
                    && record.date >= from
                    && record.date <= until
            })
            .cloned()
            .collect();
        matched.sort_by_key(|record| record.date);
        Ok(matched)
    }

    fn latest_closed_before(
        &self,
        driver: &DriverId,
        date: NaiveDate,
    ) -> Result<Option<WorkRecord>, StoreError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| {
                &record.driver_id == driver && record.end.is_some() && record.date < date
            })
            .max_by_key(|record| record.date)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
    sequence: AtomicU64,
}

impl MemoryAlertStore {
    pub(super) fn stored(&self) -> Vec<Alert> {
        self.alerts.lock().expect("alert mutex poisoned").clone()
    }
}

impl AlertStore for MemoryAlertStore {
    fn insert(&self, draft: NewAlert) -> Result<Alert, StoreError> {
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        let duplicate = guard.iter().any(|alert| {
            alert.driver_id == draft.driver_id
                && alert.alert_date == draft.alert_date
                && alert.alert_type == draft.alert_type
        });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let alert = Alert {
            id: AlertId(format!("alert-{id:04}")),
            driver_id: draft.driver_id,
            alert_date: draft.alert_date,
            alert_type: draft.alert_type,
            alert_level: draft.alert_level,
            threshold_value: draft.threshold_value,
            actual_value: draft.actual_value,
            threshold_label: draft.threshold_label,
            description: draft.description,
            acknowledged: false,
            created_at: Utc::now(),
        };
        guard.push(alert.clone());
        Ok(alert)
    }

    fn alerts_for_day(&self, driver: &DriverId, date: NaiveDate) -> Result<Vec<Alert>, StoreError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        Ok(guard
            .iter()
            .filter(|alert| &alert.driver_id == driver && alert.alert_date == date)
            .cloned()
            .collect())
    }

    fn search(&self, query: &AlertQuery) -> Result<AlertPage, StoreError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        let mut matched: Vec<Alert> = guard
            .iter()
            .filter(|alert| {
                query
                    .driver_id
                    .as_ref()
                    .map_or(true, |id| &alert.driver_id == id)
                    && query
                        .acknowledged
                        .map_or(true, |flag| alert.acknowledged == flag)
                    && query.level.map_or(true, |level| alert.alert_level == level)
                    && query
                        .category
                        .map_or(true, |category| alert.alert_type == category)
                    && query.date_from.map_or(true, |from| alert.alert_date >= from)
                    && query.date_to.map_or(true, |to| alert.alert_date <= to)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.alert_level
                .cmp(&a.alert_level)
                .then(b.created_at.cmp(&a.created_at))
        });
        let total = matched.len();
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(DEFAULT_ALERT_PAGE);
        let alerts = matched.into_iter().skip(offset).take(limit).collect();
        Ok(AlertPage { alerts, total })
    }

    fn recent_for_driver(&self, driver: &DriverId, limit: usize) -> Result<Vec<Alert>, StoreError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        let mut matched: Vec<Alert> = guard
            .iter()
            .filter(|alert| &alert.driver_id == driver)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        Ok(matched)
    }

    fn set_acknowledged(&self, id: &AlertId) -> Result<Alert, StoreError> {
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        let alert = guard
            .iter_mut()
            .find(|alert| &alert.id == id)
            .ok_or(StoreError::NotFound)?;
        alert.acknowledged = true;
        Ok(alert.clone())
    }

    fn unacknowledged_counts(&self) -> Result<SeverityTally, StoreError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        let mut tally = SeverityTally::default();
        for alert in guard.iter().filter(|alert| !alert.acknowledged) {
            tally.bump(alert.alert_level);
        }
        Ok(tally)
    }
}

/// Alert store that never reports existing alerts back, so every
/// evaluation re-drafts and the uniqueness constraint has to arbitrate.
#[derive(Default)]
pub(super) struct BlindAlertStore {
    pub(super) inner: MemoryAlertStore,
}

impl AlertStore for BlindAlertStore {
    fn insert(&self, draft: NewAlert) -> Result<Alert, StoreError> {
        self.inner.insert(draft)
    }

    fn alerts_for_day(
        &self,
        _driver: &DriverId,
        _date: NaiveDate,
    ) -> Result<Vec<Alert>, StoreError> {
        Ok(Vec::new())
    }

    fn search(&self, query: &AlertQuery) -> Result<AlertPage, StoreError> {
        self.inner.search(query)
    }

    fn recent_for_driver(&self, driver: &DriverId, limit: usize) -> Result<Vec<Alert>, StoreError> {
        self.inner.recent_for_driver(driver, limit)
    }

    fn set_acknowledged(&self, id: &AlertId) -> Result<Alert, StoreError> {
        self.inner.set_acknowledged(id)
    }

    fn unacknowledged_counts(&self) -> Result<SeverityTally, StoreError> {
        self.inner.unacknowledged_counts()
    }
}

/// Record store that fails for one driver and delegates for the rest.
pub(super) struct FailingRecordStore {
    pub(super) inner: MemoryRecordStore,
    pub(super) poison: DriverId,
}

impl WorkRecordStore for FailingRecordStore {
    fn open_record(&self, driver: &DriverId) -> Result<Option<WorkRecord>, StoreError> {
        if driver == &self.poison {
            return Err(StoreError::Unavailable("record store offline".to_string()));
        }
        self.inner.open_record(driver)
    }

    fn closed_records(
        &self,
        driver: &DriverId,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<WorkRecord>, StoreError> {
        if driver == &self.poison {
            return Err(StoreError::Unavailable("record store offline".to_string()));
        }
        self.inner.closed_records(driver, from, until)
    }

    fn latest_closed_before(
        &self,
        driver: &DriverId,
        date: NaiveDate,
    ) -> Result<Option<WorkRecord>, StoreError> {
        if driver == &self.poison {
            return Err(StoreError::Unavailable("record store offline".to_string()));
        }
        self.inner.latest_closed_before(driver, date)
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    drivers: Mutex<Vec<DriverProfile>>,
}

impl MemoryDirectory {
    pub(super) fn add(&self, id: &str, name: &str) {
        self.drivers
            .lock()
            .expect("roster mutex poisoned")
            .push(DriverProfile {
                id: DriverId(id.to_string()),
                name: name.to_string(),
                employee_number: format!("E-{id}"),
                active: true,
            });
    }
}

impl DriverDirectory for MemoryDirectory {
    fn active_drivers(&self) -> Result<Vec<DriverProfile>, StoreError> {
        let guard = self.drivers.lock().expect("roster mutex poisoned");
        Ok(guard.iter().filter(|profile| profile.active).cloned().collect())
    }

    fn driver(&self, id: &DriverId) -> Result<Option<DriverProfile>, StoreError> {
        let guard = self.drivers.lock().expect("roster mutex poisoned");
        Ok(guard.iter().find(|profile| &profile.id == id).cloned())
    }
}

pub(super) type TestService = ComplianceService<MemoryRecordStore, MemoryAlertStore, MemoryDirectory>;

pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryRecordStore>,
    Arc<MemoryAlertStore>,
    Arc<MemoryDirectory>,
) {
    let records = Arc::new(MemoryRecordStore::default());
    let alerts = Arc::new(MemoryAlertStore::default());
    let drivers = Arc::new(MemoryDirectory::default());
    let service = Arc::new(ComplianceService::new(
        records.clone(),
        alerts.clone(),
        drivers.clone(),
        policy(),
    ));
    (service, records, alerts, drivers)
}

pub(super) fn compliance_router_with_service(service: Arc<TestService>) -> axum::Router {
    crate::compliance::router::compliance_router(service)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
