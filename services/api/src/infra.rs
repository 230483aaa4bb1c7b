use chrono::{NaiveDate, Utc};
use duty_watch::compliance::{
    parse_timecard, Alert, AlertId, AlertPage, AlertQuery, AlertStore, DriverDirectory, DriverId,
    DriverProfile, NewAlert, SeverityTally, StoreError, WorkRecord, WorkRecordStore,
    DEFAULT_ALERT_PAGE,
};
use duty_watch::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Reference store backing the served API and the CLI commands. Production
/// deployments implement the store traits against real persistence instead.
#[derive(Default)]
pub(crate) struct InMemoryWorkRecordStore {
    records: Mutex<Vec<WorkRecord>>,
}

impl InMemoryWorkRecordStore {
    /// Insert or amend; at most one record survives per driver-day.
    pub(crate) fn load(&self, record: WorkRecord) {
        let mut guard = self.records.lock().expect("record mutex poisoned");
        guard.retain(|existing| {
            !(existing.driver_id == record.driver_id && existing.date == record.date)
        });
        guard.push(record);
    }
}

impl WorkRecordStore for InMemoryWorkRecordStore {
    fn open_record(&self, driver: &DriverId) -> Result<Option<WorkRecord>, StoreError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        Ok(guard
            .iter()
            .find(|record| &record.driver_id == driver && record.is_open())
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
                    && !record.is_open()
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
            .filter(|record| &record.driver_id == driver && !record.is_open() && record.date < date)
            .max_by_key(|record| record.date)
            .cloned())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
    sequence: AtomicU64,
}

impl AlertStore for InMemoryAlertStore {
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
            id: AlertId(format!("alert-{id:06}")),
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

    fn recent_for_driver(
        &self,
        driver: &DriverId,
        limit: usize,
    ) -> Result<Vec<Alert>, StoreError> {
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
        match guard.iter_mut().find(|alert| &alert.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                Ok(alert.clone())
            }
            None => Err(StoreError::NotFound),
        }
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

#[derive(Default)]
pub(crate) struct InMemoryDriverDirectory {
    drivers: Mutex<HashMap<DriverId, DriverProfile>>,
}

impl InMemoryDriverDirectory {
    pub(crate) fn enroll(&self, profile: DriverProfile) {
        let mut guard = self.drivers.lock().expect("roster mutex poisoned");
        guard.insert(profile.id.clone(), profile);
    }
}

impl DriverDirectory for InMemoryDriverDirectory {
    fn active_drivers(&self) -> Result<Vec<DriverProfile>, StoreError> {
        let guard = self.drivers.lock().expect("roster mutex poisoned");
        let mut active: Vec<DriverProfile> = guard
            .values()
            .filter(|profile| profile.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    fn driver(&self, id: &DriverId) -> Result<Option<DriverProfile>, StoreError> {
        let guard = self.drivers.lock().expect("roster mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Roster for the seeded demo fleet.
pub(crate) fn demo_roster() -> Vec<DriverProfile> {
    vec![
        profile("drv-100", "Kenji Aoki", "E-2041"),
        profile("drv-200", "Yui Sato", "E-2044"),
        profile("drv-300", "Jiro Tanaka", "E-2047"),
        profile("drv-400", "Haruto Suzuki", "E-2051"),
    ]
}

fn profile(id: &str, name: &str, employee_number: &str) -> DriverProfile {
    DriverProfile {
        id: DriverId(id.to_string()),
        name: name.to_string(),
        employee_number: employee_number.to_string(),
        active: true,
    }
}

/// Timecard rows for the demo fleet: two clean days, a long day, an
/// over-ceiling day, and an open shift on `today`.
fn demo_timecard(today: NaiveDate) -> String {
    let two_back = today - chrono::Duration::days(2);
    let one_back = today - chrono::Duration::days(1);
    let mut export = String::from("Driver ID,Date,Clock In,Clock Out,Breaks,Driving Minutes\n");
    export.push_str(&format!(
        "drv-100,{two_back},09:00,18:00,11:30-12:00;15:00-15:30,420\n"
    ));
    export.push_str(&format!(
        "drv-100,{one_back},09:00,18:00,11:30-12:00;15:00-15:30,430\n"
    ));
    export.push_str(&format!("drv-200,{one_back},06:00,21:00,12:00-13:00,\n"));
    export.push_str(&format!("drv-300,{two_back},05:30,22:30,12:00-13:00,\n"));
    export.push_str(&format!("drv-400,{today},05:00,,11:00-11:30,\n"));
    export
}

pub(crate) fn seed_demo_fleet(
    records: &InMemoryWorkRecordStore,
    roster: &InMemoryDriverDirectory,
    today: NaiveDate,
) -> Result<(), AppError> {
    for profile in demo_roster() {
        roster.enroll(profile);
    }
    let export = demo_timecard(today);
    for record in parse_timecard(Cursor::new(export.into_bytes()))? {
        records.load(record);
    }
    Ok(())
}
