use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};

use super::domain::{BreakInterval, DriverId, WorkRecord, WorkRecordId};

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Error raised while importing a timecard export.
#[derive(Debug, thiserror::Error)]
pub enum TimecardImportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("row {row}: {problem}")]
    Row { row: usize, problem: String },
}

#[derive(Debug, Deserialize)]
struct TimecardRow {
    #[serde(rename = "Driver ID")]
    driver_id: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Clock In")]
    clock_in: String,
    #[serde(rename = "Clock Out", deserialize_with = "empty_string_as_none", default)]
    clock_out: Option<String>,
    #[serde(rename = "Breaks", deserialize_with = "empty_string_as_none", default)]
    breaks: Option<String>,
    #[serde(
        rename = "Driving Minutes",
        deserialize_with = "empty_string_as_none",
        default
    )]
    driving_minutes: Option<String>,
}

/// Parse a timecard CSV export into duty records.
///
/// Expected columns: `Driver ID`, `Date` (YYYY-MM-DD), `Clock In` and
/// `Clock Out` (HH:MM, clock-out may be empty for a still-open shift),
/// `Breaks` (`HH:MM-HH:MM` spans joined with `;`), and an optional
/// `Driving Minutes` tachograph figure. Times earlier than clock-in are
/// read as next-day, so overnight shifts need no date on every field.
pub fn parse_timecard<R: Read>(reader: R) -> Result<Vec<WorkRecord>, TimecardImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (index, row) in csv_reader.deserialize::<TimecardRow>().enumerate() {
        // header occupies row 1
        let row_number = index + 2;
        records.push(build_record(row?, row_number)?);
    }
    Ok(records)
}

fn build_record(row: TimecardRow, row_number: usize) -> Result<WorkRecord, TimecardImportError> {
    if row.driver_id.is_empty() {
        return Err(row_error(row_number, "missing driver id".to_string()));
    }
    let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
        .map_err(|error| row_error(row_number, format!("bad date {:?}: {error}", row.date)))?;
    let clock_in = parse_clock(&row.clock_in)
        .ok_or_else(|| row_error(row_number, format!("bad clock-in {:?}", row.clock_in)))?;

    let end = match &row.clock_out {
        None => None,
        Some(raw) => {
            let time = parse_clock(raw)
                .ok_or_else(|| row_error(row_number, format!("bad clock-out {raw:?}")))?;
            Some(anchored(date, time, clock_in))
        }
    };

    let mut breaks = Vec::new();
    if let Some(raw) = &row.breaks {
        for span in raw.split(';').map(str::trim).filter(|span| !span.is_empty()) {
            let (from, until) = span.split_once('-').ok_or_else(|| {
                row_error(row_number, format!("bad break {span:?}, expected HH:MM-HH:MM"))
            })?;
            let from = parse_clock(from.trim())
                .ok_or_else(|| row_error(row_number, format!("bad break start {from:?}")))?;
            let until = parse_clock(until.trim())
                .ok_or_else(|| row_error(row_number, format!("bad break end {until:?}")))?;
            breaks.push(BreakInterval {
                start: anchored(date, from, clock_in),
                end: anchored(date, until, clock_in),
            });
        }
    }

    let reported_driving_minutes = match &row.driving_minutes {
        None => None,
        Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
            row_error(row_number, format!("bad driving minutes {raw:?}"))
        })?),
    };

    Ok(WorkRecord {
        id: next_record_id(),
        driver_id: DriverId(row.driver_id),
        date,
        start: date.and_time(clock_in).and_utc(),
        end,
        breaks,
        reported_driving_minutes,
    })
}

/// Clock times earlier than clock-in belong to the next calendar day.
fn anchored(date: NaiveDate, time: NaiveTime, clock_in: NaiveTime) -> DateTime<Utc> {
    let day = if time < clock_in { date + Duration::days(1) } else { date };
    day.and_time(time).and_utc()
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

/// Blank CSV cells deserialize as empty strings, not missing values.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.is_empty()))
}

fn row_error(row: usize, problem: String) -> TimecardImportError {
    TimecardImportError::Row { row, problem }
}

fn next_record_id() -> WorkRecordId {
    let id = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    WorkRecordId(format!("rec-{id:06}"))
}
