use crate::infra::{
    seed_demo_fleet, InMemoryAlertStore, InMemoryDriverDirectory, InMemoryWorkRecordStore,
};
use chrono::{Local, NaiveDate, Utc};
use clap::Args;
use duty_watch::compliance::{
    hours_label, parse_timecard, Alert, AlertQuery, CompliancePolicy, ComplianceService,
    DriverProfile, SweepReport, YearMonth, DEFAULT_SWEEP_LOOKBACK_DAYS,
};
use duty_watch::error::AppError;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Timecard CSV export to grade
    #[arg(long)]
    pub(crate) timecard: PathBuf,
    /// Close-out date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Days to grade counting back from the close-out date
    #[arg(long)]
    pub(crate) lookback_days: Option<u32>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluation date for the synthetic fleet (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
}

pub(crate) fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let SweepArgs {
        timecard,
        as_of,
        lookback_days,
    } = args;

    let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
    let lookback_days = lookback_days.unwrap_or(DEFAULT_SWEEP_LOOKBACK_DAYS);

    let file = File::open(&timecard)?;
    let imported = parse_timecard(file)?;
    println!(
        "Loaded {} duty records from {}",
        imported.len(),
        timecard.display()
    );

    let records = Arc::new(InMemoryWorkRecordStore::default());
    let roster = Arc::new(InMemoryDriverDirectory::default());
    let mut seen = BTreeSet::new();
    for record in imported {
        if seen.insert(record.driver_id.clone()) {
            // Timecards carry no display names; the id stands in.
            roster.enroll(DriverProfile {
                id: record.driver_id.clone(),
                name: record.driver_id.0.clone(),
                employee_number: record.driver_id.0.clone(),
                active: true,
            });
        }
        records.load(record);
    }

    let service = ComplianceService::new(
        records,
        Arc::new(InMemoryAlertStore::default()),
        roster,
        CompliancePolicy::default(),
    );

    let report = service.sweep(as_of, lookback_days)?;
    println!(
        "\nClose-out {} (lookback {} days)",
        report.as_of, report.lookback_days
    );
    render_sweep_report(&report);

    let page = service.search_alerts(&AlertQuery::default())?;
    if page.alerts.is_empty() {
        println!("\nNo alerts raised.");
    } else {
        println!("\nAlerts (most severe first)");
        for alert in &page.alerts {
            render_alert(alert);
        }
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { as_of } = args;

    let today = as_of.unwrap_or_else(|| Local::now().date_naive());
    println!("Duty watch demo (fleet seeded around {today})");

    let records = Arc::new(InMemoryWorkRecordStore::default());
    let alerts = Arc::new(InMemoryAlertStore::default());
    let roster = Arc::new(InMemoryDriverDirectory::default());
    seed_demo_fleet(&records, &roster, today)?;

    let service = ComplianceService::new(records, alerts, roster, CompliancePolicy::default());

    let report = service.sweep(today, DEFAULT_SWEEP_LOOKBACK_DAYS)?;
    println!("\nNightly close-out ({} day lookback)", report.lookback_days);
    render_sweep_report(&report);

    let now = today
        .and_hms_opt(18, 0, 0)
        .map(|evening| evening.and_utc())
        .unwrap_or_else(Utc::now);
    let board = service.live_board(now)?;
    println!("\nLive board ({} drivers)", board.summary.total_drivers);
    for row in &board.drivers {
        println!(
            "- {} ({}): {} | bound {} of {}",
            row.driver_name,
            row.employee_number,
            row.status.label(),
            hours_label(row.current_binding_minutes),
            hours_label(row.binding_limit)
        );
    }
    println!(
        "Summary: {} working | {} off duty | {} at warning or worse",
        board.summary.working,
        board.summary.off_duty,
        board.summary.warning + board.summary.violation + board.summary.critical
    );

    let tally = service.unacknowledged_counts()?;
    println!(
        "\nOpen alerts: {} ({} warning / {} violation / {} critical)",
        tally.total(),
        tally.warning,
        tally.violation,
        tally.critical
    );
    let page = service.search_alerts(&AlertQuery::default())?;
    for alert in &page.alerts {
        render_alert(alert);
    }

    let stats = service.company_monthly_stats(YearMonth::of(today))?;
    println!("\nMonth {} fleet totals", stats.month);
    println!(
        "- {} of {} drivers recorded duty | {} extended days | {} violation days",
        stats.drivers_with_records, stats.active_drivers, stats.extended_days, stats.violation_days
    );
    println!(
        "- bound {} | driving {}",
        hours_label(stats.total_binding_minutes),
        hours_label(stats.total_driving_minutes)
    );

    Ok(())
}

fn render_sweep_report(report: &SweepReport) {
    println!(
        "- {} drivers scanned | {} driver-days evaluated | {} alerts created",
        report.drivers_scanned, report.days_evaluated, report.alerts_created
    );
    for failure in &report.failures {
        println!("- {} failed: {}", failure.driver_id, failure.message);
    }
}

fn render_alert(alert: &Alert) {
    println!(
        "- [{}] {} {} on {}: {}",
        alert.alert_level.label(),
        alert.driver_id,
        alert.alert_type.label(),
        alert.alert_date,
        alert.description
    );
}
