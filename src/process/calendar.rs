use std::collections::{BTreeMap, HashSet};

use crate::process::{
    csv_reader::RawRecord, date_parser::TargetMonth, schema::VENDOR_COLUMN,
};

/// Stop value meaning the vendor is not out that day.
pub const OFF_SENTINEL: &str = "OFF";

/// Stop name → vendor names serving it, in row order.
pub type DailySchedule = BTreeMap<String, Vec<String>>;

/// A whole month of stops, one entry per calendar date.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonthlySchedule {
    /// Distinct raw vendor names seen in the file.
    pub vendors: HashSet<String>,
    /// ISO date (`YYYY-MM-DD`) → that day's stops.
    pub days: BTreeMap<String, DailySchedule>,
}

/// Expand weekday-grid rows into a per-date calendar for `target`.
pub fn build_schedule(records: &[RawRecord], target: TargetMonth) -> MonthlySchedule {
    let dates: Vec<(String, String)> = target
        .dates()
        .into_iter()
        .map(|d| (d.format("%Y-%m-%d").to_string(), d.format("%A").to_string()))
        .collect();

    let mut schedule = MonthlySchedule {
        vendors: HashSet::new(),
        days: dates
            .iter()
            .map(|(iso, _)| (iso.clone(), DailySchedule::new()))
            .collect(),
    };

    for rec in records {
        let vendor = match rec.get(VENDOR_COLUMN) {
            Some(v) if !v.is_empty() => v,
            _ => continue,
        };
        schedule.vendors.insert(vendor.clone());

        for (iso, weekday) in &dates {
            let Some(stop) = rec.get(weekday) else {
                continue;
            };
            if stop.is_empty() || stop == OFF_SENTINEL {
                continue;
            }
            if let Some(day) = schedule.days.get_mut(iso) {
                day.entry(stop.clone()).or_default().push(vendor.clone());
            }
        }
    }

    schedule
}
