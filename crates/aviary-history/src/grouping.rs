//! Calendar-month sections for the sightings list.

use chrono::{Datelike, TimeZone};
use serde::Serialize;

use aviary_core::types::BirdSighting;

/// Sightings that fall in one calendar month of the viewer's time zone.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthGroup {
    /// Display label such as "March 2025".
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub sightings: Vec<BirdSighting>,
}

/// Group sightings by month, keeping input order inside each group.
///
/// Groups are ordered by the first sighting that lands in them, so a
/// newest-first input yields newest-first sections.
pub fn group_by_month<Tz: TimeZone>(sightings: &[BirdSighting], tz: &Tz) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();
    for sighting in sightings {
        let local = sighting.timestamp.with_timezone(tz).naive_local();
        let (year, month) = (local.year(), local.month());
        match groups
            .iter_mut()
            .find(|g| g.year == year && g.month == month)
        {
            Some(group) => group.sightings.push(sighting.clone()),
            None => groups.push(MonthGroup {
                label: local.format("%B %Y").to_string(),
                year,
                month,
                sightings: vec![sighting.clone()],
            }),
        }
    }
    groups
}
