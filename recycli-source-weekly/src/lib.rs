//! Slot source generating pickup slots from a recurring weekly template.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use recycli_core::{
    model::{DateRange, SlotDefinition, SlotKey, TimeWindow},
    plugin::SourcePlugin,
    ports::{SlotSource, SourceError, SourceId, SourceMeta},
};

/// Recurring pickup schedule.
///
/// Every open day gets `windows`, unless `weekday_windows` names a different
/// set for that weekday. Closed weekdays and closure dates produce no slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    /// Capacity of every generated slot.
    pub capacity: u32,
    /// Windows offered on a regular open day.
    pub windows: Vec<TimeWindow>,
    /// Per-weekday replacements for `windows`.
    #[serde(default)]
    pub weekday_windows: HashMap<Weekday, Vec<TimeWindow>>,
    /// Weekdays without pickups.
    #[serde(default)]
    pub closed_weekdays: Vec<Weekday>,
    /// Single dates without pickups, e.g. public holidays.
    #[serde(default)]
    pub closures: Vec<NaiveDate>,
}

impl WeeklyTemplate {
    /// Template offering `windows` every day with the given capacity.
    #[must_use]
    pub fn new(capacity: u32, windows: Vec<TimeWindow>) -> Self {
        Self {
            capacity,
            windows,
            weekday_windows: HashMap::new(),
            closed_weekdays: Vec::new(),
            closures: Vec::new(),
        }
    }

    /// Close the template on `weekday`.
    #[must_use]
    pub fn closed_on(mut self, weekday: Weekday) -> Self {
        self.closed_weekdays.push(weekday);
        self
    }

    /// Close the template on a single date.
    #[must_use]
    pub fn closed_at(mut self, date: NaiveDate) -> Self {
        self.closures.push(date);
        self
    }

    /// Offer `windows` instead of the regular set on `weekday`.
    #[must_use]
    pub fn with_weekday_windows(mut self, weekday: Weekday, windows: Vec<TimeWindow>) -> Self {
        self.weekday_windows.insert(weekday, windows);
        self
    }

    /// Windows offered on `date`, ascending and without repeats.
    #[must_use]
    pub fn windows_on(&self, date: NaiveDate) -> Vec<TimeWindow> {
        let weekday = date.weekday();
        if self.closed_weekdays.contains(&weekday) || self.closures.contains(&date) {
            return Vec::new();
        }

        let mut windows = self
            .weekday_windows
            .get(&weekday)
            .unwrap_or(&self.windows)
            .clone();
        windows.sort_unstable();
        windows.dedup();
        windows
    }

    /// Expand the template over `range` into slot definitions sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidSlot`] when the capacity is zero.
    pub fn expand(&self, range: DateRange) -> Result<Vec<SlotDefinition>, SourceError> {
        if self.capacity == 0 {
            return Err(SourceError::InvalidSlot(String::from(
                "weekly template capacity must be positive",
            )));
        }

        Ok(range
            .days()
            .flat_map(|date| {
                self.windows_on(date)
                    .into_iter()
                    .map(move |window| SlotDefinition {
                        key: SlotKey::new(date, window),
                        capacity: self.capacity,
                        booked: 0,
                        disabled: false,
                    })
            })
            .collect())
    }
}

/// Slot source backed by a [`WeeklyTemplate`].
pub struct WeeklySlotSource {
    meta: SourceMeta,
    template: WeeklyTemplate,
}

impl WeeklySlotSource {
    /// Create a source for `template`.
    #[must_use]
    pub fn new(template: WeeklyTemplate) -> Self {
        Self {
            meta: source_meta(),
            template,
        }
    }
}

#[async_trait]
impl SlotSource for WeeklySlotSource {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    async fn slots(&self, range: DateRange) -> Result<Vec<SlotDefinition>, SourceError> {
        let definitions = self.template.expand(range)?;
        debug!(
            from = %range.start,
            to = %range.end,
            slots = definitions.len(),
            "expanded weekly template"
        );
        Ok(definitions)
    }
}

/// Build the plugin bundle for a weekly template.
#[must_use]
pub fn plugin(template: WeeklyTemplate) -> SourcePlugin {
    SourcePlugin {
        meta: source_meta(),
        source: Arc::new(WeeklySlotSource::new(template)),
    }
}

fn source_meta() -> SourceMeta {
    SourceMeta {
        id: SourceId(String::from("weekly")),
        name: String::from("Weekly template"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(raw: &str) -> TimeWindow {
        raw.parse().expect("valid window")
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).expect("valid date")
    }

    fn template() -> WeeklyTemplate {
        WeeklyTemplate::new(5, vec![window("2-4PM"), window("9-11AM")])
            .closed_on(Weekday::Sun)
            .closed_at(date(1))
            .with_weekday_windows(Weekday::Sat, vec![window("9-11AM")])
    }

    #[test]
    fn expands_open_days_in_key_order() {
        // 2025-01-01 is a Wednesday closure; 4th is Saturday, 5th Sunday.
        let definitions = template()
            .expand(DateRange::new(date(1), date(6)))
            .expect("valid template");

        let keys: Vec<(u32, String)> = definitions
            .iter()
            .map(|slot| (slot.key.date.day(), slot.key.window.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (2, String::from("09:00-11:00")),
                (2, String::from("14:00-16:00")),
                (3, String::from("09:00-11:00")),
                (3, String::from("14:00-16:00")),
                (4, String::from("09:00-11:00")),
                (6, String::from("09:00-11:00")),
                (6, String::from("14:00-16:00")),
            ],
            "closures skipped, saturday shortened"
        );
        assert!(
            definitions
                .iter()
                .all(|slot| slot.capacity == 5 && slot.booked == 0 && !slot.disabled),
            "fresh slots"
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let outcome = WeeklyTemplate::new(0, vec![window("9-11AM")]).expand(DateRange::day(date(2)));
        assert!(
            matches!(outcome, Err(SourceError::InvalidSlot(_))),
            "capacity must be positive"
        );
    }

    #[test]
    fn template_reads_from_toml() {
        let raw = r#"
            capacity = 3
            windows = ["9:00 AM - 11:00 AM", "11-1PM"]
            closed_weekdays = ["Sun"]
            closures = ["2025-12-25"]

            [weekday_windows]
            Sat = ["9-11AM"]
        "#;
        let parsed: WeeklyTemplate = toml::from_str(raw).expect("valid template");

        assert_eq!(parsed.capacity, 3, "capacity");
        assert_eq!(parsed.windows, vec![window("9-11AM"), window("11-1PM")], "windows");
        assert_eq!(parsed.closed_weekdays, vec![Weekday::Sun], "closed weekdays");
        assert_eq!(
            parsed.weekday_windows.get(&Weekday::Sat),
            Some(&vec![window("9-11AM")]),
            "saturday override"
        );
    }

    #[tokio::test]
    async fn source_serves_expanded_template() {
        let source = WeeklySlotSource::new(template());
        let slots = source
            .slots(DateRange::day(date(2)))
            .await
            .expect("expanded");
        assert_eq!(slots.len(), 2, "two windows on a thursday");
        assert_eq!(plugin(template()).meta.id.0, "weekly", "plugin id");
    }
}
