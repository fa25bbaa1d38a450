//! Domain data structures for pickup slots, bookings, and declared items.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Inclusive start/end range for catalog queries.
pub struct DateRange {
    /// Start date (inclusive).
    pub start: NaiveDate,
    /// End date (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Construct a range from its inclusive bounds.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Range covering a single day.
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Whether `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// A range whose start lies after its end selects nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Days of the range in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors raised while reading a time window.
pub enum WindowParseError {
    /// Input did not look like `start-end`.
    #[error("Malformed time window: {0:?}")]
    Malformed(String),
    /// Window ends at or before it starts.
    #[error("Time window must end after it starts ({start} - {end})")]
    Inverted {
        /// Parsed start time.
        start: NaiveTime,
        /// Parsed end time.
        end: NaiveTime,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Clock-time window within a day, ordered by start then end.
///
/// Accepts `09:00-11:00`, `9:00 AM - 11:00 AM`, `9AM-11AM` and the short
/// `9-11AM` form where the start borrows the end's meridiem.
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted spans.
    ///
    /// # Errors
    ///
    /// Returns [`WindowParseError::Inverted`] when `end <= start`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WindowParseError> {
        if end <= start {
            return Err(WindowParseError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window start.
    #[must_use]
    pub fn start(&self) -> NaiveTime {
        self.start
    }

    /// Window end.
    #[must_use]
    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Human label such as `9:00 AM - 11:00 AM`.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%-I:%M %p"),
            self.end.format("%-I:%M %p")
        )
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

impl FromStr for TimeWindow {
    type Err = WindowParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || WindowParseError::Malformed(raw.to_owned());

        let (head, tail) = raw.split_once('-').ok_or_else(malformed)?;
        let start_token = ClockToken::parse(head).ok_or_else(malformed)?;
        let end_token = ClockToken::parse(tail).ok_or_else(malformed)?;

        let end = end_token.resolve(None).ok_or_else(malformed)?;
        let start = match (start_token.meridiem, end_token.meridiem) {
            (None, Some(borrowed)) => match start_token.resolve(Some(borrowed)) {
                Some(time) if time < end => time,
                _ => start_token
                    .resolve(Some(borrowed.flip()))
                    .ok_or_else(malformed)?,
            },
            _ => start_token.resolve(None).ok_or_else(malformed)?,
        };

        Self::new(start, end)
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = WindowParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeWindow> for String {
    fn from(window: TimeWindow) -> Self {
        window.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn flip(self) -> Self {
        match self {
            Meridiem::Am => Meridiem::Pm,
            Meridiem::Pm => Meridiem::Am,
        }
    }
}

/// One side of a window as typed by a person: `9`, `9:30`, `9AM`, `09:00`.
#[derive(Debug, Clone, Copy)]
struct ClockToken {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
}

impl ClockToken {
    fn parse(raw: &str) -> Option<Self> {
        let compact: String = raw
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        let (digits, meridiem) = if let Some(rest) = compact.strip_suffix("AM") {
            (rest, Some(Meridiem::Am))
        } else if let Some(rest) = compact.strip_suffix("PM") {
            (rest, Some(Meridiem::Pm))
        } else {
            (compact.as_str(), None)
        };

        let (hour, minute): (u32, u32) = match digits.split_once(':') {
            Some((hour, minute)) => (hour.parse().ok()?, minute.parse().ok()?),
            None => (digits.parse().ok()?, 0),
        };

        if meridiem.is_some() && !(1..=12).contains(&hour) {
            return None;
        }

        Some(Self {
            hour,
            minute,
            meridiem,
        })
    }

    fn resolve(self, fallback: Option<Meridiem>) -> Option<NaiveTime> {
        // 24h tokens never borrow a meridiem.
        let meridiem = self
            .meridiem
            .or_else(|| fallback.filter(|_| self.hour <= 12));
        let hour = match meridiem {
            None => self.hour,
            Some(Meridiem::Am) if self.hour == 12 => 0,
            Some(Meridiem::Am) => self.hour,
            Some(Meridiem::Pm) if self.hour == 12 => 12,
            Some(Meridiem::Pm) => self.hour + 12,
        };
        NaiveTime::from_hms_opt(hour, self.minute, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Identity of a slot: a calendar date and a window on that date.
pub struct SlotKey {
    /// Pickup date.
    pub date: NaiveDate,
    /// Pickup window on that date.
    pub window: TimeWindow,
}

impl SlotKey {
    /// Construct a slot key.
    #[must_use]
    pub fn new(date: NaiveDate, window: TimeWindow) -> Self {
        Self { date, window }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.date, self.window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Snapshot of a bookable window and its consumption.
pub struct Slot {
    /// Slot identity.
    pub key: SlotKey,
    /// Maximum number of active bookings.
    pub capacity: u32,
    /// Active (non-cancelled) bookings against the slot.
    pub booked: u32,
    /// Operator switch that stops new reservations.
    pub disabled: bool,
}

impl Slot {
    /// Capacity still free.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.booked)
    }

    /// Whether a reservation could currently succeed.
    #[must_use]
    pub fn is_bookable(&self) -> bool {
        !self.disabled && self.remaining() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Seed record describing a slot as delivered by a source.
pub struct SlotDefinition {
    /// Slot identity.
    pub key: SlotKey,
    /// Maximum number of active bookings.
    pub capacity: u32,
    /// Bookings already taken elsewhere before start-up.
    #[serde(default)]
    pub booked: u32,
    /// Whether the slot starts out disabled.
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Booking identifier, rendered as `PU-000042`.
pub struct BookingId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "PU-{:06}", self.0)
    }
}

impl FromStr for BookingId {
    type Err = ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digits = raw.trim();
        let digits = digits
            .strip_prefix("PU-")
            .or_else(|| digits.strip_prefix("pu-"))
            .unwrap_or(digits);
        digits.parse().map(BookingId)
    }
}

impl Serialize for BookingId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BookingId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier of the customer that owns a booking.
pub struct CustomerId(pub String);

impl CustomerId {
    /// Owner recorded for bookings imported from seed data.
    #[must_use]
    pub fn imported() -> Self {
        CustomerId(String::from("imported"))
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Contact details captured at registration. Stored and echoed, never interpreted.
pub struct Contact {
    /// Full name.
    pub name: String,
    /// Pickup address.
    pub address: String,
    /// Phone number.
    pub phone: String,
    /// Optional e-mail address for reminders.
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form notes for the collection team.
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Device category of a declared item.
pub enum ItemCategory {
    /// Desktop computers and laptops.
    Computers,
    /// Phones and tablets.
    MobileDevices,
    /// Televisions and monitors.
    TvsAndMonitors,
    /// Gaming consoles.
    GamingConsoles,
    /// Large and small household appliances.
    HomeAppliances,
    /// Speakers, amplifiers, headphones.
    AudioEquipment,
    /// Cameras.
    Cameras,
    /// Anything not covered above.
    Other(String),
}

impl ItemCategory {
    /// Display label of the category.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            ItemCategory::Computers => "Computers & Laptops",
            ItemCategory::MobileDevices => "Mobile Devices",
            ItemCategory::TvsAndMonitors => "TVs & Monitors",
            ItemCategory::GamingConsoles => "Gaming Consoles",
            ItemCategory::HomeAppliances => "Home Appliances",
            ItemCategory::AudioEquipment => "Audio Equipment",
            ItemCategory::Cameras => "Cameras",
            ItemCategory::Other(label) => label,
        }
    }
}

impl From<String> for ItemCategory {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "computers & laptops" | "computers" => ItemCategory::Computers,
            "mobile devices" => ItemCategory::MobileDevices,
            "tvs & monitors" => ItemCategory::TvsAndMonitors,
            "gaming consoles" => ItemCategory::GamingConsoles,
            "home appliances" => ItemCategory::HomeAppliances,
            "audio equipment" => ItemCategory::AudioEquipment,
            "cameras" => ItemCategory::Cameras,
            _ => ItemCategory::Other(raw),
        }
    }
}

impl From<ItemCategory> for String {
    fn from(category: ItemCategory) -> Self {
        match category {
            ItemCategory::Other(label) => label,
            known => known.label().to_owned(),
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Declared working condition of an item.
pub enum Condition {
    /// Fully functional.
    Working,
    /// Some functions broken.
    #[serde(alias = "Partially Working")]
    PartiallyWorking,
    /// Does not power on or is broken.
    #[serde(alias = "Not Working")]
    NotWorking,
    /// Owner did not say.
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Item declared for pickup.
pub struct ItemDescriptor {
    /// Device category.
    pub category: ItemCategory,
    /// Manufacturer.
    pub brand: String,
    /// Model name or number.
    #[serde(default)]
    pub model: String,
    /// Working condition.
    #[serde(default)]
    pub condition: Condition,
    /// Estimated weight in kilograms.
    #[serde(default)]
    pub estimated_weight_kg: Option<f64>,
    /// Whether the item contains hazardous materials (batteries, CRT glass, ...).
    #[serde(default)]
    pub hazardous: bool,
}

impl ItemDescriptor {
    /// Item of a category and brand with everything else unknown.
    pub fn new(category: ItemCategory, brand: impl Into<String>) -> Self {
        Self {
            category,
            brand: brand.into(),
            model: String::new(),
            condition: Condition::Unknown,
            estimated_weight_kg: None,
            hazardous: false,
        }
    }

    /// Set the estimated weight in kilograms.
    #[must_use]
    pub fn with_weight(mut self, kilograms: f64) -> Self {
        self.estimated_weight_kg = Some(kilograms);
        self
    }

    /// Weight is either absent or a finite, non-negative number.
    #[must_use]
    pub fn has_valid_weight(&self) -> bool {
        self.estimated_weight_kg
            .is_none_or(|weight| weight.is_finite() && weight >= 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Lifecycle state of a booking.
pub enum BookingStatus {
    /// Reserved, awaiting confirmation by the operator.
    Scheduled,
    /// Confirmed by the operator.
    Confirmed,
    /// Collection team checked in.
    InProgress,
    /// Items collected.
    Completed,
    /// Cancelled; capacity released.
    Cancelled,
}

impl BookingStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Scheduled, BookingStatus::Confirmed)
                | (BookingStatus::Confirmed, BookingStatus::InProgress)
                | (BookingStatus::InProgress, BookingStatus::Completed)
                | (
                    BookingStatus::Scheduled | BookingStatus::Confirmed,
                    BookingStatus::Cancelled
                )
        )
    }

    /// Cancelled bookings no longer hold capacity.
    #[must_use]
    pub fn is_active(self) -> bool {
        self != BookingStatus::Cancelled
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Everything a caller supplies to reserve a slot.
pub struct BookingPayload {
    /// Booking owner.
    pub customer: CustomerId,
    /// Contact details.
    pub contact: Contact,
    /// Declared items.
    #[serde(default)]
    pub items: Vec<ItemDescriptor>,
    /// Client-chosen key making retries of the same reservation safe.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl BookingPayload {
    /// Payload without items or idempotency key.
    #[must_use]
    pub fn new(customer: CustomerId, contact: Contact) -> Self {
        Self {
            customer,
            contact,
            items: Vec::new(),
            idempotency_key: None,
        }
    }

    /// Attach declared items.
    #[must_use]
    pub fn with_items(mut self, items: Vec<ItemDescriptor>) -> Self {
        self.items = items;
        self
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Placeholder payload for bookings carried over from seed data.
    #[must_use]
    pub fn imported() -> Self {
        Self::new(CustomerId::imported(), Contact::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A customer's reservation against one slot.
pub struct Booking {
    /// Unique identifier.
    pub id: BookingId,
    /// Slot the booking holds capacity in.
    pub slot: SlotKey,
    /// Booking owner.
    pub customer: CustomerId,
    /// Contact details.
    pub contact: Contact,
    /// Declared items, owned by the booking.
    pub items: Vec<ItemDescriptor>,
    /// Current lifecycle state.
    pub status: BookingStatus,
    /// When the reservation was made.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
    /// Idempotency key the booking was created with.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl Booking {
    /// Whether the booking still holds capacity.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Sum of declared weights, `None` when no item declares one.
    #[must_use]
    pub fn total_weight_kg(&self) -> Option<f64> {
        self.items
            .iter()
            .filter_map(|item| item.estimated_weight_kg)
            .reduce(|total, weight| total + weight)
    }

    /// Whether any declared item is hazardous.
    #[must_use]
    pub fn has_hazardous_items(&self) -> bool {
        self.items.iter().any(|item| item.hazardous)
    }

    /// Payload that would recreate this booking on another slot.
    #[must_use]
    pub fn to_payload(&self) -> BookingPayload {
        BookingPayload {
            customer: self.customer.clone(),
            contact: self.contact.clone(),
            items: self.items.clone(),
            idempotency_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn parses_all_window_spellings() {
        let expected = TimeWindow::new(time(9, 0), time(11, 0)).expect("valid window");
        for raw in ["09:00-11:00", "9:00 AM - 11:00 AM", "9AM-11AM", "9-11AM", " 9 - 11 am "] {
            let parsed: TimeWindow = raw.parse().expect("window parses");
            assert_eq!(parsed, expected, "spelling {raw:?}");
        }
    }

    #[test]
    fn short_form_flips_meridiem_across_noon() {
        let window: TimeWindow = "11-1PM".parse().expect("window parses");
        assert_eq!(window.start(), time(11, 0), "start stays in the morning");
        assert_eq!(window.end(), time(13, 0), "end is after noon");

        let afternoon: TimeWindow = "2:00 PM - 4:00 PM".parse().expect("window parses");
        assert_eq!(afternoon.to_string(), "14:00-16:00", "canonical form");
        assert_eq!(afternoon.label(), "2:00 PM - 4:00 PM", "human label");
    }

    #[test]
    fn rejects_inverted_and_garbage_windows() {
        assert!(
            matches!("11:00-09:00".parse::<TimeWindow>(), Err(WindowParseError::Inverted { .. })),
            "inverted window"
        );
        assert!(
            matches!("morning".parse::<TimeWindow>(), Err(WindowParseError::Malformed(_))),
            "no separator"
        );
        assert!(
            matches!("13PM-14PM".parse::<TimeWindow>(), Err(WindowParseError::Malformed(_))),
            "hour out of 12h range"
        );
    }

    #[test]
    fn slot_keys_order_by_date_then_window_start() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date");
        let next_day = NaiveDate::from_ymd_opt(2025, 1, 16).expect("valid date");
        let early: TimeWindow = "9-11AM".parse().expect("window");
        let late: TimeWindow = "2-4PM".parse().expect("window");

        let mut keys = vec![
            SlotKey::new(next_day, early),
            SlotKey::new(day, late),
            SlotKey::new(day, early),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                SlotKey::new(day, early),
                SlotKey::new(day, late),
                SlotKey::new(next_day, early),
            ],
            "date first, then window"
        );
    }

    #[test]
    fn booking_ids_render_with_prefix() {
        assert_eq!(BookingId(42).to_string(), "PU-000042", "zero padded");
        assert_eq!("PU-000042".parse::<BookingId>(), Ok(BookingId(42)), "prefixed");
        assert_eq!("7".parse::<BookingId>(), Ok(BookingId(7)), "bare number");
        "PU-x".parse::<BookingId>().expect_err("garbage rejected");
    }

    #[test]
    fn status_table_matches_lifecycle() {
        use BookingStatus::{Cancelled, Completed, Confirmed, InProgress, Scheduled};

        let allowed = [
            (Scheduled, Confirmed),
            (Confirmed, InProgress),
            (InProgress, Completed),
            (Scheduled, Cancelled),
            (Confirmed, Cancelled),
        ];
        let all = [Scheduled, Confirmed, InProgress, Completed, Cancelled];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn categories_round_trip_through_labels() {
        assert_eq!(
            ItemCategory::from(String::from("TVs & Monitors")),
            ItemCategory::TvsAndMonitors,
            "known label"
        );
        assert_eq!(
            ItemCategory::from(String::from("Drones")),
            ItemCategory::Other(String::from("Drones")),
            "open set"
        );
        assert_eq!(String::from(ItemCategory::Cameras), "Cameras", "label out");
    }

    #[test]
    fn weight_validation() {
        let laptop = ItemDescriptor::new(ItemCategory::Computers, "Lenovo");
        assert!(laptop.has_valid_weight(), "missing weight is fine");
        assert!(laptop.clone().with_weight(2.5).has_valid_weight(), "positive");
        assert!(!laptop.clone().with_weight(-0.1).has_valid_weight(), "negative");
        assert!(!laptop.with_weight(f64::NAN).has_valid_weight(), "nan");
    }
}
