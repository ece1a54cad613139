//! time parsing utilities for `date_time` conditions
//!
//! time ranges are "HH:MM-HH:MM" in 24-hour notation; the hour may drop its
//! leading zero ("9:00-17:00"). bare hours and AM/PM forms are rejected.
//!
//! ranges are inclusive at both ends and never wrap past midnight:
//! a range whose start is after its end matches nothing

/// a time range in minutes from midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// start time in minutes from midnight (0-1439)
    pub start: u16,
    /// end time in minutes from midnight (0-1439)
    pub end: u16,
}

impl TimeRange {
    /// create a new time range
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// check if a time (in minutes from midnight) is within this range
    pub fn contains(&self, minutes: u16) -> bool {
        self.start <= minutes && minutes <= self.end
    }
}

/// parse a range endpoint ("09:00", "9:00", "17:30") into minutes from midnight
pub fn parse_time(s: &str) -> Option<u16> {
    let (hour, minute) = s.trim().split_once(':')?;

    if hour.is_empty() || hour.len() > 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if minute.len() != 2 || !minute.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hour: u16 = hour.parse().ok()?;
    let minute: u16 = minute.parse().ok()?;
    if hour >= 24 || minute >= 60 {
        return None;
    }

    Some(hour * 60 + minute)
}

/// parse the context's wall-clock reading ("HH:MM", optionally "HH:MM:SS")
///
/// some 24-hour clocks render the first hour after midnight as "24:MM";
/// that reading is folded back to "00:MM"
pub fn parse_clock(s: &str) -> Option<u16> {
    let s = s.trim();
    let mut parts = s.split(':');
    let hour: u16 = parts.next()?.trim().parse().ok()?;
    let minute: u16 = parts.next()?.trim().parse().ok()?;
    if let Some(seconds) = parts.next() {
        let seconds: u16 = seconds.trim().parse().ok()?;
        if seconds >= 60 {
            return None;
        }
    }
    if parts.next().is_some() || minute >= 60 {
        return None;
    }
    match hour {
        0..=23 => Some(hour * 60 + minute),
        24 => Some(minute),
        _ => None,
    }
}

/// parse a time range string like "09:00-17:00"
pub fn parse_time_range(s: &str) -> Option<TimeRange> {
    let (start, end) = s.trim().split_once('-')?;
    Some(TimeRange::new(parse_time(start)?, parse_time(end)?))
}
