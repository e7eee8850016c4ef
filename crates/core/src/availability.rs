//! Whole-hour slot calendar of a court.
//!
//! Everything here is pure: callers load the court and its confirmed
//! reservations, and the store re-checks the same overlap rule when it
//! commits.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

use crate::domain::court::{Court, SlotModel};
use crate::domain::reservation::Reservation;
use crate::errors::{BookingError, ValidationIssue};

pub const MIN_DURATION_HOURS: u32 = 1;
pub const DEFAULT_MAX_DURATION_HOURS: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingPolicy {
    pub max_duration_hours: u32,
    pub offset: FixedOffset,
}

impl BookingPolicy {
    pub fn new(max_duration_hours: u32, offset: FixedOffset) -> Self {
        Self { max_duration_hours, offset }
    }

    pub fn check_duration(&self, duration_hours: u32) -> Result<(), ValidationIssue> {
        if (MIN_DURATION_HOURS..=self.max_duration_hours).contains(&duration_hours) {
            Ok(())
        } else {
            Err(ValidationIssue::DurationOutOfBounds {
                requested: duration_hours,
                max: self.max_duration_hours,
            })
        }
    }
}

/// Start instants of each hour in `[start, start + duration_hours)`.
pub fn hours_of(start: DateTime<Utc>, duration_hours: u32) -> Vec<DateTime<Utc>> {
    (0..i64::from(duration_hours)).map(|offset| start + Duration::hours(offset)).collect()
}

/// Hours of the requested block already held by a confirmed reservation of `court`.
pub fn conflicting_hours(
    court: &Court,
    start: DateTime<Utc>,
    duration_hours: u32,
    reservations: &[Reservation],
) -> Vec<DateTime<Utc>> {
    hours_of(start, duration_hours)
        .into_iter()
        .filter(|hour| {
            reservations.iter().any(|reservation| {
                reservation.court_id == court.id
                    && reservation.blocks_slot()
                    && reservation.overlaps(*hour, 1)
            })
        })
        .collect()
}

/// Full availability verdict for a block, with the reason when it is not bookable.
///
/// Checks run in order: duration policy, hour alignment, past start, slot
/// model (operating window or fixed slot list), then confirmed overlaps.
pub fn check_block(
    policy: &BookingPolicy,
    court: &Court,
    start: DateTime<Utc>,
    duration_hours: u32,
    reservations: &[Reservation],
    now: DateTime<Utc>,
) -> Result<(), BookingError> {
    policy.check_duration(duration_hours)?;

    if start.minute() != 0 || start.second() != 0 || start.nanosecond() != 0 {
        return Err(ValidationIssue::MisalignedStart.into());
    }
    if start < now {
        return Err(ValidationIssue::StartInPast.into());
    }

    match &court.slots {
        SlotModel::OperatingHours { open_hour, close_hour } => {
            let outside = hours_of(start, duration_hours).iter().any(|hour| {
                let local = hour.with_timezone(&policy.offset).hour();
                local < *open_hour || local >= *close_hour
            });
            if outside {
                return Err(BookingError::OutsideOperatingHours {
                    open_hour: *open_hour,
                    close_hour: *close_hour,
                });
            }
        }
        SlotModel::FixedSlots { slots } => {
            let missing = hours_of(start, duration_hours)
                .into_iter()
                .filter(|hour| !slots.contains(hour))
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                return Err(BookingError::Conflict { hours: missing });
            }
        }
    }

    let taken = conflicting_hours(court, start, duration_hours, reservations);
    if !taken.is_empty() {
        return Err(BookingError::Conflict { hours: taken });
    }

    Ok(())
}

pub fn is_available(
    policy: &BookingPolicy,
    court: &Court,
    start: DateTime<Utc>,
    duration_hours: u32,
    reservations: &[Reservation],
    now: DateTime<Utc>,
) -> bool {
    check_block(policy, court, start, duration_hours, reservations, now).is_ok()
}

/// Local start hours on `date` where a one-hour block is still bookable.
pub fn free_hours(
    policy: &BookingPolicy,
    court: &Court,
    date: NaiveDate,
    reservations: &[Reservation],
    now: DateTime<Utc>,
) -> Vec<u32> {
    (0..24)
        .filter(|hour| {
            local_instant(policy.offset, date, *hour).is_some_and(|start| {
                is_available(policy, court, start, 1, reservations, now)
            })
        })
        .collect()
}

/// The UTC instant of `date` at `hour:00` in the establishment's local time.
pub fn local_instant(offset: FixedOffset, date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    offset.from_local_datetime(&naive).single().map(|local| local.with_timezone(&Utc))
}

/// Half-open UTC range covering the whole local `date`.
pub fn local_day_bounds(offset: FixedOffset, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_instant(offset, date, 0)?;
    Some((start, start + Duration::days(1)))
}
