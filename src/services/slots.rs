use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    dto::bookings::SlotInfo,
    entity::{
        bookings::{Column as BookingCol, Entity as Bookings},
        packages, studios,
    },
    error::AppResult,
};

/// Slot grid granularity, independent of package duration.
pub const SLOT_DURATION_MINUTES: i64 = 30;

fn minutes_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight() / 60)
}

fn time_from_minutes(minutes: i64) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
}

/// Candidate windows between opening and closing: the cursor advances in
/// 30-minute steps, each candidate spans the package duration and must end
/// at or before closing. Degenerate durations are clamped to one minute.
pub fn slot_windows(
    open_time: NaiveTime,
    close_time: NaiveTime,
    duration_minutes: i32,
) -> Vec<(NaiveTime, NaiveTime)> {
    let duration = i64::from(duration_minutes.max(1));
    let close = minutes_of(close_time);

    let mut windows = Vec::new();
    let mut cursor = minutes_of(open_time);
    while cursor + duration <= close {
        if let (Some(start), Some(end)) = (time_from_minutes(cursor), time_from_minutes(cursor + duration)) {
            windows.push((start, end));
        }
        cursor += SLOT_DURATION_MINUTES;
    }
    windows
}

/// A slot on today's date whose start has already passed is never bookable,
/// and its remaining quota is reported as zero.
pub fn slot_availability(
    remaining: i64,
    slot_start: NaiveTime,
    booking_date: NaiveDate,
    now_date: NaiveDate,
    now_time: NaiveTime,
) -> (bool, i64) {
    let is_past = booking_date == now_date && slot_start <= now_time;
    let is_available = remaining > 0 && !is_past;
    (is_available, if is_available { remaining } else { 0 })
}

/// Compute the slot list for a package on a date, counting live bookings per
/// slot. `exclude_booking_id` keeps a rescheduled booking from occupying its
/// own old slot.
pub async fn build_slots<C: ConnectionTrait>(
    conn: &C,
    package: &packages::Model,
    studio: &studios::Model,
    booking_date: NaiveDate,
    exclude_booking_id: Option<Uuid>,
) -> AppResult<Vec<SlotInfo>> {
    let max_per_slot = i64::from(package.max_booking_per_slot.max(1));
    let now = Local::now();
    let now_date = now.date_naive();
    let now_time = now.time();

    let mut slots = Vec::new();
    for (start, end) in slot_windows(studio.open_time, studio.close_time, package.duration_minutes)
    {
        let mut query = Bookings::find()
            .filter(BookingCol::PackageId.eq(package.id))
            .filter(BookingCol::BookingDate.eq(booking_date))
            .filter(BookingCol::StartTime.eq(start))
            .filter(BookingCol::Status.is_not_in(["cancelled", "expired"]));
        if let Some(exclude) = exclude_booking_id {
            query = query.filter(BookingCol::Id.ne(exclude));
        }

        let booked_count = query.count(conn).await? as i64;
        let remaining = (max_per_slot - booked_count).max(0);
        let (is_available, remaining_quota) =
            slot_availability(remaining, start, booking_date, now_date, now_time);

        slots.push(SlotInfo {
            start_time: start,
            end_time: end,
            booked_count,
            remaining_quota,
            is_available,
        });
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn windows_step_thirty_minutes_and_respect_closing() {
        let windows = slot_windows(t(9, 0), t(11, 0), 60);
        assert_eq!(
            windows,
            vec![
                (t(9, 0), t(10, 0)),
                (t(9, 30), t(10, 30)),
                (t(10, 0), t(11, 0)),
            ]
        );
    }

    #[test]
    fn window_count_never_exceeds_grid_size() {
        let windows = slot_windows(t(8, 0), t(20, 0), 30);
        assert_eq!(windows.len(), 24);
        for (start, end) in &windows {
            assert!(*end <= t(20, 0));
            assert!(start < end);
        }
    }

    #[test]
    fn duration_longer_than_opening_hours_yields_no_slots() {
        assert!(slot_windows(t(9, 0), t(10, 0), 90).is_empty());
    }

    #[test]
    fn zero_duration_is_clamped_and_terminates() {
        let windows = slot_windows(t(9, 0), t(10, 0), 0);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], (t(9, 0), t(9, 1)));
    }

    #[test]
    fn past_slot_today_is_unavailable_even_with_quota() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (available, remaining) = slot_availability(3, t(9, 0), date, date, t(9, 0));
        assert!(!available);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn future_slot_today_is_available() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (available, remaining) = slot_availability(2, t(10, 0), date, date, t(9, 59));
        assert!(available);
        assert_eq!(remaining, 2);
    }

    #[test]
    fn other_day_ignores_clock() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (available, _) = slot_availability(1, t(9, 0), date, today, t(23, 0));
        assert!(available);
    }

    #[test]
    fn full_slot_is_unavailable() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (available, remaining) = slot_availability(0, t(9, 0), date, today, t(8, 0));
        assert!(!available);
        assert_eq!(remaining, 0);
    }
}
