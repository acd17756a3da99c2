use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike};

use crate::models::{AvailableSlot, BusyInterval};

pub const SLOT_STEP_MINUTES: i64 = 30;
pub const DAY_START_HOUR: u32 = 9;
/// Candidates starting at or after this hour are never proposed.
pub const DAY_END_HOUR: u32 = 18;
/// How many slots are presented to the user.
pub const TOP_SLOTS: usize = 5;

/// Lazily enumerates free slots between `window_start` and `window_end`.
///
/// The cursor starts at 09:00 on `window_start`'s date and moves in 30 minute
/// steps. Accepted slots may overlap each other when the duration is longer than
/// the step.
pub fn find_slots(
    window_start: DateTime<FixedOffset>,
    window_end: DateTime<FixedOffset>,
    busy: &[BusyInterval],
    duration_minutes: i64,
) -> Slots<'_> {
    let offset = *window_start.offset();
    let cursor = NaiveTime::from_hms_opt(DAY_START_HOUR, 0, 0)
        .map(|t| window_start.date_naive().and_time(t))
        .and_then(|naive| offset.from_local_datetime(&naive).single());

    Slots {
        cursor,
        window_end,
        busy,
        duration: Duration::minutes(duration_minutes),
    }
}

pub struct Slots<'a> {
    cursor: Option<DateTime<FixedOffset>>,
    window_end: DateTime<FixedOffset>,
    busy: &'a [BusyInterval],
    duration: Duration,
}

impl Iterator for Slots<'_> {
    type Item = AvailableSlot;

    fn next(&mut self) -> Option<AvailableSlot> {
        loop {
            let cursor = self.cursor?;
            if cursor >= self.window_end {
                self.cursor = None;
                return None;
            }
            self.cursor = Some(cursor + Duration::minutes(SLOT_STEP_MINUTES));

            let slot_end = cursor + self.duration;
            if cursor.hour() >= DAY_END_HOUR {
                continue;
            }
            if self.busy.iter().any(|b| b.overlaps(&cursor, &slot_end)) {
                continue;
            }
            return Some(AvailableSlot::new(cursor, slot_end));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(&format!("{s}:00+05:30")).unwrap()
    }

    fn busy(start: &str, end: &str) -> BusyInterval {
        BusyInterval {
            start: dt(start),
            end: dt(end),
        }
    }

    #[test]
    fn test_busy_slot_is_skipped() {
        let busy = vec![busy("2026-10-20T10:00", "2026-10-20T10:30")];
        let slots: Vec<_> =
            find_slots(dt("2026-10-20T09:00"), dt("2026-10-20T18:00"), &busy, 60).collect();

        assert_eq!(slots[0].start, dt("2026-10-20T09:00"));
        for slot in &slots {
            assert!(!busy[0].overlaps(&slot.start, &slot.end), "slot {slot:?} overlaps");
        }
        // 09:30 would run until 10:30 and 10:00 starts inside the busy block
        assert!(slots.iter().all(|s| s.start != dt("2026-10-20T09:30")));
        assert!(slots.iter().all(|s| s.start != dt("2026-10-20T10:00")));
        assert_eq!(slots[1].start, dt("2026-10-20T10:30"));
    }

    #[test]
    fn test_adjacent_busy_block_does_not_overlap() {
        let busy = vec![busy("2026-10-20T10:00", "2026-10-20T11:00")];
        let slots: Vec<_> =
            find_slots(dt("2026-10-20T09:00"), dt("2026-10-20T12:00"), &busy, 60).collect();
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        assert_eq!(
            starts,
            vec![
                dt("2026-10-20T09:00"),
                dt("2026-10-20T11:00"),
                dt("2026-10-20T11:30")
            ]
        );
    }

    #[test]
    fn test_six_pm_cutoff() {
        let slots: Vec<_> =
            find_slots(dt("2026-10-20T09:00"), dt("2026-10-20T23:00"), &[], 30).collect();
        assert_eq!(slots.last().unwrap().start, dt("2026-10-20T17:30"));
        assert!(slots.iter().all(|s| s.start.hour() < DAY_END_HOUR));
    }

    #[test]
    fn test_cursor_starts_at_nine_regardless_of_window_time() {
        let slots: Vec<_> =
            find_slots(dt("2026-10-20T14:10"), dt("2026-10-20T10:00"), &[], 60).collect();
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![dt("2026-10-20T09:00"), dt("2026-10-20T09:30")]);
    }

    #[test]
    fn test_accepted_slots_overlap_each_other() {
        let slots: Vec<_> =
            find_slots(dt("2026-10-20T09:00"), dt("2026-10-20T10:30"), &[], 60).collect();
        assert_eq!(slots.len(), 3);
        assert!(slots[1].start < slots[0].end);
    }

    #[test]
    fn test_empty_window() {
        let slots: Vec<_> =
            find_slots(dt("2026-10-20T09:00"), dt("2026-10-20T09:00"), &[], 60).collect();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_identical_inputs_give_identical_slots() {
        let busy = vec![
            busy("2026-10-20T11:00", "2026-10-20T12:00"),
            busy("2026-10-21T09:00", "2026-10-21T13:00"),
        ];
        let first: Vec<_> =
            find_slots(dt("2026-10-20T09:00"), dt("2026-10-22T09:00"), &busy, 45).collect();
        let second: Vec<_> =
            find_slots(dt("2026-10-20T09:00"), dt("2026-10-22T09:00"), &busy, 45).collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_top_slots_truncation_is_lazy() {
        let slots: Vec<_> = find_slots(dt("2026-10-20T09:00"), dt("2026-10-27T09:00"), &[], 60)
            .take(TOP_SLOTS)
            .collect();
        assert_eq!(slots.len(), TOP_SLOTS);
        assert_eq!(slots[4].start, dt("2026-10-20T11:00"));
    }
}
