//! SlotFinder：忙碌区间 + 约束 → 空闲时段
//!
//! 纯计算，不做 I/O。步骤：
//! 1. 归一化忙碌区间（丢弃 start >= end，按 start 排序，合并重叠或相接的区间）
//! 2. 按自然日遍历 [range_start, range_end]，构造当日窗口（与每日时间窗求交，可跳过周末）
//! 3. 从窗口中扣除忙碌区间，保留长度 >= duration 的空段
//!
//! 结果按 start 升序且两两不相交；时段不会跨越午夜。

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

use crate::scheduling::{BusyInterval, FreeSlot, SlotRequest};

/// 归一化忙碌区间：排序并合并重叠/相接（`next.start <= current.end`）的区间。对已归一化输入是幂等的。
pub fn normalize(busy: &[BusyInterval]) -> Vec<BusyInterval> {
    let mut sorted: Vec<BusyInterval> = busy.iter().copied().filter(BusyInterval::is_valid).collect();
    sorted.sort_by_key(|b| (b.start, b.end));

    let mut merged: Vec<BusyInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(current) if interval.start <= current.end => {
                if interval.end > current.end {
                    current.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// 计算空闲时段。范围为空或时长超出所有窗口时返回空序列（不是错误）。
pub fn find_free_slots(busy: &[BusyInterval], request: &SlotRequest) -> Vec<FreeSlot> {
    if request.range_start >= request.range_end || request.duration_minutes == 0 {
        return Vec::new();
    }

    let merged = normalize(busy);
    let duration = request.duration();
    let mut slots = Vec::new();
    // 窗口按时间递增，早于当前窗口结束的忙碌区间不会再与后续窗口相交
    let mut first_relevant = 0usize;

    let mut day = request.range_start.date();
    let last_day = request.range_end.date();
    while day <= last_day {
        let skip = request.exclude_weekends && is_weekend(day);
        if let (false, Some((window_start, window_end))) = (skip, day_window(day, request)) {
            while first_relevant < merged.len() && merged[first_relevant].end <= window_start {
                first_relevant += 1;
            }

            let mut free_from = window_start;
            for busy in merged[first_relevant..]
                .iter()
                .take_while(|b| b.start < window_end)
            {
                if busy.start > free_from {
                    push_if_fits(&mut slots, free_from, busy.start, duration);
                }
                if busy.end > free_from {
                    free_from = busy.end;
                }
            }
            if free_from < window_end {
                push_if_fits(&mut slots, free_from, window_end, duration);
            }
        }

        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    slots
}

/// 当日候选窗口：[range_start, range_end] ∩ [day + earliest, day + latest]
fn day_window(day: NaiveDate, request: &SlotRequest) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = request.range_start.max(day.and_time(request.earliest_time_of_day));
    let end = request.range_end.min(day.and_time(request.latest_time_of_day));
    (start < end).then_some((start, end))
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

fn push_if_fits(slots: &mut Vec<FreeSlot>, start: NaiveDateTime, end: NaiveDateTime, duration: Duration) {
    if end - start >= duration {
        slots.push(FreeSlot { start, end });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn busy(date: &str, start: &str, end: &str) -> BusyInterval {
        BusyInterval::new(at(date, start), at(date, end))
    }

    /// 2025-06-24 是周二
    const TUE: &str = "2025-06-24";

    fn day_request(duration: u32) -> SlotRequest {
        SlotRequest::new(duration, at(TUE, "00:00"), at(TUE, "23:59"))
            .with_daily_window(hm(8, 0), hm(18, 0))
    }

    #[test]
    fn test_single_busy_block_splits_window() {
        let slots = find_free_slots(&[busy(TUE, "09:00", "10:00")], &day_request(30));
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, at(TUE, "08:00"));
        assert_eq!(slots[0].end, at(TUE, "09:00"));
        assert_eq!(slots[1].start, at(TUE, "10:00"));
        assert_eq!(slots[1].end, at(TUE, "18:00"));
        for s in &slots {
            assert!(s.end <= at(TUE, "09:00") || s.start >= at(TUE, "10:00"));
        }
    }

    #[test]
    fn test_overlapping_busy_merged_before_subtraction() {
        let merged = normalize(&[busy(TUE, "10:00", "11:00"), busy(TUE, "09:00", "10:30")]);
        assert_eq!(merged, vec![busy(TUE, "09:00", "11:00")]);

        let slots = find_free_slots(
            &[busy(TUE, "09:00", "10:30"), busy(TUE, "10:00", "11:00")],
            &day_request(30),
        );
        assert_eq!(slots[1].start, at(TUE, "11:00"));
    }

    #[test]
    fn test_touching_intervals_merge() {
        let merged = normalize(&[busy(TUE, "09:00", "10:00"), busy(TUE, "10:00", "10:30")]);
        assert_eq!(merged, vec![busy(TUE, "09:00", "10:30")]);
    }

    #[test]
    fn test_degenerate_intervals_dropped() {
        let merged = normalize(&[busy(TUE, "10:00", "10:00"), busy(TUE, "12:00", "11:00")]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_normalize_idempotent() {
        let raw = vec![
            busy(TUE, "13:00", "14:00"),
            busy(TUE, "09:00", "09:30"),
            busy(TUE, "09:15", "10:00"),
            busy(TUE, "15:00", "15:00"),
        ];
        let once = normalize(&raw);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let req = SlotRequest::new(30, at(TUE, "18:00"), at(TUE, "08:00"));
        assert!(find_free_slots(&[], &req).is_empty());
        let req = SlotRequest::new(30, at(TUE, "08:00"), at(TUE, "08:00"));
        assert!(find_free_slots(&[], &req).is_empty());
    }

    #[test]
    fn test_duration_longer_than_window_is_empty() {
        assert!(find_free_slots(&[], &day_request(11 * 60)).is_empty());
    }

    #[test]
    fn test_empty_daily_window_is_empty() {
        let req = day_request(30).with_daily_window(hm(17, 0), hm(9, 0));
        assert!(find_free_slots(&[], &req).is_empty());
    }

    #[test]
    fn test_short_gaps_filtered() {
        let slots = find_free_slots(
            &[busy(TUE, "08:20", "12:00"), busy(TUE, "12:15", "18:00")],
            &day_request(30),
        );
        assert!(slots.is_empty());
    }

    #[test]
    fn test_weekends_skipped() {
        // 2025-06-27 周五 ~ 2025-06-30 周一
        let req = SlotRequest::new(60, at("2025-06-27", "00:00"), at("2025-06-30", "23:00"))
            .with_daily_window(hm(9, 0), hm(17, 0))
            .with_exclude_weekends(true);
        let slots = find_free_slots(&[], &req);
        let days: Vec<String> = slots.iter().map(|s| s.start.date().to_string()).collect();
        assert_eq!(days, vec!["2025-06-27", "2025-06-30"]);

        let all = find_free_slots(&[], &req.clone().with_exclude_weekends(false));
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_range_clips_first_and_last_day() {
        let req = SlotRequest::new(30, at(TUE, "15:00"), at("2025-06-25", "10:00"))
            .with_daily_window(hm(9, 0), hm(17, 0));
        let slots = find_free_slots(&[], &req);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, at(TUE, "15:00"));
        assert_eq!(slots[0].end, at(TUE, "17:00"));
        assert_eq!(slots[1].start, at("2025-06-25", "09:00"));
        assert_eq!(slots[1].end, at("2025-06-25", "10:00"));
    }

    #[test]
    fn test_multi_day_busy_block_carries_over() {
        let block = BusyInterval::new(at(TUE, "16:00"), at("2025-06-25", "11:00"));
        let req = SlotRequest::new(30, at(TUE, "00:00"), at("2025-06-25", "23:00"))
            .with_daily_window(hm(9, 0), hm(17, 0));
        let slots = find_free_slots(&[block], &req);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].end, at(TUE, "16:00"));
        assert_eq!(slots[1].start, at("2025-06-25", "11:00"));
    }

    #[test]
    fn test_no_slot_crosses_midnight() {
        // 全天窗口，两天之间有前后相接的空闲，也不会合并成跨午夜的时段
        let req = SlotRequest::new(60, at(TUE, "22:00"), at("2025-06-25", "02:00"));
        let slots = find_free_slots(&[], &req);
        assert_eq!(slots.len(), 2);
        for s in &slots {
            assert_eq!(s.start.date(), s.end.date());
        }
    }

    /// 伪随机生成忙碌区间，检查输出的排序、不相交、时长与窗口约束
    #[test]
    fn test_output_invariants_on_generated_inputs() {
        let mut seed: u64 = 0x5eed_1234;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };
        let base = at("2025-06-23", "00:00");

        for _ in 0..200 {
            let mut intervals = Vec::new();
            for _ in 0..next(12) {
                let start = base + Duration::minutes(next(5 * 24 * 60) as i64);
                let len = Duration::minutes(next(300) as i64 - 20);
                intervals.push(BusyInterval::new(start, start + len));
            }
            let duration = 15 + next(120) as u32;
            let range_start = base + Duration::minutes(next(24 * 60) as i64);
            let range_end = range_start + Duration::minutes(next(5 * 24 * 60) as i64);
            let earliest = hm(next(12) as u32, 0);
            let latest = hm(10 + next(14) as u32, 0);
            let req = SlotRequest::new(duration, range_start, range_end)
                .with_daily_window(earliest, latest)
                .with_exclude_weekends(next(2) == 0);

            let merged = normalize(&intervals);
            let slots = find_free_slots(&intervals, &req);
            for pair in slots.windows(2) {
                assert!(pair[0].end <= pair[1].start, "slots must be sorted and disjoint");
            }
            for s in &slots {
                assert!(s.duration_minutes() >= i64::from(duration));
                assert_eq!(s.start.date(), s.end.date());
                assert!(s.start >= req.range_start && s.end <= req.range_end);
                assert!(s.start.time() >= earliest && s.end.time() <= latest);
                if req.exclude_weekends {
                    assert!(!is_weekend(s.start.date()));
                }
                for b in &merged {
                    assert!(s.end <= b.start || s.start >= b.end, "slot overlaps busy interval");
                }
            }
        }
    }
}
