//! Scheduler (C7, §4.6).
//!
//! Calendar math is a dependency-free, hand-rolled Howard Hinnant
//! civil_from_days/days_from_civil implementation, matching this
//! codebase's preference for hand-rolling small, self-contained date
//! arithmetic over pulling in a date/time crate for one-off use.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::api::traits::EventSink;
use crate::state::EngineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Sun = 0,
    Mon = 1,
    Tue = 2,
    Wed = 3,
    Thu = 4,
    Fri = 5,
    Sat = 6,
}

impl Weekday {
    pub fn parse(s: &str) -> Option<Weekday> {
        match s.to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Some(Weekday::Sun),
            "monday" | "mon" => Some(Weekday::Mon),
            "tuesday" | "tue" => Some(Weekday::Tue),
            "wednesday" | "wed" => Some(Weekday::Wed),
            "thursday" | "thu" => Some(Weekday::Thu),
            "friday" | "fri" => Some(Weekday::Fri),
            "saturday" | "sat" => Some(Weekday::Sat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval: Duration,
    pub scan_on_start: bool,
    pub scan_day: Option<u32>,
    pub scan_wday: Option<Weekday>,
    pub scan_time: Option<(u8, u8)>,
}

fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

fn weekday_of(epoch_day: i64) -> Weekday {
    // Epoch day 0 (1970-01-01) was a Thursday.
    match ((epoch_day % 7) + 7 + 4) % 7 {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

fn next_month(y: i64, m: i64) -> (i64, i64) {
    if m == 12 {
        (y + 1, 1)
    } else {
        (y, m + 1)
    }
}

/// Compute the delay until the next scheduled fire, honoring the precedence
/// `scan_day > scan_wday > scan_time > interval` (§4.6).
pub fn next_fire_delay(now: SystemTime, schedule: &Schedule) -> Duration {
    let now_secs = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let epoch_day = now_secs.div_euclid(86400);
    let (hh, mm) = schedule.scan_time.unwrap_or((0, 0));
    let target_sec_of_day = hh as i64 * 3600 + mm as i64 * 60;

    if let Some(day) = schedule.scan_day {
        let (y, m, _) = civil_from_days(epoch_day);
        let mut candidate = days_from_civil(y, m, day as i64) * 86400 + target_sec_of_day;
        if candidate <= now_secs {
            let (ny, nm) = next_month(y, m);
            candidate = days_from_civil(ny, nm, day as i64) * 86400 + target_sec_of_day;
        }
        return Duration::from_secs((candidate - now_secs).max(0) as u64);
    }

    if let Some(wday) = schedule.scan_wday {
        let mut delta_days = (wday as i64 - weekday_of(epoch_day) as i64).rem_euclid(7);
        let mut candidate = (epoch_day + delta_days) * 86400 + target_sec_of_day;
        if candidate <= now_secs {
            delta_days += 7;
            candidate = (epoch_day + delta_days) * 86400 + target_sec_of_day;
        }
        return Duration::from_secs((candidate - now_secs).max(0) as u64);
    }

    if schedule.scan_time.is_some() {
        let mut candidate = epoch_day * 86400 + target_sec_of_day;
        if candidate <= now_secs {
            candidate += 86400;
        }
        return Duration::from_secs((candidate - now_secs).max(0) as u64);
    }

    schedule.interval
}

/// Drive the single cooperative scheduler loop: sleep to the next fire
/// time (or fire immediately if `scan_on_start`), run one scan cycle, then
/// recompute the next fire time relative to the scan's end (§4.6).
pub async fn run_scheduler(
    state: Arc<EngineState>,
    schedule: Schedule,
    sink: Arc<tokio::sync::Mutex<Box<dyn EventSink>>>,
) {
    if !schedule.scan_on_start {
        let delay = next_fire_delay(SystemTime::now(), &schedule);
        tokio::time::sleep(delay).await;
    }

    loop {
        let cycle_start = SystemTime::now();
        {
            let mut guard = sink.lock().await;
            info!("scan cycle starting");
            state.run_scan_cycle(&mut **guard).await;
        }
        let elapsed = SystemTime::now().duration_since(cycle_start).unwrap_or_default();

        if schedule.scan_day.is_none()
            && schedule.scan_wday.is_none()
            && schedule.scan_time.is_none()
            && elapsed > schedule.interval
        {
            warn!(?elapsed, interval = ?schedule.interval, "scan cycle overran interval, resetting schedule");
        }

        let next_delay = next_fire_delay(SystemTime::now(), &schedule);
        tokio::time::sleep(next_delay).await;
    }
}
