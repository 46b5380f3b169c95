//! Schedule value parsing and next-run computation.
//!
//! Includes a zero-dependency cron expression parser supporting standard
//! 5-field expressions: `minute hour day-of-month month day-of-week`.
//! The next cron occurrence is found by a bounded forward minute scan —
//! approximate by design; the tick loop corrects any drift.

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use valet_core::error::SchedulerError;
use valet_core::task::ScheduleKind;

/// Upper bound for the cron scan: a year is enough for any 5-field
/// expression with at least one reachable date.
const CRON_SCAN_MINUTES: i64 = 366 * 24 * 60;

/// A parsed 5-field cron expression: minute hour dom month dow.
#[derive(Debug, Clone)]
pub struct CronExpr {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>, // 0=Sun, 6=Sat
}

impl CronExpr {
    /// Parse a standard 5-field cron expression.
    ///
    /// Supports: `*`, `*/N` (step), `N` (literal), `N-M` (range), `N,M` (list).
    pub fn parse(expr: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expr.trim().split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "Expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            ));
        }

        Ok(CronExpr {
            minutes: Self::parse_field(fields[0], 0, 59)?,
            hours: Self::parse_field(fields[1], 0, 23)?,
            days_of_month: Self::parse_field(fields[2], 1, 31)?,
            months: Self::parse_field(fields[3], 1, 12)?,
            days_of_week: Self::parse_field(fields[4], 0, 6)?,
        })
    }

    fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
        let mut values = Vec::new();

        for part in field.split(',') {
            let part = part.trim();

            if part.contains('/') {
                // Step: */N or M-N/S
                let pieces: Vec<&str> = part.splitn(2, '/').collect();
                let step: u32 = pieces[1]
                    .parse()
                    .map_err(|_| format!("Invalid step: {}", pieces[1]))?;
                if step == 0 {
                    return Err("Step cannot be zero".into());
                }
                let (start, end) = if pieces[0] == "*" {
                    (min, max)
                } else if pieces[0].contains('-') {
                    Self::parse_range(pieces[0], min, max)?
                } else {
                    let s: u32 = pieces[0]
                        .parse()
                        .map_err(|_| format!("Invalid number: {}", pieces[0]))?;
                    (s, max)
                };
                let mut v = start;
                while v <= end {
                    values.push(v);
                    v += step;
                }
            } else if part.contains('-') {
                // Range: M-N
                let (start, end) = Self::parse_range(part, min, max)?;
                for v in start..=end {
                    values.push(v);
                }
            } else if part == "*" {
                for v in min..=max {
                    values.push(v);
                }
            } else {
                // Literal
                let v: u32 = part
                    .parse()
                    .map_err(|_| format!("Invalid number: {part}"))?;
                if v < min || v > max {
                    return Err(format!("{v} out of range {min}-{max}"));
                }
                values.push(v);
            }
        }

        values.sort();
        values.dedup();
        if values.is_empty() {
            return Err("Field produced no values".into());
        }
        Ok(values)
    }

    fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), String> {
        let pieces: Vec<&str> = s.splitn(2, '-').collect();
        let start: u32 = pieces[0]
            .parse()
            .map_err(|_| format!("Invalid range start: {}", pieces[0]))?;
        let end: u32 = pieces[1]
            .parse()
            .map_err(|_| format!("Invalid range end: {}", pieces[1]))?;
        if start < min || end > max || start > end {
            return Err(format!("Range {start}-{end} invalid for {min}-{max}"));
        }
        Ok((start, end))
    }

    /// Check if the given datetime matches this cron expression.
    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        let minute = dt.minute();
        let hour = dt.hour();
        let dom = dt.day();
        let month = dt.month();
        let dow = dt.weekday().num_days_from_sunday(); // 0=Sun

        self.minutes.contains(&minute)
            && self.hours.contains(&hour)
            && self.days_of_month.contains(&dom)
            && self.months.contains(&month)
            && self.days_of_week.contains(&dow)
    }

    /// The first matching minute strictly after `after`, if any exists
    /// within the scan horizon.
    pub fn next_match(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // First whole minute strictly after `after`
        let mut candidate = after
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(after)
            + Duration::minutes(1);

        for _ in 0..CRON_SCAN_MINUTES {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

/// Validate a schedule value and compute the first eligible time.
///
/// Called at task creation so malformed schedules are rejected before they
/// are ever persisted.
pub fn initial_next_run(
    kind: ScheduleKind,
    value: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedulerError> {
    match kind {
        ScheduleKind::Once => DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                SchedulerError::InvalidSchedule(format!("Bad 'once' timestamp '{value}': {e}"))
            }),
        ScheduleKind::Interval => {
            let millis = parse_interval(value)?;
            Ok(now + Duration::milliseconds(millis))
        }
        ScheduleKind::Cron => {
            let expr = CronExpr::parse(value)
                .map_err(|e| SchedulerError::InvalidSchedule(format!("Bad cron '{value}': {e}")))?;
            expr.next_match(now).ok_or_else(|| {
                SchedulerError::InvalidSchedule(format!("Cron '{value}' never fires"))
            })
        }
    }
}

/// Compute the next eligible time after a run, or None for terminal tasks.
///
/// A schedule value that was valid at creation but fails to parse now
/// (e.g. edited by hand in the database) degrades to one tick ahead
/// instead of wedging the scheduler.
pub fn next_run_after(
    kind: ScheduleKind,
    value: &str,
    now: DateTime<Utc>,
    tick: std::time::Duration,
) -> Option<DateTime<Utc>> {
    let fallback = now + Duration::from_std(tick).unwrap_or(Duration::seconds(15));
    match kind {
        ScheduleKind::Once => None,
        ScheduleKind::Interval => match parse_interval(value) {
            Ok(millis) => Some(now + Duration::milliseconds(millis)),
            Err(_) => Some(fallback),
        },
        ScheduleKind::Cron => match CronExpr::parse(value) {
            Ok(expr) => Some(expr.next_match(now).unwrap_or(fallback)),
            Err(_) => Some(fallback),
        },
    }
}

fn parse_interval(value: &str) -> Result<i64, SchedulerError> {
    let millis: i64 = value.trim().parse().map_err(|_| {
        SchedulerError::InvalidSchedule(format!("Bad interval '{value}': expected milliseconds"))
    })?;
    if millis <= 0 {
        return Err(SchedulerError::InvalidSchedule(format!(
            "Interval must be positive, got {millis}"
        )));
    }
    Ok(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_expr_every_minute() {
        let expr = CronExpr::parse("* * * * *").unwrap();
        assert_eq!(expr.minutes.len(), 60);
        assert_eq!(expr.hours.len(), 24);
    }

    #[test]
    fn cron_expr_specific_time() {
        let expr = CronExpr::parse("30 9 * * 1-5").unwrap();
        assert_eq!(expr.minutes, vec![30]);
        assert_eq!(expr.hours, vec![9]);
        assert_eq!(expr.days_of_week, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn cron_expr_step_and_list() {
        let expr = CronExpr::parse("*/15 * * * *").unwrap();
        assert_eq!(expr.minutes, vec![0, 15, 30, 45]);

        let expr = CronExpr::parse("0,30 * * * *").unwrap();
        assert_eq!(expr.minutes, vec![0, 30]);
    }

    #[test]
    fn cron_invalid_rejected() {
        assert!(CronExpr::parse("* * *").is_err());
        assert!(CronExpr::parse("70 * * * *").is_err());
        assert!(CronExpr::parse("not a cron").is_err());
    }

    #[test]
    fn cron_matches_datetime() {
        // "At 09:30 on weekdays"
        let expr = CronExpr::parse("30 9 * * 1-5").unwrap();

        // 2026-02-23 is a Monday (dow=1)
        let monday_930 = chrono::NaiveDate::from_ymd_opt(2026, 2, 23)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        assert!(expr.matches(&monday_930));

        // 2026-02-22 is a Sunday (dow=0) — should NOT match
        let sunday_930 = chrono::NaiveDate::from_ymd_opt(2026, 2, 22)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        assert!(!expr.matches(&sunday_930));
    }

    #[test]
    fn cron_next_match_moves_forward() {
        let expr = CronExpr::parse("0 12 * * *").unwrap();
        let morning = chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 17, 42)
            .unwrap()
            .and_utc();

        let next = expr.next_match(morning).unwrap();
        assert_eq!(next.hour(), 12);
        assert_eq!(next.minute(), 0);
        assert_eq!(next.day(), 1);

        // From exactly noon, the next firing is tomorrow
        let noon = chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        let next = expr.next_match(noon).unwrap();
        assert_eq!(next.day(), 2);
    }

    #[test]
    fn initial_once_parses_timestamp() {
        let now = Utc::now();
        let next = initial_next_run(ScheduleKind::Once, "2027-01-01T09:00:00Z", now).unwrap();
        assert_eq!(next.year(), 2027);

        assert!(initial_next_run(ScheduleKind::Once, "tomorrow", now).is_err());
    }

    #[test]
    fn initial_interval_offsets_from_now() {
        let now = Utc::now();
        let next = initial_next_run(ScheduleKind::Interval, "60000", now).unwrap();
        assert_eq!(next - now, Duration::milliseconds(60000));

        assert!(initial_next_run(ScheduleKind::Interval, "-5", now).is_err());
        assert!(initial_next_run(ScheduleKind::Interval, "soon", now).is_err());
    }

    #[test]
    fn next_after_once_is_none() {
        let now = Utc::now();
        assert!(
            next_run_after(
                ScheduleKind::Once,
                "2027-01-01T09:00:00Z",
                now,
                std::time::Duration::from_secs(15)
            )
            .is_none()
        );
    }

    #[test]
    fn next_after_interval_is_now_plus_period() {
        let now = Utc::now();
        let next = next_run_after(
            ScheduleKind::Interval,
            "60000",
            now,
            std::time::Duration::from_secs(15),
        )
        .unwrap();
        assert_eq!(next - now, Duration::milliseconds(60000));
    }

    #[test]
    fn corrupted_value_degrades_to_one_tick() {
        let now = Utc::now();
        let tick = std::time::Duration::from_secs(15);
        let next = next_run_after(ScheduleKind::Interval, "garbage", now, tick).unwrap();
        assert_eq!(next - now, Duration::seconds(15));

        let next = next_run_after(ScheduleKind::Cron, "bad cron", now, tick).unwrap();
        assert_eq!(next - now, Duration::seconds(15));
    }
}
