use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::error::ProtonErrorOut;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM`, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD` (local time).
pub fn parse_datetime(raw: &str) -> Result<DateTime<Local>, ProtonErrorOut> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProtonErrorOut::usage("empty datetime"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Local));
    }
    for layout in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return local(naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return local(date.and_time(NaiveTime::MIN));
    }

    Err(ProtonErrorOut::usage(format!("unsupported datetime format: {raw}")))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ProtonErrorOut> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ProtonErrorOut::usage(format!("invalid date (want YYYY-MM-DD): {raw}")))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, ProtonErrorOut> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ProtonErrorOut::usage(format!("invalid time (want HH:MM): {raw}")))
}

fn local(naive: NaiveDateTime) -> Result<DateTime<Local>, ProtonErrorOut> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ProtonErrorOut::usage(format!("{naive} does not exist in the local timezone")))
}

/// Resolves `--from/--to`. Defaults to today's midnight through the next 30 days.
pub fn event_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(DateTime<Local>, DateTime<Local>), ProtonErrorOut> {
    let from = match from {
        Some(raw) => parse_datetime(raw).map_err(|e| ProtonErrorOut::usage(format!("invalid --from: {}", e.message)))?,
        None => local(Local::now().date_naive().and_time(NaiveTime::MIN))?,
    };
    let to = match to {
        Some(raw) => parse_datetime(raw).map_err(|e| ProtonErrorOut::usage(format!("invalid --to: {}", e.message)))?,
        None => from + Duration::days(DEFAULT_WINDOW_DAYS),
    };
    if from >= to {
        return Err(ProtonErrorOut::usage("--from must be before --to"));
    }
    Ok((from, to))
}

/// Start/end in unix seconds. All-day events cover whole days.
pub fn schedule(
    date: NaiveDate,
    time: Option<NaiveTime>,
    duration_minutes: u32,
    all_day: bool,
) -> Result<(i64, i64), ProtonErrorOut> {
    if all_day {
        let start = local(date.and_time(NaiveTime::MIN))?;
        let days = (i64::from(duration_minutes) + 24 * 60 - 1) / (24 * 60);
        let end = start + Duration::days(days.max(1));
        return Ok((start.timestamp(), end.timestamp()));
    }
    let start = local(date.and_time(time.unwrap_or(NaiveTime::MIN)))?;
    let end = start + Duration::minutes(i64::from(duration_minutes));
    Ok((start.timestamp(), end.timestamp()))
}

/// Moves an existing event, keeping whatever the caller did not change.
pub fn reschedule(
    current_start: i64,
    current_end: i64,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    duration_minutes: Option<u32>,
) -> Result<(i64, i64), ProtonErrorOut> {
    let start = Local
        .timestamp_opt(current_start, 0)
        .single()
        .ok_or_else(|| ProtonErrorOut::api("event has an invalid start time"))?;

    let new_start = local(
        date.unwrap_or_else(|| start.date_naive())
            .and_time(time.unwrap_or_else(|| start.time())),
    )?;
    let minutes = match duration_minutes {
        Some(m) => i64::from(m),
        None => ((current_end - current_start) / 60).max(0),
    };
    let new_end = new_start + Duration::minutes(minutes);
    Ok((new_start.timestamp(), new_end.timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_layout() {
        for raw in [
            "2026-03-01T09:30:00Z",
            "2026-03-01T09:30",
            "2026-03-01 09:30",
            "2026-03-01",
        ] {
            assert!(parse_datetime(raw).is_ok(), "{raw}");
        }
        assert!(parse_datetime("03/01/2026").is_err());
        assert!(parse_datetime("  ").is_err());
    }

    #[test]
    fn range_defaults_to_thirty_days() {
        let (from, to) = event_range(None, None).unwrap();
        assert_eq!(to - from, Duration::days(DEFAULT_WINDOW_DAYS));
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        let err = event_range(Some("2026-03-02"), Some("2026-03-01")).unwrap_err();
        assert_eq!(err.kind, "protonUsageError");
        assert!(event_range(Some("bogus"), None).unwrap_err().message.contains("--from"));
    }

    #[test]
    fn timed_event_lasts_its_duration() {
        let date = parse_date("2026-03-01").unwrap();
        let (start, end) = schedule(date, Some(parse_time("09:30").unwrap()), 45, false).unwrap();
        assert_eq!(end - start, 45 * 60);
    }

    #[test]
    fn all_day_event_spans_at_least_one_day() {
        let date = parse_date("2026-03-01").unwrap();
        let (start, end) = schedule(date, Some(parse_time("09:30").unwrap()), 60, true).unwrap();
        let start_local = Local.timestamp_opt(start, 0).unwrap();
        assert_eq!(start_local.time(), NaiveTime::MIN);
        assert!(end - start >= 23 * 3600);
    }

    #[test]
    fn reschedule_keeps_unchanged_parts() {
        let date = parse_date("2026-03-01").unwrap();
        let (start, end) = schedule(date, Some(parse_time("09:30").unwrap()), 90, false).unwrap();

        let (moved_start, moved_end) =
            reschedule(start, end, None, Some(parse_time("14:00").unwrap()), None).unwrap();
        let moved = Local.timestamp_opt(moved_start, 0).unwrap();
        assert_eq!(moved.date_naive(), date);
        assert_eq!(moved.time(), parse_time("14:00").unwrap());
        assert_eq!(moved_end - moved_start, 90 * 60);

        let (s, e) = reschedule(start, end, None, None, Some(30)).unwrap();
        assert_eq!(s, start);
        assert_eq!(e - s, 30 * 60);
    }

    #[test]
    fn bad_flag_values_are_usage_errors() {
        assert_eq!(parse_date("2026-13-01").unwrap_err().kind, "protonUsageError");
        assert_eq!(parse_time("25:00").unwrap_err().kind, "protonUsageError");
    }
}
