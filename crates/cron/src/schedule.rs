//! Schedule feasibility and translation to five-field crontab expressions,
//! plus next-run computation and the due check.
//!
//! `cron(8)` does the actual waiting; everything here is pure translation
//! against a supplied `now`.

use {
    chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Timelike, Utc},
    cron::Schedule,
};

use crate::{
    error::{Error, Result},
    types::{CronJob, CronSchedule},
};

const MINUTE_MS: u64 = 60_000;

/// A schedule reduced to crontab-representable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchedule {
    /// Five-field cron expression.
    pub expr: String,
    /// Kept for format extensibility; always `None` for crontab-backed
    /// schedules (per-job timezones are rejected below).
    pub tz: Option<String>,
}

/// Translate a high-level schedule into a five-field crontab expression, or
/// reject it with a user-facing reason.
pub fn resolve_crontab_schedule(schedule: &CronSchedule) -> Result<ResolvedSchedule> {
    match schedule {
        CronSchedule::Cron {
            expr,
            tz,
            stagger_ms,
        } => {
            let trimmed = expr.trim();
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() == 6 {
                return Err(Error::infeasible(
                    "cron expressions with seconds are not supported by crontab (5 fields required)",
                ));
            }
            if fields.len() != 5 {
                return Err(Error::infeasible(format!(
                    "cron expression must have 5 fields, got {}",
                    fields.len()
                )));
            }
            if tz.as_deref().is_some_and(|t| !t.is_empty()) {
                return Err(Error::infeasible(
                    "per-job timezones are not supported with crontab scheduling",
                ));
            }
            if stagger_ms.is_some_and(|s| s > 0) {
                return Err(Error::infeasible(
                    "stagger is not supported with crontab scheduling",
                ));
            }
            let joined = fields.join(" ");
            // A syntactically broken expression would poison the whole
            // crontab at write time; reject it here instead.
            parse_five_field(&joined)?;
            Ok(ResolvedSchedule {
                expr: joined,
                tz: None,
            })
        }
        CronSchedule::Every {
            every_ms,
            anchor_ms,
        } => {
            if *every_ms == 0 {
                return Err(Error::infeasible(
                    "every schedule interval must be greater than zero",
                ));
            }
            if anchor_ms.is_some() {
                return Err(Error::infeasible(
                    "anchored intervals are not supported with crontab scheduling",
                ));
            }
            if every_ms % MINUTE_MS != 0 {
                return Err(Error::infeasible(
                    "every schedule interval is not a multiple of one minute",
                ));
            }
            let minutes = every_ms / MINUTE_MS;
            let expr = if minutes == 1 {
                "* * * * *".to_string()
            } else if minutes < 60 && 60 % minutes == 0 {
                format!("*/{minutes} * * * *")
            } else if minutes % 60 == 0 {
                let hours = minutes / 60;
                if hours == 1 {
                    "0 * * * *".to_string()
                } else if 24 % hours == 0 {
                    format!("0 */{hours} * * *")
                } else if hours % 24 == 0 && (1..=31).contains(&(hours / 24)) {
                    format!("0 0 */{} * *", hours / 24)
                } else {
                    return Err(Error::infeasible(
                        "every schedule interval is not representable in crontab",
                    ));
                }
            } else {
                return Err(Error::infeasible(
                    "every schedule interval is not representable in crontab",
                ));
            };
            Ok(ResolvedSchedule { expr, tz: None })
        }
        CronSchedule::At { at } => {
            let fire = parse_at_minute(at)?;
            Ok(ResolvedSchedule {
                expr: format!(
                    "{} {} {} {} *",
                    fire.minute(),
                    fire.hour(),
                    fire.day(),
                    fire.month()
                ),
                tz: None,
            })
        }
    }
}

/// Parse an ISO-8601 instant and round it up to the next whole minute.
///
/// The civil fields are taken as written (wall-clock), so the result is the
/// same on every machine regardless of its local timezone.
fn parse_at_minute(at: &str) -> Result<NaiveDateTime> {
    let dt = DateTime::parse_from_rfc3339(at.trim())
        .map_err(|source| Error::external(format!("invalid ISO 8601 timestamp: {at}"), source))?;
    let naive = dt.naive_local();
    if naive.second() == 0 && naive.nanosecond() == 0 {
        Ok(naive)
    } else {
        Ok(truncate_to_minute(naive) + Duration::minutes(1))
    }
}

fn truncate_to_minute(naive: NaiveDateTime) -> NaiveDateTime {
    naive
        .with_second(0)
        .and_then(|n| n.with_nanosecond(0))
        .unwrap_or(naive)
}

/// Parse a five-field expression with the `cron` crate, which wants
/// 7 fields (sec min hour dom month dow year). Prepend "0" seconds and
/// append "*" year.
fn parse_five_field(expr: &str) -> Result<Schedule> {
    let padded = format!("0 {expr} *");
    padded
        .parse::<Schedule>()
        .map_err(|e| Error::message(format!("invalid cron expression '{expr}': {e}")))
}

/// Compute the next run time (epoch millis) for a given schedule.
///
/// Returns `None` when the schedule has no future runs (a past one-shot).
pub fn compute_next_run(schedule: &CronSchedule, now_ms: u64) -> Result<Option<u64>> {
    if let CronSchedule::At { at } = schedule {
        // One-shots fire once; the yearly recurrence of the emitted
        // expression must not leak into next-run reporting.
        let fire = parse_at_minute(at)?;
        let fire_ms = Utc.from_utc_datetime(&fire).timestamp_millis().max(0) as u64;
        return Ok((fire_ms > now_ms).then_some(fire_ms));
    }

    let resolved = resolve_crontab_schedule(schedule)?;
    let schedule = parse_five_field(&resolved.expr)?;
    let now_dt = DateTime::from_timestamp_millis(now_ms as i64)
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    Ok(schedule
        .after(&now_dt)
        .next()
        .map(|dt| dt.timestamp_millis().max(0) as u64))
}

/// Next run for a job, `None` when disabled or in the past.
pub fn resolve_job_next_run(job: &CronJob, now_ms: u64) -> Option<u64> {
    if !job.enabled {
        return None;
    }
    compute_next_run(&job.schedule, now_ms).ok().flatten()
}

/// Whether the job's schedule matches the current minute. Disabled jobs are
/// never due.
pub fn is_job_due(job: &CronJob, now_ms: u64) -> bool {
    if !job.enabled {
        return false;
    }
    let Ok(resolved) = resolve_crontab_schedule(&job.schedule) else {
        return false;
    };
    let Ok(schedule) = parse_five_field(&resolved.expr) else {
        return false;
    };
    let minute_ms = now_ms - now_ms % MINUTE_MS;
    let Some(minute_dt) = DateTime::from_timestamp_millis(minute_ms as i64) else {
        return false;
    };
    if let CronSchedule::At { at } = &job.schedule {
        // The emitted expression recurs yearly; a one-shot is only due at or
        // after its instant.
        match parse_at_minute(at) {
            Ok(fire) => {
                let fire_ms = Utc.from_utc_datetime(&fire).timestamp_millis().max(0) as u64;
                if now_ms < fire_ms {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }
    schedule.includes(minute_dt)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use {
        super::*,
        crate::types::{CronPayload, SessionTarget, WakeMode},
    };

    fn cron_expr(expr: &str) -> CronSchedule {
        CronSchedule::Cron {
            expr: expr.into(),
            tz: None,
            stagger_ms: None,
        }
    }

    fn every(every_ms: u64) -> CronSchedule {
        CronSchedule::Every {
            every_ms,
            anchor_ms: None,
        }
    }

    #[rstest]
    #[case(60_000, "* * * * *")]
    #[case(300_000, "*/5 * * * *")]
    #[case(600_000, "*/10 * * * *")]
    #[case(3_600_000, "0 * * * *")]
    #[case(7_200_000, "0 */2 * * *")]
    #[case(172_800_000, "0 0 */2 * *")]
    fn every_translation(#[case] every_ms: u64, #[case] expected: &str) {
        let resolved = resolve_crontab_schedule(&every(every_ms)).unwrap();
        assert_eq!(resolved.expr, expected);
    }

    #[rstest]
    #[case(90_000)]
    #[case(59_000)]
    #[case(0)]
    fn every_rejections(#[case] every_ms: u64) {
        assert!(resolve_crontab_schedule(&every(every_ms)).is_err());
    }

    #[test]
    fn every_not_multiple_message() {
        let err = resolve_crontab_schedule(&every(45_000)).unwrap_err();
        assert!(err.to_string().contains("not a multiple"));
    }

    #[test]
    fn every_not_representable_message() {
        // 7 minutes: a multiple of one minute but 60 % 7 != 0.
        let err = resolve_crontab_schedule(&every(7 * 60_000)).unwrap_err();
        assert!(
            err.to_string()
                .contains("every schedule interval is not representable in crontab")
        );
    }

    #[test]
    fn every_rejects_anchor() {
        let schedule = CronSchedule::Every {
            every_ms: 60_000,
            anchor_ms: Some(1_000),
        };
        let err = resolve_crontab_schedule(&schedule).unwrap_err();
        assert!(err.to_string().contains("anchored"));
    }

    #[test]
    fn cron_five_fields_pass_through() {
        let resolved = resolve_crontab_schedule(&cron_expr("  */5 * * * *  ")).unwrap();
        assert_eq!(resolved.expr, "*/5 * * * *");
        assert!(resolved.tz.is_none());
    }

    #[test]
    fn cron_six_fields_rejected_with_seconds_reason() {
        let err = resolve_crontab_schedule(&cron_expr("0 */5 * * * *")).unwrap_err();
        assert!(err.to_string().contains("seconds"));
    }

    #[test]
    fn cron_wrong_field_count_rejected() {
        let err = resolve_crontab_schedule(&cron_expr("* * *")).unwrap_err();
        assert!(err.to_string().contains("5 fields"));
    }

    #[test]
    fn cron_broken_syntax_rejected() {
        let err = resolve_crontab_schedule(&cron_expr("a b c d e")).unwrap_err();
        assert!(err.to_string().contains("invalid cron expression"));
    }

    #[test]
    fn cron_tz_rejected() {
        let schedule = CronSchedule::Cron {
            expr: "0 9 * * *".into(),
            tz: Some("Europe/Paris".into()),
            stagger_ms: None,
        };
        let err = resolve_crontab_schedule(&schedule).unwrap_err();
        assert!(err.to_string().contains("timezone"));
    }

    #[test]
    fn cron_stagger_rejected() {
        let schedule = CronSchedule::Cron {
            expr: "0 9 * * *".into(),
            tz: None,
            stagger_ms: Some(5_000),
        };
        assert!(resolve_crontab_schedule(&schedule).is_err());
    }

    #[test]
    fn at_subminute_rounds_up() {
        let schedule = CronSchedule::At {
            at: "2030-06-15T12:34:56.500Z".into(),
        };
        let resolved = resolve_crontab_schedule(&schedule).unwrap();
        assert_eq!(resolved.expr, "35 12 15 6 *");
    }

    #[test]
    fn at_whole_minute_unchanged() {
        let schedule = CronSchedule::At {
            at: "2030-06-15T12:34:00Z".into(),
        };
        let resolved = resolve_crontab_schedule(&schedule).unwrap();
        assert_eq!(resolved.expr, "34 12 15 6 *");
    }

    #[test]
    fn at_invalid_timestamp_rejected() {
        let schedule = CronSchedule::At {
            at: "not a date".into(),
        };
        assert!(resolve_crontab_schedule(&schedule).is_err());
    }

    #[test]
    fn next_run_cron() {
        // 2024-02-01T00:00:00Z
        let now_ms = 1_706_745_600_000;
        let next = compute_next_run(&cron_expr("0 9 * * *"), now_ms)
            .unwrap()
            .unwrap();
        assert!(next > now_ms);
        let dt = DateTime::from_timestamp_millis(next as i64).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn next_run_at_future_and_past() {
        let future = CronSchedule::At {
            at: "2099-01-01T00:00:00Z".into(),
        };
        assert!(compute_next_run(&future, 1_000).unwrap().is_some());

        let past = CronSchedule::At {
            at: "2001-01-01T00:00:00Z".into(),
        };
        let now_ms = 1_706_745_600_000;
        assert_eq!(compute_next_run(&past, now_ms).unwrap(), None);
    }

    fn job_with(schedule: CronSchedule, enabled: bool) -> CronJob {
        CronJob {
            id: "j1".into(),
            name: "test".into(),
            description: None,
            enabled,
            agent_id: None,
            session_key: None,
            delete_after_run: false,
            created_at_ms: 0,
            updated_at_ms: 0,
            schedule,
            session_target: SessionTarget::Main,
            wake_mode: WakeMode::Now,
            payload: CronPayload::SystemEvent { text: "hi".into() },
            delivery: None,
            state: Default::default(),
        }
    }

    #[test]
    fn every_minute_always_due() {
        let job = job_with(every(60_000), true);
        assert!(is_job_due(&job, 1_706_745_600_123));
    }

    #[test]
    fn disabled_never_due() {
        let job = job_with(every(60_000), false);
        assert!(!is_job_due(&job, 1_706_745_600_000));
    }

    #[test]
    fn hourly_due_only_on_the_hour() {
        let job = job_with(every(3_600_000), true);
        // 2024-02-01T00:00:30Z — minute 0.
        assert!(is_job_due(&job, 1_706_745_630_000));
        // 2024-02-01T00:05:00Z — minute 5.
        assert!(!is_job_due(&job, 1_706_745_900_000));
    }

    #[test]
    fn future_at_not_due() {
        let job = job_with(
            CronSchedule::At {
                at: "2099-01-01T00:00:00Z".into(),
            },
            true,
        );
        assert!(!is_job_due(&job, 1_706_745_600_000));
    }
}
