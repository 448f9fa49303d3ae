//! DailySummary dispatch (spec §4.L "Dispatch by kind" — DailySummary job):
//! reads D, calls I, stores the summary back to D, and sends it via J.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use voicecap_core::error::{CoreError, CoreResult, ErrorCategory};
use voicecap_core::money::{Service, Unit};
use voicecap_db::transcripts::SummaryBody;
use voicecap_db::{DailySummary, Job, KeyVaultRepository, LedgerRepository, PrefStore, TranscriptRepository};

use crate::state::AppState;

pub async fn process(state: &Arc<AppState>, job: &Job) -> CoreResult<()> {
    let pool = state.db.pool();

    let prefs = match PrefStore::get(pool, &job.user_id).await? {
        Some(p) if p.enable_daily_summary => p,
        _ => return Ok(()),
    };

    let email = prefs.notification_email.as_deref().ok_or_else(|| {
        CoreError::new(ErrorCategory::InvalidInput, "notification email required")
    })?;

    let target_date = target_date(job, prefs.timezone_offset_hours);
    let (utc_start, utc_end) = local_day_bounds(target_date, prefs.timezone_offset_hours);

    let transcripts =
        TranscriptRepository::list_transcripts(pool, &job.user_id, Some((utc_start, utc_end))).await?;
    let concatenated = transcripts
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let result = state
        .summary
        .summarize(&concatenated, &state.daily_summary_prompt)
        .await?;

    if result.tokens_in > 0 {
        let quantity = Decimal::from(result.tokens_in) / Decimal::from(1000);
        LedgerRepository::charge(
            pool,
            &job.user_id,
            Service::Summary,
            "summarize_input",
            quantity,
            Unit::ThousandInputTokens,
            state.seed_grant_usd,
        )
        .await?;
    }
    if result.tokens_out > 0 {
        let quantity = Decimal::from(result.tokens_out) / Decimal::from(1000);
        LedgerRepository::charge(
            pool,
            &job.user_id,
            Service::Summary,
            "summarize_output",
            quantity,
            Unit::ThousandOutputTokens,
            state.seed_grant_usd,
        )
        .await?;
    }

    let body = SummaryBody {
        family: result.family,
        business: result.business,
        misc: result.misc,
    };
    let html = render_html(&body, target_date);

    state
        .mailer
        .send(email, &format!("Your voice memo summary for {target_date}"), &html)
        .await?;
    LedgerRepository::charge(
        pool,
        &job.user_id,
        Service::Email,
        "send",
        Decimal::ONE / Decimal::from(1000),
        Unit::ThousandMessages,
        state.seed_grant_usd,
    )
    .await?;

    let key = KeyVaultRepository::get_key(pool, &job.user_id).await?;
    let summary = DailySummary::new(&job.user_id, target_date, body, Utc::now());
    TranscriptRepository::save_summary(pool, &summary, &key).await?;

    Ok(())
}

/// `summary_date` when present, else the legacy `created_at - 1 day`
/// fallback converted to the user's local calendar (spec §9 open question 3).
fn target_date(job: &Job, timezone_offset_hours: i32) -> NaiveDate {
    match job.summary_date {
        Some(d) => d,
        None => {
            let local_created = job.created_at + Duration::hours(timezone_offset_hours as i64);
            (local_created - Duration::days(1)).date_naive()
        }
    }
}

/// `[local 00:00, local 24:00)` of `date`, converted to UTC instants.
fn local_day_bounds(
    date: NaiveDate,
    timezone_offset_hours: i32,
) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let local_midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    let offset = Duration::hours(timezone_offset_hours as i64);
    let utc_start = Utc.from_utc_datetime(&local_midnight) - offset;
    (utc_start, utc_start + Duration::days(1))
}

fn render_html(body: &SummaryBody, date: NaiveDate) -> String {
    if body.family.is_empty() && body.business.is_empty() && body.misc.is_empty() {
        return format!("<p>No activity recorded for {date}.</p>");
    }

    let section = |title: &str, items: &[String]| -> String {
        if items.is_empty() {
            return String::new();
        }
        let lis: String = items.iter().map(|i| format!("<li>{i}</li>")).collect();
        format!("<h3>{title}</h3><ul>{lis}</ul>")
    };

    format!(
        "<h2>Summary for {date}</h2>{}{}{}",
        section("Family", &body.family),
        section("Business", &body.business),
        section("Misc", &body.misc),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_date_prefers_summary_date_over_legacy_fallback() {
        let now = Utc::now();
        let mut job = Job::new_daily_summary("u1", now.date_naive(), now);
        job.summary_date = Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(target_date(&job, -6), NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn local_day_bounds_shift_by_offset() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let (start, end) = local_day_bounds(date, -6);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 15, 6, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 16, 6, 0, 0).unwrap());
    }

    #[test]
    fn no_activity_renders_placeholder() {
        let html = render_html(&SummaryBody::default(), NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert!(html.contains("No activity"));
    }
}
