//! Wire DTOs for the read/write HTTP surface (spec §6). Kept distinct from
//! the storage-layer structs so a column rename never leaks onto the wire.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use voicecap_core::domain::{JobKind, JobStatus};
use voicecap_core::money::Service;
use voicecap_db::{AudioObject, CreditAccount, DailySummary, Job, Preferences, Transcript};

#[derive(Debug, Serialize)]
pub struct AudioResponse {
    pub file_id: String,
    pub user_id: String,
    pub blob_key: String,
    pub size_bytes: i64,
    pub recorded_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<AudioObject> for AudioResponse {
    fn from(a: AudioObject) -> Self {
        Self {
            file_id: a.file_id,
            user_id: a.user_id,
            blob_key: a.blob_key,
            size_bytes: a.size_bytes,
            recorded_at: a.recorded_at,
            received_at: a.received_at,
            deleted_at: a.deleted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterAudioRequest {
    pub blob_key: String,
    pub size_bytes: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: String,
    pub user_id: String,
    pub kind: JobKind,
    pub audio_file_id: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub error_message: Option<String>,
}

impl From<Job> for JobResponse {
    fn from(j: Job) -> Self {
        Self {
            job_id: j.job_id,
            user_id: j.user_id,
            kind: j.kind,
            audio_file_id: j.audio_file_id,
            status: j.status,
            created_at: j.created_at,
            last_attempt_at: j.last_attempt_at,
            completed_at: j.completed_at,
            attempts: j.attempts,
            error_message: j.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub transcript_id: String,
    pub user_id: String,
    pub audio_file_id: String,
    pub text: String,
    pub duration_seconds: f64,
    pub blob_key: String,
    pub created_at: DateTime<Utc>,
}

impl From<Transcript> for TranscriptResponse {
    fn from(t: Transcript) -> Self {
        Self {
            transcript_id: t.transcript_id,
            user_id: t.user_id,
            audio_file_id: t.audio_file_id,
            text: t.text,
            duration_seconds: t.duration_seconds,
            blob_key: t.blob_key,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary_id: String,
    pub user_id: String,
    pub summary_date: NaiveDate,
    pub family: Vec<String>,
    pub business: Vec<String>,
    pub misc: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DailySummary> for SummaryResponse {
    fn from(s: DailySummary) -> Self {
        Self {
            summary_id: s.summary_id,
            user_id: s.user_id,
            summary_date: s.summary_date,
            family: s.body.family,
            business: s.body.business,
            misc: s.body.misc,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub user_id: String,
    pub notification_email: Option<String>,
    pub enable_daily_summary: bool,
    pub enable_transcription: bool,
    pub summary_time_local: String,
    pub timezone_offset_hours: i32,
    pub recording_max_duration_minutes: i32,
}

impl From<Preferences> for PreferencesResponse {
    fn from(p: Preferences) -> Self {
        Self {
            user_id: p.user_id,
            notification_email: p.notification_email,
            enable_daily_summary: p.enable_daily_summary,
            enable_transcription: p.enable_transcription,
            summary_time_local: p.summary_time_local,
            timezone_offset_hours: p.timezone_offset_hours,
            recording_max_duration_minutes: p.recording_max_duration_minutes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PutPreferencesRequest {
    pub notification_email: Option<String>,
    pub enable_daily_summary: bool,
    pub enable_transcription: bool,
    pub summary_time_local: String,
    pub timezone_offset_hours: i32,
    pub recording_max_duration_minutes: i32,
}

#[derive(Debug, Serialize)]
pub struct CreditResponse {
    pub user_id: String,
    pub balance_usd: Decimal,
    pub granted_total: Decimal,
    pub used_total: Decimal,
    pub refunded_total: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<CreditAccount> for CreditResponse {
    fn from(a: CreditAccount) -> Self {
        Self {
            user_id: a.user_id,
            balance_usd: a.balance_usd,
            granted_total: a.granted_total,
            used_total: a.used_total,
            refunded_total: a.refunded_total,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CostLine {
    pub service: Service,
    pub cost_usd: Decimal,
}

#[derive(Debug, Serialize)]
pub struct KeyResponse {
    pub key_base64: String,
}

#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: String,
    pub amount_usd: Decimal,
}
