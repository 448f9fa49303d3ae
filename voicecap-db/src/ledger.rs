//! Ledger (spec §4.F): credit balance plus append-only usage log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

use voicecap_core::money::{Service, Unit, round_half_even};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct CreditAccount {
    pub user_id: String,
    pub balance_usd: Decimal,
    pub granted_total: Decimal,
    pub used_total: Decimal,
    pub refunded_total: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    pub fn seed(user_id: &str, seed_grant_usd: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance_usd: seed_grant_usd,
            granted_total: seed_grant_usd,
            used_total: Decimal::ZERO,
            refunded_total: Decimal::ZERO,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub usage_id: String,
    pub user_id: String,
    pub service: Service,
    pub operation: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub cost_usd: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub month: String,
}

pub struct LedgerRepository;

impl LedgerRepository {
    /// Lazily seeds an account with a one-time grant on first touch
    /// (SPEC_FULL §2 supplemented feature), so `HasCredit`/`Charge` never
    /// have to special-case a missing row.
    pub async fn ensure_account(
        pool: &SqlitePool,
        user_id: &str,
        seed_grant_usd: Decimal,
    ) -> DbResult<CreditAccount> {
        if let Some(existing) = Self::get_account(pool, user_id).await? {
            return Ok(existing);
        }

        let account = CreditAccount::seed(user_id, seed_grant_usd, Utc::now());
        let result = sqlx::query(
            "INSERT INTO credit_accounts (user_id, balance_usd, granted_total, used_total, refunded_total, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(&account.user_id)
        .bind(account.balance_usd.to_string())
        .bind(account.granted_total.to_string())
        .bind(account.used_total.to_string())
        .bind(account.refunded_total.to_string())
        .bind(account.updated_at.to_rfc3339())
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(account)
        } else {
            // Lost the race to a concurrent seed; read back what won.
            Self::get_account(pool, user_id)
                .await?
                .ok_or_else(|| DbError::Serialization("account vanished after seed race".to_string()))
        }
    }

    pub async fn get_account(pool: &SqlitePool, user_id: &str) -> DbResult<Option<CreditAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT user_id, balance_usd, granted_total, used_total, refunded_total, updated_at
             FROM credit_accounts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        row.map(CreditAccount::try_from).transpose()
    }

    pub async fn has_credit(pool: &SqlitePool, user_id: &str, seed_grant_usd: Decimal) -> DbResult<bool> {
        let account = Self::ensure_account(pool, user_id, seed_grant_usd).await?;
        Ok(account.balance_usd > Decimal::ZERO)
    }

    /// Computes cost, appends a UsageRecord, and debits the balance. Does
    /// not gate on balance — callers MUST check `has_credit` before
    /// starting chargeable work (spec §4.F).
    ///
    /// The balance update is a conditional `UPDATE ... WHERE balance_usd =
    /// old_balance`, retried once on conflict (spec §5 "Shared resources").
    pub async fn charge(
        pool: &SqlitePool,
        user_id: &str,
        service: Service,
        operation: &str,
        quantity: Decimal,
        unit: Unit,
        seed_grant_usd: Decimal,
    ) -> DbResult<Decimal> {
        let rate = voicecap_core::money::lookup_rate(service, unit)
            .ok_or_else(|| DbError::Serialization(format!("no rate for {service}/{unit}")))?;
        let cost = round_half_even(quantity, rate.rate_usd);

        let account = Self::ensure_account(pool, user_id, seed_grant_usd).await?;

        let mut attempt_balance = account.balance_usd;
        for _ in 0..2 {
            let now = Utc::now();
            let new_balance = attempt_balance - cost;
            let new_used = account.used_total + cost;

            let result = sqlx::query(
                "UPDATE credit_accounts
                 SET balance_usd = ?, used_total = ?, updated_at = ?
                 WHERE user_id = ? AND balance_usd = ?",
            )
            .bind(new_balance.to_string())
            .bind(new_used.to_string())
            .bind(now.to_rfc3339())
            .bind(user_id)
            .bind(attempt_balance.to_string())
            .execute(pool)
            .await?;

            if result.rows_affected() == 1 {
                Self::insert_usage_record(pool, user_id, service, operation, quantity, unit, cost, now)
                    .await?;
                return Ok(cost);
            }

            // Lost the race: re-read current balance and retry once.
            attempt_balance = Self::get_account(pool, user_id)
                .await?
                .ok_or_else(|| DbError::Serialization("account vanished during charge".to_string()))?
                .balance_usd;
        }

        Err(DbError::Serialization(
            "charge lost the balance-update race twice".to_string(),
        ))
    }

    async fn insert_usage_record(
        pool: &SqlitePool,
        user_id: &str,
        service: Service,
        operation: &str,
        quantity: Decimal,
        unit: Unit,
        cost_usd: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let month = occurred_at.format("%Y-%m").to_string();
        sqlx::query(
            "INSERT INTO usage_records (usage_id, user_id, service, operation, quantity, unit,
                                         cost_usd, occurred_at, month)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(format!("usage_{}", Uuid::new_v4()))
        .bind(user_id)
        .bind(service.to_string())
        .bind(operation)
        .bind(quantity.to_string())
        .bind(unit.to_string())
        .bind(cost_usd.to_string())
        .bind(occurred_at.to_rfc3339())
        .bind(month)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn grant(pool: &SqlitePool, user_id: &str, amount_usd: Decimal, seed_grant_usd: Decimal) -> DbResult<()> {
        let account = Self::ensure_account(pool, user_id, seed_grant_usd).await?;
        let now = Utc::now();
        sqlx::query(
            "UPDATE credit_accounts
             SET balance_usd = ?, granted_total = ?, updated_at = ?
             WHERE user_id = ?",
        )
        .bind((account.balance_usd + amount_usd).to_string())
        .bind((account.granted_total + amount_usd).to_string())
        .bind(now.to_rfc3339())
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Totals grouped by service, optionally filtered to one `YYYY-MM` month.
    pub async fn summary(
        pool: &SqlitePool,
        user_id: &str,
        month: Option<&str>,
    ) -> DbResult<Vec<(Service, Decimal)>> {
        let rows: Vec<(String, String)> = match month {
            Some(m) => {
                sqlx::query_as(
                    "SELECT service, cost_usd FROM usage_records WHERE user_id = ? AND month = ?",
                )
                .bind(user_id)
                .bind(m)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT service, cost_usd FROM usage_records WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_all(pool)
                    .await?
            }
        };

        let mut totals: Vec<(Service, Decimal)> = Vec::new();
        for (service_str, cost_str) in rows {
            let service: Service = service_str
                .parse()
                .map_err(|_| DbError::Serialization(format!("unknown service tag: {service_str}")))?;
            let cost = Decimal::from_str(&cost_str)
                .map_err(|_| DbError::Serialization("invalid cost_usd".to_string()))?;

            match totals.iter_mut().find(|(s, _)| *s == service) {
                Some((_, total)) => *total += cost,
                None => totals.push((service, cost)),
            }
        }
        Ok(totals)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    user_id: String,
    balance_usd: String,
    granted_total: String,
    used_total: String,
    refunded_total: String,
    updated_at: String,
}

impl TryFrom<AccountRow> for CreditAccount {
    type Error = DbError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let parse = |s: &str| {
            Decimal::from_str(s).map_err(|_| DbError::Serialization(format!("invalid decimal: {s}")))
        };
        Ok(CreditAccount {
            user_id: row.user_id,
            balance_usd: parse(&row.balance_usd)?,
            granted_total: parse(&row.granted_total)?,
            used_total: parse(&row.used_total)?,
            refunded_total: parse(&row.refunded_total)?,
            updated_at: DateTime::parse_from_rfc3339(&row.updated_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| DbError::Serialization(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn ensure_account_seeds_once() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let first = LedgerRepository::ensure_account(pool, "u1", dec!(5.00)).await.unwrap();
        assert_eq!(first.balance_usd, dec!(5.00));

        let second = LedgerRepository::ensure_account(pool, "u1", dec!(5.00)).await.unwrap();
        assert_eq!(second.balance_usd, dec!(5.00));
    }

    #[tokio::test]
    async fn charge_debits_balance_and_records_usage() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        LedgerRepository::ensure_account(pool, "u1", dec!(1.00)).await.unwrap();
        let cost = LedgerRepository::charge(
            pool,
            "u1",
            Service::Speech,
            "transcribe",
            dec!(15) / dec!(60),
            Unit::Minute,
            dec!(1.00),
        )
        .await
        .unwrap();

        assert_eq!(cost, dec!(0.0015));
        let account = LedgerRepository::get_account(pool, "u1").await.unwrap().unwrap();
        assert_eq!(account.balance_usd, dec!(1.00) - dec!(0.0015));
        assert_eq!(account.used_total, dec!(0.0015));
    }

    #[tokio::test]
    async fn charge_permits_balance_to_go_negative() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        LedgerRepository::ensure_account(pool, "u1", dec!(0.001)).await.unwrap();
        LedgerRepository::charge(pool, "u1", Service::KeyVault, "retrieve", dec!(1), Unit::Secret, dec!(0.001))
            .await
            .unwrap();

        let account = LedgerRepository::get_account(pool, "u1").await.unwrap().unwrap();
        assert!(account.balance_usd < Decimal::ZERO);
    }

    #[tokio::test]
    async fn has_credit_reflects_balance() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(LedgerRepository::has_credit(pool, "u1", dec!(1.00)).await.unwrap());

        LedgerRepository::charge(pool, "u1", Service::Speech, "transcribe", dec!(200), Unit::Minute, dec!(1.00))
            .await
            .unwrap();
        assert!(!LedgerRepository::has_credit(pool, "u1", dec!(1.00)).await.unwrap());
    }

    #[tokio::test]
    async fn grant_increases_balance_and_granted_total() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        LedgerRepository::ensure_account(pool, "u1", dec!(0)).await.unwrap();
        LedgerRepository::grant(pool, "u1", dec!(10.00), dec!(0)).await.unwrap();

        let account = LedgerRepository::get_account(pool, "u1").await.unwrap().unwrap();
        assert_eq!(account.balance_usd, dec!(10.00));
        assert_eq!(account.granted_total, dec!(10.00));
    }

    #[tokio::test]
    async fn summary_groups_by_service() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        LedgerRepository::ensure_account(pool, "u1", dec!(10.00)).await.unwrap();
        LedgerRepository::charge(pool, "u1", Service::Speech, "transcribe", dec!(1), Unit::Minute, dec!(10.00))
            .await
            .unwrap();
        LedgerRepository::charge(pool, "u1", Service::Speech, "transcribe", dec!(2), Unit::Minute, dec!(10.00))
            .await
            .unwrap();
        LedgerRepository::charge(pool, "u1", Service::KeyVault, "retrieve", dec!(1), Unit::Secret, dec!(10.00))
            .await
            .unwrap();

        let totals = LedgerRepository::summary(pool, "u1", None).await.unwrap();
        let speech_total = totals.iter().find(|(s, _)| *s == Service::Speech).unwrap().1;
        assert_eq!(speech_total, dec!(0.018));
    }
}
