//! Forecast store: reads of due forecasts, leases and write-once settlement.
//!
//! Timestamps are stored as unix seconds. Every state transition is a single
//! conditional UPDATE, so a transition that lost a race reports `false`
//! instead of overwriting.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use matchday::{Forecast, ForecastState, Outcome, SettlementResult, Side};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::time::Duration;
use tracing::{debug, info};

use super::schema::create_tables;

/// Wait this long on a locked database before failing a statement
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "id, match_label, sport_tag, league, kickoff, forecast_text, \
     selection, value_bet_side, value_bet_odds, state, actual_result, actual_score, \
     value_bet_outcome, value_bet_profit, resolved_at, attempts, last_attempt_at, \
     lease_owner, lease_expires_at, review_reason";

/// A stored forecast plus its resolution bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub forecast: Forecast,
    /// Passes that looked for this forecast without settling it
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub review_reason: Option<String>,
}

pub struct ForecastStore {
    conn: Mutex<Connection>,
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn ts(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| conversion_error(idx, format!("timestamp out of range: {}", secs)))
}

fn opt_ts(idx: usize, secs: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    secs.map(|s| ts(idx, s)).transpose()
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ForecastRecord> {
    let side: Option<String> = row.get(7)?;
    let value_bet_side = match side {
        Some(s) => Some(Side::parse(&s).ok_or_else(|| conversion_error(7, format!("bad side {}", s)))?),
        None => None,
    };

    let state: String = row.get(9)?;
    let state = ForecastState::parse(&state)
        .ok_or_else(|| conversion_error(9, format!("bad state {}", state)))?;

    let vb_outcome: Option<String> = row.get(12)?;
    let value_bet_outcome = match vb_outcome {
        Some(s) => Some(Outcome::parse(&s).ok_or_else(|| conversion_error(12, format!("bad outcome {}", s)))?),
        None => None,
    };

    let forecast = Forecast {
        id: row.get(0)?,
        match_label: row.get(1)?,
        sport_tag: row.get(2)?,
        league: row.get(3)?,
        kickoff: ts(4, row.get(4)?)?,
        forecast_text: row.get(5)?,
        selection: row.get(6)?,
        value_bet_side,
        value_bet_odds: row.get(8)?,
        state,
        actual_result: row.get(10)?,
        actual_score: row.get(11)?,
        value_bet_outcome,
        value_bet_profit: row.get(13)?,
        resolved_at: opt_ts(14, row.get(14)?)?,
    };

    Ok(ForecastRecord {
        forecast,
        attempts: row.get(15)?,
        last_attempt_at: opt_ts(16, row.get(16)?)?,
        lease_owner: row.get(17)?,
        lease_expires_at: opt_ts(18, row.get(18)?)?,
        review_reason: row.get(19)?,
    })
}

impl ForecastStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open forecast database {}", path))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        create_tables(&conn).context("Failed to create forecast tables")?;
        info!("[STORE] Opened {}", path);
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Insert a new forecast. Returns `false` when the id already exists.
    pub fn insert(&self, forecast: &Forecast, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO forecasts (
                    id, match_label, sport_tag, league, kickoff, forecast_text, selection,
                    value_bet_side, value_bet_odds, state, actual_result, actual_score,
                    value_bet_outcome, value_bet_profit, resolved_at, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    forecast.id,
                    forecast.match_label,
                    forecast.sport_tag,
                    forecast.league,
                    forecast.kickoff.timestamp(),
                    forecast.forecast_text,
                    forecast.selection,
                    forecast.value_bet_side.map(|s| s.as_str()),
                    forecast.value_bet_odds,
                    forecast.state.as_str(),
                    forecast.actual_result,
                    forecast.actual_score,
                    forecast.value_bet_outcome.map(|o| o.as_str()),
                    forecast.value_bet_profit,
                    forecast.resolved_at.map(|t| t.timestamp()),
                    now.timestamp(),
                ],
            )
            .with_context(|| format!("Failed to insert forecast {}", forecast.id))?;
        Ok(rows == 1)
    }

    pub fn get(&self, id: &str) -> Result<Option<ForecastRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM forecasts WHERE id = ?1", SELECT_COLUMNS);
        conn.query_row(&sql, params![id], row_to_record)
            .optional()
            .with_context(|| format!("Failed to load forecast {}", id))
    }

    fn query_records(&self, where_clause: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<ForecastRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM forecasts WHERE {} ORDER BY kickoff ASC, id ASC",
            SELECT_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(args, row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Every PENDING forecast whose kickoff is at or before `now`.
    pub fn pending_due(&self, now: DateTime<Utc>) -> Result<Vec<ForecastRecord>> {
        self.query_records("state = 'PENDING' AND kickoff <= ?1", &[&now.timestamp()])
            .context("Failed to list pending forecasts")
    }

    /// Forecasts parked for manual review.
    pub fn needs_review(&self) -> Result<Vec<ForecastRecord>> {
        self.query_records("state = 'NEEDS_MANUAL_REVIEW'", &[])
            .context("Failed to list forecasts needing review")
    }

    /// Take a lease on a PENDING forecast. Succeeds when the forecast is
    /// unclaimed, its lease has expired, or `owner` already holds it.
    pub fn claim(&self, id: &str, owner: &str, now: DateTime<Utc>, ttl_secs: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE forecasts SET lease_owner = ?2, lease_expires_at = ?3
             WHERE id = ?1 AND state = 'PENDING'
               AND (lease_owner IS NULL OR lease_expires_at IS NULL
                    OR lease_expires_at <= ?4 OR lease_owner = ?2)",
            params![id, owner, now.timestamp() + ttl_secs, now.timestamp()],
        )?;
        if rows == 0 {
            debug!("[STORE] {} already claimed or no longer pending", id);
        }
        Ok(rows == 1)
    }

    /// Drop a lease held by `owner`. Leases held by others are left alone.
    pub fn release(&self, id: &str, owner: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE forecasts SET lease_owner = NULL, lease_expires_at = NULL
             WHERE id = ?1 AND lease_owner = ?2",
            params![id, owner],
        )?;
        Ok(())
    }

    /// Count one unproductive attempt. Returns the new attempt count.
    pub fn record_attempt(&self, id: &str, now: DateTime<Utc>) -> Result<u32> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE forecasts SET attempts = attempts + 1, last_attempt_at = ?2 WHERE id = ?1",
            params![id, now.timestamp()],
        )?;
        let attempts: u32 = conn
            .query_row("SELECT attempts FROM forecasts WHERE id = ?1", params![id], |row| row.get(0))
            .with_context(|| format!("Forecast {} vanished while recording an attempt", id))?;
        Ok(attempts)
    }

    /// Write the settlement of a PENDING forecast. Returns `false` when the
    /// forecast was already settled or parked.
    pub fn settle(&self, id: &str, result: &SettlementResult, now: DateTime<Utc>) -> Result<bool> {
        self.write_settlement(id, result, now, "state = 'PENDING'")
    }

    /// Settlement through the override path: also accepted from manual review.
    pub fn settle_manual(&self, id: &str, result: &SettlementResult, now: DateTime<Utc>) -> Result<bool> {
        self.write_settlement(id, result, now, "state IN ('PENDING', 'NEEDS_MANUAL_REVIEW')")
    }

    fn write_settlement(
        &self,
        id: &str,
        result: &SettlementResult,
        now: DateTime<Utc>,
        state_guard: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let sql = format!(
            "UPDATE forecasts SET state = ?2, actual_result = ?3, actual_score = ?4,
                 value_bet_outcome = ?5, value_bet_profit = ?6, resolved_at = ?7,
                 lease_owner = NULL, lease_expires_at = NULL
             WHERE id = ?1 AND {}",
            state_guard
        );
        let rows = conn
            .execute(
                &sql,
                params![
                    id,
                    result.outcome.state().as_str(),
                    result.actual_result,
                    result.actual_score,
                    result.value_bet_outcome.map(|o| o.as_str()),
                    result.value_bet_profit,
                    now.timestamp(),
                ],
            )
            .with_context(|| format!("Failed to settle forecast {}", id))?;
        Ok(rows == 1)
    }

    /// Park a PENDING forecast for manual review.
    pub fn mark_needs_review(&self, id: &str, reason: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE forecasts SET state = 'NEEDS_MANUAL_REVIEW', review_reason = ?2,
                 lease_owner = NULL, lease_expires_at = NULL
             WHERE id = ?1 AND state = 'PENDING'",
            params![id, reason],
        )?;
        Ok(rows == 1)
    }

    pub fn counts_by_state(&self) -> Result<Vec<(ForecastState, u64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM forecasts GROUP BY state ORDER BY state")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(state, n)| ForecastState::parse(&state).map(|s| (s, n.max(0) as u64)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    fn forecast(id: &str, kickoff: DateTime<Utc>) -> Forecast {
        Forecast {
            id: id.into(),
            match_label: "Chelsea vs Liverpool".into(),
            sport_tag: "soccer_epl".into(),
            kickoff,
            forecast_text: "Home Win".into(),
            value_bet_side: Some(Side::Away),
            value_bet_odds: Some(2.5),
            ..Default::default()
        }
    }

    fn result(outcome: Outcome) -> SettlementResult {
        SettlementResult {
            outcome,
            actual_result: "Home Win".into(),
            actual_score: "3-1".into(),
            actual_winner: Side::Home,
            predicted_side: Some(Side::Home),
            value_bet_outcome: Some(Outcome::Miss),
            value_bet_profit: Some(-1.0),
        }
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let store = ForecastStore::open_in_memory().unwrap();
        let f = forecast("f-1", at(15));
        assert!(store.insert(&f, at(10)).unwrap());
        assert!(!store.insert(&f, at(11)).unwrap());

        let rec = store.get("f-1").unwrap().unwrap();
        assert_eq!(rec.forecast, f);
        assert_eq!(rec.attempts, 0);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_pending_due_filters_by_kickoff_and_state() {
        let store = ForecastStore::open_in_memory().unwrap();
        store.insert(&forecast("early", at(12)), at(0)).unwrap();
        store.insert(&forecast("late", at(20)), at(0)).unwrap();
        store.insert(&forecast("done", at(11)), at(0)).unwrap();
        store.settle("done", &result(Outcome::Hit), at(13)).unwrap();

        let due: Vec<String> = store
            .pending_due(at(15))
            .unwrap()
            .into_iter()
            .map(|r| r.forecast.id)
            .collect();
        assert_eq!(due, vec!["early".to_string()]);
    }

    #[test]
    fn test_lease_excludes_other_owners_until_expiry() {
        let store = ForecastStore::open_in_memory().unwrap();
        store.insert(&forecast("f-1", at(12)), at(0)).unwrap();

        assert!(store.claim("f-1", "run-a", at(13), 600).unwrap());
        assert!(!store.claim("f-1", "run-b", at(13), 600).unwrap());
        // Re-entrant for the holder
        assert!(store.claim("f-1", "run-a", at(13), 600).unwrap());
        // Expired leases can be taken over
        assert!(store.claim("f-1", "run-b", at(14), 600).unwrap());

        // Releasing someone else's lease is a no-op
        store.release("f-1", "run-a").unwrap();
        assert_eq!(store.get("f-1").unwrap().unwrap().lease_owner.as_deref(), Some("run-b"));
        store.release("f-1", "run-b").unwrap();
        assert!(store.get("f-1").unwrap().unwrap().lease_owner.is_none());
    }

    #[test]
    fn test_settlement_is_write_once() {
        let store = ForecastStore::open_in_memory().unwrap();
        store.insert(&forecast("f-1", at(12)), at(0)).unwrap();

        assert!(store.settle("f-1", &result(Outcome::Hit), at(15)).unwrap());
        assert!(!store.settle("f-1", &result(Outcome::Miss), at(16)).unwrap());
        assert!(!store.settle_manual("f-1", &result(Outcome::Miss), at(16)).unwrap());

        let rec = store.get("f-1").unwrap().unwrap();
        assert_eq!(rec.forecast.state, ForecastState::Hit);
        assert_eq!(rec.forecast.actual_score.as_deref(), Some("3-1"));
        assert_eq!(rec.forecast.value_bet_outcome, Some(Outcome::Miss));
        assert_eq!(rec.forecast.resolved_at, Some(at(15)));
        // Claims on settled forecasts fail
        assert!(!store.claim("f-1", "run-a", at(17), 600).unwrap());
    }

    #[test]
    fn test_review_state_only_left_through_manual_settlement() {
        let store = ForecastStore::open_in_memory().unwrap();
        store.insert(&forecast("f-1", at(12)), at(0)).unwrap();

        assert_eq!(store.record_attempt("f-1", at(13)).unwrap(), 1);
        assert_eq!(store.record_attempt("f-1", at(14)).unwrap(), 2);
        assert!(store.mark_needs_review("f-1", "no provider event").unwrap());
        assert!(!store.mark_needs_review("f-1", "again").unwrap());

        assert!(store.pending_due(at(20)).unwrap().is_empty());
        let parked = store.needs_review().unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].attempts, 2);
        assert_eq!(parked[0].review_reason.as_deref(), Some("no provider event"));

        assert!(!store.settle("f-1", &result(Outcome::Hit), at(21)).unwrap());
        assert!(store.settle_manual("f-1", &result(Outcome::Hit), at(21)).unwrap());

        let counts = store.counts_by_state().unwrap();
        assert_eq!(counts, vec![(ForecastState::Hit, 1)]);
    }
}
