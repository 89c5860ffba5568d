//! Database schema creation and migrations.

use rusqlite::{Connection, Result};

/// Create all database tables and indexes.
pub fn create_tables(conn: &Connection) -> Result<()> {
    // Forecasts: the recorded prediction, its settlement and resolution bookkeeping
    conn.execute(
        "CREATE TABLE IF NOT EXISTS forecasts (
            id TEXT PRIMARY KEY NOT NULL,
            match_label TEXT NOT NULL,
            sport_tag TEXT NOT NULL DEFAULT '',
            league TEXT NOT NULL DEFAULT '',
            kickoff INTEGER NOT NULL,
            forecast_text TEXT NOT NULL,
            selection TEXT,
            value_bet_side TEXT,
            value_bet_odds REAL,
            state TEXT NOT NULL DEFAULT 'PENDING',
            actual_result TEXT,
            actual_score TEXT,
            value_bet_outcome TEXT,
            value_bet_profit REAL,
            resolved_at INTEGER,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_at INTEGER,
            lease_owner TEXT,
            lease_expires_at INTEGER,
            review_reason TEXT,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_forecasts_state_kickoff ON forecasts(state, kickoff)",
        [],
    )?;

    Ok(())
}
