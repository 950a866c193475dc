//! Persisted timer state shared between processes.
//!
//! Between CLI invocations the engine lives in the `kv` table and each
//! invocation catches it up with the wall clock. A process that keeps the
//! engine in memory (the foreground `timer run`) must hold the driver lease
//! for as long as it ticks: a pid plus a heartbeat refreshed every second.
//! While a live lease exists nobody else may tick or modify the stored engine.

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use super::engine::TimerEngine;
use crate::error::{CoreError, Result};
use crate::storage::Database;

pub const ENGINE_KEY: &str = "timer_engine";
pub const DRIVER_KEY: &str = "timer_driver";

/// A lease whose heartbeat is older than this was abandoned by a crashed or
/// killed driver.
pub const LEASE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverLease {
    pub pid: u32,
    pub heartbeat_ms: u64,
}

impl DriverLease {
    pub fn is_live(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.heartbeat_ms) < LEASE_TIMEOUT_MS
    }
}

fn decode_lease(json: &str) -> Option<DriverLease> {
    match serde_json::from_str(json) {
        Ok(lease) => Some(lease),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable timer driver lease");
            None
        }
    }
}

/// The stored engine, `None` when nothing was saved yet or the saved state
/// cannot be read.
pub fn load_engine(db: &Database) -> Result<Option<TimerEngine>> {
    let Some(json) = db.kv_get(ENGINE_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str(&json) {
        Ok(engine) => Ok(Some(engine)),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable timer state");
            Ok(None)
        }
    }
}

pub fn save_engine(db: &Database, engine: &TimerEngine) -> Result<()> {
    db.kv_set(ENGINE_KEY, &serde_json::to_string(engine)?)
}

/// The lease of the process currently driving the timer, if it is alive.
pub fn active_driver(db: &Database, now_ms: u64) -> Result<Option<DriverLease>> {
    Ok(db
        .kv_get(DRIVER_KEY)?
        .and_then(|json| decode_lease(&json))
        .filter(|lease| lease.is_live(now_ms)))
}

/// Take or refresh the lease for `pid`.
///
/// # Errors
/// [`CoreError::TimerDriven`] when another process holds a live lease.
pub fn claim_driver(db: &Database, pid: u32, now_ms: u64) -> Result<()> {
    // IMMEDIATE takes the write lock up front so two claimers cannot both
    // see a free lease.
    let tx = Transaction::new_unchecked(db.conn(), TransactionBehavior::Immediate)?;
    let current = tx
        .query_row("SELECT value FROM kv WHERE key = ?1", params![DRIVER_KEY], |row| {
            row.get::<_, String>(0)
        })
        .optional()?
        .and_then(|json| decode_lease(&json));
    if let Some(lease) = current {
        if lease.pid != pid && lease.is_live(now_ms) {
            return Err(CoreError::TimerDriven { pid: lease.pid });
        }
    }
    let lease = DriverLease {
        pid,
        heartbeat_ms: now_ms,
    };
    tx.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![DRIVER_KEY, serde_json::to_string(&lease)?],
    )?;
    tx.commit()?;
    Ok(())
}

/// Drop the lease if `pid` still holds it.
pub fn release_driver(db: &Database, pid: u32) -> Result<()> {
    let held = db.kv_get(DRIVER_KEY)?.and_then(|json| decode_lease(&json));
    if held.is_some_and(|lease| lease.pid == pid) {
        db.kv_delete(DRIVER_KEY)?;
        tracing::debug!(pid, "timer driver lease released");
    }
    Ok(())
}
