//! Day-scoped token counters.

use rusqlite::{OptionalExtension, TransactionBehavior};

use super::{Database, DbResult};
use crate::clock::DateKey;

impl Database {
    /// Atomically increment and return the counter for `day` (first call returns 1).
    ///
    /// Runs as one IMMEDIATE transaction, so the write lock is held from the
    /// read of the old value to the commit of the new one. Concurrent
    /// connections on the same file each get a distinct value.
    pub fn allocate_sequence(&mut self, day: DateKey) -> DbResult<u32> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let value: u32 = tx.query_row(
            r#"
            INSERT INTO token_sequences (visit_date, last_value, updated_at)
            VALUES (?1, 1, datetime('now'))
            ON CONFLICT(visit_date) DO UPDATE SET
                last_value = last_value + 1,
                updated_at = datetime('now')
            RETURNING last_value
            "#,
            [day.to_string()],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(value)
    }

    /// Last value handed out for `day`, or 0 if none yet.
    pub fn current_sequence(&self, day: DateKey) -> DbResult<u32> {
        let value: Option<u32> = self
            .conn
            .query_row(
                "SELECT last_value FROM token_sequences WHERE visit_date = ?",
                [day.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0))
    }
}
