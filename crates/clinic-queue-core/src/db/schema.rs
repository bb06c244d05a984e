//! SQLite schema definition.

/// Complete database schema for the clinic queue.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Visits
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    token_number TEXT NOT NULL,                  -- T001, T002, ... per visit_date
    visit_date TEXT NOT NULL,                    -- YYYY-MM-DD (UTC day)
    name TEXT NOT NULL,
    age INTEGER NOT NULL CHECK (age >= 0),
    gender TEXT NOT NULL CHECK (gender IN ('Male', 'Female', 'Other')),
    phone TEXT NOT NULL,
    address TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'in-consultation', 'completed', 'billed')),
    assigned_doctor TEXT,
    symptoms TEXT,
    prescription TEXT,
    bill_amount REAL CHECK (bill_amount IS NULL OR bill_amount >= 0),
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Not unique: offline fallback numbering may repeat a token
CREATE INDEX IF NOT EXISTS idx_visits_day_token ON visits(visit_date, token_number);
CREATE INDEX IF NOT EXISTS idx_visits_created ON visits(created_at);
CREATE INDEX IF NOT EXISTS idx_visits_status ON visits(status);

-- Identity fields are write-once
CREATE TRIGGER IF NOT EXISTS visits_identity_immutable BEFORE UPDATE ON visits
WHEN new.token_number IS NOT old.token_number
  OR new.visit_date IS NOT old.visit_date
  OR new.created_at IS NOT old.created_at
BEGIN
    SELECT RAISE(ABORT, 'Visit token, date and creation time are immutable');
END;

-- Every status write must advance the workflow; rewriting the same status
-- is a stale client replaying a transition
CREATE TRIGGER IF NOT EXISTS visits_status_advances BEFORE UPDATE OF status ON visits
WHEN (CASE new.status
        WHEN 'waiting' THEN 0 WHEN 'in-consultation' THEN 1
        WHEN 'completed' THEN 2 WHEN 'billed' THEN 3 END)
  <= (CASE old.status
        WHEN 'waiting' THEN 0 WHEN 'in-consultation' THEN 1
        WHEN 'completed' THEN 2 WHEN 'billed' THEN 3 END)
BEGIN
    SELECT RAISE(ABORT, 'Visit status must advance');
END;

-- Prescription and bill are each written once
CREATE TRIGGER IF NOT EXISTS visits_prescription_write_once BEFORE UPDATE OF prescription ON visits
WHEN old.prescription IS NOT NULL AND old.prescription <> ''
  AND new.prescription IS NOT old.prescription
BEGIN
    SELECT RAISE(ABORT, 'Saved prescription cannot be changed');
END;

CREATE TRIGGER IF NOT EXISTS visits_bill_write_once BEFORE UPDATE OF bill_amount ON visits
WHEN old.bill_amount IS NOT NULL
  AND new.bill_amount IS NOT old.bill_amount
BEGIN
    SELECT RAISE(ABORT, 'Bill amount cannot be changed');
END;

-- ============================================================================
-- Token Sequences (one counter per visit_date, incremented atomically)
-- ============================================================================

CREATE TABLE IF NOT EXISTS token_sequences (
    visit_date TEXT PRIMARY KEY,
    last_value INTEGER NOT NULL CHECK (last_value > 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
