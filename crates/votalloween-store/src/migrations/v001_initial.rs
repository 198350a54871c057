//! v001 -- Initial schema creation.
//!
//! Creates the three contest tables: `config`, `costumes` and `votes`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Config (singleton row, id is always 1)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS config (
    id                INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
    phase             TEXT NOT NULL DEFAULT 'upload'
                      CHECK (phase IN ('upload', 'voting')),
    voting_start_time TEXT,                      -- RFC-3339, nullable
    voting_end_time   TEXT,                      -- RFC-3339, nullable
    updated_at        TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Costumes
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS costumes (
    id               TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    participant_name TEXT NOT NULL,
    costume_name     TEXT,
    image_url        TEXT NOT NULL,              -- /uploads/<file>
    device_id        TEXT NOT NULL,
    uploaded_at      TEXT NOT NULL               -- RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_costumes_uploaded ON costumes(uploaded_at DESC);
CREATE INDEX IF NOT EXISTS idx_costumes_device ON costumes(device_id, uploaded_at DESC);

-- ----------------------------------------------------------------
-- Votes
--
-- No foreign key on costume_id: votes outlive a deleted costume.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS votes (
    id         TEXT PRIMARY KEY NOT NULL,        -- UUID v4
    device_id  TEXT NOT NULL,
    costume_id TEXT NOT NULL,
    category   TEXT NOT NULL
               CHECK (category IN ('best', 'funniest', 'most_elaborate', 'best_group')),
    created_at TEXT NOT NULL,

    UNIQUE (device_id, category)
);

CREATE INDEX IF NOT EXISTS idx_votes_costume ON votes(costume_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
