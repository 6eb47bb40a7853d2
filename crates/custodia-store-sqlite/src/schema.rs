//! SQL schema for the Custodia SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    record_id   TEXT PRIMARY KEY,
    subject_id  TEXT NOT NULL REFERENCES subjects(subject_id),
    category    TEXT NOT NULL,   -- DataCategory, snake_case
    recorded_at TEXT NOT NULL,   -- ISO 8601 UTC
    fields_json TEXT NOT NULL,   -- JSON object
    anonymized  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS records_subject_category_idx
    ON records(subject_id, category);

-- No foreign key to subjects: audit events outlive the subject's data.
CREATE TABLE IF NOT EXISTS audit_events (
    sequence     INTEGER PRIMARY KEY,
    event_id     TEXT NOT NULL UNIQUE,
    subject_id   TEXT NOT NULL,
    action       TEXT NOT NULL,   -- SCREAMING_SNAKE_CASE
    actor        TEXT NOT NULL,
    timestamp    TEXT NOT NULL,
    details_json TEXT NOT NULL,
    prev_hash    TEXT NOT NULL,
    hash         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS audit_events_subject_idx ON audit_events(subject_id);

CREATE TRIGGER IF NOT EXISTS audit_events_no_update
BEFORE UPDATE ON audit_events
BEGIN
    SELECT RAISE(ABORT, 'audit_events is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_events_no_delete
BEFORE DELETE ON audit_events
BEGIN
    SELECT RAISE(ABORT, 'audit_events is append-only');
END;

PRAGMA user_version = 1;
";
