//! SQL schema for the Quill SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Immutability is enforced here rather than trusted to callers: triggers
//! abort any UPDATE or DELETE against subjects, events and event details, any
//! change to a recording's identity, parent, bucket or creation time, and any
//! second write of a discard timestamp. Their messages start with
//! `immutable:` so the store can surface them as `Error::Immutable`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS buckets (
    bucket_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- Subjects are strictly append-only.
CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,   -- discriminant of SubjectValue variant
    value_json  TEXT NOT NULL,   -- JSON payload (inner data only)
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recordings (
    recording_id  TEXT PRIMARY KEY,
    parent_id     TEXT REFERENCES recordings(recording_id),
    bucket_id     TEXT NOT NULL REFERENCES buckets(bucket_id),
    subject_kind  TEXT NOT NULL,
    subject_id    TEXT NOT NULL REFERENCES subjects(subject_id),
    discarded_at  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS people (
    person_id     TEXT PRIMARY KEY,
    recording_id  TEXT NOT NULL UNIQUE REFERENCES recordings(recording_id)
);

CREATE TABLE IF NOT EXISTS memberships (
    person_id  TEXT NOT NULL REFERENCES people(person_id),
    bucket_id  TEXT NOT NULL REFERENCES buckets(bucket_id),
    role       TEXT NOT NULL DEFAULT 'viewer',
    PRIMARY KEY (person_id, bucket_id)
);

-- The audit timeline. `sequence` orders events written in the same instant.
CREATE TABLE IF NOT EXISTS events (
    sequence       INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id       TEXT NOT NULL UNIQUE,
    recording_id   TEXT NOT NULL REFERENCES recordings(recording_id),
    subject_kind   TEXT NOT NULL,
    subject_id     TEXT NOT NULL,
    previous_kind  TEXT,
    previous_id    TEXT,
    action         TEXT NOT NULL,
    person_id      TEXT,
    bucket_id      TEXT NOT NULL REFERENCES buckets(bucket_id),
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_details (
    event_id  TEXT NOT NULL REFERENCES events(event_id),
    key       TEXT NOT NULL,
    value     TEXT,
    UNIQUE (event_id, key)
);

CREATE TABLE IF NOT EXISTS counter_caches (
    recording_id  TEXT NOT NULL REFERENCES recordings(recording_id),
    name          TEXT NOT NULL,
    count         INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    UNIQUE (recording_id, name)
);

CREATE TABLE IF NOT EXISTS search_indices (
    search_index_id  TEXT PRIMARY KEY,
    recording_id     TEXT NOT NULL UNIQUE REFERENCES recordings(recording_id),
    subject_kind     TEXT NOT NULL,
    content          TEXT NOT NULL,
    -- content lowercased with full Unicode folding; lower() only folds ASCII
    folded           TEXT NOT NULL
);

-- A tag is a shared subject; this table makes its normalized name unique.
CREATE TABLE IF NOT EXISTS tags (
    tag_id  TEXT PRIMARY KEY REFERENCES subjects(subject_id),
    name    TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tag_states (
    tag_id     TEXT NOT NULL UNIQUE REFERENCES tags(tag_id),
    available  INTEGER NOT NULL DEFAULT 1
);

-- One shared subject per publication state.
CREATE TABLE IF NOT EXISTS publication_states (
    state       TEXT PRIMARY KEY CHECK (state IN ('published', 'notPublished')),
    subject_id  TEXT NOT NULL UNIQUE REFERENCES subjects(subject_id)
);

CREATE INDEX IF NOT EXISTS recordings_parent_idx  ON recordings(parent_id);
CREATE INDEX IF NOT EXISTS recordings_bucket_idx  ON recordings(bucket_id);
CREATE INDEX IF NOT EXISTS recordings_subject_idx ON recordings(subject_kind, subject_id);
CREATE INDEX IF NOT EXISTS events_recording_idx   ON events(recording_id, created_at);
CREATE INDEX IF NOT EXISTS search_kind_idx        ON search_indices(subject_kind);

CREATE TRIGGER IF NOT EXISTS subjects_no_update BEFORE UPDATE ON subjects
BEGIN
    SELECT RAISE(ABORT, 'immutable: subjects cannot be updated');
END;

CREATE TRIGGER IF NOT EXISTS subjects_no_delete BEFORE DELETE ON subjects
BEGIN
    SELECT RAISE(ABORT, 'immutable: subjects cannot be deleted');
END;

CREATE TRIGGER IF NOT EXISTS events_no_update BEFORE UPDATE ON events
BEGIN
    SELECT RAISE(ABORT, 'immutable: events cannot be updated');
END;

CREATE TRIGGER IF NOT EXISTS events_no_delete BEFORE DELETE ON events
BEGIN
    SELECT RAISE(ABORT, 'immutable: events cannot be deleted');
END;

CREATE TRIGGER IF NOT EXISTS event_details_no_update BEFORE UPDATE ON event_details
BEGIN
    SELECT RAISE(ABORT, 'immutable: event details cannot be updated');
END;

CREATE TRIGGER IF NOT EXISTS event_details_no_delete BEFORE DELETE ON event_details
BEGIN
    SELECT RAISE(ABORT, 'immutable: event details cannot be deleted');
END;

CREATE TRIGGER IF NOT EXISTS recordings_fixed_columns
BEFORE UPDATE OF recording_id, parent_id, bucket_id, created_at ON recordings
BEGIN
    SELECT RAISE(ABORT, 'immutable: recording identity, parent and bucket are fixed');
END;

CREATE TRIGGER IF NOT EXISTS recordings_discard_once
BEFORE UPDATE OF discarded_at ON recordings
WHEN OLD.discarded_at IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'immutable: discarded_at is written once');
END;

PRAGMA user_version = 1;
";
