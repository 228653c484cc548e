//! SQL schema for the Patron SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sponsors (
    sponsor_id  TEXT PRIMARY KEY,
    full_name   TEXT NOT NULL,
    email       TEXT NOT NULL UNIQUE,  -- normalised; natural key for requests
    phone       TEXT,
    role        TEXT NOT NULL DEFAULT 'sponsor',  -- 'sponsor' | 'assistant' | 'admin'
    created_at  TEXT NOT NULL
);

-- Sponsorship columns mirror the ledger and are written only inside the
-- ledger transaction that changes it.
CREATE TABLE IF NOT EXISTS children (
    child_id      TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    is_sponsored  INTEGER NOT NULL DEFAULT 0,
    sponsor_id    TEXT REFERENCES sponsors(sponsor_id),
    sponsor_name  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    CHECK (is_sponsored = (sponsor_id IS NOT NULL))
);

-- The ledger. Rows are never deleted.
CREATE TABLE IF NOT EXISTS sponsorships (
    sponsorship_id      TEXT PRIMARY KEY,
    child_id            TEXT NOT NULL REFERENCES children(child_id),
    sponsor_id          TEXT NOT NULL REFERENCES sponsors(sponsor_id),
    status              TEXT NOT NULL,  -- 'active' | 'pending' | 'ended'
    kind                TEXT NOT NULL DEFAULT 'long_term',
    start_date          TEXT NOT NULL,  -- YYYY-MM-DD
    end_date            TEXT,           -- YYYY-MM-DD; set iff status = 'ended'
    termination_reason  TEXT,
    ended_by            TEXT REFERENCES sponsors(sponsor_id),
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    CHECK ((status = 'ended') = (end_date IS NOT NULL))
);

-- At most one active row per child.
CREATE UNIQUE INDEX IF NOT EXISTS sponsorships_one_active_idx
    ON sponsorships(child_id) WHERE status = 'active';
CREATE INDEX IF NOT EXISTS sponsorships_child_idx   ON sponsorships(child_id);
CREATE INDEX IF NOT EXISTS sponsorships_sponsor_idx ON sponsorships(sponsor_id);

CREATE TABLE IF NOT EXISTS sponsorship_requests (
    request_id        TEXT PRIMARY KEY,
    full_name         TEXT NOT NULL,
    email             TEXT NOT NULL,
    phone             TEXT,
    city              TEXT,
    facebook_url      TEXT,
    motivation        TEXT,
    child_id          TEXT REFERENCES children(child_id),
    sponsorship_type  TEXT NOT NULL,  -- 'long_term' | 'one_time'
    terms_accepted    INTEGER NOT NULL CHECK (terms_accepted = 1),
    status            TEXT NOT NULL DEFAULT 'pending',
    reviewed_by       TEXT REFERENCES sponsors(sponsor_id),
    reviewed_at       TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignment_requests (
    request_id       TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    requester_email  TEXT NOT NULL,
    child_id         TEXT NOT NULL REFERENCES children(child_id),
    status           TEXT NOT NULL DEFAULT 'pending',
    reviewed_by      TEXT REFERENCES sponsors(sponsor_id),
    reviewed_at      TEXT,
    created_at       TEXT NOT NULL
);

-- Append-only field diffs of the child sponsorship columns.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id      TEXT PRIMARY KEY,
    child_id      TEXT NOT NULL REFERENCES children(child_id),
    field         TEXT NOT NULL,
    old_value     TEXT,
    new_value     TEXT,
    performed_by  TEXT NOT NULL,
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id  TEXT PRIMARY KEY,
    recipient_id     TEXT NOT NULL REFERENCES sponsors(sponsor_id),
    kind             TEXT NOT NULL,
    title            TEXT NOT NULL,
    content          TEXT NOT NULL,
    metadata         TEXT NOT NULL DEFAULT '{}',
    is_read          INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    message_id    TEXT PRIMARY KEY,
    sender_id     TEXT REFERENCES sponsors(sponsor_id),
    recipient_id  TEXT NOT NULL REFERENCES sponsors(sponsor_id),
    subject       TEXT NOT NULL,
    body          TEXT NOT NULL,
    is_read       INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

-- Deliveries written by lifecycle transactions, drained after commit.
CREATE TABLE IF NOT EXISTS outbox (
    outbox_id        TEXT PRIMARY KEY,
    event            TEXT NOT NULL,
    delivery         TEXT NOT NULL,  -- JSON-encoded Delivery
    status           TEXT NOT NULL DEFAULT 'pending',  -- 'pending' | 'delivered' | 'dead'
    attempts         INTEGER NOT NULL DEFAULT 0,
    next_attempt_at  TEXT NOT NULL,
    last_error       TEXT,
    created_at       TEXT NOT NULL,
    delivered_at     TEXT
);

CREATE INDEX IF NOT EXISTS audit_child_idx          ON audit_log(child_id);
CREATE INDEX IF NOT EXISTS notifications_recipient  ON notifications(recipient_id);
CREATE INDEX IF NOT EXISTS messages_recipient       ON messages(recipient_id);
CREATE INDEX IF NOT EXISTS outbox_due_idx           ON outbox(status, next_attempt_at);

PRAGMA user_version = 1;
";
