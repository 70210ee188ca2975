/// Idempotent DDL run every time a connection is opened.
pub(crate) const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS subscriptions (
    id                TEXT PRIMARY KEY,   -- UUIDv7
    locations         TEXT NOT NULL,      -- comma-joined location keys
    subscription_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS summaries (
    location     TEXT PRIMARY KEY,
    summary      TEXT NOT NULL,
    generated_at TEXT NOT NULL            -- RFC 3339 UTC
);
";
