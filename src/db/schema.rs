pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- flows table
CREATE TABLE IF NOT EXISTS flows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    archived INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_flows_archived_created ON flows(archived, created_at DESC);

-- matches table
CREATE TABLE IF NOT EXISTS matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    line TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    line_no INTEGER,
    grep_meta TEXT,
    archived INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- natural key, live rows only: an archived hit may be saved again
CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_live_key ON matches(line, file_path) WHERE archived = 0;

-- flow_matches table (one row per occurrence)
CREATE TABLE IF NOT EXISTS flow_matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow_id INTEGER NOT NULL REFERENCES flows(id),
    match_id INTEGER NOT NULL REFERENCES matches(id),
    order_index INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_flow_matches_flow ON flow_matches(flow_id, archived, order_index);
CREATE INDEX IF NOT EXISTS idx_flow_matches_match ON flow_matches(match_id);

-- match_notes table (scoped to an occurrence)
CREATE TABLE IF NOT EXISTS match_notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow_match_id INTEGER NOT NULL REFERENCES flow_matches(id),
    name TEXT,
    note TEXT NOT NULL DEFAULT '',
    archived INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_match_notes_flow_match ON match_notes(flow_match_id, archived);

-- flow_history table (append-only activation log)
CREATE TABLE IF NOT EXISTS flow_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow_id INTEGER NOT NULL REFERENCES flows(id),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_flow_history_created ON flow_history(created_at DESC, id DESC);
"#;
