//! Database schema and migrations for groupvault.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL,
    password        TEXT NOT NULL,           -- Argon2 hash
    display_name    TEXT NOT NULL,
    email           TEXT,
    role            TEXT NOT NULL DEFAULT 'regular',  -- 'admin', 'regular'
    storage_limit   INTEGER,                 -- bytes, NULL = inherit
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL DEFAULT (datetime('now')),
    last_login      TEXT
);

CREATE UNIQUE INDEX idx_users_username_nocase ON users(username COLLATE NOCASE);
CREATE INDEX idx_users_role ON users(role);
"#,
    // v2: groups and memberships
    r#"
CREATE TABLE groups (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    description     TEXT NOT NULL DEFAULT '',
    storage_limit   INTEGER,                 -- bytes, NULL = inherit
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX idx_groups_name_nocase ON groups(name COLLATE NOCASE);

CREATE TABLE group_members (
    group_id    INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (group_id, user_id)
);

CREATE INDEX idx_group_members_user_id ON group_members(user_id);
"#,
    // v3: file metadata
    r#"
CREATE TABLE files (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    group_id            INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    original_name       TEXT NOT NULL,
    stored_name         TEXT NOT NULL UNIQUE,
    mime_type           TEXT NOT NULL,
    size                INTEGER NOT NULL,
    description         TEXT,
    status              TEXT NOT NULL DEFAULT 'pending',  -- 'pending', 'approved', 'rejected'
    rejection_reason    TEXT,
    created_at          TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_files_user_id ON files(user_id);
CREATE INDEX idx_files_group_id ON files(group_id);
CREATE INDEX idx_files_created_at ON files(created_at);
"#,
    // v4: settings with defaults
    r#"
CREATE TABLE settings (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT INTO settings (key, value) VALUES
    ('banned_extensions', '["exe","bat","js","php","sh","py","rb","pl","cgi","asp","aspx","jsp","jar","dll"]'),
    ('default_storage_limit', '10485760'),
    ('max_file_size', '5242880');
"#,
    // v5: refresh tokens for the web API
    r#"
CREATE TABLE refresh_tokens (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token       TEXT NOT NULL UNIQUE,
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    revoked_at  TEXT
);

CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id);
"#,
];
