//! Database schema and migrations for schoolgate.
//!
//! Migrations are applied in order when the database is opened. The
//! schema_version table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Schools
    r#"
CREATE TABLE schools (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: Principals, one per school
    r#"
CREATE TABLE principals (
    id                      TEXT PRIMARY KEY,
    school_id               TEXT NOT NULL UNIQUE REFERENCES schools(id) ON DELETE CASCADE,
    username                TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name                    TEXT NOT NULL,
    email                   TEXT,
    password_hash           TEXT NOT NULL,           -- Argon2id PHC string
    failed_login_attempts   INTEGER NOT NULL DEFAULT 0,
    is_blocked              INTEGER NOT NULL DEFAULT 0,
    otp                     TEXT,
    otp_expires_at          INTEGER,                 -- epoch milliseconds
    otp_attempts            INTEGER NOT NULL DEFAULT 0,
    last_login_at           TEXT,
    created_at              TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v3: Staff
    r#"
CREATE TABLE staff (
    id                      TEXT PRIMARY KEY,
    school_id               TEXT NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    username                TEXT NOT NULL UNIQUE,
    name                    TEXT NOT NULL,
    email                   TEXT,
    password_hash           TEXT NOT NULL,
    failed_login_attempts   INTEGER NOT NULL DEFAULT 0,
    is_blocked              INTEGER NOT NULL DEFAULT 0,
    otp                     TEXT,
    otp_expires_at          INTEGER,
    otp_attempts            INTEGER NOT NULL DEFAULT 0,
    last_login_at           TEXT,
    created_at              TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_staff_school_id ON staff(school_id);
"#,
    // v4: Students
    r#"
CREATE TABLE students (
    id                      TEXT PRIMARY KEY,
    school_id               TEXT NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    username                TEXT NOT NULL UNIQUE,
    name                    TEXT NOT NULL,
    email                   TEXT,
    password_hash           TEXT NOT NULL,
    failed_login_attempts   INTEGER NOT NULL DEFAULT 0,
    is_blocked              INTEGER NOT NULL DEFAULT 0,
    otp                     TEXT,
    otp_expires_at          INTEGER,
    otp_attempts            INTEGER NOT NULL DEFAULT 0,
    last_login_at           TEXT,
    created_at              TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_students_school_id ON students(school_id);
"#,
];
