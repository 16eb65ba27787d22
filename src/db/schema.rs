//! SQL DDL for the portfolio database.
//! SQLite-first; every statement is `IF NOT EXISTS` so replaying it is harmless.

/// Column default producing a random v4-format identifier, so rows inserted
/// without an `id` still get a unique text key from the engine.
pub const ID_DEFAULT: &str = "lower(hex(randomblob(4))) || '-' || lower(hex(randomblob(2))) \
     || '-4' || substr(lower(hex(randomblob(2))), 2) || '-' \
     || substr('89ab', 1 + (abs(random()) % 4), 1) || substr(lower(hex(randomblob(2))), 2) \
     || '-' || lower(hex(randomblob(6)))";

const NOW_DEFAULT: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub const USERS: &str = "users";
pub const DOMAINS: &str = "domains";
pub const FILES: &str = "files";
pub const NOTES: &str = "notes";
pub const SEO_ANALYSIS: &str = "seo_analysis";

/// Bookkeeping table written once per initialization pass.
pub const INIT_MARKER: &str = "_dbinit";

/// Tables that must exist before the database counts as installed.
pub const EXPECTED_TABLES: [&str; 5] = [USERS, DOMAINS, FILES, NOTES, SEO_ANALYSIS];

pub struct TableDef {
    pub name: &'static str,
    /// Everything after the `id` column, already in DDL form.
    pub columns: &'static str,
}

/// `{now}` is substituted with [`NOW_DEFAULT`] when rendering.
pub const TABLES: [TableDef; 5] = [
    TableDef {
        name: USERS,
        columns: r#""name" TEXT NOT NULL,
    "email" TEXT NOT NULL UNIQUE,
    "role" TEXT NOT NULL DEFAULT 'user',
    "status" TEXT NOT NULL DEFAULT 'active',
    "createdAt" TEXT NOT NULL DEFAULT ({now})"#,
    },
    TableDef {
        name: DOMAINS,
        columns: r#""name" TEXT NOT NULL,
    "url" TEXT NULL,
    "status" TEXT NULL,
    "createdAt" TEXT NOT NULL DEFAULT ({now}),
    "updatedAt" TEXT NOT NULL DEFAULT ({now})"#,
    },
    TableDef {
        name: FILES,
        columns: r#""name" TEXT NOT NULL,
    "path" TEXT NULL,
    "size" INTEGER NULL,
    "type" TEXT NULL,
    "createdAt" TEXT NOT NULL DEFAULT ({now})"#,
    },
    TableDef {
        name: NOTES,
        columns: r#""content" TEXT NOT NULL,
    "createdAt" TEXT NOT NULL DEFAULT ({now}),
    "updatedAt" TEXT NOT NULL DEFAULT ({now})"#,
    },
    TableDef {
        name: SEO_ANALYSIS,
        columns: r#""domainId" TEXT NOT NULL,
    "title" TEXT NULL,
    "description" TEXT NULL,
    "score" INTEGER NULL,
    "createdAt" TEXT NOT NULL DEFAULT ({now}),
    FOREIGN KEY ("domainId") REFERENCES "domains"("id")"#,
    },
];

pub const SQLITE_INIT_MARKER: &str = r#"
CREATE TABLE IF NOT EXISTS "_dbinit" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "initialized" INTEGER NOT NULL DEFAULT 1,
    "timestamp" TEXT NOT NULL
)"#;

impl TableDef {
    pub fn create_statement(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    \"id\" TEXT PRIMARY KEY NOT NULL DEFAULT ({}),\n    {}\n)",
            self.name,
            ID_DEFAULT,
            self.columns.replace("{now}", NOW_DEFAULT)
        )
    }
}

/// DDL for every application table, in creation order.
pub fn create_statements() -> Vec<String> {
    TABLES.iter().map(TableDef::create_statement).collect()
}
