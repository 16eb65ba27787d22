use crate::config::Config;
use crate::db::document::{Collection, Db, Document};
use crate::db::models::{
    Domain, Note, Record, SeoAnalysis, User, default_users, sample_domains, sample_note,
    sample_seo_analysis, timestamp_now,
};
use crate::db::schema::{self, EXPECTED_TABLES, SQLITE_INIT_MARKER};
use crate::db::sqlite::{SchemaManager, SqlitePool};
use crate::db::status::{InitPhase, StatusRegistry, StatusUpdate};
use crate::error::StorageError;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Result of checking the opened database for the expected tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub present: Vec<String>,
    pub missing: Vec<String>,
    pub users_exist: bool,
}

impl VerificationReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Database handle owner plus the status that describes it.
pub struct Storage {
    manager: SchemaManager,
    status: StatusRegistry,
    location: String,
}

impl Storage {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let location = format!("sqlite:{}", db_path.display());
        Self {
            manager: SchemaManager::new(db_path),
            status: StatusRegistry::new(),
            location,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            location: cfg.storage_location(),
            ..Self::new(cfg.database_path())
        }
    }

    pub fn manager(&self) -> &SchemaManager {
        &self.manager
    }

    pub fn status(&self) -> &StatusRegistry {
        &self.status
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// One attempt at taking storage from unopened to schema-ready.
    ///
    /// On failure the status is still marked initialized, with the error
    /// message recorded, so pollers stop waiting; the error is returned too.
    /// Calling again always re-runs the whole sequence.
    pub async fn initialize(&self) -> Result<bool, StorageError> {
        info!(location = %self.location, "initializing storage");
        self.status.update(StatusUpdate::new().phase(InitPhase::Opening));

        match self.run_open_sequence().await {
            Ok(report) => {
                self.status.update(
                    StatusUpdate::new()
                        .initialized(true)
                        .installed(true)
                        .error(None)
                        .using_external_store(false)
                        .phase(InitPhase::SchemaReady),
                );
                info!(
                    tables = ?report.present,
                    users_exist = report.users_exist,
                    "storage initialized"
                );
                Ok(true)
            }
            Err(e) => {
                error!(location = %self.location, error = %e, "storage initialization failed");
                self.status.update(
                    StatusUpdate::new()
                        .initialized(true)
                        .error(Some(e.to_string()))
                        .phase(InitPhase::Failed),
                );
                Err(e)
            }
        }
    }

    async fn run_open_sequence(&self) -> Result<VerificationReport, StorageError> {
        let pool = self.manager.connect().await?;
        self.status.update(StatusUpdate::new().initialized(true));

        SchemaManager::create_tables(&pool)
            .await
            .map_err(|e| StorageError::open(self.manager.db_path(), e))?;
        write_init_marker(&pool).await?;

        let db = Db::new(pool.clone());
        seed_if_empty(&db.collection(User::TABLE), default_users()).await?;
        seed_sample_data(&db).await?;

        let report = verify(&pool).await?;
        if !report.is_complete() {
            self.status.update(StatusUpdate::new().installed(false));
            return Err(StorageError::SchemaIncomplete {
                missing: report.missing,
            });
        }
        Ok(report)
    }

    /// Document access, once the status reports initialized and a handle is open.
    pub fn db(&self) -> Option<Db> {
        if !self.status.is_initialized() {
            warn!("storage not initialized");
            return None;
        }
        self.manager.handle().map(Db::new)
    }

    pub async fn close(&self) {
        self.manager.close().await;
    }
}

async fn write_init_marker(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(SQLITE_INIT_MARKER).execute(pool).await?;
    sqlx::query(r#"INSERT INTO "_dbinit" ("initialized", "timestamp") VALUES (1, ?)"#)
        .bind(timestamp_now())
        .execute(pool)
        .await?;
    debug!(table = schema::INIT_MARKER, "initialization marker written");
    Ok(())
}

/// Insert `records` when the table has no rows yet.
async fn seed_if_empty<R: Record>(
    collection: &Collection,
    records: impl IntoIterator<Item = R>,
) -> Result<(), StorageError> {
    let existing = collection.count_documents().await?;
    if existing > 0 {
        debug!(
            table = collection.name(),
            count = existing,
            "table already populated; skipping seed"
        );
        return Ok(());
    }
    let mut inserted = 0usize;
    for record in records {
        collection.insert_one(&record.to_document()?).await?;
        inserted += 1;
    }
    info!(table = collection.name(), count = inserted, "seeded table");
    Ok(())
}

async fn seed_sample_data(db: &Db) -> Result<(), StorageError> {
    let domains = db.collection(Domain::TABLE);
    seed_if_empty(&domains, sample_domains()).await?;
    seed_if_empty(&db.collection(Note::TABLE), [sample_note()]).await?;

    let analyses = db.collection(SeoAnalysis::TABLE);
    if analyses.count_documents().await? > 0 {
        return Ok(());
    }
    let Some(domain_id) = sample_anchor_domain(&domains).await else {
        warn!("no domain to attach the sample seo analysis to; skipping");
        return Ok(());
    };
    seed_if_empty(&analyses, [sample_seo_analysis(domain_id)]).await
}

/// `example.com` when present, otherwise whichever domain comes first.
async fn sample_anchor_domain(domains: &Collection) -> Option<String> {
    let mut filter = Document::new();
    filter.insert("name".to_string(), Value::from("example.com"));
    let found = match domains.find_one(&filter).await {
        Some(doc) => Some(doc),
        None => domains.find().to_array().await.into_iter().next(),
    };
    found
        .and_then(|doc| doc.get("id").cloned())
        .and_then(|id| match id {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

pub async fn verify(pool: &SqlitePool) -> Result<VerificationReport, StorageError> {
    let present = SchemaManager::list_tables(pool).await?;
    let missing: Vec<String> = EXPECTED_TABLES
        .iter()
        .filter(|t| !present.iter().any(|p| p == *t))
        .map(|t| t.to_string())
        .collect();
    let users_exist = if missing.iter().any(|t| t == schema::USERS) {
        false
    } else {
        Db::new(pool.clone())
            .collection(schema::USERS)
            .count_documents()
            .await?
            > 0
    };
    Ok(VerificationReport {
        present,
        missing,
        users_exist,
    })
}
