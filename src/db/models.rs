use crate::db::document::Document;
use crate::db::schema;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed row of one of the portfolio tables.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: &'static str;

    fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "record did not serialize to an object: {other}"
            ))),
        }
    }

    fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(doc))
    }
}

/// New random identifier for caller-generated ids.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time in the format the tables store.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: String,
}

impl Record for User {
    const TABLE: &'static str = schema::USERS;
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            email: email.into(),
            role: role.into(),
            status: "active".to_string(),
            created_at: timestamp_now(),
        }
    }
}

/// The two accounts a fresh database starts with.
pub fn default_users() -> [User; 2] {
    [
        User::new("Admin User", "admin@example.com", "admin"),
        User::new("Regular User", "user@example.com", "user"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Domain {
    const TABLE: &'static str = schema::DOMAINS;
}

impl Domain {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        let name = name.into();
        let now = timestamp_now();
        Self {
            id: new_id(),
            url: Some(format!("https://{name}")),
            name,
            status: Some(status.into()),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Baseline portfolio entries for a fresh database. The first one anchors
/// the sample SEO analysis.
pub fn sample_domains() -> [Domain; 3] {
    [
        Domain::new("example.com", "active"),
        Domain::new("store-example.com", "expired"),
        Domain::new("blog-example.com", "expiring-soon"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub path: Option<String>,
    pub size: Option<i64>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
    pub created_at: String,
}

impl Record for FileRecord {
    const TABLE: &'static str = schema::FILES;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Note {
    const TABLE: &'static str = schema::NOTES;
}

pub fn sample_note() -> Note {
    let now = timestamp_now();
    Note {
        id: new_id(),
        content: "This is a sample note for testing".to_string(),
        created_at: now.clone(),
        updated_at: now,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoAnalysis {
    pub id: String,
    pub domain_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub score: Option<i64>,
    pub created_at: String,
}

impl Record for SeoAnalysis {
    const TABLE: &'static str = schema::SEO_ANALYSIS;
}

pub fn sample_seo_analysis(domain_id: impl Into<String>) -> SeoAnalysis {
    SeoAnalysis {
        id: new_id(),
        domain_id: domain_id.into(),
        title: Some("https://example.com".to_string()),
        description: Some("Add meta description; optimize images".to_string()),
        score: Some(85),
        created_at: timestamp_now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_use_column_names() {
        let file = FileRecord {
            id: "f1".into(),
            name: "logo.png".into(),
            path: Some("/uploads/logo.png".into()),
            size: Some(2048),
            mime_type: Some("image/png".into()),
            created_at: "2023-01-01T00:00:00Z".into(),
        };
        let doc = file.to_document().unwrap();
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "name", "path", "size", "type", "createdAt"]);
        assert_eq!(FileRecord::from_document(doc).unwrap(), file);
    }

    #[test]
    fn default_users_have_distinct_ids_and_emails() {
        let [admin, user] = default_users();
        assert_ne!(admin.id, user.id);
        assert_ne!(admin.email, user.email);
        assert_eq!(admin.role, "admin");
        assert_eq!(uuid::Uuid::parse_str(&admin.id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn sample_domains_cover_each_status() {
        let domains = sample_domains();
        let statuses: Vec<_> = domains.iter().filter_map(|d| d.status.as_deref()).collect();
        assert_eq!(statuses, ["active", "expired", "expiring-soon"]);
        assert_eq!(domains[0].name, "example.com");
        assert_eq!(domains[0].url.as_deref(), Some("https://example.com"));
        assert_eq!(sample_seo_analysis(&domains[0].id).domain_id, domains[0].id);
    }
}
