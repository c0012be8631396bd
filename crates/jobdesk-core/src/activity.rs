use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Update,
    Delete,
    BulkImport,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::BulkImport => "BULK_IMPORT",
        }
    }
}

/// One line of the audit trail kept next to the job collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: Action,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ActivityEntry {
    pub fn new(
        user: &str,
        action: Action,
        description: String,
        category: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now,
            user: user.to_string(),
            action,
            description,
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn serializes_actions_in_upper_snake_case() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 20, 8, 0, 0)
            .single()
            .expect("valid now");
        let entry = ActivityEntry::new(
            "rina@example.com",
            Action::BulkImport,
            "imported 2 job(s)".to_string(),
            None,
            now,
        );
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["action"], "BULK_IMPORT");
        assert!(value.get("category").is_none());
        assert_eq!(Action::BulkImport.as_str(), "BULK_IMPORT");
    }
}
