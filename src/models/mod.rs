use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

// Voter login -> timestamp of their current vote
pub type VoteState = HashMap<String, DateTime<Utc>>;

// --- Wire types (YouTrack REST responses) ---

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityItem {
    pub timestamp: i64,
    pub author: User,
    // For VotersCategory this is usually a bool, but other categories send
    // arrays of entities, so keep it loose and judge by truthiness.
    #[serde(default)]
    pub added: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkType {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedIssue {
    pub id_readable: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLink {
    pub link_type: LinkType,
    #[serde(default)]
    pub issues: Vec<LinkedIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueDetails {
    pub reporter: User,
    pub created: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomField {
    pub name: String,
    // Single-value fields carry an object, multi-value fields an array, empty fields null
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub id_readable: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub votes: u64,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

// --- Domain types ---

pub const UNSPECIFIED_SUBSYSTEM: &str = "Unspecified";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteEvent {
    pub voter: String,
    pub timestamp: DateTime<Utc>,
    pub added: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSummary {
    pub id: String,
    pub title: String,
    pub votes: u64,
    pub subsystem: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub id: String,
    pub title: String,
    pub votes: usize,
}

// Convert YouTrack epoch milliseconds into a whole-second UTC timestamp
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(millis.div_euclid(1000), 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl From<&ActivityItem> for VoteEvent {
    fn from(item: &ActivityItem) -> Self {
        VoteEvent {
            voter: item.author.login.clone(),
            timestamp: from_millis(item.timestamp),
            added: is_truthy(&item.added),
        }
    }
}

impl CustomField {
    // First non-empty value name, if any
    pub fn value_name(&self) -> Option<String> {
        match &self.value {
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            Value::Array(values) => values
                .iter()
                .find_map(|v| v.get("name").and_then(Value::as_str))
                .map(str::to_string),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

impl IssueRecord {
    pub fn into_summary(self, subsystem_field: &str) -> IssueSummary {
        let subsystem = self
            .custom_fields
            .iter()
            .find(|field| field.name == subsystem_field)
            .and_then(CustomField::value_name)
            .unwrap_or_else(|| UNSPECIFIED_SUBSYSTEM.to_string());

        IssueSummary {
            id: self.id_readable,
            title: self.summary.unwrap_or_default(),
            votes: self.votes,
            subsystem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_added_flag_follows_truthiness() {
        let added: ActivityItem = serde_json::from_value(json!({
            "timestamp": 1_609_459_200_123i64,
            "author": {"login": "alice"},
            "added": true,
            "removed": false
        }))
        .unwrap();
        let removed: ActivityItem = serde_json::from_value(json!({
            "timestamp": 1_609_459_200_000i64,
            "author": {"login": "bob"},
            "added": [],
            "removed": [{"login": "bob"}]
        }))
        .unwrap();

        let event = VoteEvent::from(&added);
        assert!(event.added);
        assert_eq!(event.voter, "alice");
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert!(!VoteEvent::from(&removed).added);
    }

    #[test]
    fn subsystem_falls_back_to_unspecified() {
        let record: IssueRecord = serde_json::from_value(json!({
            "idReadable": "ABC-1",
            "summary": "Crash on start",
            "votes": 4,
            "customFields": [
                {"name": "Priority", "value": {"name": "Major"}},
                {"name": "Subsystem", "value": null}
            ]
        }))
        .unwrap();
        assert_eq!(record.clone().into_summary("Subsystem").subsystem, UNSPECIFIED_SUBSYSTEM);
        assert_eq!(record.clone().into_summary("Component").subsystem, UNSPECIFIED_SUBSYSTEM);
        assert_eq!(record.into_summary("Priority").subsystem, "Major");
    }

    #[test]
    fn multi_value_field_uses_first_name() {
        let field: CustomField = serde_json::from_value(json!({
            "name": "Subsystem",
            "value": [{"name": "Editor"}, {"name": "Debugger"}]
        }))
        .unwrap();
        assert_eq!(field.value_name().as_deref(), Some("Editor"));
    }
}
