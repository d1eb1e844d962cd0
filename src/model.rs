// Shared records: fetched emails and the structured output derived from them
use serde::{Deserialize, Serialize};

/// One fetched email, the unit a prompt is built from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailItem {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Lowercases, trims and turns `_`/spaces into `-` so "Follow_Up" matches "follow-up"
fn normalize_label(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Response,
    FollowUp,
    TeamWorkflow,
    Action,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::Action
    }
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::Response,
        TaskType::FollowUp,
        TaskType::TeamWorkflow,
        TaskType::Action,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Response => "response",
            TaskType::FollowUp => "follow-up",
            TaskType::TeamWorkflow => "team-workflow",
            TaskType::Action => "action",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_label(value);
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_label(value);
        Self::ALL.into_iter().find(|p| p.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Work,
    Personal,
    Finance,
    Shopping,
    Travel,
    Health,
    Education,
    Other,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Other
    }
}

impl Theme {
    pub const ALL: [Theme; 8] = [
        Theme::Work,
        Theme::Personal,
        Theme::Finance,
        Theme::Shopping,
        Theme::Travel,
        Theme::Health,
        Theme::Education,
        Theme::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Work => "work",
            Theme::Personal => "personal",
            Theme::Finance => "finance",
            Theme::Shopping => "shopping",
            Theme::Travel => "travel",
            Theme::Health => "health",
            Theme::Education => "education",
            Theme::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_label(value);
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// A task suggested by the model for one source email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub priority: Priority,
    pub assigned_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub source_item_id: String,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub source_item_id: String,
    pub theme: Theme,
    pub category: String,
}

impl Categorization {
    /// Full-default record for an email the model said nothing usable about
    pub fn fallback(source_item_id: &str) -> Self {
        Self {
            source_item_id: source_item_id.to_string(),
            theme: Theme::Other,
            category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// Output schema requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    Tasks,
    Categorization,
}

impl std::str::FromStr for Schema {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tasks" | "task" => Ok(Schema::Tasks),
            "categorization" | "categories" | "categorize" => Ok(Schema::Categorization),
            other => Err(crate::error::AppError::InvalidInput(format!(
                "unknown schema '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StructuredRecord {
    Task(Task),
    Categorization(Categorization),
}

impl StructuredRecord {
    pub fn source_item_id(&self) -> &str {
        match self {
            StructuredRecord::Task(t) => &t.source_item_id,
            StructuredRecord::Categorization(c) => &c.source_item_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing_is_lenient_on_case_and_separators() {
        assert_eq!(TaskType::parse("Follow_Up"), Some(TaskType::FollowUp));
        assert_eq!(TaskType::parse("team workflow"), Some(TaskType::TeamWorkflow));
        assert_eq!(TaskType::parse("chore"), None);
        assert_eq!(Priority::parse(" URGENT "), Some(Priority::Urgent));
        assert_eq!(Theme::parse("Finance"), Some(Theme::Finance));
        assert_eq!(Theme::parse("business"), None);
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task {
            title: "Reply".to_string(),
            description: String::new(),
            task_type: TaskType::FollowUp,
            priority: Priority::High,
            assigned_to: "self".to_string(),
            due_date: None,
            source_item_id: "e1".to_string(),
            status: TaskStatus::Pending,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "follow-up");
        assert_eq!(json["assignedTo"], "self");
        assert_eq!(json["sourceItemId"], "e1");
        assert_eq!(json["status"], "pending");
        assert!(json.get("dueDate").is_none());
    }

    #[test]
    fn test_schema_from_str() {
        assert_eq!("tasks".parse::<Schema>().unwrap(), Schema::Tasks);
        assert_eq!("Categorization".parse::<Schema>().unwrap(), Schema::Categorization);
        assert!("summary".parse::<Schema>().is_err());
    }
}
