use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TaskError;

/// Server-assigned task identifier.
pub type TaskId = i64;

/// Completion state of a task.
///
/// The service speaks `0`/`1`; nothing outside the (de)serializers below
/// sees those integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Completion {
    #[default]
    Pending,
    Done,
}

impl Completion {
    pub fn toggled(self) -> Self {
        match self {
            Completion::Pending => Completion::Done,
            Completion::Done => Completion::Pending,
        }
    }

    pub fn is_done(self) -> bool {
        self == Completion::Done
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Completion::Pending => 0,
            Completion::Done => 1,
        }
    }

    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(Completion::Pending),
            1 => Some(Completion::Done),
            _ => None,
        }
    }
}

impl Serialize for Completion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Completion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Completion::from_wire(raw).ok_or_else(|| {
            serde::de::Error::custom(format!("completed must be 0 or 1, got {raw}"))
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub completed: Completion,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Decodes one item of a listing. Anything short of a full, valid task is
    /// rejected as a whole.
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        let task: Task = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if task.title.trim().is_empty() {
            return Err(format!("task {} has an empty title", task.id));
        }
        Ok(task)
    }

    /// Creation date as shown in the task table.
    pub fn created_on(&self) -> String {
        self.created_at.format("%d/%m/%Y").to_string()
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Payload of the creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        validate_title(&self.title)
    }

    /// Trimmed title, and `None` for a blank description.
    pub fn normalized(&self) -> (String, Option<String>) {
        let description = self.description.trim();
        (
            self.title.trim().to_string(),
            (!description.is_empty()).then(|| description.to_string()),
        )
    }
}

pub fn validate_title(title: &str) -> Result<(), TaskError> {
    if title.trim().is_empty() {
        return Err(TaskError::Validation("title is required".to_string()));
    }
    Ok(())
}

/// Newest first. Ties fall back to the higher id so the order is total.
pub fn sorted_by_recency(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    sorted
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form SQL backends emit,
/// the latter taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
