use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const DEFAULT_CATEGORY: &str = "work";

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex"));

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(anyhow!(
                "Unknown priority '{}': expected high|medium|low",
                other
            )),
        }
    }
}

impl ValueEnum for Priority {
    fn value_variants<'a>() -> &'a [Self] {
        &[Priority::High, Priority::Medium, Priority::Low]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// A category that ships with the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub key: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

impl Category {
    pub const BUILT_IN: &'static [Category] = &[
        Category {
            key: "work",
            label: "Work",
            color: "#6C63FF",
        },
        Category {
            key: "personal",
            label: "Personal",
            color: "#FF6584",
        },
        Category {
            key: "study",
            label: "Study",
            color: "#43D9AD",
        },
        Category {
            key: "health",
            label: "Health",
            color: "#FFB547",
        },
    ];

    pub fn built_in(key: &str) -> Option<&'static Category> {
        Self::BUILT_IN.iter().find(|category| category.key == key)
    }
}

/// User-defined grouping that lives for the current session only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCategory {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Name and color for a category that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyCategoryName);
        }
        if !HEX_COLOR.is_match(self.color.trim()) {
            return Err(ValidationError::InvalidColor(self.color.clone()));
        }
        Ok(())
    }
}

/// Display label for a category id, resolving custom ids against the session list.
pub fn category_label(id: &str, custom: &[CustomCategory]) -> String {
    if let Some(category) = Category::built_in(id) {
        return category.label.to_string();
    }
    custom
        .iter()
        .find(|category| category.id == id)
        .map(|category| category.name.clone())
        .unwrap_or_else(|| id.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "clock_time"
    )]
    pub due_time: Option<NaiveTime>,
    pub recurring: bool,
    pub reminder: bool,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Pre-filled creation form value, e.g. from clicking a calendar day.
    pub fn stub_for_date(date: NaiveDate) -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: None,
            priority: Priority::default(),
            category: DEFAULT_CATEGORY.to_string(),
            due_date: Some(date),
            due_time: None,
            recurring: false,
            reminder: false,
            completed: false,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text(&self.title, self.description.as_deref())
    }
}

/// Payload for ADD: every task field except the backend-owned id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: String,
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "clock_time")]
    pub due_time: Option<NaiveTime>,
    pub recurring: bool,
    pub reminder: bool,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::default(),
            category: DEFAULT_CATEGORY.to_string(),
            due_date: None,
            due_time: None,
            recurring: false,
            reminder: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text(&self.title, self.description.as_deref())
    }
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            category: task.category.clone(),
            due_date: task.due_date,
            due_time: task.due_time,
            recurring: task.recurring,
            reminder: task.reminder,
        }
    }
}

fn validate_text(title: &str, description: Option<&str>) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong {
            len,
            max: MAX_TITLE_LEN,
        });
    }
    if let Some(description) = description {
        let len = description.chars().count();
        if len > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::DescriptionTooLong {
                len,
                max: MAX_DESCRIPTION_LEN,
            });
        }
    }
    Ok(())
}

/// Task record as the backend stores it. Carries none of the UI-only fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTask {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BackendTask {
    /// Creation time with a deterministic fallback for records that lack one.
    pub fn created_or_fallback(&self) -> DateTime<Utc> {
        self.created_at
            .or(self.updated_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| {
        parse_timestamp(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{value}'")))
    })
    .transpose()
}

/// Accepts RFC 3339 as well as the offset-less ISO-8601 the backend emits (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Named filters offered as chips above the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskFilter {
    #[default]
    All,
    Today,
    High,
    Medium,
    Low,
    Completed,
}

impl TaskFilter {
    pub const ALL: &'static [TaskFilter] = &[
        TaskFilter::All,
        TaskFilter::Today,
        TaskFilter::High,
        TaskFilter::Medium,
        TaskFilter::Low,
        TaskFilter::Completed,
    ];

    /// Parse a filter token; anything outside the vocabulary passes everything through.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "today" => TaskFilter::Today,
            "high" => TaskFilter::High,
            "medium" => TaskFilter::Medium,
            "low" => TaskFilter::Low,
            "completed" => TaskFilter::Completed,
            _ => TaskFilter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "All",
            TaskFilter::Today => "Today",
            TaskFilter::High => "High",
            TaskFilter::Medium => "Medium",
            TaskFilter::Low => "Low",
            TaskFilter::Completed => "Completed",
        }
    }

    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Today => task.due_date == Some(today),
            TaskFilter::High => task.priority == Priority::High,
            TaskFilter::Medium => task.priority == Priority::Medium,
            TaskFilter::Low => task.priority == Priority::Low,
            TaskFilter::Completed => task.completed,
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the task form is being opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalMode {
    Create,
    CreatePrefilled,
    Edit,
}

impl ModalMode {
    pub fn for_task(task: Option<&Task>) -> Self {
        match task {
            None => ModalMode::Create,
            Some(task) if task.is_persisted() => ModalMode::Edit,
            Some(_) => ModalMode::CreatePrefilled,
        }
    }
}

/// Field-level changes for EDIT. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub due_time: Option<Option<NaiveTime>>,
    pub recurring: Option<bool>,
    pub reminder: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    pub fn apply(&self, task: &Task) -> Task {
        let mut updated = task.clone();
        if let Some(title) = &self.title {
            updated.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            updated.description = description
                .as_ref()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());
        }
        if let Some(priority) = self.priority {
            updated.priority = priority;
        }
        if let Some(category) = &self.category {
            updated.category = category.clone();
        }
        if let Some(due_date) = self.due_date {
            updated.due_date = due_date;
        }
        if let Some(due_time) = self.due_time {
            updated.due_time = due_time;
        }
        if let Some(recurring) = self.recurring {
            updated.recurring = recurring;
        }
        if let Some(reminder) = self.reminder {
            updated.reminder = reminder;
        }
        updated
    }
}

/// `HH:MM` wall-clock times; `HH:MM:SS` is accepted on read.
pub(crate) mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_str(&time.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.filter(|value| !value.trim().is_empty())
            .map(|value| {
                super::parse_clock_time(&value).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid time '{value}'"))
                })
            })
            .transpose()
    }
}

pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .ok()
}
