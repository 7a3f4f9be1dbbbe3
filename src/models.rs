use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 2;

/// Id of the group created on first run.
pub const SEED_GROUP_ID: &str = "1";
pub const SEED_GROUP_NAME: &str = "Home";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum IconName {
    #[default]
    Home,
    Briefcase,
    Book,
    Car,
    User,
    Utensils,
}

impl IconName {
    pub fn as_str(self) -> &'static str {
        match self {
            IconName::Home => "Home",
            IconName::Briefcase => "Briefcase",
            IconName::Book => "Book",
            IconName::Car => "Car",
            IconName::User => "User",
            IconName::Utensils => "Utensils",
        }
    }

    /// Unknown names render with the default icon.
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "Briefcase" => IconName::Briefcase,
            "Book" => IconName::Book,
            "Car" => IconName::Car,
            "User" => IconName::User,
            "Utensils" => IconName::Utensils,
            _ => IconName::Home,
        }
    }
}

impl From<String> for IconName {
    fn from(value: String) -> Self {
        IconName::parse(&value)
    }
}

impl From<IconName> for String {
    fn from(value: IconName) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, with = "due_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon_name: IconName,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Group {
    pub fn seed() -> Self {
        Self {
            id: SEED_GROUP_ID.to_string(),
            name: SEED_GROUP_NAME.to_string(),
            icon_name: IconName::Home,
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataFile {
    pub schema_version: u32,
    pub groups: Vec<Group>,
}

impl Default for DataFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            groups: Vec::new(),
        }
    }
}

impl DataFile {
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            groups,
        }
    }
}

/// Due dates are stored as `YYYY-MM-DD`. Older renderer builds wrote full RFC 3339
/// timestamps, which are read back as the local calendar date.
pub(crate) mod due_date {
    use chrono::{DateTime, Local, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(text) if text.trim().is_empty() => Ok(None),
            Some(text) => parse(text.trim())
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid due date: {text}"))),
        }
    }

    pub fn parse(text: &str) -> Option<NaiveDate> {
        if let Ok(date) = NaiveDate::parse_from_str(text, FORMAT) {
            return Some(date);
        }
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Local).date_naive())
    }
}
