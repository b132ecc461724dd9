use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format used for every date cell.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Separator between items of a text-list cell.
pub const LIST_SEPARATOR: char = ';';

/// Storage kind of a tabular column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Bool,
    Int,
    Text,
    Date,
    TextList,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Int => "int",
            ColumnKind::Text => "text",
            ColumnKind::Date => "date",
            ColumnKind::TextList => "text_list",
        }
    }
}

/// Typed cell value of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Date(NaiveDate),
    TextList(Vec<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_csv(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::Date(value) => value.format(DATE_FORMAT).to_string(),
            Value::TextList(values) => values.join(&LIST_SEPARATOR.to_string()),
        }
    }

    /// Parse one CSV cell. Empty cells become [`Value::Null`]; an empty list is also null.
    pub fn parse(kind: ColumnKind, raw: &str) -> Result<Value, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }

        match kind {
            ColumnKind::Bool => match trimmed.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("invalid boolean '{}'", trimmed)),
            },
            ColumnKind::Int => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid integer '{}'", trimmed)),
            ColumnKind::Text => Ok(Value::Text(trimmed.to_string())),
            ColumnKind::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| format!("invalid date '{}'", trimmed)),
            ColumnKind::TextList => Ok(Value::TextList(
                trimmed
                    .split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::TextList(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnKind::Bool),
            Value::Int(_) => Some(ColumnKind::Int),
            Value::Text(_) => Some(ColumnKind::Text),
            Value::Date(_) => Some(ColumnKind::Date),
            Value::TextList(_) => Some(ColumnKind::TextList),
        }
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(value as i64)
    }
}

impl From<Option<u64>> for Value {
    fn from(value: Option<u64>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Option<NaiveDate>> for Value {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map(Value::Date).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
