use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use utoipa::ToSchema;

/// Tag attached to every notification, fixed by the data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Product,
    Purchase,
    Influencer,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Product => "product",
            Category::Purchase => "purchase",
            Category::Influencer => "influencer",
        }
    }

    /// Capitalised form shown under the message in the list row
    pub fn label(&self) -> &'static str {
        match self {
            Category::Product => "Product",
            Category::Purchase => "Purchase",
            Category::Influencer => "Influencer",
        }
    }
}

impl FromStr for Category {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(Category::Product),
            "purchase" => Ok(Category::Purchase),
            "influencer" => Ok(Category::Influencer),
            other => Err(NotificationError::UnknownCategory(other.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification entry
///
/// Everything except the read flag is fixed once the record leaves the data
/// source, so the fields stay private and `is_read` only moves one way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRecord {
    #[schema(example = 1)]
    id: i64,
    category: Category,
    #[schema(example = "New product available!")]
    message: String,
    #[schema(example = false)]
    is_read: bool,
}

impl NotificationRecord {
    pub fn new(id: i64, category: Category, message: impl Into<String>, is_read: bool) -> Self {
        Self {
            id,
            category,
            message: message.into(),
            is_read,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    /// Flips the record to read. Returns false if it already was.
    pub(crate) fn mark_read(&mut self) -> bool {
        let was_unread = !self.is_read;
        self.is_read = true;
        was_unread
    }
}

/// Row shape of `global.notifications`
#[derive(Debug, FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub category: String,
    pub message: String,
    pub is_read: bool,
}

impl TryFrom<NotificationRow> for NotificationRecord {
    type Error = NotificationError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(NotificationRecord::new(
            row.id,
            row.category.parse()?,
            row.message,
            row.is_read,
        ))
    }
}

/// Read-only view of a screen's notifications, pushed to the client after
/// every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationSnapshot {
    /// Records in arrival order
    pub records: Vec<NotificationRecord>,

    /// Number of records not yet read
    #[schema(example = 2)]
    pub unread_count: usize,

    /// Bumped once per applied mutation
    #[schema(example = 1)]
    pub revision: u64,

    /// When the current list was loaded, if it ever was
    #[schema(value_type = Option<String>, example = "2026-01-01T09:30:00Z")]
    pub loaded_at: Option<DateTime<Utc>>,

    /// Non-fatal message describing why the last load came back empty
    #[schema(example = "null")]
    pub notice: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Duplicate notification id {0} in fetch result")]
    DuplicateId(i64),

    #[error("Unknown notification category: {0}")]
    UnknownCategory(String),

    #[error("Notification not found")]
    NotFound,

    #[error("Screen not found")]
    ScreenNotFound,

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_str() {
        assert_eq!("product".parse::<Category>().unwrap(), Category::Product);
        assert_eq!("purchase".parse::<Category>().unwrap(), Category::Purchase);
        assert_eq!(
            "influencer".parse::<Category>().unwrap(),
            Category::Influencer
        );

        match "coupon".parse::<Category>() {
            Err(NotificationError::UnknownCategory(tag)) => assert_eq!(tag, "coupon"),
            other => panic!("Expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_category_label() {
        assert_eq!(Category::Product.label(), "Product");
        assert_eq!(Category::Purchase.label(), "Purchase");
        assert_eq!(Category::Influencer.label(), "Influencer");
    }

    #[test]
    fn test_record_serialization() {
        let record = NotificationRecord::new(2, Category::Purchase, "Your order is on the way!", false);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""id":2"#));
        assert!(json.contains(r#""category":"purchase""#));
        assert!(json.contains(r#""is_read":false"#));

        let deserialized: NotificationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, record);
    }

    #[test]
    fn test_mark_read_is_one_way() {
        let mut record = NotificationRecord::new(1, Category::Product, "New product available!", false);

        assert!(record.mark_read());
        assert!(record.is_read());
        assert!(!record.mark_read());
        assert!(record.is_read());
    }

    #[test]
    fn test_row_conversion_rejects_unknown_category() {
        let row = NotificationRow {
            id: 7,
            category: "flash_sale".to_string(),
            message: "Sale!".to_string(),
            is_read: false,
        };

        assert!(matches!(
            NotificationRecord::try_from(row),
            Err(NotificationError::UnknownCategory(_))
        ));
    }
}
