use chrono::{DateTime, Utc};
use tracing::debug;

use crate::notification::model::{NotificationError, NotificationRecord, NotificationSnapshot};

/// In-memory notification list for one screen, with its unread count.
///
/// `unread_count` is adjusted incrementally on `mark_as_read` and recomputed
/// from scratch whenever the list is replaced. Every method that touches
/// `records` also settles `unread_count` before returning.
#[derive(Debug, Default)]
pub struct NotificationStore {
    records: Vec<NotificationRecord>,
    unread_count: usize,
    revision: u64,
    loaded_at: Option<DateTime<Utc>>,
    notice: Option<String>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the whole list with a fresh fetch result, keeping its order
    pub fn replace(&mut self, records: Vec<NotificationRecord>) {
        self.unread_count = count_unread(&records);
        self.records = records;
        self.loaded_at = Some(Utc::now());
        self.notice = None;
        self.revision += 1;
    }

    /// Fall back to an empty list after a failed fetch, keeping the reason
    /// for the client
    pub fn fail_load(&mut self, reason: impl Into<String>) {
        self.records.clear();
        self.unread_count = 0;
        self.loaded_at = None;
        self.notice = Some(reason.into());
        self.revision += 1;
    }

    /// Mark the record with `id` as read.
    ///
    /// Returns true when the state changed. Already-read records and ids that
    /// are no longer in the list are silent no-ops.
    pub fn mark_as_read(&mut self, id: i64) -> bool {
        let index = match self.position(id) {
            Ok(index) => index,
            Err(e) => {
                debug!("Ignoring mark-as-read for notification {}: {}", id, e);
                return false;
            }
        };

        if !self.records[index].mark_read() {
            return false;
        }

        self.unread_count -= 1;
        self.revision += 1;
        debug_assert_eq!(self.unread_count, count_unread(&self.records));
        true
    }

    /// Drop every record. Returns true if there was anything to drop.
    pub fn clear_all(&mut self) -> bool {
        let changed = !self.records.is_empty() || self.unread_count != 0;
        self.records.clear();
        self.unread_count = 0;
        if changed {
            self.revision += 1;
        }
        changed
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        NotificationSnapshot {
            records: self.records.clone(),
            unread_count: self.unread_count,
            revision: self.revision,
            loaded_at: self.loaded_at,
            notice: self.notice.clone(),
        }
    }

    fn position(&self, id: i64) -> Result<usize, NotificationError> {
        self.records
            .iter()
            .position(|record| record.id() == id)
            .ok_or(NotificationError::NotFound)
    }
}

/// Full re-scan of the list
pub fn count_unread(records: &[NotificationRecord]) -> usize {
    records.iter().filter(|record| !record.is_read()).count()
}
