use axum::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::notification::model::{
    Category, NotificationError, NotificationRecord, NotificationRow,
};

/// Where a screen gets its notification list from
///
/// Implementations return records in arrival order and signal failure as an
/// error, never as an empty list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn fetch_notifications(&self) -> Result<Vec<NotificationRecord>, NotificationError>;
}

/// Fixed list, used when no database is configured
#[derive(Debug, Clone)]
pub struct FixtureSource {
    records: Vec<NotificationRecord>,
}

impl FixtureSource {
    pub fn new(records: Vec<NotificationRecord>) -> Self {
        Self { records }
    }

    /// The three notifications the app ships with for demos
    pub fn sample() -> Self {
        Self::new(vec![
            NotificationRecord::new(1, Category::Product, "New product available!", false),
            NotificationRecord::new(2, Category::Purchase, "Your order is on the way!", false),
            NotificationRecord::new(3, Category::Influencer, "Influencer X has a new post!", true),
        ])
    }
}

#[async_trait]
impl NotificationSource for FixtureSource {
    async fn fetch_notifications(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
        Ok(self.records.clone())
    }
}

/// Reads notifications from the hosted Postgres table
#[derive(Debug, Clone)]
pub struct PgNotificationSource {
    pool: PgPool,
}

impl PgNotificationSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSource for PgNotificationSource {
    async fn fetch_notifications(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, category, message, is_read
            FROM global.notifications
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch notifications: {}", e);
            NotificationError::DatabaseError(e)
        })?;

        info!("Fetched {} notifications from database", rows.len());

        rows.into_iter().map(NotificationRecord::try_from).collect()
    }
}

/// Bounds any source with a deadline
///
/// Retry policies should wrap the same way, so the screen never has to know
/// about them.
pub struct TimeoutSource<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<S: NotificationSource> NotificationSource for TimeoutSource<S> {
    async fn fetch_notifications(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
        match tokio::time::timeout(self.timeout, self.inner.fetch_notifications()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Notification fetch exceeded {:?}", self.timeout);
                Err(NotificationError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowSource {
        delay: Duration,
    }

    #[async_trait]
    impl NotificationSource for SlowSource {
        async fn fetch_notifications(&self) -> Result<Vec<NotificationRecord>, NotificationError> {
            tokio::time::sleep(self.delay).await;
            Ok(FixtureSource::sample().records)
        }
    }

    #[tokio::test]
    async fn test_fixture_sample_matches_demo_list() {
        let records = FixtureSource::sample().fetch_notifications().await.unwrap();

        let ids: Vec<i64> = records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(records[0].category(), Category::Product);
        assert_eq!(records[2].message(), "Influencer X has a new post!");
        assert!(records[2].is_read());
        assert_eq!(records.iter().filter(|r| !r.is_read()).count(), 2);
    }

    #[tokio::test]
    async fn test_fixture_empty_is_not_an_error() {
        let records = FixtureSource::new(Vec::new())
            .fetch_notifications()
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_source_passes_through_fast_fetch() {
        let source = TimeoutSource::new(
            SlowSource {
                delay: Duration::from_millis(1),
            },
            Duration::from_secs(5),
        );

        let records = source.fetch_notifications().await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_source_fails_slow_fetch() {
        let source = TimeoutSource::new(
            SlowSource {
                delay: Duration::from_secs(5),
            },
            Duration::from_millis(20),
        );

        match source.fetch_notifications().await {
            Err(NotificationError::Timeout(limit)) => {
                assert_eq!(limit, Duration::from_millis(20))
            }
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_source_passes_through_errors() {
        let mut inner = MockNotificationSource::new();
        inner
            .expect_fetch_notifications()
            .times(1)
            .returning(|| Err(NotificationError::InternalError("backend down".to_string())));

        let source = TimeoutSource::new(inner, Duration::from_secs(1));
        assert!(matches!(
            source.fetch_notifications().await,
            Err(NotificationError::InternalError(_))
        ));
    }
}
