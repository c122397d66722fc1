use crate::error::Result;
use crate::models::item::GeneratedItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub count: i64,
    pub last_n_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceUsage {
    pub reference: String,
    pub frequency: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Total usage records, and how many of them fall within the last `days` days.
    async fn usage_stats(&self, days: i64) -> Result<UsageStats>;

    async fn usage_snapshot(&self, limit: i64) -> Result<Vec<ReferenceUsage>>;

    async fn record_usage(&self, reference: &str) -> Result<()>;

    async fn persist_item(&self, job_id: &str, item: &GeneratedItem, sequence: u32)
        -> Result<()>;

    /// Removes usage records older than `days` days and returns how many were deleted.
    async fn delete_usage_older_than(&self, days: i64) -> Result<u64>;
}

/// Write path used by the generator. Writes are attempted once and failures are only logged.
#[derive(Clone)]
pub struct BestEffortSink {
    store: Arc<dyn QuizStore>,
}

impl BestEffortSink {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub async fn record_usage(&self, reference: &str) -> bool {
        match self.store.record_usage(reference).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "Failed to record reference usage");
                false
            }
        }
    }

    pub async fn persist_item(&self, job_id: &str, item: &GeneratedItem, sequence: u32) -> bool {
        match self.store.persist_item(job_id, item, sequence).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    sequence,
                    unique_id = %item.unique_id,
                    error = %e,
                    "Failed to persist generated item"
                );
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizStore for PgQuizStore {
    async fn usage_stats(&self, days: i64) -> Result<UsageStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE used_at > NOW() - make_interval(days => $1)) AS recent
            FROM reference_usage
            "#,
        )
        .bind(days as i32)
        .fetch_one(&self.pool)
        .await?;
        Ok(UsageStats {
            count: row.try_get("total")?,
            last_n_days: row.try_get("recent")?,
        })
    }

    async fn usage_snapshot(&self, limit: i64) -> Result<Vec<ReferenceUsage>> {
        let rows = sqlx::query(
            r#"
            SELECT reference, COUNT(*) AS frequency
            FROM reference_usage
            GROUP BY reference
            ORDER BY frequency DESC, reference ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ReferenceUsage {
                    reference: row.try_get("reference")?,
                    frequency: row.try_get("frequency")?,
                })
            })
            .collect()
    }

    async fn record_usage(&self, reference: &str) -> Result<()> {
        sqlx::query("INSERT INTO reference_usage (reference) VALUES ($1)")
            .bind(reference)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn persist_item(
        &self,
        job_id: &str,
        item: &GeneratedItem,
        sequence: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO generated_items
                (id, job_id, sequence, unique_id, question, correct_answer, options, reference, difficulty, points)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (unique_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(sequence as i32)
        .bind(&item.unique_id)
        .bind(&item.text)
        .bind(&item.correct_answer)
        .bind(serde_json::to_value(&item.options)?)
        .bind(&item.reference)
        .bind(item.difficulty.as_str())
        .bind(item.points)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_usage_older_than(&self, days: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM reference_usage WHERE used_at < NOW() - make_interval(days => $1)",
        )
        .bind(days as i32)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct StoredItem {
    pub job_id: String,
    pub sequence: u32,
    pub item: GeneratedItem,
}

#[derive(Debug, Default)]
struct MemoryState {
    usage: Vec<(String, DateTime<Utc>)>,
    items: Vec<StoredItem>,
}

#[derive(Debug, Default)]
pub struct MemoryQuizStore {
    state: Mutex<MemoryState>,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_usage_at(&self, reference: &str, at: DateTime<Utc>) {
        self.state
            .lock()
            .await
            .usage
            .push((reference.to_string(), at));
    }

    pub async fn items_for(&self, job_id: &str) -> Vec<StoredItem> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .filter(|s| s.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn usage_stats(&self, days: i64) -> Result<UsageStats> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let state = self.state.lock().await;
        Ok(UsageStats {
            count: state.usage.len() as i64,
            last_n_days: state.usage.iter().filter(|(_, at)| *at > cutoff).count() as i64,
        })
    }

    async fn usage_snapshot(&self, limit: i64) -> Result<Vec<ReferenceUsage>> {
        let state = self.state.lock().await;
        let mut counts: std::collections::HashMap<&str, i64> = std::collections::HashMap::new();
        for (reference, _) in &state.usage {
            *counts.entry(reference.as_str()).or_insert(0) += 1;
        }
        let mut usage: Vec<ReferenceUsage> = counts
            .into_iter()
            .map(|(reference, frequency)| ReferenceUsage {
                reference: reference.to_string(),
                frequency,
            })
            .collect();
        usage.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        usage.truncate(limit.max(0) as usize);
        Ok(usage)
    }

    async fn record_usage(&self, reference: &str) -> Result<()> {
        self.record_usage_at(reference, Utc::now()).await;
        Ok(())
    }

    async fn persist_item(
        &self,
        job_id: &str,
        item: &GeneratedItem,
        sequence: u32,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.items.iter().any(|s| s.item.unique_id == item.unique_id) {
            return Ok(());
        }
        state.items.push(StoredItem {
            job_id: job_id.to_string(),
            sequence,
            item: item.clone(),
        });
        Ok(())
    }

    async fn delete_usage_older_than(&self, days: i64) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut state = self.state.lock().await;
        let before = state.usage.len();
        state.usage.retain(|(_, at)| *at >= cutoff);
        Ok((before - state.usage.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::Difficulty;

    fn item(id: &str) -> GeneratedItem {
        GeneratedItem {
            text: format!("Question {}", id),
            correct_answer: "A".into(),
            options: vec!["A".into(), "B".into()],
            reference: "Ruth 1:1".into(),
            difficulty: Difficulty::Easy,
            points: 10,
            generated: true,
            unique_id: id.into(),
        }
    }

    #[tokio::test]
    async fn memory_store_counts_and_snapshots_usage() {
        let store = MemoryQuizStore::new();
        store.record_usage("Ruth 1:1").await.unwrap();
        store.record_usage("Ruth 1:1").await.unwrap();
        store.record_usage("Jonah 2:1").await.unwrap();
        store
            .record_usage_at("Joel 1:1", Utc::now() - chrono::Duration::days(40))
            .await;

        let stats = store.usage_stats(7).await.unwrap();
        assert_eq!(stats, UsageStats { count: 4, last_n_days: 3 });

        let snapshot = store.usage_snapshot(2).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].reference, "Ruth 1:1");
        assert_eq!(snapshot[0].frequency, 2);

        assert_eq!(store.delete_usage_older_than(30).await.unwrap(), 1);
        assert_eq!(store.usage_stats(7).await.unwrap().count, 3);
    }

    #[tokio::test]
    async fn memory_store_persists_items_once() {
        let store = MemoryQuizStore::new();
        store.persist_item("job-1", &item("a"), 1).await.unwrap();
        store.persist_item("job-1", &item("a"), 1).await.unwrap();
        store.persist_item("job-2", &item("b"), 1).await.unwrap();
        assert_eq!(store.items_for("job-1").await.len(), 1);
        assert_eq!(store.items_for("job-2").await[0].item.unique_id, "b");
    }

    #[tokio::test]
    async fn sink_swallows_store_failures() {
        let mut mock = MockQuizStore::new();
        mock.expect_record_usage()
            .times(1)
            .returning(|_| Err(crate::error::Error::Internal("db down".into())));
        mock.expect_persist_item()
            .times(1)
            .returning(|_, _, _| Err(crate::error::Error::Internal("db down".into())));

        let sink = BestEffortSink::new(Arc::new(mock));
        assert!(!sink.record_usage("Ruth 1:1").await);
        assert!(!sink.persist_item("job", &item("x"), 1).await);
    }
}
