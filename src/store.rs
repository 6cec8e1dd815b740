use std::{str::FromStr, time::Duration};

use anyhow::Context as _;
use rand::Rng;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tokio::sync::Mutex;

use crate::{
    error::{QuoteError, QuoteResult},
    models::quotes::{Quote, QuoteRow},
};

const SELECT_QUOTE: &str = "SELECT id, text, author, created_at FROM quotes";

/// sqlite-backed quote collection.
///
/// reads go straight to the pool. every mutating statement first takes `write_lock`, so at
/// most one write is in flight no matter how many connections the pool holds.
pub struct QuoteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl QuoteStore {
    /// opens (or creates) the database at `database_url` in WAL mode and runs migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        tracing::info!("initializing database connection...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url {database_url:?}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when opening database"))?;

        Self::new(pool).await
    }

    /// wraps an existing pool, running migrations on it first.
    pub async fn new(pool: SqlitePool) -> anyhow::Result<Self> {
        tracing::info!("running migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when running migrations"))?;
        tracing::info!("finished running migrations!");

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[tracing::instrument(skip(self))]
    pub async fn add(&self, text: &str, author: &str) -> QuoteResult<i64> {
        let text = text.trim();
        let author = author.trim();

        if text.is_empty() {
            return Err(QuoteError::Validation(
                "Quote text cannot be empty".to_string(),
            ));
        }

        if author.is_empty() {
            return Err(QuoteError::Validation("Author cannot be empty".to_string()));
        }

        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("INSERT INTO quotes (text, author) VALUES (?, ?)")
            .bind(text)
            .bind(author)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when adding quote"))?;

        Ok(result.last_insert_rowid())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> QuoteResult<Quote> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!("{SELECT_QUOTE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when fetching quote"),
            )?;

        row.ok_or_else(|| QuoteError::no_such_id(id))?.into_quote()
    }

    /// picks a quote uniformly at random without loading the whole table.
    ///
    /// counts first, then reads the row at a random offset. a delete landing between the two
    /// reads can leave the offset past the end; that comes back as `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn random(&self) -> QuoteResult<Quote> {
        let count = self.count().await?;

        if count == 0 {
            return Err(QuoteError::no_quotes());
        }

        let offset = rand::thread_rng().gen_range(0..count);

        let row =
            sqlx::query_as::<_, QuoteRow>(&format!("{SELECT_QUOTE} ORDER BY id LIMIT 1 OFFSET ?"))
                .bind(offset)
                .fetch_optional(&self.pool)
                .await
                .inspect_err(
                    |e| tracing::error!(err = ?e, offset, "an error occurred when fetching random quote"),
                )?;

        match row {
            Some(row) => row.into_quote(),
            None => {
                tracing::debug!(offset, count, "random quote vanished between count and fetch");
                Err(QuoteError::no_quotes())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn latest(&self) -> QuoteResult<Quote> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!("{SELECT_QUOTE} ORDER BY id DESC LIMIT 1"))
            .fetch_optional(&self.pool)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when fetching latest quote"),
            )?;

        row.ok_or_else(QuoteError::no_quotes)?.into_quote()
    }

    /// case-sensitive substring search over text and author, in id order.
    ///
    /// uses `instr` rather than `LIKE`, which would fold ascii case.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, term: &str) -> QuoteResult<Vec<Quote>> {
        if term.is_empty() {
            return Err(QuoteError::NotFound("no search term given".to_string()));
        }

        let rows = sqlx::query_as::<_, QuoteRow>(&format!(
            "{SELECT_QUOTE} WHERE instr(text, ?) > 0 OR instr(author, ?) > 0 ORDER BY id"
        ))
        .bind(term)
        .bind(term)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when searching quotes"))?;

        let quotes = decode_lenient(rows);

        if quotes.is_empty() {
            return Err(QuoteError::NotFound("no matching quotes".to_string()));
        }

        Ok(quotes)
    }

    /// every readable quote in id order.
    pub async fn list(&self) -> QuoteResult<Vec<Quote>> {
        self.list_first(usize::MAX).await
    }

    /// the first `limit` rows in id order. unreadable rows are skipped, not replaced.
    #[tracing::instrument(skip(self))]
    pub async fn list_first(&self, limit: usize) -> QuoteResult<Vec<Quote>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, QuoteRow>(&format!("{SELECT_QUOTE} ORDER BY id LIMIT ?"))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, limit, "an error occurred when fetching quotes from database"),
            )?;

        non_empty(decode_lenient(rows))
    }

    #[tracing::instrument(skip(self))]
    pub async fn count(&self) -> QuoteResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quotes")
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when counting quotes"))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> QuoteResult<()> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("DELETE FROM quotes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when deleting quote"),
            )?;

        if result.rows_affected() == 0 {
            return Err(QuoteError::no_such_id(id));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_text(&self, id: i64, text: &str) -> QuoteResult<()> {
        let text = text.trim();

        if text.is_empty() {
            return Err(QuoteError::Validation(
                "Quote text cannot be empty".to_string(),
            ));
        }

        self.update_column(id, "UPDATE quotes SET text = ? WHERE id = ?", text)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_author(&self, id: i64, author: &str) -> QuoteResult<()> {
        let author = author.trim();

        if author.is_empty() {
            return Err(QuoteError::Validation("Author cannot be empty".to_string()));
        }

        self.update_column(id, "UPDATE quotes SET author = ? WHERE id = ?", author)
            .await
    }

    async fn update_column(&self, id: i64, statement: &'static str, value: &str) -> QuoteResult<()> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(statement)
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when updating quote"),
            )?;

        if result.rows_affected() == 0 {
            return Err(QuoteError::no_such_id(id));
        }

        Ok(())
    }
}

/// decodes rows for multi-row reads, skipping (and logging) rows with unreadable timestamps.
fn decode_lenient(rows: Vec<QuoteRow>) -> Vec<Quote> {
    rows.into_iter()
        .filter_map(|row| {
            row.into_quote()
                .inspect_err(|e| tracing::warn!(err = %e, "skipping unreadable quote row"))
                .ok()
        })
        .collect()
}

fn non_empty(quotes: Vec<Quote>) -> QuoteResult<Vec<Quote>> {
    if quotes.is_empty() {
        return Err(QuoteError::no_quotes());
    }

    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use time::OffsetDateTime;

    use super::*;

    async fn create_test_store() -> QuoteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        QuoteStore::new(pool).await.unwrap()
    }

    async fn insert_raw(store: &QuoteStore, text: &str, created_at: &str) {
        sqlx::query("INSERT INTO quotes (text, author, created_at) VALUES (?, 'legacy', ?)")
            .bind(text)
            .bind(created_at)
            .execute(&store.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_assigns_increasing_ids_and_trims() {
        let store = create_test_store().await;

        let first = store.add("  hello world ", " alice ").await.unwrap();
        let second = store.add("second", "bob").await.unwrap();
        let third = store.add("third", "carol").await.unwrap();

        assert_eq!(first, 1);
        assert!(second > first);
        assert!(third > second);

        let quote = store.get_by_id(first).await.unwrap();
        assert_eq!(quote.text, "hello world");
        assert_eq!(quote.author, "alice");

        let age = OffsetDateTime::now_utc() - quote.created_at;
        assert!(age.whole_seconds().abs() <= 5, "created_at too far off: {age}");
    }

    #[tokio::test]
    async fn test_add_rejects_blank_fields() {
        let store = create_test_store().await;

        assert!(matches!(
            store.add("   ", "alice").await,
            Err(QuoteError::Validation(_))
        ));
        assert!(matches!(
            store.add("text", "\t").await,
            Err(QuoteError::Validation(_))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let store = create_test_store().await;

        store.add("one", "a").await.unwrap();
        let two = store.add("two", "a").await.unwrap();
        store.delete(two).await.unwrap();

        let three = store.add("three", "a").await.unwrap();
        assert!(three > two);
    }

    #[tokio::test]
    async fn test_empty_store_reads() {
        let store = create_test_store().await;

        assert!(matches!(store.random().await, Err(QuoteError::NotFound(_))));
        assert!(matches!(store.latest().await, Err(QuoteError::NotFound(_))));
        assert!(matches!(store.list().await, Err(QuoteError::NotFound(_))));
        assert!(matches!(store.get_by_id(1).await, Err(QuoteError::NotFound(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_random_is_roughly_uniform() {
        let store = create_test_store().await;

        for text in ["a", "b", "c"] {
            store.add(text, "tester").await.unwrap();
        }

        let mut seen: HashMap<i64, usize> = HashMap::new();
        for _ in 0..300 {
            let quote = store.random().await.unwrap();
            *seen.entry(quote.id).or_default() += 1;
        }

        assert_eq!(seen.len(), 3);
        for (id, hits) in seen {
            assert!((50..=150).contains(&hits), "quote {id} picked {hits} times");
        }
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let store = create_test_store().await;

        let id = store.add("short lived", "alice").await.unwrap();
        store.delete(id).await.unwrap();

        assert!(matches!(store.get_by_id(id).await, Err(QuoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_id_does_not_mutate() {
        let store = create_test_store().await;

        store.add("keep me", "alice").await.unwrap();

        assert!(matches!(store.delete(42).await, Err(QuoteError::NotFound(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_updates_touch_one_field() {
        let store = create_test_store().await;

        let id = store.add("original", "alice").await.unwrap();
        let before = store.get_by_id(id).await.unwrap();

        store.update_text(id, "  revised ").await.unwrap();
        let after_text = store.get_by_id(id).await.unwrap();
        assert_eq!(after_text.text, "revised");
        assert_eq!(after_text.author, before.author);
        assert_eq!(after_text.created_at, before.created_at);

        store.update_author(id, "bob").await.unwrap();
        let after_author = store.get_by_id(id).await.unwrap();
        assert_eq!(after_author.author, "bob");
        assert_eq!(after_author.text, "revised");
        assert_eq!(after_author.id, before.id);
        assert_eq!(after_author.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_updates_validate_and_check_existence() {
        let store = create_test_store().await;

        let id = store.add("original", "alice").await.unwrap();

        assert!(matches!(
            store.update_text(id, " ").await,
            Err(QuoteError::Validation(_))
        ));
        assert!(matches!(
            store.update_author(id, "").await,
            Err(QuoteError::Validation(_))
        ));
        assert!(matches!(
            store.update_text(99, "new").await,
            Err(QuoteError::NotFound(_))
        ));
        assert!(matches!(
            store.update_author(99, "new").await,
            Err(QuoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_is_case_sensitive_substring() {
        let store = create_test_store().await;

        let a = store.add("The cake is a lie", "glados").await.unwrap();
        store.add("nothing to see", "someone").await.unwrap();
        let c = store.add("a piece of cake", "chell").await.unwrap();
        let d = store.add("unrelated", "cakebaker").await.unwrap();

        let ids: Vec<i64> = store
            .search("cake")
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec![a, c, d]);

        assert!(matches!(store.search("CAKE").await, Err(QuoteError::NotFound(_))));
        assert!(matches!(store.search("").await, Err(QuoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_latest_and_list_order() {
        let store = create_test_store().await;

        let first = store.add("first", "a").await.unwrap();
        let second = store.add("second", "b").await.unwrap();

        assert_eq!(store.latest().await.unwrap().id, second);

        let ids: Vec<i64> = store.list().await.unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_list_first_reads_a_window() {
        let store = create_test_store().await;

        assert!(matches!(store.list_first(5).await, Err(QuoteError::NotFound(_))));

        for i in 1..=8 {
            store.add(&format!("q{i}"), "a").await.unwrap();
        }

        let ids: Vec<i64> = store.list_first(5).await.unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        assert_eq!(store.list_first(50).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_legacy_timestamps_are_read() {
        let store = create_test_store().await;

        insert_raw(&store, "iso", "2023-05-06T07:08:09Z").await;
        insert_raw(&store, "iso nano", "2023-05-06T07:08:09.123456789+00:00").await;
        insert_raw(&store, "naive", "2023-05-06T07:08:09").await;

        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unreadable_timestamp_is_skipped_by_list_but_fails_get() {
        let store = create_test_store().await;

        store.add("fine", "alice").await.unwrap();
        insert_raw(&store, "broken", "not a date").await;

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "fine");

        let searched = store.search("broken").await;
        assert!(matches!(searched, Err(QuoteError::NotFound(_))));

        assert!(matches!(
            store.get_by_id(2).await,
            Err(QuoteError::CorruptRow { id: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_adds_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("quotes.db").display());
        let store = Arc::new(QuoteStore::connect(&url, 4).await.unwrap());

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.add(&format!("quote {i}"), "racer").await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 20);
        assert_eq!(store.count().await.unwrap(), 20);

        store.close().await;
    }
}
