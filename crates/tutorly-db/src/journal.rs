//! Journal entries: CRUD, tag extraction, suggestions and mood summaries.

use crate::error::{DbError, Result};
use crate::schema::{JournalEntry, JournalQuery, JournalRow, JournalUpdate, MoodCount, NewJournalEntry};
use regex::Regex;
use sqlx::PgPool;
use std::sync::OnceLock;
use tutorly_common::Mood;
use uuid::Uuid;

const ENTRY_COLUMNS: &str =
    "id, student_id, title, content, mood, tags, is_private, created_at, updated_at";
const MAX_TAG_LEN: usize = 32;
const DEFAULT_PAGE: i64 = 20;
const MAX_PAGE: i64 = 100;

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#([A-Za-z0-9_][A-Za-z0-9_-]*)").expect("hashtag pattern"))
}

/// `#hashtags` in free text, lowercased, in order of first appearance.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    normalise_tags(hashtag_re().captures_iter(content).map(|c| c[1].to_string()))
}

/// Lowercase, trim, drop a leading `#`, dedupe and bound the length.
pub fn normalise_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let t = tag.as_ref().trim().trim_start_matches('#').to_lowercase();
        if t.is_empty() || t.chars().count() > MAX_TAG_LEN || out.contains(&t) {
            continue;
        }
        out.push(t);
    }
    out
}

fn merged_tags(explicit: &[String], content: &str) -> Vec<String> {
    normalise_tags(explicit.iter().cloned().chain(extract_hashtags(content)))
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE), offset.unwrap_or(0).max(0))
}

#[derive(Clone)]
pub struct JournalRepository {
    pool: PgPool,
}

impl JournalRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn create(&self, student_id: Uuid, new: &NewJournalEntry) -> Result<JournalEntry> {
        if new.title.trim().is_empty() {
            return Err(DbError::Validation("title must not be empty".into()));
        }
        let row: JournalRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO journal_entries (student_id, title, content, mood, tags, is_private)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(student_id)
        .bind(new.title.trim())
        .bind(&new.content)
        .bind(new.mood.map(|m| m.as_str()))
        .bind(merged_tags(&new.tags, &new.content))
        .bind(new.is_private)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_into()?)
    }

    pub async fn get(&self, id: Uuid) -> Result<JournalEntry> {
        let row: JournalRow =
            sqlx::query_as(&format!("SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::NotFound("Journal entry".into()))?;
        Ok(row.try_into()?)
    }

    /// Newest first, filtered by tag, mood and a free-text search over
    /// title and content.
    pub async fn list(&self, student_id: Uuid, query: &JournalQuery) -> Result<Vec<JournalEntry>> {
        let (limit, offset) = page(query.limit, query.offset);
        let tag = query.tag.as_deref().map(|t| t.trim().trim_start_matches('#').to_lowercase());
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let rows: Vec<JournalRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM journal_entries
            WHERE student_id = $1
              AND ($2::text IS NULL OR $2 = ANY(tags))
              AND ($3::text IS NULL OR mood = $3)
              AND ($4::text IS NULL OR title ILIKE $4 OR content ILIKE $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(student_id)
        .bind(tag)
        .bind(query.mood.map(|m| m.as_str()))
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| JournalEntry::try_from(r).map_err(DbError::from))
            .collect()
    }

    /// Apply a partial update. Tags are re-derived when content changes.
    pub async fn update(&self, id: Uuid, update: &JournalUpdate) -> Result<JournalEntry> {
        let mut tx = self.pool.begin().await?;

        let current: JournalEntry = sqlx::query_as::<_, JournalRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound("Journal entry".into()))?
        .try_into()?;

        let title = update.title.as_deref().map(str::trim).unwrap_or(&current.title);
        if title.is_empty() {
            return Err(DbError::Validation("title must not be empty".into()));
        }
        let content = update.content.as_deref().unwrap_or(&current.content);
        let tags = merged_tags(update.tags.as_ref().unwrap_or(&current.tags), content);
        let mood = update.mood.or(current.mood);

        let row: JournalRow = sqlx::query_as(&format!(
            r#"
            UPDATE journal_entries
            SET title = $2, content = $3, mood = $4, tags = $5, is_private = $6
            WHERE id = $1
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(mood.map(|m| m.as_str()))
        .bind(tags)
        .bind(update.is_private.unwrap_or(current.is_private))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.try_into()?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM journal_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("Journal entry".into()));
        }
        Ok(())
    }

    // ── Suggestions ──────────────────────────────────────────────────────────

    /// The student's own tags starting with `prefix`, most used first.
    pub async fn tag_suggestions(&self, student_id: Uuid, prefix: &str, limit: i64) -> Result<Vec<String>> {
        let pattern = format!("{}%", escape_like(prefix.trim().trim_start_matches('#')));
        Ok(sqlx::query_scalar(
            r#"
            SELECT tag FROM (
                SELECT unnest(tags) AS tag FROM journal_entries WHERE student_id = $1
            ) t
            WHERE tag ILIKE $2
            GROUP BY tag
            ORDER BY COUNT(*) DESC, tag
            LIMIT $3
            "#,
        )
        .bind(student_id)
        .bind(pattern)
        .bind(limit.clamp(1, MAX_PAGE))
        .fetch_all(&self.pool)
        .await?)
    }

    /// Entry titles containing `fragment`.
    pub async fn search_suggestions(&self, student_id: Uuid, fragment: &str, limit: i64) -> Result<Vec<String>> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(Vec::new());
        }
        Ok(sqlx::query_scalar(
            r#"
            SELECT DISTINCT title FROM journal_entries
            WHERE student_id = $1 AND title ILIKE $2
            ORDER BY title
            LIMIT $3
            "#,
        )
        .bind(student_id)
        .bind(format!("%{}%", escape_like(fragment)))
        .bind(limit.clamp(1, MAX_PAGE))
        .fetch_all(&self.pool)
        .await?)
    }

    /// Entry count per mood over the last `days` days, most common first.
    pub async fn mood_summary(&self, student_id: Uuid, days: i32) -> Result<Vec<MoodCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT mood, COUNT(*) FROM journal_entries
            WHERE student_id = $1
              AND mood IS NOT NULL
              AND created_at >= now() - make_interval(days => $2)
            GROUP BY mood
            ORDER BY COUNT(*) DESC, mood
            "#,
        )
        .bind(student_id)
        .bind(days.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(mood, count)| -> Result<MoodCount> {
                Ok(MoodCount { mood: mood.parse::<Mood>()?, count })
            })
            .collect()
    }
}
