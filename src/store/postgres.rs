// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    models::{
        placement::PlacementCache,
        question::{Page, Question, QuestionFilter, QuestionKind, QuestionPayload},
        session::{
            Level, LevelAssignment, NewSession, QuestionAttempt, SessionScores, SessionStatus, TestSession,
        },
    },
    placement::error::{PlacementError, PlacementResult},
    store::{PlacementStore, bank_changed, question_in_use},
};

const QUESTION_COLUMNS: &str = "id, prompt, category, difficulty, points, time_allocation, \
     skills_tested, answer_key, is_active, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, user_id, status, attempt_number, question_ids, attempts, \
     started_at, expires_at, completed_at, total_time_spent, scores, placement, version";

/// Row of the `questions` table.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    prompt: String,
    category: String,
    difficulty: String,
    points: i32,
    time_allocation: i32,
    skills_tested: Json<Vec<String>>,
    answer_key: Json<QuestionKind>,
    is_active: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = PlacementError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::models::question::UnknownVariant| {
            PlacementError::Storage(format!("question {}: {}", row.id, e))
        };
        Ok(Question {
            id: row.id,
            prompt: row.prompt,
            category: row.category.parse().map_err(corrupt)?,
            difficulty: row.difficulty.parse().map_err(corrupt)?,
            points: row.points,
            time_allocation: row.time_allocation,
            skills_tested: row.skills_tested.0,
            is_active: row.is_active,
            kind: row.answer_key.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row of the `test_sessions` table.
#[derive(FromRow)]
struct SessionRow {
    id: i64,
    user_id: i64,
    status: String,
    attempt_number: i32,
    question_ids: Json<Vec<i64>>,
    attempts: Json<Vec<QuestionAttempt>>,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    total_time_spent: i32,
    scores: Json<SessionScores>,
    placement: Option<Json<LevelAssignment>>,
    version: i32,
}

impl TryFrom<SessionRow> for TestSession {
    type Error = PlacementError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status: SessionStatus = row
            .status
            .parse()
            .map_err(|e| PlacementError::Storage(format!("session {}: {}", row.id, e)))?;
        Ok(TestSession {
            id: row.id,
            user_id: row.user_id,
            status,
            attempt_number: row.attempt_number,
            question_ids: row.question_ids.0,
            attempts: row.attempts.0,
            started_at: row.started_at,
            expires_at: row.expires_at,
            completed_at: row.completed_at,
            total_time_spent: row.total_time_spent,
            scores: row.scores.0,
            placement: row.placement.map(|p| p.0),
            version: row.version,
        })
    }
}

/// Row of the `user_placements` table.
#[derive(FromRow)]
struct PlacementRow {
    user_id: i64,
    assigned_level: Option<String>,
    level_code: Option<String>,
    placement_test_score: Option<i32>,
    placement_test_completed: bool,
    level_assigned_date: Option<DateTime<Utc>>,
    strength_areas: Json<Vec<String>>,
    improvement_areas: Json<Vec<String>>,
}

impl TryFrom<PlacementRow> for PlacementCache {
    type Error = PlacementError;

    fn try_from(row: PlacementRow) -> Result<Self, Self::Error> {
        let assigned_level = row
            .assigned_level
            .map(|l| l.parse::<Level>())
            .transpose()
            .map_err(|e| PlacementError::Storage(format!("placement of user {}: {}", row.user_id, e)))?;
        Ok(PlacementCache {
            user_id: row.user_id,
            assigned_level,
            level_code: row.level_code,
            placement_test_score: row.placement_test_score,
            placement_test_completed: row.placement_test_completed,
            level_assigned_date: row.level_assigned_date,
            strength_areas: row.strength_areas.0,
            improvement_areas: row.improvement_areas.0,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> PlacementResult<Vec<TestSession>> {
    rows.into_iter().map(TestSession::try_from).collect()
}

/// Maps a unique-constraint violation to `Conflict`, everything else to `Storage`.
fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> PlacementError {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PlacementError::Conflict(message.to_string())
        }
        _ => PlacementError::from(err),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &QuestionFilter) {
    builder.push(" WHERE TRUE");
    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(difficulty) = filter.difficulty {
        builder.push(" AND difficulty = ").push_bind(difficulty.as_str());
    }
    if let Some(question_type) = filter.question_type {
        builder.push(" AND question_type = ").push_bind(question_type.as_str());
    }
    if let Some(is_active) = filter.is_active {
        builder.push(" AND is_active = ").push_bind(is_active);
    }
}

/// Version-checked session update on an open connection or transaction.
async fn write_session(conn: &mut PgConnection, session: &TestSession) -> PlacementResult<TestSession> {
    let sql = format!(
        r#"
        UPDATE test_sessions SET
            status = $1,
            attempts = $2,
            completed_at = $3,
            total_time_spent = $4,
            scores = $5,
            placement = $6,
            version = version + 1
        WHERE id = $7 AND version = $8
        RETURNING {}
        "#,
        SESSION_COLUMNS
    );

    let row = sqlx::query_as::<_, SessionRow>(&sql)
        .bind(session.status.as_str())
        .bind(Json(&session.attempts))
        .bind(session.completed_at)
        .bind(session.total_time_spent)
        .bind(Json(&session.scores))
        .bind(session.placement.as_ref().map(Json))
        .bind(session.id)
        .bind(session.version)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            PlacementError::Conflict("session was modified concurrently, reload and retry".to_string())
        })?;

    row.try_into()
}

async fn write_cache(conn: &mut PgConnection, cache: &PlacementCache) -> PlacementResult<()> {
    sqlx::query(
        r#"
        INSERT INTO user_placements (
            user_id, assigned_level, level_code, placement_test_score,
            placement_test_completed, level_assigned_date, strength_areas,
            improvement_areas, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            assigned_level = EXCLUDED.assigned_level,
            level_code = EXCLUDED.level_code,
            placement_test_score = EXCLUDED.placement_test_score,
            placement_test_completed = EXCLUDED.placement_test_completed,
            level_assigned_date = EXCLUDED.level_assigned_date,
            strength_areas = EXCLUDED.strength_areas,
            improvement_areas = EXCLUDED.improvement_areas,
            updated_at = NOW()
        "#,
    )
    .bind(cache.user_id)
    .bind(cache.assigned_level.map(|l| l.as_str()))
    .bind(cache.level_code.as_deref())
    .bind(cache.placement_test_score)
    .bind(cache.placement_test_completed)
    .bind(cache.level_assigned_date)
    .bind(Json(&cache.strength_areas))
    .bind(Json(&cache.improvement_areas))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlacementStore for PgStore {
    async fn list_questions(&self, filter: &QuestionFilter) -> PlacementResult<Page<Question>> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM questions");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM questions", QUESTION_COLUMNS));
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY id LIMIT ");
        builder.push_bind(filter.per_page());
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset());

        let rows: Vec<QuestionRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(Question::try_from)
            .collect::<PlacementResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn active_questions(&self) -> PlacementResult<Vec<Question>> {
        let sql = format!("SELECT {} FROM questions WHERE is_active ORDER BY id", QUESTION_COLUMNS);
        let rows = sqlx::query_as::<_, QuestionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Question::try_from).collect()
    }

    async fn get_question(&self, id: i64) -> PlacementResult<Option<Question>> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Question::try_from).transpose()
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> PlacementResult<Vec<Question>> {
        let sql = format!("SELECT {} FROM questions WHERE id = ANY($1)", QUESTION_COLUMNS);
        let rows = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Question::try_from).collect()
    }

    async fn insert_question(&self, payload: QuestionPayload) -> PlacementResult<Question> {
        let sql = format!(
            r#"
            INSERT INTO questions
            (question_type, prompt, category, difficulty, points, time_allocation,
             skills_tested, answer_key, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );

        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(payload.kind.question_type().as_str())
            .bind(&payload.prompt)
            .bind(payload.category.as_str())
            .bind(payload.difficulty.as_str())
            .bind(payload.points)
            .bind(payload.time_allocation)
            .bind(Json(&payload.skills_tested))
            .bind(Json(&payload.kind))
            .bind(payload.is_active)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn update_question(
        &self,
        id: i64,
        payload: QuestionPayload,
    ) -> PlacementResult<Option<Question>> {
        let sql = format!(
            r#"
            UPDATE questions SET
                question_type = $1,
                prompt = $2,
                category = $3,
                difficulty = $4,
                points = $5,
                time_allocation = $6,
                skills_tested = $7,
                answer_key = $8,
                is_active = $9,
                updated_at = NOW()
            WHERE id = $10
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );

        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(payload.kind.question_type().as_str())
            .bind(&payload.prompt)
            .bind(payload.category.as_str())
            .bind(payload.difficulty.as_str())
            .bind(payload.points)
            .bind(payload.time_allocation)
            .bind(Json(&payload.skills_tested))
            .bind(Json(&payload.kind))
            .bind(payload.is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Question::try_from).transpose()
    }

    async fn delete_question(&self, id: i64) -> PlacementResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Row lock waits for any session insert holding a share lock on it.
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        let in_use: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM test_sessions
                WHERE status = 'in-progress' AND question_ids @> jsonb_build_array($1::BIGINT)
            )
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            return Err(question_in_use(id));
        }

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn create_session(&self, new: NewSession) -> PlacementResult<TestSession> {
        let mut tx = self.pool.begin().await?;

        let present: Vec<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = ANY($1) FOR SHARE")
            .bind(&new.question_ids)
            .fetch_all(&mut *tx)
            .await?;
        if present.len() != new.question_ids.len() {
            return Err(bank_changed());
        }

        let finished: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM test_sessions WHERE user_id = $1 AND status <> 'in-progress'",
        )
        .bind(new.user_id)
        .fetch_one(&mut *tx)
        .await?;

        // The partial unique index on in-progress sessions settles races.
        let sql = format!(
            r#"
            INSERT INTO test_sessions
            (user_id, status, attempt_number, question_ids, started_at, expires_at)
            VALUES ($1, 'in-progress', $2, $3, $4, $5)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(new.user_id)
            .bind(finished as i32 + 1)
            .bind(Json(&new.question_ids))
            .bind(new.started_at)
            .bind(new.expires_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(conflict_on_unique("a placement session is already in progress"))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn get_session(&self, id: i64) -> PlacementResult<Option<TestSession>> {
        let sql = format!("SELECT {} FROM test_sessions WHERE id = $1", SESSION_COLUMNS);
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TestSession::try_from).transpose()
    }

    async fn in_progress_session(&self, user_id: i64) -> PlacementResult<Option<TestSession>> {
        let sql = format!(
            "SELECT {} FROM test_sessions WHERE user_id = $1 AND status = 'in-progress'",
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TestSession::try_from).transpose()
    }

    async fn sessions_for_user(&self, user_id: i64) -> PlacementResult<Vec<TestSession>> {
        let sql = format!(
            "SELECT {} FROM test_sessions WHERE user_id = $1 ORDER BY attempt_number",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        into_sessions(rows)
    }

    async fn completed_sessions(&self) -> PlacementResult<Vec<TestSession>> {
        let sql = format!(
            "SELECT {} FROM test_sessions WHERE status = 'completed' ORDER BY id",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_sessions(rows)
    }

    async fn save_session(&self, session: &TestSession) -> PlacementResult<TestSession> {
        let mut conn = self.pool.acquire().await?;
        write_session(&mut conn, session).await
    }

    async fn save_completed_session(
        &self,
        session: &TestSession,
        cache: &PlacementCache,
    ) -> PlacementResult<TestSession> {
        let mut tx = self.pool.begin().await?;
        let saved = write_session(&mut tx, session).await?;
        write_cache(&mut tx, cache).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn reset_placement(&self, user_id: i64, cache: &PlacementCache) -> PlacementResult<u64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE test_sessions
            SET status = 'abandoned', version = version + 1
            WHERE user_id = $1 AND status = 'completed'
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        write_cache(&mut tx, cache).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn placement_cache(&self, user_id: i64) -> PlacementResult<PlacementCache> {
        let row = sqlx::query_as::<_, PlacementRow>(
            r#"
            SELECT
                user_id, assigned_level, level_code, placement_test_score,
                placement_test_completed, level_assigned_date, strength_areas,
                improvement_areas
            FROM user_placements
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(PlacementCache::cleared(user_id)),
        }
    }
}
