//! SQLite-backed submission store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use super::{
    now, CardIdentity, CreateSubmissionRequest, MarketplaceEstimate, Submission, SubmissionError,
    SubmissionFilter, SubmissionStatus, SubmissionStore, SubmissionUpdate,
};

const SELECT_COLUMNS: &str = "SELECT id, image_data_uri, image_digest, card_name, card_number, deck_id_letter, illustrator_name, estimations_json, status, error_message, created_at, updated_at FROM card_submissions";

/// SQLite-backed submission store.
pub struct SqliteSubmissionStore {
    conn: Mutex<Connection>,
}

impl SqliteSubmissionStore {
    /// Create a new SQLite submission store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, SubmissionError> {
        let conn = Connection::open(path).map_err(|e| SubmissionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite submission store (useful for testing).
    pub fn in_memory() -> Result<Self, SubmissionError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SubmissionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SubmissionError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS card_submissions (
                id TEXT PRIMARY KEY,
                image_data_uri TEXT NOT NULL,
                image_digest TEXT NOT NULL DEFAULT '',
                card_name TEXT,
                card_number TEXT,
                deck_id_letter TEXT,
                illustrator_name TEXT,
                estimations_json TEXT,
                status TEXT NOT NULL,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_card_submissions_status ON card_submissions(status);
            CREATE INDEX IF NOT EXISTS idx_card_submissions_updated_at ON card_submissions(updated_at);
            "#,
        )
        .map_err(|e| SubmissionError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SubmissionError> {
        self.conn
            .lock()
            .map_err(|_| SubmissionError::Database("connection mutex poisoned".to_string()))
    }

    fn format_timestamp(value: &DateTime<Utc>) -> String {
        // Fixed width so that string comparison in SQL matches time order
        value.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        // Rows are only ever written by format_timestamp
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_submission(row: &rusqlite::Row) -> rusqlite::Result<Submission> {
        let id: String = row.get(0)?;
        let image_data_uri: String = row.get(1)?;
        let image_digest: String = row.get(2)?;
        let card_name: Option<String> = row.get(3)?;
        let card_number: Option<String> = row.get(4)?;
        let deck_id_letter: Option<String> = row.get(5)?;
        let illustrator_name: Option<String> = row.get(6)?;
        let estimations_json: Option<String> = row.get(7)?;
        let status_str: String = row.get(8)?;
        let error_message: Option<String> = row.get(9)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        let status: SubmissionStatus = status_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;

        let card_identity = match (card_name, card_number) {
            (Some(name), Some(number)) => Some(CardIdentity {
                name,
                number,
                deck_id_letter,
                illustrator_name,
            }),
            _ => None,
        };

        let valuation: Option<Vec<MarketplaceEstimate>> = estimations_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(Submission {
            id,
            image_data_uri,
            image_digest,
            card_identity,
            valuation,
            status,
            error_message,
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Submission>, SubmissionError> {
        let result = conn.query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_submission,
        );

        match result {
            Ok(submission) => Ok(Some(submission)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SubmissionError::Database(e.to_string())),
        }
    }

    fn build_where_clause(filter: &SubmissionFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        let where_clause = match filter.status {
            Some(status) => {
                params.push(Box::new(status.as_str()));
                "WHERE status = ?".to_string()
            }
            None => String::new(),
        };

        (where_clause, params)
    }

    fn collect_rows(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Submission>, SubmissionError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params, Self::row_to_submission)
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        let mut submissions = Vec::new();
        for row_result in rows {
            submissions.push(row_result.map_err(|e| SubmissionError::Database(e.to_string()))?);
        }
        Ok(submissions)
    }
}

impl SubmissionStore for SqliteSubmissionStore {
    fn create(&self, request: CreateSubmissionRequest) -> Result<Submission, SubmissionError> {
        let conn = self.lock()?;
        let submission = Submission::new(
            request.id,
            request.image_data_uri,
            request.image_digest,
            now(),
        );

        let result = conn.execute(
            "INSERT INTO card_submissions (id, image_data_uri, image_digest, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                submission.id,
                submission.image_data_uri,
                submission.image_digest,
                submission.status.as_str(),
                Self::format_timestamp(&submission.created_at),
                Self::format_timestamp(&submission.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(submission),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(SubmissionError::AlreadyExists(submission.id))
            }
            Err(e) => Err(SubmissionError::Database(e.to_string())),
        }
    }

    fn get(&self, id: &str) -> Result<Option<Submission>, SubmissionError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn update(
        &self,
        id: &str,
        new_status: SubmissionStatus,
        update: SubmissionUpdate,
    ) -> Result<Submission, SubmissionError> {
        let conn = self.lock()?;

        let current =
            Self::fetch(&conn, id)?.ok_or_else(|| SubmissionError::NotFound(id.to_string()))?;

        let updated = update.apply(current, new_status, now())?;

        let identity = updated.card_identity.as_ref();
        let estimations_json = updated
            .valuation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| SubmissionError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE card_submissions SET card_name = ?, card_number = ?, deck_id_letter = ?, illustrator_name = ?, estimations_json = ?, status = ?, error_message = ?, updated_at = ? WHERE id = ?",
            params![
                identity.map(|i| i.name.as_str()),
                identity.map(|i| i.number.as_str()),
                identity.and_then(|i| i.deck_id_letter.as_deref()),
                identity.and_then(|i| i.illustrator_name.as_deref()),
                estimations_json,
                updated.status.as_str(),
                updated.error_message,
                Self::format_timestamp(&updated.updated_at),
                id,
            ],
        )
        .map_err(|e| SubmissionError::Database(e.to_string()))?;

        Ok(updated)
    }

    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, SubmissionError> {
        let conn = self.lock()?;

        let (where_clause, mut params) = Self::build_where_clause(filter);
        let sql = format!(
            "{} {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Self::collect_rows(&conn, &sql, param_refs.as_slice())
    }

    fn count(&self, filter: &SubmissionFilter) -> Result<i64, SubmissionError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM card_submissions {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| SubmissionError::Database(e.to_string()))
    }

    fn list_unfinished(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Submission>, SubmissionError> {
        let conn = self.lock()?;

        let sql = format!(
            "{} WHERE status IN (?, ?) AND updated_at < ? ORDER BY created_at ASC",
            SELECT_COLUMNS
        );
        Self::collect_rows(
            &conn,
            &sql,
            params![
                SubmissionStatus::ProcessingIdentification.as_str(),
                SubmissionStatus::ProcessingValuation.as_str(),
                Self::format_timestamp(&updated_before),
            ],
        )
    }

    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, SubmissionError> {
        let conn = self.lock()?;

        conn.execute(
            "DELETE FROM card_submissions WHERE status IN (?, ?, ?) AND updated_at < ?",
            params![
                SubmissionStatus::Completed.as_str(),
                SubmissionStatus::ErrorIdentification.as_str(),
                SubmissionStatus::ErrorValuation.as_str(),
                Self::format_timestamp(&cutoff),
            ],
        )
        .map_err(|e| SubmissionError::Database(e.to_string()))
    }
}
