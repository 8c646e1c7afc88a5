//! The school record: schema, submission validation, and listing queries.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::orm::{Backend, Db, FromRow, Model};

/// One school as served by `GET /api/get-schools`. The listing projection
/// is fixed: id, name, address, city, and the public image path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub city: String,
    pub image: String,
}

impl Model for School {
    fn table_name() -> &'static str {
        "schools"
    }

    fn create_table_sql(backend: Backend) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS schools (
                id {},
                name VARCHAR(255) NOT NULL,
                address TEXT,
                city VARCHAR(255),
                state VARCHAR(255),
                contact VARCHAR(255),
                email_id VARCHAR(255),
                image VARCHAR(255)
            )",
            backend.auto_increment_pk()
        )
    }
}

/// A submitted school, before it has an id or a stored image.
#[derive(Debug, Clone, Default)]
pub struct NewSchool {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub contact: String,
    pub email_id: String,
}

impl NewSchool {
    /// Every text field is required. The first missing field fails the
    /// submission with a descriptive message.
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            (&self.name, "School name is required."),
            (&self.address, "Address is required."),
            (&self.city, "City is required."),
            (&self.state, "State is required."),
            (&self.contact, "Contact number is required."),
            (&self.email_id, "Email ID is required."),
        ];
        for (value, message) in required {
            if value.trim().is_empty() {
                return Err(AppError::validation(message));
            }
        }
        Ok(())
    }

    /// Insert one row referencing the stored image's public path.
    /// Returns the number of affected rows as reported by the driver.
    pub async fn insert(&self, db: &Db, image_path: &str) -> Result<u64, sqlx::Error> {
        db.execute_with(
            "INSERT INTO schools (name, address, city, state, contact, email_id, image) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            &[
                self.name.as_str(),
                self.address.as_str(),
                self.city.as_str(),
                self.state.as_str(),
                self.contact.as_str(),
                self.email_id.as_str(),
                image_path,
            ],
        )
        .await
    }
}

/// Optional listing filters, AND-combined when both are present.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Free-text substring match against name, address, and city.
    pub search: Option<String>,
    /// Exact-match city inclusion filter.
    pub cities: Vec<String>,
}

impl ListFilter {
    /// Build a filter from raw query pairs. `search` keeps the last value
    /// seen; `city` (also accepted as `city[]`) accumulates.
    pub fn from_query_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut filter = ListFilter::default();
        for (key, value) in pairs {
            match key.as_str() {
                "search" => filter.search = Some(value),
                "city" | "city[]" => {
                    if !value.is_empty() {
                        filter.cities.push(value);
                    }
                }
                _ => {}
            }
        }
        filter
    }
}

/// LIKE escape character. `!` avoids the dialect-dependent treatment of a
/// backslash inside string literals.
const LIKE_ESCAPE: char = '!';

/// Build the listing SELECT and its bind values.
///
/// Matching semantics are pinned here rather than left to the storage
/// collation: the substring match is ASCII case-insensitive (`LOWER()` on
/// both sides) and `%`/`_` in user input match literally.
pub fn build_list_query(filter: &ListFilter) -> (String, Vec<String>) {
    let mut sql = String::from("SELECT id, name, address, city, image FROM schools");
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(needle) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        clauses.push(
            "(LOWER(name) LIKE ? ESCAPE '!' \
             OR LOWER(address) LIKE ? ESCAPE '!' \
             OR LOWER(city) LIKE ? ESCAPE '!')"
                .to_string(),
        );
        params.extend([pattern.clone(), pattern.clone(), pattern]);
    }

    if !filter.cities.is_empty() {
        let placeholders = vec!["?"; filter.cities.len()].join(", ");
        clauses.push(format!("city IN ({})", placeholders));
        params.extend(filter.cities.iter().cloned());
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    (sql, params)
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Fetch the schools matching the given filter.
pub async fn list_schools(db: &Db, filter: &ListFilter) -> Result<Vec<School>, sqlx::Error> {
    let (sql, params) = build_list_query(filter);
    let param_refs: Vec<&str> = params.iter().map(String::as_str).collect();
    db.fetch_all_with(&sql, &param_refs).await
}

/// Distinct non-empty city names, for the listing page's filter chips.
pub async fn distinct_cities(db: &Db) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = db
        .fetch_all("SELECT DISTINCT city FROM schools WHERE city <> '' ORDER BY city")
        .await?;
    Ok(rows.into_iter().map(|(city,)| city).collect())
}
