//! Genre accessors.

use sqlx::SqliteConnection;

use crate::error::Result;
use crate::model::Genre;

/// Display name when a genre id has no row.
pub const UNKNOWN_GENRE: &str = "Unknown";

pub async fn add(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO genres (name) VALUES (?)")
        .bind(name)
        .execute(conn)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn id_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM genres WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

pub async fn get_or_create(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    match id_by_name(&mut *conn, name).await? {
        Some(id) => Ok(id),
        None => add(conn, name).await,
    }
}

pub async fn name(conn: &mut SqliteConnection, genre_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM genres WHERE id = ?")
        .bind(genre_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(name,)| name))
}

pub async fn display_name(conn: &mut SqliteConnection, genre_id: i64) -> Result<String> {
    Ok(name(conn, genre_id)
        .await?
        .unwrap_or_else(|| UNKNOWN_GENRE.to_string()))
}

/// Every genre, sorted case-insensitively.
pub async fn all(conn: &mut SqliteConnection) -> Result<Vec<Genre>> {
    Ok(
        sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY name COLLATE NOCASE")
            .fetch_all(conn)
            .await?,
    )
}
