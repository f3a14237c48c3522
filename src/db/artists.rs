//! Artist accessors.

use sqlx::SqliteConnection;

use crate::error::Result;
use crate::model::{Artist, ArtistKey};

/// Display name for compilation albums.
pub const COMPILATION_NAME: &str = "Various Artists";
/// Display name when an artist id has no row.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Insert an artist and return its id.
pub async fn add(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO artists (name) VALUES (?)")
        .bind(name)
        .execute(conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Look up an artist by exact name.
pub async fn id_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM artists WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

/// Get or create an artist by name.
///
/// Idempotent: calling with the same name always returns the same id.
pub async fn get_or_create(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    match id_by_name(&mut *conn, name).await? {
        Some(id) => Ok(id),
        None => add(conn, name).await,
    }
}

/// Name of a real artist. `None` for compilations and unknown ids.
pub async fn name(conn: &mut SqliteConnection, artist: ArtistKey) -> Result<Option<String>> {
    let Some(id) = artist.artist_id() else {
        return Ok(None);
    };
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM artists WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(name,)| name))
}

/// Name suitable for display, never empty.
pub async fn display_name(conn: &mut SqliteConnection, artist: ArtistKey) -> Result<String> {
    if artist.is_compilation() {
        return Ok(COMPILATION_NAME.to_string());
    }
    Ok(name(conn, artist)
        .await?
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()))
}

/// All artists credited on at least one album, sorted case-insensitively.
///
/// Artists that only appear as track performers on other artists' albums are
/// left out of the listing.
pub async fn all(conn: &mut SqliteConnection) -> Result<Vec<Artist>> {
    Ok(sqlx::query_as::<_, Artist>(
        r#"
        SELECT id, name FROM artists
        WHERE EXISTS (SELECT 1 FROM albums WHERE albums.artist_id = artists.id)
        ORDER BY name COLLATE NOCASE
        "#,
    )
    .fetch_all(conn)
    .await?)
}

/// Artists with at least one album in the given genre.
pub async fn by_genre(conn: &mut SqliteConnection, genre_id: i64) -> Result<Vec<Artist>> {
    Ok(sqlx::query_as::<_, Artist>(
        r#"
        SELECT DISTINCT artists.id, artists.name
        FROM artists JOIN albums ON albums.artist_id = artists.id
        WHERE albums.genre_id = ?
        ORDER BY artists.name COLLATE NOCASE
        "#,
    )
    .bind(genre_id)
    .fetch_all(conn)
    .await?)
}

/// Artist ids whose name contains `text` (case-insensitive for ASCII).
pub async fn search(conn: &mut SqliteConnection, text: &str) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM artists WHERE name LIKE ? ESCAPE '\\' LIMIT 100")
            .bind(super::contains_pattern(text))
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
