//! Track accessors.
//!
//! Tracks are keyed by file path: scanning the same file again refreshes the
//! existing row instead of adding a new one.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::error::Result;
use crate::model::{NewTrack, Track};

/// Insert or update a track row keyed by file path.
///
/// Returns the id of the inserted or refreshed row.
pub async fn upsert(conn: &mut SqliteConnection, track: &NewTrack) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tracks (name, filepath, length, tracknumber, artist_id, album_id, mtime)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(filepath) DO UPDATE SET
            name = excluded.name,
            length = excluded.length,
            tracknumber = excluded.tracknumber,
            artist_id = excluded.artist_id,
            album_id = excluded.album_id,
            mtime = excluded.mtime
        RETURNING id
        "#,
    )
    .bind(&track.name)
    .bind(&track.filepath)
    .bind(track.length)
    .bind(track.track_number)
    .bind(track.artist_id)
    .bind(track.album_id)
    .bind(track.mtime)
    .fetch_one(conn)
    .await?;

    Ok(row.0)
}

/// Get a track by id.
pub async fn get(conn: &mut SqliteConnection, track_id: i64) -> Result<Option<Track>> {
    Ok(sqlx::query_as::<_, Track>(
        r#"
        SELECT id, name, filepath, length, tracknumber, artist_id, album_id, mtime
        FROM tracks WHERE id = ?
        "#,
    )
    .bind(track_id)
    .fetch_optional(conn)
    .await?)
}

pub async fn album_id(conn: &mut SqliteConnection, track_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT album_id FROM tracks WHERE id = ?")
        .bind(track_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

/// Name of the performing artist.
pub async fn artist_name(conn: &mut SqliteConnection, track_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT artists.name FROM artists JOIN tracks ON tracks.artist_id = artists.id WHERE tracks.id = ?",
    )
    .bind(track_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(name,)| name))
}

pub async fn filepath(conn: &mut SqliteConnection, track_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT filepath FROM tracks WHERE id = ?")
        .bind(track_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(path,)| path))
}

pub async fn name(conn: &mut SqliteConnection, track_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM tracks WHERE id = ?")
        .bind(track_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(name,)| name))
}

/// Length in seconds, 0 on a miss.
pub async fn length(conn: &mut SqliteConnection, track_id: i64) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT length FROM tracks WHERE id = ?")
        .bind(track_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(length,)| length).unwrap_or(0))
}

/// Every track id.
pub async fn all_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM tracks ORDER BY id")
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Every stored file path with the modification time recorded at scan.
pub async fn known_files(conn: &mut SqliteConnection) -> Result<Vec<(String, i64)>> {
    Ok(sqlx::query_as("SELECT filepath, mtime FROM tracks")
        .fetch_all(conn)
        .await?)
}

/// Delete the track stored for a file path. Returns whether a row went away.
pub async fn remove_by_path(conn: &mut SqliteConnection, path: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tracks WHERE filepath = ?")
        .bind(path)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Tracks whose name contains `text`.
pub async fn search(conn: &mut SqliteConnection, text: &str) -> Result<Vec<(i64, String)>> {
    Ok(
        sqlx::query_as("SELECT id, name FROM tracks WHERE name LIKE ? ESCAPE '\\' LIMIT 100")
            .bind(super::contains_pattern(text))
            .fetch_all(conn)
            .await?,
    )
}

/// Tracks an artist performs on albums credited to someone else.
pub async fn guest_appearances(
    conn: &mut SqliteConnection,
    artist_id: i64,
) -> Result<Vec<(i64, String)>> {
    Ok(sqlx::query_as(
        r#"
        SELECT tracks.id, tracks.name FROM tracks JOIN albums ON albums.id = tracks.album_id
        WHERE tracks.artist_id = ? AND albums.artist_id != tracks.artist_id
        ORDER BY tracks.name COLLATE NOCASE
        "#,
    )
    .bind(artist_id)
    .fetch_all(conn)
    .await?)
}

/// Track ids of a set of albums in one query, ordered by album then track
/// number.
pub async fn ids_for_albums(conn: &mut SqliteConnection, album_ids: &[i64]) -> Result<Vec<i64>> {
    if album_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM tracks WHERE album_id IN (");
    let mut list = query.separated(", ");
    for album_id in album_ids {
        list.push_bind(*album_id);
    }
    list.push_unseparated(") ORDER BY album_id, tracknumber, id");

    let rows: Vec<(i64,)> = query.build_query_as().fetch_all(conn).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
