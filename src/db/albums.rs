//! Album accessors.
//!
//! Albums are looked up by (name, artist, genre). That triple is not a
//! database constraint, so callers that insert must serialize through one
//! writer (the scanner's transaction) to avoid duplicates.

use sqlx::SqliteConnection;

use crate::error::Result;
use crate::model::{Album, AlbumScope, ArtistKey, PartySource, TrackSummary};

/// Display name when an album id has no row.
pub const UNKNOWN_ALBUM: &str = "Unknown";
/// Artist line for compilation albums and misses.
pub const COMPILATION_LABEL: &str = "Compilation";

/// How many albums the popular pool holds.
const POPULAR_LIMIT: i64 = 100;

/// Insert an album with zero popularity and return its id.
pub async fn add(
    conn: &mut SqliteConnection,
    name: &str,
    artist: ArtistKey,
    genre_id: i64,
    year: i64,
    path: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO albums (name, artist_id, genre_id, year, path, popularity) VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(name)
    .bind(artist)
    .bind(genre_id)
    .bind(year)
    .bind(path)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Find an album by name, credited artist and genre.
pub async fn find(
    conn: &mut SqliteConnection,
    name: &str,
    artist: ArtistKey,
    genre_id: i64,
) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM albums WHERE name = ? AND artist_id = ? AND genre_id = ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .bind(artist)
    .bind(genre_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Find a compilation album by name and folder.
pub async fn find_compilation(
    conn: &mut SqliteConnection,
    name: &str,
    path: &str,
) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM albums WHERE name = ? AND path = ? AND artist_id = ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .bind(path)
    .bind(ArtistKey::Compilation)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Fetch a full album row.
pub async fn get(conn: &mut SqliteConnection, album_id: i64) -> Result<Option<Album>> {
    Ok(sqlx::query_as::<_, Album>(
        "SELECT id, name, artist_id, genre_id, year, path, popularity FROM albums WHERE id = ?",
    )
    .bind(album_id)
    .fetch_optional(conn)
    .await?)
}

pub async fn name(conn: &mut SqliteConnection, album_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM albums WHERE id = ?")
        .bind(album_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(name,)| name))
}

/// Album name for display; [`UNKNOWN_ALBUM`] on a miss.
pub async fn display_name(conn: &mut SqliteConnection, album_id: i64) -> Result<String> {
    Ok(name(conn, album_id)
        .await?
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()))
}

pub async fn artist(conn: &mut SqliteConnection, album_id: i64) -> Result<Option<ArtistKey>> {
    let row: Option<(ArtistKey,)> = sqlx::query_as("SELECT artist_id FROM albums WHERE id = ?")
        .bind(album_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(artist,)| artist))
}

/// Credited artist name, or [`COMPILATION_LABEL`] for compilations and misses.
pub async fn artist_name(conn: &mut SqliteConnection, album_id: i64) -> Result<String> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT artists.name FROM artists JOIN albums ON albums.artist_id = artists.id WHERE albums.id = ?",
    )
    .bind(album_id)
    .fetch_optional(conn)
    .await?;
    Ok(row
        .map(|(name,)| name)
        .unwrap_or_else(|| COMPILATION_LABEL.to_string()))
}

pub async fn genre_id(conn: &mut SqliteConnection, album_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT genre_id FROM albums WHERE id = ?")
        .bind(album_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

/// Release year; `None` when unknown or on a miss.
pub async fn year(conn: &mut SqliteConnection, album_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT year FROM albums WHERE id = ?")
        .bind(album_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(year,)| year).filter(|year| *year != 0))
}

pub async fn path(conn: &mut SqliteConnection, album_id: i64) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT path FROM albums WHERE id = ?")
        .bind(album_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(path,)| path))
}

pub async fn set_artist(
    conn: &mut SqliteConnection,
    album_id: i64,
    artist: ArtistKey,
) -> Result<()> {
    sqlx::query("UPDATE albums SET artist_id = ? WHERE id = ?")
        .bind(artist)
        .bind(album_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Add one completed play to an album.
///
/// The increment happens inside a single statement, so serialized callers
/// never lose an update. Returns the new counter, or `None` if the album does
/// not exist.
pub async fn increment_popularity(
    conn: &mut SqliteConnection,
    album_id: i64,
) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "UPDATE albums SET popularity = popularity + 1 WHERE id = ? RETURNING popularity",
    )
    .bind(album_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(popularity,)| popularity))
}

/// Played albums, most played first.
pub async fn populars(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT id FROM albums WHERE popularity > 0 ORDER BY popularity DESC, id LIMIT ?",
    )
    .bind(POPULAR_LIMIT)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Album ids eligible in party mode.
///
/// Popular albums come first when selected, followed by each genre's albums
/// in the order given. Each album appears once.
pub async fn party_ids(conn: &mut SqliteConnection, sources: &[PartySource]) -> Result<Vec<i64>> {
    let mut albums = Vec::new();
    if sources.contains(&PartySource::Popular) {
        albums = populars(&mut *conn).await?;
    }
    for source in sources {
        let PartySource::Genre(genre_id) = *source else {
            continue;
        };
        for album_id in genre_album_ids(&mut *conn, genre_id).await? {
            if !albums.contains(&album_id) {
                albums.push(album_id);
            }
        }
    }
    Ok(albums)
}

/// Every album of a genre, compilations included.
async fn genre_album_ids(conn: &mut SqliteConnection, genre_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT albums.id FROM albums
        LEFT JOIN artists ON artists.id = albums.artist_id
        WHERE albums.genre_id = ?
        ORDER BY artists.name COLLATE NOCASE, albums.year
        "#,
    )
    .bind(genre_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Number of tracks on an album (0 on a miss).
pub async fn track_count(conn: &mut SqliteConnection, album_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks WHERE album_id = ?")
        .bind(album_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Track ids of an album in track-number order.
pub async fn track_ids(conn: &mut SqliteConnection, album_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM tracks WHERE album_id = ? ORDER BY tracknumber, id")
            .bind(album_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Track listing of an album in track-number order.
pub async fn tracks(conn: &mut SqliteConnection, album_id: i64) -> Result<Vec<TrackSummary>> {
    Ok(sqlx::query_as::<_, TrackSummary>(
        "SELECT id, name, filepath, length FROM tracks WHERE album_id = ? ORDER BY tracknumber, id",
    )
    .bind(album_id)
    .fetch_all(conn)
    .await?)
}

/// Album ids covered by a scope.
pub async fn ids(conn: &mut SqliteConnection, scope: AlbumScope) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = match scope {
        AlbumScope::All => {
            sqlx::query_as(
                r#"
                SELECT albums.id FROM albums JOIN artists ON artists.id = albums.artist_id
                ORDER BY artists.name COLLATE NOCASE, albums.year, albums.id
                "#,
            )
            .fetch_all(conn)
            .await?
        }
        AlbumScope::Popular => return populars(conn).await,
        AlbumScope::Compilations => return compilations(conn, None).await,
        AlbumScope::Genre(genre_id) => {
            sqlx::query_as(
                r#"
                SELECT albums.id FROM albums JOIN artists ON artists.id = albums.artist_id
                WHERE albums.genre_id = ?
                ORDER BY artists.name COLLATE NOCASE, albums.year, albums.id
                "#,
            )
            .bind(genre_id)
            .fetch_all(conn)
            .await?
        }
        AlbumScope::Artist(artist_id) => {
            sqlx::query_as("SELECT id FROM albums WHERE artist_id = ? ORDER BY year, id")
                .bind(artist_id)
                .fetch_all(conn)
                .await?
        }
        AlbumScope::ArtistInGenre {
            artist_id,
            genre_id,
        } => {
            sqlx::query_as(
                "SELECT id FROM albums WHERE artist_id = ? AND genre_id = ? ORDER BY year, id",
            )
            .bind(artist_id)
            .bind(genre_id)
            .fetch_all(conn)
            .await?
        }
    };
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Compilation album ids, optionally restricted to one genre, by year.
pub async fn compilations(conn: &mut SqliteConnection, genre_id: Option<i64>) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = match genre_id {
        None => {
            sqlx::query_as("SELECT id FROM albums WHERE artist_id = ? ORDER BY year, id")
                .bind(ArtistKey::Compilation)
                .fetch_all(conn)
                .await?
        }
        Some(genre_id) => {
            sqlx::query_as(
                "SELECT id FROM albums WHERE genre_id = ? AND artist_id = ? ORDER BY year, id",
            )
            .bind(genre_id)
            .bind(ArtistKey::Compilation)
            .fetch_all(conn)
            .await?
        }
    };
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Every album in browsing order: by artist, then compilations.
pub async fn browse_order(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    let mut order = ids(&mut *conn, AlbumScope::All).await?;
    order.extend(compilations(conn, None).await?);
    Ok(order)
}

/// Albums whose name contains `text`, with their credited artist.
pub async fn search(conn: &mut SqliteConnection, text: &str) -> Result<Vec<(i64, ArtistKey)>> {
    Ok(
        sqlx::query_as("SELECT id, artist_id FROM albums WHERE name LIKE ? ESCAPE '\\' LIMIT 100")
            .bind(super::contains_pattern(text))
            .fetch_all(conn)
            .await?,
    )
}
