//! Whole-catalogue passes: compilation merge, orphan cleanup, reset.
//!
//! These run at the end of a scan, inside the scan's transaction. None of
//! them commits on its own.

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::Result;
use crate::model::ArtistKey;

/// Rows removed by [`clean_orphans`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub albums: u64,
    pub artists: u64,
    pub genres: u64,
}

impl CleanReport {
    pub fn total(&self) -> u64 {
        self.albums + self.artists + self.genres
    }
}

/// True when the catalogue holds no tracks.
pub async fn is_empty(conn: &mut SqliteConnection) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
        .fetch_one(conn)
        .await?;
    Ok(count == 0)
}

/// Forget every track. Albums, artists and genres go on the next cleanup.
pub async fn reset(conn: &mut SqliteConnection) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tracks").execute(conn).await?;
    Ok(result.rows_affected())
}

/// Delete rows nothing refers to any more.
///
/// Order matters: albums without tracks go first, then artists no album or
/// track refers to, then genres without albums. A row still referenced by a
/// track (directly or through its album) is never removed.
pub async fn clean_orphans(conn: &mut SqliteConnection) -> Result<CleanReport> {
    let albums = sqlx::query(
        "DELETE FROM albums WHERE NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.album_id = albums.id)",
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let artists = sqlx::query(
        r#"
        DELETE FROM artists
        WHERE NOT EXISTS (SELECT 1 FROM albums WHERE albums.artist_id = artists.id)
          AND NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.artist_id = artists.id)
        "#,
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let genres = sqlx::query(
        "DELETE FROM genres WHERE NOT EXISTS (SELECT 1 FROM albums WHERE albums.genre_id = genres.id)",
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let report = CleanReport {
        albums,
        artists,
        genres,
    };
    if report.total() > 0 {
        tracing::debug!(target: "db", ?report, "Removed orphaned rows");
    }
    Ok(report)
}

/// Fold albums that share a name and folder across several artists into one
/// compilation.
///
/// The surviving row is an existing compilation if the group has one, else
/// the oldest row. Its tracks absorb the others' and the duplicates are
/// deleted. Running it again with no such groups left changes nothing.
///
/// Returns how many album rows were folded away.
pub async fn merge_compilations(conn: &mut SqliteConnection) -> Result<u64> {
    let groups: Vec<(String, String)> = sqlx::query_as(
        "SELECT name, path FROM albums GROUP BY name, path HAVING COUNT(DISTINCT artist_id) > 1",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut merged = 0;
    for (name, path) in groups {
        let members: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM albums WHERE name = ? AND path = ? ORDER BY (artist_id = ?) DESC, id",
        )
        .bind(&name)
        .bind(&path)
        .bind(ArtistKey::Compilation)
        .fetch_all(&mut *conn)
        .await?;

        let mut members = members.into_iter().map(|(id,)| id);
        let Some(survivor) = members.next() else {
            continue;
        };

        crate::db::albums::set_artist(&mut *conn, survivor, ArtistKey::Compilation).await?;

        for duplicate in members {
            sqlx::query("UPDATE tracks SET album_id = ? WHERE album_id = ?")
                .bind(survivor)
                .bind(duplicate)
                .execute(&mut *conn)
                .await?;
            sqlx::query("DELETE FROM albums WHERE id = ?")
                .bind(duplicate)
                .execute(&mut *conn)
                .await?;
            merged += 1;
        }

        tracing::debug!(target: "db", album = %name, path = %path, survivor, "Merged compilation");
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{albums, artists, genres, tracks};
    use crate::model::Album;
    use crate::test_utils::{add_track, temp_db};

    async fn all_albums(conn: &mut SqliteConnection) -> Vec<Album> {
        sqlx::query_as::<_, Album>(
            "SELECT id, name, artist_id, genre_id, year, path, popularity FROM albums ORDER BY id",
        )
        .fetch_all(conn)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_reset_and_is_empty() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(is_empty(&mut conn).await.unwrap());

        add_track(&mut conn, "/m/1.mp3", 1, 1, 1).await;
        assert!(!is_empty(&mut conn).await.unwrap());

        assert_eq!(reset(&mut conn).await.unwrap(), 1);
        assert!(is_empty(&mut conn).await.unwrap());
    }

    #[tokio::test]
    async fn test_compilation_merge() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let a = artists::add(&mut conn, "A").await.unwrap();
        let b = artists::add(&mut conn, "B").await.unwrap();
        let genre = genres::add(&mut conn, "Pop").await.unwrap();

        let first = albums::add(&mut conn, "Hits", ArtistKey::Artist(a), genre, 2001, "/m/hits")
            .await
            .unwrap();
        let second = albums::add(&mut conn, "Hits", ArtistKey::Artist(b), genre, 2001, "/m/hits")
            .await
            .unwrap();
        // Same name elsewhere is a different album
        let solo = albums::add(&mut conn, "Hits", ArtistKey::Artist(a), genre, 1999, "/m/solo")
            .await
            .unwrap();
        let t1 = add_track(&mut conn, "/m/hits/1.mp3", 1, a, first).await;
        let t2 = add_track(&mut conn, "/m/hits/2.mp3", 2, b, second).await;

        assert_eq!(merge_compilations(&mut conn).await.unwrap(), 1);

        let rows = all_albums(&mut conn).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first);
        assert_eq!(rows[0].artist, ArtistKey::Compilation);
        assert_eq!(rows[1].id, solo);
        assert_eq!(rows[1].artist, ArtistKey::Artist(a));

        assert_eq!(tracks::album_id(&mut conn, t1).await.unwrap(), Some(first));
        assert_eq!(tracks::album_id(&mut conn, t2).await.unwrap(), Some(first));
        // Track performers are untouched
        assert_eq!(tracks::get(&mut conn, t2).await.unwrap().unwrap().artist_id, b);
    }

    #[tokio::test]
    async fn test_compilation_merge_is_idempotent() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let a = artists::add(&mut conn, "A").await.unwrap();
        let b = artists::add(&mut conn, "B").await.unwrap();
        let c = artists::add(&mut conn, "C").await.unwrap();
        let genre = genres::add(&mut conn, "Pop").await.unwrap();
        for (artist, n) in [(a, 1), (b, 2), (c, 3)] {
            let album = albums::add(&mut conn, "Mix", ArtistKey::Artist(artist), genre, 0, "/mix")
                .await
                .unwrap();
            add_track(&mut conn, &format!("/mix/{n}.mp3"), n, artist, album).await;
        }

        assert_eq!(merge_compilations(&mut conn).await.unwrap(), 2);
        let once = all_albums(&mut conn).await;

        assert_eq!(merge_compilations(&mut conn).await.unwrap(), 0);
        let twice = all_albums(&mut conn).await;

        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
    }

    #[tokio::test]
    async fn test_rescanned_member_folds_into_existing_compilation() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let a = artists::add(&mut conn, "A").await.unwrap();
        let genre = genres::add(&mut conn, "Pop").await.unwrap();

        let newer = albums::add(&mut conn, "Mix", ArtistKey::Artist(a), genre, 0, "/mix")
            .await
            .unwrap();
        let compilation = albums::add(&mut conn, "Mix", ArtistKey::Compilation, genre, 0, "/mix")
            .await
            .unwrap();
        let track = add_track(&mut conn, "/mix/9.mp3", 9, a, newer).await;

        assert_eq!(merge_compilations(&mut conn).await.unwrap(), 1);
        assert_eq!(tracks::album_id(&mut conn, track).await.unwrap(), Some(compilation));
        assert_eq!(albums::get(&mut conn, newer).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clean_keeps_referenced_rows() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let host = artists::add(&mut conn, "Host").await.unwrap();
        let guest = artists::add(&mut conn, "Guest").await.unwrap();
        let lonely = artists::add(&mut conn, "Lonely").await.unwrap();
        let rock = genres::add(&mut conn, "Rock").await.unwrap();
        let unused = genres::add(&mut conn, "Unused").await.unwrap();

        let kept = albums::add(&mut conn, "Kept", ArtistKey::Artist(host), rock, 0, "/k")
            .await
            .unwrap();
        let empty = albums::add(&mut conn, "Empty", ArtistKey::Artist(lonely), unused, 0, "/e")
            .await
            .unwrap();
        add_track(&mut conn, "/k/1.mp3", 1, guest, kept).await;

        let report = clean_orphans(&mut conn).await.unwrap();
        assert_eq!(
            report,
            CleanReport {
                albums: 1,
                artists: 1,
                genres: 1
            }
        );

        assert!(albums::get(&mut conn, kept).await.unwrap().is_some());
        assert!(albums::get(&mut conn, empty).await.unwrap().is_none());
        // Guest only performs a track, and is still referenced
        assert!(artists::name(&mut conn, ArtistKey::Artist(guest)).await.unwrap().is_some());
        assert!(artists::name(&mut conn, ArtistKey::Artist(host)).await.unwrap().is_some());
        assert!(artists::name(&mut conn, ArtistKey::Artist(lonely)).await.unwrap().is_none());
        assert!(genres::name(&mut conn, rock).await.unwrap().is_some());
        assert!(genres::name(&mut conn, unused).await.unwrap().is_none());

        // Nothing left to clean
        assert_eq!(clean_orphans(&mut conn).await.unwrap().total(), 0);
    }
}
