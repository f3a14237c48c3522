//! Test utilities and fixtures for songbook tests.
//!
//! Provides a throwaway catalogue database, quick row builders and a writer
//! for small tagged audio files the scanner can read.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_db, add_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let mut conn = pool.acquire().await.unwrap();
//!     let id = add_track(&mut conn, "/m/1.mp3", 1, 1, 1).await;
//!     // ... test logic
//! }
//! ```

use std::path::Path;

use lofty::config::WriteOptions;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::model::NewTrack;

/// Creates a temporary catalogue for testing.
///
/// The database lives in a temporary directory that is removed when the
/// returned `TempDir` is dropped. Keep it alive for the duration of the test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");

    let pool = crate::db::init_db(&db_path)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// A track row with sensible defaults: named after the file stem, 180 seconds.
pub fn new_track(path: &str, number: i64, artist_id: i64, album_id: i64) -> NewTrack {
    let name = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("Track {number}"));
    NewTrack {
        name,
        filepath: path.to_string(),
        length: 180,
        track_number: number,
        artist_id,
        album_id,
        mtime: 0,
    }
}

/// Inserts a track built by [`new_track`] and returns its id.
///
/// The artist and album ids are stored as given; create the rows first if the
/// test needs them to resolve.
pub async fn add_track(
    conn: &mut SqliteConnection,
    path: &str,
    number: i64,
    artist_id: i64,
    album_id: i64,
) -> i64 {
    crate::db::tracks::upsert(conn, &new_track(path, number, artist_id, album_id))
        .await
        .expect("Failed to insert track")
}

/// Tags written into a fixture file. `None` leaves the frame out.
#[derive(Debug, Clone, Default)]
pub struct FixtureTags<'a> {
    pub title: Option<&'a str>,
    pub artist: Option<&'a str>,
    pub album_artist: Option<&'a str>,
    pub album: Option<&'a str>,
    pub genre: Option<&'a str>,
    pub year: Option<u32>,
    pub track: Option<u32>,
}

/// Writes one second of silent 8 kHz mono PCM as a WAV file, no tags.
pub fn write_silent_wav(path: &Path) {
    const SAMPLE_RATE: u32 = 8_000;
    const BLOCK_ALIGN: u16 = 2;
    let data_len = SAMPLE_RATE * u32::from(BLOCK_ALIGN);

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    bytes.extend_from_slice(&(SAMPLE_RATE * u32::from(BLOCK_ALIGN)).to_le_bytes());
    bytes.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    std::fs::write(path, bytes).expect("Failed to write fixture wav");
}

/// Writes a silent WAV file carrying an ID3v2 tag.
pub fn write_tagged_wav(path: &Path, tags: &FixtureTags<'_>) {
    write_silent_wav(path);

    let mut tag = Tag::new(TagType::Id3v2);
    if let Some(title) = tags.title {
        tag.set_title(title.to_string());
    }
    if let Some(artist) = tags.artist {
        tag.set_artist(artist.to_string());
    }
    if let Some(album_artist) = tags.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.to_string());
    }
    if let Some(album) = tags.album {
        tag.set_album(album.to_string());
    }
    if let Some(genre) = tags.genre {
        tag.set_genre(genre.to_string());
    }
    if let Some(year) = tags.year {
        tag.set_year(year);
    }
    if let Some(track) = tags.track {
        tag.set_track(track);
    }

    tag.save_to_path(path, WriteOptions::default())
        .expect("Failed to tag fixture wav");
}

/// Shorthand for a fully tagged fixture.
pub fn write_song(path: &Path, title: &str, artist: &str, album: &str, genre: &str, track: u32) {
    write_tagged_wav(
        path,
        &FixtureTags {
            title: Some(title),
            artist: Some(artist),
            album: Some(album),
            genre: Some(genre),
            year: Some(2000),
            track: Some(track),
            ..Default::default()
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(crate::db::maintenance::is_empty(&mut conn).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_track() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let id = add_track(&mut conn, "/test/song.mp3", 4, 1, 1).await;
        assert!(id > 0);

        let track = crate::db::tracks::get(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(track.name, "song");
        assert_eq!(track.track_number, 4);
        assert_eq!(track.length, 180);
    }

    #[test]
    fn test_silent_wav_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/silence.wav");
        write_silent_wav(&path);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 16_000);
    }
}
