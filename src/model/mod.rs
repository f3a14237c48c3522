//! Core data models for the music catalogue.
//!
//! Defines the stored entities ([`Artist`], [`Genre`], [`Album`], [`Track`])
//! and the tagged identifiers that replace integer sentinels:
//!
//! - [`ArtistKey`] - a real artist or the compilation ("various artists") marker
//! - [`PartySource`] - a genre or the popular-albums pool allowed in party mode
//! - [`AlbumScope`] - which albums a listing should cover
//!
//! # Database Schema
//!
//! - `artists` - artist names
//! - `genres` - genre names
//! - `albums` - albums with artist (or compilation marker), genre, year, folder and popularity
//! - `tracks` - audio files keyed by path

use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteTypeInfo, SqliteValueRef};
use sqlx::{Database, Decode, Encode, FromRow, Sqlite, Type};

/// Stored value of `albums.artist_id` for compilations.
const COMPILATION_RAW_ID: i64 = -1;

/// The artist an album is credited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtistKey {
    /// A real row in `artists`
    Artist(i64),
    /// Several artists share the album
    Compilation,
}

impl ArtistKey {
    /// The integer stored in the database.
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Artist(id) => id,
            Self::Compilation => COMPILATION_RAW_ID,
        }
    }

    /// Decode a stored integer.
    pub fn from_raw(raw: i64) -> Self {
        if raw == COMPILATION_RAW_ID {
            Self::Compilation
        } else {
            Self::Artist(raw)
        }
    }

    /// The real artist id, if any.
    pub fn artist_id(self) -> Option<i64> {
        match self {
            Self::Artist(id) => Some(id),
            Self::Compilation => None,
        }
    }

    pub fn is_compilation(self) -> bool {
        matches!(self, Self::Compilation)
    }
}

impl Type<Sqlite> for ArtistKey {
    fn type_info() -> SqliteTypeInfo {
        <i64 as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <i64 as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for ArtistKey {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <i64 as Encode<'q, Sqlite>>::encode_by_ref(&self.as_raw(), buf)
    }
}

impl<'r> Decode<'r, Sqlite> for ArtistKey {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <i64 as Decode<'r, Sqlite>>::decode(value)?;
        Ok(Self::from_raw(raw))
    }
}

/// A pool of albums allowed in party mode.
///
/// Serialized as `"popular"` or as the bare genre id, so a config file reads
/// `party_ids = ["popular", 3, 7]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "PartyToken", try_from = "PartyToken")]
pub enum PartySource {
    /// Albums that have been played at least once, most played first
    Popular,
    /// Every album of one genre
    Genre(i64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PartyToken {
    Id(i64),
    Name(String),
}

impl From<PartySource> for PartyToken {
    fn from(source: PartySource) -> Self {
        match source {
            PartySource::Popular => Self::Name("popular".to_string()),
            PartySource::Genre(id) => Self::Id(id),
        }
    }
}

impl TryFrom<PartyToken> for PartySource {
    type Error = String;

    fn try_from(token: PartyToken) -> Result<Self, Self::Error> {
        match token {
            PartyToken::Id(id) => Ok(Self::Genre(id)),
            PartyToken::Name(name) if name.eq_ignore_ascii_case("popular") => Ok(Self::Popular),
            PartyToken::Name(name) => Err(format!("unknown party source '{name}'")),
        }
    }
}

/// Which albums a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumScope {
    /// Every album credited to a real artist, by artist name
    All,
    /// Most played albums
    Popular,
    /// Albums credited to several artists
    Compilations,
    /// Albums of one genre, by artist name then year
    Genre(i64),
    /// Albums of one artist, by year
    Artist(i64),
    /// Albums of one artist within one genre, by year
    ArtistInGenre { artist_id: i64, genre_id: i64 },
}

/// An artist in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
}

/// A genre in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// An album in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Album {
    pub id: i64,
    pub name: String,
    /// Credited artist or the compilation marker
    #[sqlx(rename = "artist_id")]
    pub artist: ArtistKey,
    pub genre_id: i64,
    /// Release year, 0 when unknown
    pub year: i64,
    /// Folder holding the album's files
    pub path: String,
    /// Completed plays of any track of this album
    pub popularity: i64,
}

/// A track (audio file) in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Track {
    pub id: i64,
    pub name: String,
    /// Absolute file path (unique)
    pub filepath: String,
    /// Duration in seconds
    pub length: i64,
    #[sqlx(rename = "tracknumber")]
    pub track_number: i64,
    /// Performing artist
    pub artist_id: i64,
    pub album_id: i64,
    /// File modification time at last scan (Unix seconds)
    pub mtime: i64,
}

/// Fields needed to insert or refresh a track row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub name: String,
    pub filepath: String,
    pub length: i64,
    pub track_number: i64,
    pub artist_id: i64,
    pub album_id: i64,
    pub mtime: i64,
}

/// Short track listing row used by album views and the player.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TrackSummary {
    pub id: i64,
    pub name: String,
    pub filepath: String,
    pub length: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_key_raw_mapping() {
        assert_eq!(ArtistKey::Compilation.as_raw(), -1);
        assert_eq!(ArtistKey::from_raw(-1), ArtistKey::Compilation);
        assert_eq!(ArtistKey::from_raw(7), ArtistKey::Artist(7));
        assert_eq!(ArtistKey::Artist(7).artist_id(), Some(7));
        assert_eq!(ArtistKey::Compilation.artist_id(), None);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct PartyHolder {
        party_ids: Vec<PartySource>,
    }

    #[test]
    fn test_party_sources_in_toml() {
        let holder: PartyHolder = toml::from_str(r#"party_ids = ["popular", 3, 7]"#).unwrap();
        assert_eq!(
            holder.party_ids,
            vec![
                PartySource::Popular,
                PartySource::Genre(3),
                PartySource::Genre(7)
            ]
        );

        let text = toml::to_string(&holder).unwrap();
        assert!(text.contains("\"popular\""));
        let again: PartyHolder = toml::from_str(&text).unwrap();
        assert_eq!(again, holder);
    }

    #[test]
    fn test_unknown_party_source_rejected() {
        let parsed: Result<PartyHolder, _> = toml::from_str(r#"party_ids = ["loud"]"#);
        assert!(parsed.is_err());
    }
}
