//! Audio file tag reading.
//!
//! Uses the lofty crate for format-independent metadata access across MP3,
//! FLAC, Ogg, Opus, M4A and WAV files.
//!
//! A file lofty cannot parse, or one with no tag at all, is reported as
//! [`Error::Metadata`]; the scanner skips it. Individual missing fields fall
//! back to the `Unknown ...` names so a partially tagged file still lands in
//! the catalogue.

use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};

use crate::db::{albums::UNKNOWN_ALBUM, artists::UNKNOWN_ARTIST, genres::UNKNOWN_GENRE};
use crate::error::{Error, Result};

/// Tags read from one audio file, with fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    /// Performing artist
    pub artist: String,
    /// Album artist tag, when present
    pub album_artist: Option<String>,
    pub album: String,
    pub genre: String,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    /// Duration in whole seconds
    pub duration: u64,
}

impl TrackTags {
    /// Artist the album is credited to: the album artist tag, else the performer.
    pub fn album_credit(&self) -> &str {
        self.album_artist.as_deref().unwrap_or(&self.artist)
    }
}

/// Read the tags of one file.
pub fn read(path: &Path) -> Result<TrackTags> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, e.to_string()))?
        .read()
        .map_err(|e| Error::metadata(path, e.to_string()))?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .ok_or_else(|| Error::metadata(path, "no tags"))?;

    let title = text(tag.title().as_deref()).unwrap_or_else(|| file_stem(path));
    let artist = text(tag.artist().as_deref()).unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let album_artist = text(tag.get_string(&ItemKey::AlbumArtist));
    let album = text(tag.album().as_deref()).unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
    let genre = text(tag.genre().as_deref()).unwrap_or_else(|| UNKNOWN_GENRE.to_string());

    Ok(TrackTags {
        title,
        artist,
        album_artist,
        album,
        genre,
        year: year(tag),
        track_number: tag.track(),
        duration: tagged_file.properties().duration().as_secs(),
    })
}

/// Trimmed, non-empty tag text.
fn text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn year(tag: &Tag) -> Option<u32> {
    tag.year().filter(|y| *y > 0)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
