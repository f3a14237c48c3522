//! Catalogue listings, search and party picks.

use std::time::Duration;

use serde::Serialize;
use sqlx::SqliteConnection;
use tokio::runtime::Runtime;

use super::{Cli, open_catalogue, print_json};
use crate::db::{albums, artists, genres, tracks};
use crate::error::Result;
use crate::model::{AlbumScope, PartySource, Track};
use crate::player::{Player, format_duration};
use crate::search::{self, SearchKind};
use crate::task::CancellationToken;

/// One line of an album listing.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct AlbumRow {
    pub id: i64,
    pub name: String,
    pub artist: String,
    pub genre: String,
    pub year: Option<i64>,
    pub tracks: i64,
    pub popularity: i64,
}

#[derive(Debug, Serialize)]
struct TrackDetail {
    #[serde(flatten)]
    track: Track,
    artist: String,
    album: String,
    album_artist: String,
}

#[derive(Debug, Serialize)]
struct PartyPick {
    id: i64,
    title: String,
    artist: String,
}

/// List artists
pub fn cmd_artists(rt: &Runtime, cli: &Cli, genre: Option<i64>) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut conn = pool.acquire().await?;
        let artists = match genre {
            Some(genre_id) => artists::by_genre(&mut conn, genre_id).await?,
            None => artists::all(&mut conn).await?,
        };

        if cli.json {
            return print_json(&artists);
        }
        for artist in &artists {
            println!("{:>6}  {}", artist.id, artist.name);
        }
        Ok(())
    })
}

/// List genres
pub fn cmd_genres(rt: &Runtime, cli: &Cli) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut conn = pool.acquire().await?;
        let genres = genres::all(&mut conn).await?;

        if cli.json {
            return print_json(&genres);
        }
        for genre in &genres {
            println!("{:>6}  {}", genre.id, genre.name);
        }
        Ok(())
    })
}

/// List albums matching the filters
pub fn cmd_albums(
    rt: &Runtime,
    cli: &Cli,
    artist: Option<i64>,
    genre: Option<i64>,
    compilations: bool,
    popular: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut conn = pool.acquire().await?;
        let ids = album_ids(&mut conn, artist, genre, compilations, popular).await?;
        let rows = album_rows(&mut conn, &ids).await?;

        if cli.json {
            return print_json(&rows);
        }
        for row in &rows {
            let year = row.year.map(|y| format!(" ({y})")).unwrap_or_default();
            println!(
                "{:>6}  {} - {}{}  [{} tracks]",
                row.id, row.artist, row.name, year, row.tracks
            );
        }
        Ok(())
    })
}

/// Album ids selected by the `albums` filters.
pub(crate) async fn album_ids(
    conn: &mut SqliteConnection,
    artist: Option<i64>,
    genre: Option<i64>,
    compilations: bool,
    popular: bool,
) -> Result<Vec<i64>> {
    if compilations {
        return albums::compilations(conn, genre).await;
    }
    let scope = match (artist, genre) {
        _ if popular => AlbumScope::Popular,
        (Some(artist_id), Some(genre_id)) => AlbumScope::ArtistInGenre {
            artist_id,
            genre_id,
        },
        (Some(artist_id), None) => AlbumScope::Artist(artist_id),
        (None, Some(genre_id)) => AlbumScope::Genre(genre_id),
        (None, None) => return albums::browse_order(conn).await,
    };
    albums::ids(conn, scope).await
}

pub(crate) async fn album_rows(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<AlbumRow>> {
    let mut rows = Vec::with_capacity(ids.len());
    for &id in ids {
        let Some(album) = albums::get(&mut *conn, id).await? else {
            continue;
        };
        rows.push(AlbumRow {
            id,
            artist: artists::display_name(&mut *conn, album.artist).await?,
            genre: genres::display_name(&mut *conn, album.genre_id).await?,
            year: (album.year > 0).then_some(album.year),
            tracks: albums::track_count(&mut *conn, id).await?,
            popularity: album.popularity,
            name: album.name,
        });
    }
    Ok(rows)
}

/// List the tracks of an album
pub fn cmd_tracks(rt: &Runtime, cli: &Cli, album_id: i64) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut conn = pool.acquire().await?;
        let Some(name) = albums::name(&mut conn, album_id).await? else {
            anyhow::bail!("no album with id {album_id}");
        };
        let tracks = albums::tracks(&mut conn, album_id).await?;

        if cli.json {
            return print_json(&tracks);
        }
        let artist = albums::artist_name(&mut conn, album_id).await?;
        println!("{artist} - {name}");
        for (index, track) in tracks.iter().enumerate() {
            let length = Duration::from_secs(u64::try_from(track.length).unwrap_or(0));
            println!(
                "{:>3}. {:<40} {:>7}  (id {})",
                index + 1,
                track.name,
                format_duration(length),
                track.id
            );
        }
        Ok(())
    })
}

/// Show one track with its artist and album
pub fn cmd_track(rt: &Runtime, cli: &Cli, id: i64) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut conn = pool.acquire().await?;
        let Some(track) = tracks::get(&mut conn, id).await? else {
            anyhow::bail!("no track with id {id}");
        };
        let detail = TrackDetail {
            artist: tracks::artist_name(&mut conn, id)
                .await?
                .unwrap_or_else(|| artists::UNKNOWN_ARTIST.to_string()),
            album: albums::display_name(&mut conn, track.album_id).await?,
            album_artist: albums::artist_name(&mut conn, track.album_id).await?,
            track,
        };

        if cli.json {
            return print_json(&detail);
        }
        let length = Duration::from_secs(u64::try_from(detail.track.length).unwrap_or(0));
        println!("Title:  {}", detail.track.name);
        println!("Artist: {}", detail.artist);
        println!("Album:  {} ({})", detail.album, detail.album_artist);
        println!("Track:  {}", detail.track.track_number);
        println!("Length: {}", format_duration(length));
        println!("File:   {}", detail.track.filepath);
        Ok(())
    })
}

/// Search the catalogue
pub fn cmd_search(rt: &Runtime, cli: &Cli, query: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut conn = pool.acquire().await?;
        let items = search::find(&mut conn, query, &CancellationToken::new()).await?;

        if cli.json {
            return print_json(&items);
        }
        if items.is_empty() {
            println!("Nothing matches \"{query}\"");
        }
        for item in &items {
            match item.kind {
                SearchKind::Album => println!(
                    "album {:>6}  {} - {} [{} tracks]",
                    item.id,
                    item.artist,
                    item.title,
                    item.count.unwrap_or(0)
                ),
                SearchKind::Track => {
                    println!("track {:>6}  {} - {}", item.id, item.artist, item.title)
                }
            }
        }
        Ok(())
    })
}

/// Pick tracks the way party mode does
pub fn cmd_party(
    rt: &Runtime,
    cli: &Cli,
    genres: &[i64],
    popular: bool,
    count: usize,
) -> anyhow::Result<()> {
    let sources = party_sources(genres, popular);
    if sources.is_empty() {
        anyhow::bail!("choose --popular or at least one --genre");
    }

    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let picks = party_picks(&pool, sources, count).await?;

        let mut conn = pool.acquire().await?;
        let mut rows = Vec::with_capacity(picks.len());
        for id in picks {
            let title = tracks::name(&mut conn, id).await?.unwrap_or_default();
            let artist = tracks::artist_name(&mut conn, id)
                .await?
                .unwrap_or_else(|| artists::UNKNOWN_ARTIST.to_string());
            rows.push(PartyPick { id, title, artist });
        }

        if cli.json {
            return print_json(&rows);
        }
        if rows.is_empty() {
            println!("No tracks in the selected party sources");
        }
        for row in &rows {
            println!("{:>6}  {} - {}", row.id, row.artist, row.title);
        }
        Ok(())
    })
}

fn party_sources(genres: &[i64], popular: bool) -> Vec<PartySource> {
    let mut sources: Vec<PartySource> = genres.iter().map(|&id| PartySource::Genre(id)).collect();
    if popular {
        sources.insert(0, PartySource::Popular);
    }
    sources
}

/// Draw `count` tracks through a silent party-mode player.
///
/// Stops early when the pool is empty.
pub(crate) async fn party_picks(
    pool: &sqlx::SqlitePool,
    sources: Vec<PartySource>,
    count: usize,
) -> Result<Vec<i64>> {
    let mut player = Player::silent(pool.clone());
    player.set_party_ids(sources);
    player.set_party(true);

    let mut picks = Vec::with_capacity(count);
    for _ in 0..count {
        match player.next().await? {
            Some(id) => picks.push(id),
            None => break,
        }
    }
    Ok(picks)
}
