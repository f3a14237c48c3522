//! Library scanning and maintenance commands.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::unbounded_channel;

use super::{Cli, load_config, open_catalogue, print_json};
use crate::db::maintenance;
use crate::library::{ScanEvent, ScanReport, Scanner};

/// Scan folders into the catalogue
pub fn cmd_scan(rt: &Runtime, cli: &Cli, paths: &[PathBuf]) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let roots = if paths.is_empty() {
            load_config(cli).0.library.music_paths
        } else {
            paths.to_vec()
        };
        if roots.is_empty() {
            anyhow::bail!("no music folders configured; pass the folders to scan");
        }
        if !cli.json {
            for root in &roots {
                println!("Scanning directory: {}", root.display());
            }
        }

        let scanner = Scanner::new(pool);
        let (events_tx, mut events_rx) = unbounded_channel::<ScanEvent>();
        let task = scanner
            .start(roots, events_tx)
            .context("a scan is already running")?;

        let on_interrupt = scanner.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        // The channel closes when the scan task ends
        while let Some(event) = events_rx.recv().await {
            match event {
                ScanEvent::Progress { done, total } if !cli.json && done % 100 == 0 && done > 0 => {
                    print!("\rScanned {done}/{total} files...");
                    std::io::stdout().flush()?;
                }
                ScanEvent::Skipped { path, reason } => {
                    eprintln!("\nSkipped {}: {}", path.display(), reason);
                }
                _ => {}
            }
        }

        let report = task.join().await??;
        if cli.json {
            print_json(&report)
        } else {
            print_report(&report);
            Ok(())
        }
    })
}

fn print_report(report: &ScanReport) {
    println!("\nScan complete.");
    println!("  Imported:  {}", report.imported);
    println!("  Unchanged: {}", report.unchanged);
    println!("  Skipped:   {}", report.skipped);
    println!("  Removed:   {}", report.removed);
    if report.merged > 0 {
        println!("  Merged into compilations: {}", report.merged);
    }
    let cleaned = &report.cleaned;
    if cleaned.total() > 0 {
        println!(
            "  Cleaned:   {} albums, {} artists, {} genres",
            cleaned.albums, cleaned.artists, cleaned.genres
        );
    }
}

/// Remove orphaned albums, artists and genres
pub fn cmd_clean(rt: &Runtime, cli: &Cli) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut tx = pool.begin().await?;
        let merged = maintenance::merge_compilations(&mut tx).await?;
        let cleaned = maintenance::clean_orphans(&mut tx).await?;
        tx.commit().await?;

        if cli.json {
            return print_json(&cleaned);
        }
        if merged > 0 {
            println!("Merged {merged} albums into compilations");
        }
        println!(
            "Removed {} albums, {} artists, {} genres",
            cleaned.albums, cleaned.artists, cleaned.genres
        );
        Ok(())
    })
}

/// Delete every track, then the rows left without tracks
pub fn cmd_reset(rt: &Runtime, cli: &Cli) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_catalogue(cli).await?;
        let mut tx = pool.begin().await?;
        let removed = maintenance::reset(&mut tx).await?;
        let cleaned = maintenance::clean_orphans(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(target: "db", tracks = removed, "Catalogue reset");
        if cli.json {
            return print_json(&serde_json::json!({ "tracks": removed, "cleaned": cleaned }));
        }
        println!("Removed {removed} tracks and {} other rows", cleaned.total());
        Ok(())
    })
}
