//! Filesystem side of a library scan: finding audio files and checking
//! whether known files still exist.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use futures::stream::Stream;
use rayon::prelude::*;
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Extensions treated as audio, compared case-insensitively.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "oga", "opus", "wav", "m4a"];

/// Whether a path has an audio file extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Scans the given root directories recursively for audio files.
///
/// Unreadable directory entries are skipped. Returns a Stream of PathBufs;
/// dropping the stream stops the walk.
pub fn scan(roots: Vec<PathBuf>) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(100);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        for root in roots {
            for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file()
                    && is_audio_file(entry.path())
                    && tx.blocking_send(entry.path().to_path_buf()).is_err()
                {
                    // Receiver dropped
                    return;
                }
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}

/// Modification time in Unix seconds, or `None` if the file is unreadable.
pub fn mtime(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}

/// Paths from `paths` that no longer exist on disk.
///
/// Existence checks run in parallel; order of the result is not meaningful.
pub fn missing(paths: Vec<String>) -> Vec<String> {
    paths
        .into_par_iter()
        .filter(|p| !Path::new(p).exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::fs::File;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_scan_audio_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("song.mp3")).unwrap();
        File::create(root.join("music.flac")).unwrap();
        File::create(root.join("notes.txt")).unwrap(); // Should be ignored
        File::create(root.join("image.png")).unwrap(); // Should be ignored
        File::create(root.join("UPPERCASE.OGG")).unwrap(); // Should be found (case-insensitive)

        let subdir = root.join("subdir");
        std::fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("track.opus")).unwrap();
        File::create(subdir.join("ignore.doc")).unwrap(); // Should be ignored

        let paths: Vec<PathBuf> = scan(vec![root.to_path_buf()]).collect().await;
        assert_eq!(paths.len(), 4);

        let file_names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(|s| s.to_string()))
            .collect();

        assert!(file_names.contains(&"song.mp3".to_string()));
        assert!(file_names.contains(&"music.flac".to_string()));
        assert!(file_names.contains(&"track.opus".to_string()));
        assert!(file_names.contains(&"UPPERCASE.OGG".to_string()));
        assert!(!file_names.contains(&"notes.txt".to_string()));
    }

    #[tokio::test]
    async fn test_scan_several_roots_and_missing_root() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        File::create(first.path().join("a.wav")).unwrap();
        File::create(second.path().join("b.m4a")).unwrap();

        let roots = vec![
            first.path().to_path_buf(),
            PathBuf::from("/definitely/not/here"),
            second.path().to_path_buf(),
        ];
        let paths: Vec<PathBuf> = scan(roots).collect().await;
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("/m/a.Mp3")));
        assert!(is_audio_file(Path::new("x.oga")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("README")));
    }

    #[test]
    fn test_missing_and_mtime() {
        let dir = tempdir().unwrap();
        let here = dir.path().join("here.mp3");
        File::create(&here).unwrap();
        let gone = dir.path().join("gone.mp3");

        assert!(mtime(&here).unwrap() > 0);
        assert_eq!(mtime(&gone), None);

        let missing = missing(vec![
            here.display().to_string(),
            gone.display().to_string(),
        ]);
        assert_eq!(missing, vec![gone.display().to_string()]);
    }
}
