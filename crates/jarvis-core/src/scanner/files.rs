use glob::Pattern;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error};
use walkdir::{DirEntry, WalkDir};

use super::{Skip, SkipLog, SkipReason};
use crate::config::ScanFolderSet;
use crate::model::{bytes_to_mb, FileRecord, ScanKind, ScanThreshold};
use crate::progress::ProgressReporter;

const PROGRESS_EVERY: usize = 500;

/// Regular files strictly larger than the limit, walked folder by folder.
///
/// Folders are walked in parallel but results keep folder order, and entries
/// within a folder are visited in file-name order. Symbolic links are never
/// followed, so link cycles cannot stall the walk.
pub fn scan_files(
    folders: &ScanFolderSet,
    threshold: &ScanThreshold,
    ignore_globs: &[String],
    reporter: &dyn ProgressReporter,
) -> Vec<FileRecord> {
    let start = Instant::now();
    reporter.on_scan_start(threshold.kind());

    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let seen = AtomicUsize::new(0);
    let per_folder: Vec<(Vec<FileRecord>, SkipLog)> = folders
        .paths()
        .par_iter()
        .map(|root| {
            walk_folder(
                root,
                threshold.limit_mb(),
                &ignore_patterns,
                &seen,
                reporter,
            )
        })
        .collect();

    let mut skips = SkipLog::new(threshold.kind());
    let mut found = Vec::new();
    for (records, folder_skips) in per_folder {
        found.extend(records);
        skips.merge(folder_skips);
    }

    let duration = start.elapsed().as_secs_f64();
    let skipped = skips.finish();
    debug!(
        "File scan visited {} entries in {} folders ({} skipped) in {:.2}s, {} above {}MB",
        seen.load(Ordering::Relaxed),
        folders.len(),
        skipped,
        duration,
        found.len(),
        threshold.limit_mb(),
    );
    reporter.on_scan_complete(found.len(), duration);

    found
}

fn walk_folder(
    root: &Path,
    limit_mb: u64,
    ignore_patterns: &[Pattern],
    seen: &AtomicUsize,
    reporter: &dyn ProgressReporter,
) -> (Vec<FileRecord>, SkipLog) {
    let mut skips = SkipLog::new(ScanKind::Files);
    let mut found = Vec::new();

    if !root.is_dir() {
        skips.record(Skip::new(root.display().to_string(), SkipReason::Vanished));
        return (found, skips);
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry, ignore_patterns));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let subject = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                let reason = match err.io_error() {
                    Some(io_err) => SkipReason::from_io(io_err),
                    None => SkipReason::Unreadable(err.to_string()),
                };
                skips.record(Skip::new(subject, reason));
                continue;
            }
        };

        let count = seen.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PROGRESS_EVERY == 0 {
            reporter.on_scan_progress(count, &entry.path().to_string_lossy());
        }

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(record) = skips.keep(measure(&entry, limit_mb)).flatten() {
            found.push(record);
        }
    }

    (found, skips)
}

fn measure(entry: &DirEntry, limit_mb: u64) -> Result<Option<FileRecord>, Skip> {
    let metadata = entry.metadata().map_err(|err| {
        let reason = match err.io_error() {
            Some(io_err) => SkipReason::from_io(io_err),
            None => SkipReason::Unreadable(err.to_string()),
        };
        Skip::new(entry.path().display().to_string(), reason)
    })?;

    let size_mb = bytes_to_mb(metadata.len());
    if size_mb > limit_mb {
        Ok(Some(FileRecord {
            absolute_path: absolute(entry.path()),
            size_mb,
        }))
    } else {
        Ok(None)
    }
}

fn absolute(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn is_ignored(entry: &DirEntry, ignore_patterns: &[Pattern]) -> bool {
    ignore_patterns
        .iter()
        .any(|pattern| pattern.matches_path(entry.path()))
}
