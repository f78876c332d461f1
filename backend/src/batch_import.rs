//! Import every XML document below a directory.
//!
//! Documents are imported on a small pool of scoped worker threads. Each
//! document gets its own tree and context, so a failed document never
//! affects the others.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::app_settings::ImportOptions;
use crate::encoding::read_xml_file;
use crate::importer::import_xml;
use crate::logger::{format_duration, info, warn};
use crate::text_model::ImportedWork;

#[derive(Debug, Default)]
pub struct BatchImportReport {
    /// Successful imports, sorted by path.
    pub imported: Vec<(PathBuf, ImportedWork)>,
    /// Failed documents with the error message, sorted by path.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchImportReport {
    pub fn total(&self) -> usize {
        self.imported.len() + self.failed.len()
    }
}

/// Read and import one document.
pub fn import_file(path: &Path, options: &ImportOptions) -> Result<ImportedWork> {
    let xml = read_xml_file(path)?;
    let work = import_xml(&xml, options).with_context(|| format!("Failed to import {}", path.display()))?;
    Ok(work)
}

/// The `*.xml` files below `dir`, sorted.
pub fn find_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        let is_xml = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if entry.file_type().is_file() && is_xml {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Import the documents below `dir` with `workers` threads (at least one).
pub fn import_directory(dir: &Path, options: &ImportOptions, workers: usize) -> Result<BatchImportReport> {
    let start_time = Instant::now();
    let paths = find_documents(dir)?;
    info(&format!("Found {} documents in {}", paths.len(), dir.display()));

    let queue = Mutex::new(paths.into_iter());
    let report = Mutex::new(BatchImportReport::default());

    let workers = workers.max(1);
    thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| {
                loop {
                    let next = queue.lock().next();
                    let Some(path) = next else {
                        break;
                    };
                    match import_file(&path, options) {
                        Ok(work) => report.lock().imported.push((path, work)),
                        Err(e) => {
                            warn(&format!("{}: {:#}", path.display(), e));
                            report.lock().failed.push((path, format!("{:#}", e)));
                        }
                    }
                }
            });
        }
    });

    let mut report = report.into_inner();
    report.imported.sort_by(|a, b| a.0.cmp(&b.0));
    report.failed.sort_by(|a, b| a.0.cmp(&b.0));

    info(&format!(
        "Imported {} of {} documents in {}",
        report.imported.len(),
        report.total(),
        format_duration(start_time.elapsed())
    ));

    Ok(report)
}
