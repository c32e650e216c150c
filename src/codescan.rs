use crate::patterns::{Language, PatternRegistry};
use crate::types::CodeFinding;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use walkdir::WalkDir;

/// Characters of context kept on each side of a match.
const SNIPPET_CONTEXT: usize = 60;
/// Hard cap on snippet length, in characters.
const SNIPPET_MAX_CHARS: usize = 200;

/// Scan one file for every pattern registered for `lang`.
///
/// Pure over its inputs apart from the file read. A file that cannot be read
/// is skipped silently; invalid UTF-8 is tolerated via lossy decoding so one
/// odd file never aborts a scan. Patterns match independently: multiple
/// patterns and multiple occurrences each emit their own finding.
pub fn scan_file(path: &Path, lang: Language, registry: &PatternRegistry) -> Vec<CodeFinding> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("skipping unreadable file {}: {e}", path.display());
            return Vec::new();
        }
    };
    let content = String::from_utf8_lossy(&bytes);

    let mut findings = Vec::new();
    for re in registry.patterns_for(lang) {
        for m in re.find_iter(&content) {
            findings.push(CodeFinding {
                file_path: path.display().to_string(),
                language: lang,
                pattern: re.as_str().to_string(),
                snippet: snippet(&content, m.start(), m.end()),
            });
        }
    }
    findings
}

/// Context window around a match: up to 60 chars each side, newlines
/// collapsed to spaces, truncated to 200 chars. Window edges are widened to
/// the nearest UTF-8 boundary so multi-byte content cannot split a char.
fn snippet(content: &str, start: usize, end: usize) -> String {
    let mut lo = start.saturating_sub(SNIPPET_CONTEXT);
    while !content.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + SNIPPET_CONTEXT).min(content.len());
    while !content.is_char_boundary(hi) {
        hi += 1;
    }
    content[lo..hi]
        .replace(['\n', '\r'], " ")
        .chars()
        .take(SNIPPET_MAX_CHARS)
        .collect()
}

/// Recursively enumerate files under `root` whose extension maps to a known
/// language. Unmapped extensions are skipped entirely; unreadable directory
/// entries are skipped silently. Order follows the directory walk.
fn enumerate_files(root: &Path, registry: &PatternRegistry) -> Vec<(PathBuf, Language)> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("skipping walk error under {}: {e}", root.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let lang = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| registry.language_for_extension(ext))?;
            Some((entry.into_path(), lang))
        })
        .collect()
}

/// Scan a source tree with a bounded pool of file workers.
///
/// Matching is CPU-bound, so each file runs under `spawn_blocking`. Results
/// are tagged with their enumeration index and sorted after the pool drains,
/// which keeps output deterministic for one filesystem snapshot.
pub async fn scan_dir(
    root: &Path,
    registry: Arc<PatternRegistry>,
    concurrency: usize,
) -> Result<Vec<CodeFinding>> {
    let files = enumerate_files(root, &registry);
    tracing::info!("scanning {} candidate files under {}", files.len(), root.display());

    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, 256)));
    let results: Arc<Mutex<Vec<(usize, Vec<CodeFinding>)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut set = JoinSet::new();

    for (idx, (path, lang)) in files.into_iter().enumerate() {
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore in scope");
        let registry = registry.clone();
        let results = results.clone();

        set.spawn(async move {
            let _permit = permit;
            let findings =
                tokio::task::spawn_blocking(move || scan_file(&path, lang, &registry)).await;
            if let Ok(findings) = findings {
                let mut guard = results.lock().await;
                guard.push((idx, findings));
            }
        });
    }

    while let Some(_res) = set.join_next().await {}

    let mut tagged = std::mem::take(&mut *results.lock().await);
    tagged.sort_by_key(|(idx, _)| *idx);
    Ok(tagged.into_iter().flat_map(|(_, f)| f).collect())
}
