//! Corpus loader: a directory of named text files becomes an ordered list of
//! documents, one per file, keyed by file stem.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::DataSettings;
use crate::error::{Error, Result};
use crate::types::{Document, DuplicatePolicy};

#[derive(Debug, Clone)]
pub struct CorpusLoader {
    extensions: Vec<String>,
    duplicate_policy: DuplicatePolicy,
}

impl Default for CorpusLoader {
    fn default() -> Self { Self::from_settings(&DataSettings::default()) }
}

impl CorpusLoader {
    pub fn new() -> Self { Self::default() }

    pub fn from_settings(settings: &DataSettings) -> Self {
        Self {
            extensions: settings.extensions.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect(),
            duplicate_policy: settings.duplicate_policy,
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn load(&self, root: &Path) -> Result<Vec<Document>> {
        let files = self.list_files(root)?;
        self.load_files(root, &files)
    }

    /// Like [`load`](Self::load) but only reads the first `limit` qualifying files.
    pub fn load_limited(&self, root: &Path, limit: usize) -> Result<Vec<Document>> {
        let mut files = self.list_files(root)?;
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited corpus to first files");
        }
        self.load_files(root, &files)
    }

    fn load_files(&self, root: &Path, files: &[PathBuf]) -> Result<Vec<Document>> {
        if files.is_empty() {
            info!(root = %root.display(), "no matching files, corpus is empty");
            return Ok(vec![]);
        }
        let mut slots: Vec<Option<Document>> = Vec::with_capacity(files.len());
        let mut by_id: HashMap<String, usize> = HashMap::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "loading {}/{}", file_index + 1, files.len());
            let Some(id) = extract_doc_id(file_path) else {
                warn!(file = %file_path.display(), "file name is not valid UTF-8, skipping");
                continue;
            };
            let content = read_file_content(file_path)?;
            if content.trim().is_empty() {
                warn!(file = %file_path.display(), "empty document, skipping");
                continue;
            }
            if let Some(&previous) = by_id.get(&id) {
                let first = slots[previous].as_ref().map(|d| PathBuf::from(&d.path)).unwrap_or_default();
                match self.duplicate_policy {
                    DuplicatePolicy::Reject => {
                        return Err(Error::DuplicateDocumentId { id, first, second: file_path.clone() });
                    }
                    DuplicatePolicy::LastWins => {
                        warn!(id = %id, replaced = %first.display(), by = %file_path.display(), "duplicate document id, last loaded wins");
                        slots[previous] = None;
                    }
                }
            }
            by_id.insert(id.clone(), slots.len());
            slots.push(Some(Document { id, path: file_path.to_string_lossy().to_string(), content }));
        }
        let docs: Vec<Document> = slots.into_iter().flatten().collect();
        info!(files = files.len(), documents = docs.len(), root = %root.display(), "loaded corpus");
        Ok(docs)
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let not_found = |reason: String| Error::CorpusNotFound { path: root.to_path_buf(), reason };
        let meta = fs::metadata(root).map_err(|e| not_found(e.to_string()))?;
        if !meta.is_dir() {
            return Err(not_found("not a directory".to_string()));
        }
        fs::read_dir(root).map_err(|e| not_found(e.to_string()))?;

        let mut matching = Vec::new();
        for entry in walkdir::WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable corpus entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() { continue; }
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
            if ext.is_some_and(|ext| self.extensions.contains(&ext)) {
                matching.push(path.to_path_buf());
            }
        }
        matching.sort();
        Ok(matching)
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    let bytes = fs::read(file_path).map_err(|source| Error::Io { path: file_path.to_path_buf(), source })?;
    String::from_utf8(bytes).map_err(|e| {
        Error::Encoding(format!(
            "{} is not valid UTF-8 (byte offset {})",
            file_path.display(),
            e.utf8_error().valid_up_to()
        ))
    })
}

fn extract_doc_id(file_path: &Path) -> Option<String> {
    file_path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}
