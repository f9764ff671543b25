//! In-memory embedding index over faculty CVs, persisted as JSON.

use super::directory::{FacultyDocument, FacultyMember};
use crate::error::Result;
use crate::llm::Embedder;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the index inside its directory
pub const INDEX_FILE: &str = "index.json";

/// One embedded CV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub member: FacultyMember,
    pub cv: String,
    pub vector: Vec<f32>,
}

/// A search result borrowed from the index
#[derive(Debug, Clone)]
pub struct SearchHit<'a> {
    pub entry: &'a IndexEntry,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertiseIndex {
    /// Embedding model the vectors came from
    pub model: String,
    /// RFC 3339 build timestamp
    pub built_at: String,
    pub entries: Vec<IndexEntry>,
}

fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

impl ExpertiseIndex {
    /// Embed every document.
    pub async fn build<E: Embedder + ?Sized>(
        documents: Vec<FacultyDocument>,
        embedder: &E,
    ) -> Result<Self> {
        info!(documents = documents.len(), model = embedder.model(), "Building expertise index");

        let texts: Vec<String> = documents.iter().map(|d| d.cv.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&texts).await?
        };

        let entries = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, vector)| IndexEntry {
                member: doc.member,
                cv: doc.cv,
                vector,
            })
            .collect();

        Ok(Self {
            model: embedder.model().to_string(),
            built_at: Utc::now().to_rfc3339(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write `index.json` into `dir`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = index_path(dir);
        std::fs::write(&path, serde_json::to_string(self)?)?;
        info!(path = %path.display(), entries = self.entries.len(), "Saved expertise index");
        Ok(())
    }

    /// Read `index.json` from `dir`. `Ok(None)` if there is none.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = index_path(dir);
        if !path.exists() {
            return Ok(None);
        }
        let index: Self = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        info!(path = %path.display(), entries = index.entries.len(), "Loaded expertise index");
        Ok(Some(index))
    }

    /// Load the index in `dir`, or build and save a new one.
    ///
    /// A saved index is reused only when it was built with the embedder's
    /// model and `rebuild` is false. `documents` is only called when building.
    pub async fn open_or_build<E, F>(
        dir: &Path,
        embedder: &E,
        documents: F,
        rebuild: bool,
    ) -> Result<Self>
    where
        E: Embedder + ?Sized,
        F: FnOnce() -> Result<Vec<FacultyDocument>>,
    {
        if !rebuild {
            if let Some(index) = Self::load(dir)? {
                if index.model == embedder.model() {
                    return Ok(index);
                }
                warn!(
                    saved = %index.model,
                    requested = embedder.model(),
                    "Saved index uses a different embedding model, rebuilding"
                );
            }
        }

        let index = Self::build(documents()?, embedder).await?;
        index.save(dir)?;
        Ok(index)
    }

    /// Top `k` entries by cosine similarity, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit<'_>> {
        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                entry,
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        // Stable sort keeps index order among equal scores
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        hits
    }
}

/// Cosine similarity; 0 for zero-length or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
