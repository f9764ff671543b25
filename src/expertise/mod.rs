//! Faculty expertise search.
//!
//! Embeds every faculty CV once, keeps the vectors in a small on-disk index,
//! and answers research-interest queries with the closest CVs plus a short
//! LLM-written explanation per match.
//!
//! ```text
//! Data.csv + CV.json -> directory -> index (embed, persist)
//! query -> embed -> index.search(k) -> explain (LLM) -> report
//! ```

pub mod directory;
pub mod explain;
pub mod index;
pub mod report;

pub use directory::{load_directory, FacultyDocument, FacultyMember};
pub use explain::{explain_matches, ExpertiseMatch};
pub use index::{ExpertiseIndex, IndexEntry, SearchHit};
pub use report::format_report;

use crate::error::{CitationsError, Result};
use crate::llm::{ChatModel, Embedder};
use tracing::info;

/// Number of matches returned by default
pub const DEFAULT_TOP_K: usize = 3;

/// Run one query against an index and explain each match.
pub async fn search<E, C>(
    index: &ExpertiseIndex,
    embedder: &E,
    chat: &C,
    query: &str,
    k: usize,
) -> Result<Vec<ExpertiseMatch>>
where
    E: Embedder + ?Sized,
    C: ChatModel + ?Sized,
{
    let query = query.trim();
    if query.is_empty() {
        return Err(CitationsError::Validation(
            "Please enter a search query.".to_string(),
        ));
    }

    let query_vector = embedder
        .embed(&[query.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CitationsError::Parse("No embedding returned for query".to_string()))?;

    let hits = index.search(&query_vector, k);
    info!(query, hits = hits.len(), "Expertise search");

    Ok(explain_matches(chat, query, &hits).await)
}
