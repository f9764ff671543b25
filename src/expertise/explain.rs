//! LLM explanations for search hits.

use super::directory::FacultyMember;
use super::index::SearchHit;
use crate::llm::{ChatModel, TokenUsage};
use crate::prompts::build_match_prompt;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// Maximum concurrent explanation requests
const MAX_CONCURRENT_REQUESTS: usize = 3;

/// An explained search result
#[derive(Debug, Clone)]
pub struct ExpertiseMatch {
    /// 1-based position in the result list
    pub rank: usize,
    pub member: FacultyMember,
    pub score: f32,
    pub summary: String,
}

/// Ask the model why each hit matches `query`.
///
/// Results keep the order of `hits`. A failed request never fails the
/// search; its summary says the explanation is unavailable.
pub async fn explain_matches<C: ChatModel + ?Sized>(
    chat: &C,
    query: &str,
    hits: &[SearchHit<'_>],
) -> Vec<ExpertiseMatch> {
    let mut usage = TokenUsage::default();

    let results: Vec<(ExpertiseMatch, TokenUsage)> = stream::iter(hits.iter().enumerate())
        .map(|(idx, hit)| async move {
            let member = &hit.entry.member;
            let prompt = build_match_prompt(query, &member.name, &hit.entry.cv);

            debug!(rank = idx + 1, name = %member.name, "Requesting match summary");
            let (summary, usage) = match chat.complete(&prompt).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(name = %member.name, error = %e, "Failed to summarize match");
                    (format!("Summary unavailable: {}", e), TokenUsage::default())
                }
            };

            (
                ExpertiseMatch {
                    rank: idx + 1,
                    member: member.clone(),
                    score: hit.score,
                    summary,
                },
                usage,
            )
        })
        .buffered(MAX_CONCURRENT_REQUESTS)
        .collect()
        .await;

    let matches = results
        .into_iter()
        .map(|(matched, request_usage)| {
            usage.add(&request_usage);
            matched
        })
        .collect();

    info!(
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        "Match summaries complete"
    );
    matches
}
