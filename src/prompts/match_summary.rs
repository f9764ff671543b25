//! Prompt for explaining why a faculty member matches a research query.

/// Characters of CV text included in the prompt
pub const CV_SNIPPET_CHARS: usize = 8290;

/// User prompt template
/// Placeholders: {query}, {name}, {snippet}
pub const MATCH_SUMMARY_TEMPLATE: &str = "Research Query: '{query}'.
Professor: {name}.
CV Snippet: {snippet}

Based on the research query and the attached CV above, please provide a short summary explaining why this professor was selected, highlighting how the CV content matches the research interests. Focus on the positives and the matching components.";

/// First `CV_SNIPPET_CHARS` characters of a CV
pub fn cv_snippet(cv: &str) -> &str {
    match cv.char_indices().nth(CV_SNIPPET_CHARS) {
        Some((end, _)) => &cv[..end],
        None => cv,
    }
}

/// Build the match summary prompt
pub fn build_match_prompt(query: &str, name: &str, cv: &str) -> String {
    MATCH_SUMMARY_TEMPLATE
        .replace("{query}", query)
        .replace("{name}", name)
        .replace("{snippet}", cv_snippet(cv))
}
