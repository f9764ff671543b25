//! Plain-text rendering of search results.

use super::explain::ExpertiseMatch;

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Render the results as the text block shown to the user.
pub fn format_report(query: &str, matches: &[ExpertiseMatch]) -> String {
    let mut lines = vec![
        format!("Research Query: {}\n", query),
        "Matching Professors:\n".to_string(),
    ];

    for m in matches {
        let member = &m.member;
        lines.push(format!("Result {}:", m.rank));
        lines.push(format!("Name: {}", or_na(&member.name)));
        lines.push(format!("WashU Email Address: {}", or_na(&member.email)));
        lines.push(format!("School: {}", or_na(&member.school)));
        lines.push(format!("Department: {}", or_na(&member.department)));
        lines.push(format!("Title: {}", or_na(&member.title)));
        lines.push("-".repeat(40));
        lines.push("Summary:".to_string());
        lines.push(m.summary.clone());
        lines.push(format!("{}\n", "=".repeat(40)));
    }

    lines.join("\n")
}
