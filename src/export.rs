//! CSV and console output for harvested publications.

use crate::error::Result;
use crate::profile::Publication;
use std::path::Path;
use tracing::info;

/// Save titles and citation counts with a `Title,Citations` header.
///
/// The header is written even when there are no publications.
pub fn save_citations_csv(path: &Path, publications: &[Publication]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["Title", "Citations"])?;

    for publication in publications {
        wtr.write_record([publication.title.as_str(), publication.citations.to_string().as_str()])?;
    }
    wtr.flush()?;

    info!(path = %path.display(), rows = publications.len(), "Saved citations CSV");
    Ok(())
}

/// Save every publication field.
pub fn save_detailed_csv(path: &Path, publications: &[Publication]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    for publication in publications {
        wtr.serialize(publication)?;
    }
    wtr.flush()?;

    info!(path = %path.display(), rows = publications.len(), "Saved detailed CSV");
    Ok(())
}

/// Console listing, one block per publication.
pub fn render_listing(publications: &[Publication]) -> String {
    publications
        .iter()
        .map(|p| format!("Title: {}\nCitations: {}\n", p.title, p.citations))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn publication(title: &str, citations: u32) -> Publication {
        Publication {
            title: title.to_string(),
            citations,
            year: "2021".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_citations_csv_format() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("scholar_data.csv");

        save_citations_csv(
            &path,
            &[publication("Plain", 12), publication("Comma, in title", 0)],
        )?;

        let content = std::fs::read_to_string(&path)?;
        assert_eq!(content, "Title,Citations\nPlain,12\n\"Comma, in title\",0\n");
        Ok(())
    }

    #[test]
    fn test_citations_csv_empty_keeps_header() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.csv");

        save_citations_csv(&path, &[])?;
        assert_eq!(std::fs::read_to_string(&path)?, "Title,Citations\n");
        Ok(())
    }

    #[test]
    fn test_detailed_csv_has_all_columns() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("detailed.csv");

        save_detailed_csv(&path, &[publication("Plain", 3)])?;
        let content = std::fs::read_to_string(&path)?;
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("title,authors,venue,year,citations,url"));
        assert_eq!(lines.next(), Some("Plain,,,2021,3,"));
        Ok(())
    }

    #[test]
    fn test_render_listing() {
        let text = render_listing(&[publication("A", 1), publication("B", 0)]);
        assert_eq!(text, "Title: A\nCitations: 1\n\nTitle: B\nCitations: 0\n");
    }
}
