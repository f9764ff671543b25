//! Faculty directory: metadata CSV joined with extracted CV text.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Directory CSV row. Column names carry the trailing colons of the
/// survey export they come from.
#[derive(Debug, Deserialize)]
struct FacultyRow {
    #[serde(rename = "First Name:", default)]
    first_name: String,
    #[serde(rename = "Last Name:", default)]
    last_name: String,
    #[serde(rename = "WashU Email Address:", default)]
    email: String,
    #[serde(rename = "School:", default)]
    school: String,
    #[serde(rename = "Department:", default)]
    department: String,
    #[serde(rename = "Title:", default)]
    title: String,
}

/// Faculty metadata shown with every match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacultyMember {
    pub name: String,
    pub email: String,
    pub school: String,
    pub department: String,
    pub title: String,
}

impl FacultyMember {
    /// Key of this member's CV in the CV map
    pub fn cv_key(&self) -> String {
        format!("{} CV.pdf", self.name)
    }
}

impl From<FacultyRow> for FacultyMember {
    fn from(row: FacultyRow) -> Self {
        Self {
            name: format!("{} {}", row.first_name, row.last_name),
            email: row.email,
            school: row.school,
            department: row.department,
            title: row.title,
        }
    }
}

/// A member together with their CV text
#[derive(Debug, Clone, PartialEq)]
pub struct FacultyDocument {
    pub member: FacultyMember,
    pub cv: String,
}

/// Read directory rows from CSV data.
pub fn read_members<R: std::io::Read>(reader: R) -> Result<Vec<FacultyMember>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut members = Vec::new();
    for row in rdr.deserialize::<FacultyRow>() {
        members.push(FacultyMember::from(row?));
    }
    Ok(members)
}

/// Attach CVs to members, dropping members without CV text.
pub fn join_documents(
    members: Vec<FacultyMember>,
    cvs: &HashMap<String, String>,
) -> Vec<FacultyDocument> {
    members
        .into_iter()
        .filter_map(|member| {
            let cv = cvs.get(&member.cv_key()).cloned().unwrap_or_default();
            if cv.trim().is_empty() {
                debug!(name = %member.name, "No CV text, skipping");
                return None;
            }
            Some(FacultyDocument { member, cv })
        })
        .collect()
}

/// Load the directory CSV and CV JSON and join them.
pub fn load_directory(faculty_csv: &Path, cv_json: &Path) -> Result<Vec<FacultyDocument>> {
    let members = read_members(std::fs::File::open(faculty_csv)?)?;
    let cvs: HashMap<String, String> = serde_json::from_str(&std::fs::read_to_string(cv_json)?)?;

    let total = members.len();
    let documents = join_documents(members, &cvs);
    info!(
        members = total,
        with_cv = documents.len(),
        "Loaded faculty directory"
    );
    Ok(documents)
}
