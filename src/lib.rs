//! # rustcitations
//!
//! Scholar profile citation harvester and CV expertise search.
//!
//! ## Modules
//!
//! - [`loader`] - "Load more" pagination loop over any [`loader::PageHandle`]
//! - [`profile`] - Google Scholar author profile page handle and row parsing
//! - [`export`] - CSV output of harvested publications
//! - [`cookies`] - Cookie persistence
//! - [`llm`] - OpenAI-compatible chat and embedding clients
//! - [`expertise`] - Embedding search over faculty CVs with LLM explanations
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustcitations::loader::{load_all, LoaderConfig};
//! use rustcitations::profile::{ProfilePage, ProfileQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = ProfileQuery::from_target("wWlI9XMAAAAJ")?;
//!     let mut page = ProfilePage::open(query).await?;
//!     let outcome = load_all(&mut page, &LoaderConfig::default()).await;
//!     println!("{} rows after {} activations", outcome.rows, outcome.activations);
//!     for publication in page.publications()? {
//!         println!("{} ({})", publication.title, publication.citations);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cookies;
pub mod error;
pub mod expertise;
pub mod export;
pub mod llm;
pub mod loader;
pub mod profile;
pub mod prompts;

pub use error::{CitationsError, Result};
