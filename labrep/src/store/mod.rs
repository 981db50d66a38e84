//! Persistence of projects behind the [`ReportStore`] trait.
//!
//! A project is one metadata blob plus any number of text contents addressed by a
//! section key (see [`theory_key`], [`code_key`], [`explanation_key`] and the
//! top-level keys). Backends do no locking: two saves to the same project id
//! interleave and the last statement to commit wins.

pub mod fs;
pub mod sqlite;

use anyhow::Result;

use crate::models::{ProjectMetadata, ProjectSummary};

pub use fs::FsStore;
pub use sqlite::SqliteStore;

pub const OBJECTIVES_KEY: &str = "tujuan";
pub const CONCLUSION_KEY: &str = "kesimpulan";
pub const REFERENCES_KEY: &str = "referensi";

pub fn theory_key(section_id: &str) -> String {
    format!("dasar_teori_{}", section_id)
}

pub fn code_key(section_id: &str) -> String {
    format!("code_{}", section_id)
}

pub fn explanation_key(section_id: &str) -> String {
    format!("penjelasan_{}", section_id)
}

/// Storage contract used by the save and generate pipelines.
///
/// Every call is blocking. Absent data is `Ok(None)`; `Err` is reserved for
/// failures of the backend itself.
pub trait ReportStore {
    /// Loads the metadata of `project_id`, or `None` if the project was never saved.
    fn load_project(&self, project_id: &str) -> Result<Option<ProjectMetadata>>;

    /// Creates or overwrites the metadata of `project_id`.
    fn save_project(&self, project_id: &str, metadata: &ProjectMetadata) -> Result<()>;

    /// Loads the text stored under `section_key`, or `None` if nothing was stored.
    fn load_section_content(&self, project_id: &str, section_key: &str)
        -> Result<Option<String>>;

    /// Creates or overwrites the text stored under `section_key`.
    fn save_section_content(&self, project_id: &str, section_key: &str, text: &str)
        -> Result<()>;

    /// Lists saved projects, most recently modified first.
    fn list_projects(&self) -> Result<Vec<ProjectSummary>>;
}
