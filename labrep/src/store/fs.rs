use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::ReportStore;
use crate::cleaner::ContentStats;
use crate::models::{ProjectMetadata, ProjectSummary};
use crate::slug::ensure_path_component;

const METADATA_FILENAME: &str = "metadata.json";

/// Stores each project as a directory under the upload root:
/// `metadata.json` plus one `<section_key>_raw.txt` per stored text.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl AsRef<Path>) -> FsStore {
        FsStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn project_dir(&self, project_id: &str) -> Result<PathBuf> {
        ensure_path_component("project id", project_id)?;
        Ok(self.root.join(project_id))
    }

    fn metadata_path(&self, project_id: &str) -> Result<PathBuf> {
        Ok(self.project_dir(project_id)?.join(METADATA_FILENAME))
    }

    fn content_path(&self, project_id: &str, section_key: &str) -> Result<PathBuf> {
        ensure_path_component("section key", section_key)?;
        Ok(self.project_dir(project_id)?.join(format!("{}_raw.txt", section_key)))
    }
}

impl ReportStore for FsStore {
    fn load_project(&self, project_id: &str) -> Result<Option<ProjectMetadata>> {
        let path = self.metadata_path(project_id)?;
        if !path.exists() {
            tracing::warn!("Metadata file {} not found", path.display());
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let metadata = serde_json::from_str(&text)
            .with_context(|| format!("Invalid metadata in {}", path.display()))?;
        Ok(Some(metadata))
    }

    fn save_project(&self, project_id: &str, metadata: &ProjectMetadata) -> Result<()> {
        let dir = self.project_dir(project_id)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = self.metadata_path(project_id)?;
        let json = serde_json::to_string_pretty(metadata)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Metadata saved to {}", path.display());
        Ok(())
    }

    fn load_section_content(&self, project_id: &str, section_key: &str) -> Result<Option<String>> {
        let path = self.content_path(project_id, section_key)?;
        if !path.exists() {
            tracing::debug!("File not found: {}", path.display());
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        tracing::debug!("Read LaTeX from {}: {}", path.display(), ContentStats::of(&content));
        Ok(Some(content))
    }

    fn save_section_content(&self, project_id: &str, section_key: &str, text: &str) -> Result<()> {
        let dir = self.project_dir(project_id)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = self.content_path(project_id, section_key)?;
        std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("LaTeX content saved to {}: {}", path.display(), ContentStats::of(text));
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut projects = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list {}", self.root.display()))?
        {
            let entry = entry?;
            let metadata_path = entry.path().join(METADATA_FILENAME);
            if !entry.path().is_dir() || !metadata_path.exists() {
                continue;
            }
            let modified = std::fs::metadata(&metadata_path)?.modified()?;
            projects.push(ProjectSummary {
                project_id: entry.file_name().to_string_lossy().to_string(),
                last_modified: modified.into(),
            });
        }
        projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MainSection, TheorySection};

    #[test]
    fn test_fs_store_project_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        assert!(store.load_project("p").unwrap().is_none());

        let mut metadata = ProjectMetadata::default();
        metadata.project_id = "p".to_string();
        metadata.title = "Join".to_string();
        metadata.dasar_teori_sections.insert(
            "1".to_string(),
            TheorySection {
                title: "T".to_string(),
                ..Default::default()
            },
        );
        metadata
            .main_sections
            .insert("2".to_string(), MainSection::section("S"));
        store.save_project("p", &metadata).unwrap();

        assert!(dir.path().join("p").join("metadata.json").exists());
        assert_eq!(store.load_project("p").unwrap(), Some(metadata.clone()));

        metadata.title = "Outer Join".to_string();
        store.save_project("p", &metadata).unwrap();
        assert_eq!(store.load_project("p").unwrap().unwrap().title, "Outer Join");
    }

    #[test]
    fn test_fs_store_section_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        assert!(store.load_section_content("p", "tujuan").unwrap().is_none());
        store.save_section_content("p", "tujuan", "\\item A\n\nB").unwrap();
        assert!(dir.path().join("p").join("tujuan_raw.txt").exists());
        assert_eq!(
            store.load_section_content("p", "tujuan").unwrap().as_deref(),
            Some("\\item A\n\nB")
        );
    }

    #[test]
    fn test_fs_store_list_projects() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.save_project("a", &ProjectMetadata::default()).unwrap();
        store.save_project("b", &ProjectMetadata::default()).unwrap();
        std::fs::create_dir_all(dir.path().join("not_a_project")).unwrap();
        std::fs::write(dir.path().join("stray.txt"), "x").unwrap();

        let mut ids: Vec<String> =
            store.list_projects().unwrap().into_iter().map(|p| p.project_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);

        let missing = FsStore::new(dir.path().join("missing"));
        assert!(missing.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_fs_store_invalid_metadata_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("p")).unwrap();
        std::fs::write(dir.path().join("p").join("metadata.json"), "{not json").unwrap();
        let store = FsStore::new(dir.path());
        assert!(store.load_project("p").is_err());
    }

    #[test]
    fn test_fs_store_rejects_paths_outside_project() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("uploads"));

        assert!(store.save_project("..", &ProjectMetadata::default()).is_err());
        assert!(store.save_section_content("p", "dasar_teori_x/y", "teks").is_err());
        assert!(store.save_section_content("../p", "tujuan", "teks").is_err());
        assert!(store.load_section_content("p", "../../etc").is_err());
        assert!(!dir.path().join("uploads").exists());
    }
}
