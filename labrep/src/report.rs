//! Save and generate pipelines.
//!
//! [`save_report`] turns a [`ReportRequest`] into a stored project; [`generate_report`]
//! reads it back, resolves the stored content and writes the LaTeX document next to
//! the project's images.

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

use crate::assembler::assemble;
use crate::assets::{collect_images, copy_project_images, ensure_logo, write_image_zip};
use crate::cleaner::{clean_text, normalize, ContentStats};
use crate::config::{default_lecturer, ReportConfig};
use crate::models::{
    MainSection, MainSectionRecord, ProjectMetadata, ReportRequest, TheorySection,
};
use crate::renderer::{remaining_tokens, render};
use crate::slug::{ensure_path_component, slugify};
use crate::store::{
    code_key, explanation_key, theory_key, ReportStore, CONCLUSION_KEY, OBJECTIVES_KEY,
    REFERENCES_KEY,
};

/// Validates, normalizes and persists a report request.
///
/// # Arguments
///
/// * `config` - Locates the project directories (used for image carry-over).
/// * `store` - Destination of metadata and section content.
/// * `request` - The submitted report.
///
/// # Returns
///
/// The project identifier derived from name, npm, course and title.
///
/// # Errors
///
/// Returns an error when a required field is empty, an id or `original_filename` is
/// not a single path component, or the store fails. Nothing is written when
/// validation fails.
pub fn save_report(
    config: &ReportConfig,
    store: &dyn ReportStore,
    request: &ReportRequest,
) -> Result<String> {
    let name = request.name.trim();
    let npm = request.npm.trim();
    let course = request.course.trim();
    let title = request.title.trim();
    if [name, npm, course, title].iter().any(|field| field.is_empty()) {
        bail!("Nama, NPM, Mata Kuliah, dan Judul harus diisi!");
    }

    let project_id = slugify(name, npm, course, title);
    let original = request
        .original_filename
        .as_deref()
        .map(str::trim)
        .filter(|original| !original.is_empty());
    ensure_path_component("project id", &project_id)?;
    for section in &request.theory_sections {
        ensure_path_component("theory section id", &section.id)?;
    }
    for record in &request.main_sections {
        ensure_path_component("main section id", record.id())?;
    }
    if let Some(original) = original {
        ensure_path_component("original filename", original)?;
    }
    tracing::info!("Saving project {}", project_id);

    let mut theory_sections = IndexMap::new();
    for section in &request.theory_sections {
        let content = clean_text(&section.content);
        store.save_section_content(&project_id, &theory_key(&section.id), &normalize(&content))?;
        theory_sections.insert(
            section.id.clone(),
            TheorySection {
                title: section.title.trim().to_string(),
                content,
                image: section.image.trim().to_string(),
            },
        );
    }

    let mut main_sections = IndexMap::new();
    for record in &request.main_sections {
        let entry = match record {
            MainSectionRecord::Section { title, .. } => MainSection::section(title.trim()),
            MainSectionRecord::Subsection {
                id,
                title,
                code,
                explanation,
                image,
                parent_section,
            } => {
                let code = clean_text(code);
                let explanation = clean_text(explanation);
                store.save_section_content(&project_id, &code_key(id), &normalize(&code))?;
                store.save_section_content(
                    &project_id,
                    &explanation_key(id),
                    &normalize(&explanation),
                )?;
                MainSection::Subsection {
                    title: title.trim().to_string(),
                    code,
                    explanation,
                    image: image.trim().to_string(),
                    parent_section: parent_section
                        .as_deref()
                        .map(str::trim)
                        .filter(|parent| !parent.is_empty())
                        .map(str::to_string),
                }
            }
        };
        main_sections.insert(record.id().to_string(), entry);
    }

    let objectives = clean_text(&request.objectives);
    let conclusion = clean_text(&request.conclusion);
    let references = clean_text(&request.references);
    store.save_section_content(&project_id, OBJECTIVES_KEY, &normalize(&objectives))?;
    store.save_section_content(&project_id, CONCLUSION_KEY, &normalize(&conclusion))?;
    store.save_section_content(&project_id, REFERENCES_KEY, &normalize(&references))?;

    let mut lecturer = request.lecturer.trim().to_string();
    if lecturer.is_empty() {
        if let Some(default) = default_lecturer(course) {
            lecturer = default.to_string();
        }
    }

    let metadata = ProjectMetadata {
        project_id: project_id.clone(),
        course: course.to_string(),
        meeting: request.meeting.trim().to_string(),
        title: title.to_string(),
        date: request.date.trim().to_string(),
        name: name.to_string(),
        npm: npm.to_string(),
        class: request.class.trim().to_string(),
        lecturer,
        objectives,
        conclusion,
        references,
        dasar_teori_sections: theory_sections,
        main_sections,
    };
    store.save_project(&project_id, &metadata)?;
    tracing::info!(
        "Saved {} theory sections and {} main sections for {}",
        metadata.dasar_teori_sections.len(),
        metadata.main_sections.len(),
        project_id
    );

    if let Some(original) = original.filter(|original| *original != project_id) {
        copy_project_images(&config.project_dir(original), &config.project_dir(&project_id))?;
    }

    Ok(project_id)
}

/// Loads `section_key`, falling back to `fallback` when nothing non-empty is stored.
fn stored_or(
    store: &dyn ReportStore,
    project_id: &str,
    section_key: &str,
    fallback: &str,
) -> Result<String> {
    match store.load_section_content(project_id, section_key)? {
        Some(content) if !content.trim().is_empty() => {
            if ContentStats::has_missing_backslashes(&content) {
                tracing::warn!("{} of {} may have lost its backslashes", section_key, project_id);
            }
            Ok(content)
        }
        _ => {
            tracing::debug!("No stored {} for {}, using metadata copy", section_key, project_id);
            Ok(fallback.to_string())
        }
    }
}

/// Replaces the content copies held in `metadata` with the stored section content.
///
/// Stored content wins when present and non-empty; otherwise the metadata copy is kept.
pub fn resolve_content(
    store: &dyn ReportStore,
    project_id: &str,
    metadata: &ProjectMetadata,
) -> Result<ProjectMetadata> {
    let mut resolved = metadata.clone();

    for (id, section) in resolved.dasar_teori_sections.iter_mut() {
        section.content = stored_or(store, project_id, &theory_key(id), &section.content)?;
    }
    for (id, record) in resolved.main_sections.iter_mut() {
        if let MainSection::Subsection {
            code, explanation, ..
        } = record
        {
            *code = stored_or(store, project_id, &code_key(id), code)?;
            *explanation = stored_or(store, project_id, &explanation_key(id), explanation)?;
        }
    }
    resolved.objectives = stored_or(store, project_id, OBJECTIVES_KEY, &metadata.objectives)?;
    resolved.conclusion = stored_or(store, project_id, CONCLUSION_KEY, &metadata.conclusion)?;
    resolved.references = stored_or(store, project_id, REFERENCES_KEY, &metadata.references)?;
    Ok(resolved)
}

/// Loads a project with its stored content resolved, ready to be edited or rendered.
///
/// # Errors
///
/// Returns an error if the project does not exist or the store fails.
pub fn load_for_edit(store: &dyn ReportStore, project_id: &str) -> Result<ProjectMetadata> {
    let metadata = store
        .load_project(project_id)?
        .ok_or_else(|| anyhow!("Project {} not found", project_id))?;
    resolve_content(store, project_id, &metadata)
}

/// Result of [`generate_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedReport {
    pub project_id: String,
    pub latex: String,
    pub tex_path: PathBuf,
    /// Image file names the document references, plus the cover logo when present.
    pub images: Vec<String>,
}

/// Renders a stored project and writes `<project_id>.tex` into its directory.
///
/// # Errors
///
/// Returns an error if the project does not exist or a file cannot be written.
pub fn generate_report(
    config: &ReportConfig,
    store: &dyn ReportStore,
    project_id: &str,
) -> Result<GeneratedReport> {
    ensure_path_component("project id", project_id)?;
    tracing::info!("Generating LaTeX for {}", project_id);
    let metadata = load_for_edit(store, project_id)?;
    tracing::info!(
        "Found {} dasar teori sections and {} main sections",
        metadata.dasar_teori_sections.len(),
        metadata.main_sections.len()
    );

    let project_dir = config.project_dir(project_id);
    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;
    ensure_logo(config, &project_dir)?;

    let groups = assemble(&metadata.main_sections);
    let latex = render(&metadata, &metadata.dasar_teori_sections, &groups);
    let leftover = remaining_tokens(&latex);
    if !leftover.is_empty() {
        tracing::debug!("Tokens still present after rendering: {:?}", leftover);
    }

    let tex_path = project_dir.join(format!("{}.tex", project_id));
    std::fs::write(&tex_path, &latex)
        .with_context(|| format!("Failed to write {}", tex_path.display()))?;
    tracing::info!("Saved LaTeX content to {}", tex_path.display());

    Ok(GeneratedReport {
        project_id: project_id.to_string(),
        images: collect_images(&metadata, &project_dir),
        latex,
        tex_path,
    })
}

/// Builds the ZIP archive of every image a project references.
///
/// # Errors
///
/// Returns an error if the project or its directory is missing, or it references no
/// images.
pub fn build_image_zip(
    config: &ReportConfig,
    store: &dyn ReportStore,
    project_id: &str,
) -> Result<Vec<u8>> {
    ensure_path_component("project id", project_id)?;
    let project_dir = config.project_dir(project_id);
    if !project_dir.is_dir() {
        bail!("Project folder {} not found", project_id);
    }
    let metadata = store
        .load_project(project_id)?
        .ok_or_else(|| anyhow!("Project {} not found", project_id))?;
    write_image_zip(&project_dir, &collect_images(&metadata, &project_dir))
}

/// Stored content of one section key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentReport {
    pub section_key: String,
    pub title: String,
    pub stored: bool,
    pub stats: ContentStats,
    pub missing_backslashes: bool,
}

/// Overview of what a project has stored, section by section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInspection {
    pub project_id: String,
    pub theory_sections: usize,
    pub main_sections: usize,
    pub contents: Vec<ContentReport>,
}

/// Reports the stored content of every section key of `project_id`.
pub fn inspect_project(store: &dyn ReportStore, project_id: &str) -> Result<ProjectInspection> {
    let metadata = store
        .load_project(project_id)?
        .ok_or_else(|| anyhow!("Metadata not found for {}", project_id))?;

    let mut keys: Vec<(String, String)> = metadata
        .dasar_teori_sections
        .iter()
        .map(|(id, section)| (theory_key(id), section.title.clone()))
        .collect();
    for (id, record) in &metadata.main_sections {
        if record.is_subsection() {
            keys.push((code_key(id), record.title().to_string()));
            keys.push((explanation_key(id), record.title().to_string()));
        }
    }
    for key in [OBJECTIVES_KEY, CONCLUSION_KEY, REFERENCES_KEY] {
        keys.push((key.to_string(), String::new()));
    }

    let mut contents = Vec::with_capacity(keys.len());
    for (section_key, title) in keys {
        let stored = store.load_section_content(project_id, &section_key)?;
        let text = stored.as_deref().unwrap_or_default();
        contents.push(ContentReport {
            stats: ContentStats::of(text),
            missing_backslashes: ContentStats::has_missing_backslashes(text),
            stored: stored.is_some(),
            section_key,
            title,
        });
    }

    Ok(ProjectInspection {
        project_id: project_id.to_string(),
        theory_sections: metadata.dasar_teori_sections.len(),
        main_sections: metadata.main_sections.len(),
        contents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{open_store, StoreBackend};
    use crate::models::TheorySectionInput;
    use crate::store::{FsStore, SqliteStore};

    fn request() -> ReportRequest {
        ReportRequest {
            name: " Budi Santoso ".to_string(),
            npm: "123".to_string(),
            course: "Praktikum Basis Data".to_string(),
            meeting: "3".to_string(),
            title: "Join".to_string(),
            objectives: "Memahami join\n\n\nMemahami view".to_string(),
            references: "Ref A\n\nRef B".to_string(),
            theory_sections: vec![TheorySectionInput {
                id: "1".to_string(),
                title: "Join".to_string(),
                content: "Isi teori".to_string(),
                image: String::new(),
            }],
            main_sections: vec![
                MainSectionRecord::Section {
                    id: "10".to_string(),
                    title: "Percobaan".to_string(),
                },
                MainSectionRecord::Subsection {
                    id: "11".to_string(),
                    title: "Inner".to_string(),
                    code: "SELECT 1;".to_string(),
                    explanation: "Contoh inner join".to_string(),
                    image: String::new(),
                    parent_section: Some("10".to_string()),
                },
            ],
            ..Default::default()
        }
    }

    #[test_log::test]
    fn test_save_report_rejects_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let store = FsStore::new(dir.path());

        let mut incomplete = request();
        incomplete.npm = "   ".to_string();
        assert!(save_report(&config, &store, &incomplete).is_err());
        assert!(store.list_projects().unwrap().is_empty());
    }

    fn assert_rejected_before_writing(request: &ReportRequest) {
        for backend in [StoreBackend::Filesystem, StoreBackend::Sqlite] {
            let dir = tempfile::tempdir().unwrap();
            let config = ReportConfig::new(dir.path().join("uploads")).with_backend(backend);
            let store = open_store(&config).unwrap();

            let err = save_report(&config, store.as_ref(), request).unwrap_err();
            assert!(err.to_string().starts_with("Invalid"), "{}", err);
            assert!(store.list_projects().unwrap().is_empty());
            assert!(!config.project_dir("Budi_Santoso_123_Praktikum_Basis_Data_Join").exists());
        }
    }

    #[test_log::test]
    fn test_save_report_rejects_theory_id_with_separator() {
        for id in ["x/y", "x\\y", "..", "", "a\0b"] {
            let mut req = request();
            req.theory_sections[0].id = id.to_string();
            assert_rejected_before_writing(&req);
        }
    }

    #[test_log::test]
    fn test_save_report_rejects_main_section_ids() {
        let mut req = request();
        if let MainSectionRecord::Subsection { id, .. } = &mut req.main_sections[1] {
            *id = "..".to_string();
        }
        assert_rejected_before_writing(&req);

        let mut req = request();
        if let MainSectionRecord::Section { id, .. } = &mut req.main_sections[0] {
            *id = "../10".to_string();
        }
        assert_rejected_before_writing(&req);
    }

    #[test_log::test]
    fn test_save_report_rejects_original_filename_outside_root() {
        for original in ["..", "../other", "a/b", "."] {
            let mut req = request();
            req.original_filename = Some(original.to_string());
            assert_rejected_before_writing(&req);
        }

        let mut req = request();
        req.original_filename = Some("  ".to_string());
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        assert!(save_report(&config, &FsStore::new(dir.path()), &req).is_ok());
    }

    #[test_log::test]
    fn test_generate_and_zip_reject_project_id_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path().join("uploads"));
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_project("..", &ProjectMetadata::default()).unwrap();

        assert!(generate_report(&config, &store, "..").is_err());
        assert!(build_image_zip(&config, &store, "..").is_err());
        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 0);
    }

    #[test_log::test]
    fn test_save_report_persists_metadata_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let store = FsStore::new(dir.path());

        let project_id = save_report(&config, &store, &request()).unwrap();
        assert_eq!(project_id, "Budi_Santoso_123_Praktikum_Basis_Data_Join");

        let metadata = store.load_project(&project_id).unwrap().unwrap();
        assert_eq!(metadata.name, "Budi Santoso");
        assert_eq!(metadata.lecturer, "Dinar Nugroho Pratomo, S.Kom., M.IM., M.Cs.");
        assert_eq!(metadata.objectives, "Memahami join\nMemahami view");
        assert_eq!(metadata.main_sections.len(), 2);

        assert_eq!(
            store.load_section_content(&project_id, "code_11").unwrap().as_deref(),
            Some("SELECT 1;")
        );
        assert_eq!(
            store.load_section_content(&project_id, "referensi").unwrap().as_deref(),
            Some("Ref A\nRef B")
        );
    }

    #[test_log::test]
    fn test_save_report_keeps_given_lecturer() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let store = SqliteStore::open_in_memory().unwrap();

        let mut req = request();
        req.lecturer = "Pak Dosen".to_string();
        let project_id = save_report(&config, &store, &req).unwrap();
        assert_eq!(store.load_project(&project_id).unwrap().unwrap().lecturer, "Pak Dosen");
    }

    #[test_log::test]
    fn test_resolve_content_prefers_stored_text() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut metadata = ProjectMetadata::default();
        metadata.conclusion = "dari metadata".to_string();
        metadata.references = "ref metadata".to_string();
        metadata.dasar_teori_sections.insert(
            "1".to_string(),
            TheorySection {
                title: "T".to_string(),
                content: "lama".to_string(),
                image: String::new(),
            },
        );
        store.save_project("p", &metadata).unwrap();
        store.save_section_content("p", "dasar_teori_1", "baru").unwrap();
        store.save_section_content("p", "kesimpulan", "   ").unwrap();

        let resolved = resolve_content(&store, "p", &metadata).unwrap();
        assert_eq!(resolved.dasar_teori_sections["1"].content, "baru");
        assert_eq!(resolved.conclusion, "dari metadata");
        assert_eq!(resolved.references, "ref metadata");
    }

    #[test_log::test]
    fn test_load_for_edit_missing_project() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(load_for_edit(&store, "nope").is_err());
    }

    #[test_log::test]
    fn test_generate_report_writes_tex() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let store = FsStore::new(dir.path());
        let project_id = save_report(&config, &store, &request()).unwrap();

        let generated = generate_report(&config, &store, &project_id).unwrap();
        assert_eq!(
            generated.tex_path,
            config.project_dir(&project_id).join(format!("{}.tex", project_id))
        );
        assert_eq!(std::fs::read_to_string(&generated.tex_path).unwrap(), generated.latex);
        assert!(generated.latex.contains("\\section{Percobaan}"));
        assert!(generated.latex.contains("\\subsection{Inner}"));
        assert!(generated.latex.contains("\\item Memahami join\n\\item Memahami view"));
        assert!(generated.latex.contains("SELECT 1;"));
        assert!(generated.images.is_empty());
    }

    #[test_log::test]
    fn test_generate_report_missing_project() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let store = FsStore::new(dir.path());
        assert!(generate_report(&config, &store, "ghost").is_err());
    }

    #[test_log::test]
    fn test_build_image_zip_without_images_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let store = FsStore::new(dir.path());
        let project_id = save_report(&config, &store, &request()).unwrap();
        assert!(build_image_zip(&config, &store, &project_id).is_err());
        assert!(build_image_zip(&config, &store, "ghost").is_err());
    }

    #[test_log::test]
    fn test_edit_mode_copies_images() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let store = FsStore::new(dir.path());
        let old_id = save_report(&config, &store, &request()).unwrap();
        std::fs::write(config.project_dir(&old_id).join("img_1.png"), b"png").unwrap();

        let mut renamed = request();
        renamed.title = "Outer Join".to_string();
        renamed.original_filename = Some(old_id.clone());
        let new_id = save_report(&config, &store, &renamed).unwrap();

        assert_ne!(new_id, old_id);
        assert!(config.project_dir(&new_id).join("img_1.png").exists());
    }

    #[test_log::test]
    fn test_inspect_project() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let project_id = save_report(&config, &store, &request()).unwrap();

        let inspection = inspect_project(&store, &project_id).unwrap();
        assert_eq!(inspection.theory_sections, 1);
        assert_eq!(inspection.main_sections, 2);
        let keys: Vec<&str> =
            inspection.contents.iter().map(|c| c.section_key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["dasar_teori_1", "code_11", "penjelasan_11", "tujuan", "kesimpulan", "referensi"]
        );
        assert!(inspection.contents.iter().all(|c| c.stored));
        assert_eq!(inspection.contents[1].stats.chars, "SELECT 1;".len());
    }
}
