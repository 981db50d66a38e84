use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::store::{FsStore, ReportStore, SqliteStore};

pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
pub const DEFAULT_DATABASE_FILENAME: &str = "labrep.sqlite3";
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 1200;

/// Cover logo expected next to the generated `.tex` file.
pub const LOGO_FILENAME: &str = "lambang ugm.png";

/// Known practicum courses and their lecturers.
const COURSE_LECTURERS: &[(&str, &str)] = &[
    ("Praktikum Struktur Data", "Dr. Umar Taufiq, S.Kom., M.Cs."),
    ("Praktikum Basis Data", "Dinar Nugroho Pratomo, S.Kom., M.IM., M.Cs."),
    ("Praktikum Pemrograman Web 1", "Dinar Nugroho Pratomo, S.Kom., M.IM., M.Cs."),
];

/// Returns the lecturer registered for `course`, if any.
pub fn default_lecturer(course: &str) -> Option<&'static str> {
    let course = course.trim();
    COURSE_LECTURERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(course))
        .map(|(_, lecturer)| *lecturer)
}

/// Returns every course in the lecturer directory, in declaration order.
pub fn known_courses() -> impl Iterator<Item = &'static str> {
    COURSE_LECTURERS.iter().map(|(name, _)| *name)
}

/// Storage backend used for project metadata and section content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum StoreBackend {
    #[default]
    #[strum(to_string = "fs", serialize = "filesystem")]
    Filesystem,
    #[strum(to_string = "sqlite")]
    Sqlite,
}

/// `ReportConfig` holds everything the pipelines need to locate projects on disk.
///
/// # Fields
///
/// * `upload_dir` - Root directory holding one sub-directory per project.
/// * `backend` - Which [`ReportStore`] implementation to open.
/// * `database_path` - SQLite file; defaults to `<upload_dir>/labrep.sqlite3`.
/// * `logo_path` - Cover logo copied into a project when it has none.
/// * `max_image_dimension` - Longest side of uploaded images after resizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub upload_dir: PathBuf,
    pub backend: StoreBackend,
    pub database_path: Option<PathBuf>,
    pub logo_path: Option<PathBuf>,
    pub max_image_dimension: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig::new(DEFAULT_UPLOAD_DIR)
    }
}

impl ReportConfig {
    /// Creates a configuration rooted at `upload_dir` using the filesystem backend.
    pub fn new(upload_dir: impl Into<PathBuf>) -> ReportConfig {
        ReportConfig {
            upload_dir: upload_dir.into(),
            backend: StoreBackend::default(),
            database_path: None,
            logo_path: None,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
        }
    }

    /// Builds the configuration from the environment.
    ///
    /// Recognised variables: `LABREP_UPLOAD_DIR`, `LABREP_BACKEND` (`fs` or `sqlite`),
    /// `LABREP_DATABASE_PATH`, `LABREP_LOGO_PATH` and `LABREP_MAX_IMAGE_DIMENSION`.
    ///
    /// # Errors
    ///
    /// Returns an error if `LABREP_BACKEND` or `LABREP_MAX_IMAGE_DIMENSION` hold
    /// values that cannot be parsed.
    pub fn from_env() -> Result<ReportConfig> {
        let upload_dir =
            std::env::var("LABREP_UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string());
        let mut config = ReportConfig::new(upload_dir);

        if let Ok(backend) = std::env::var("LABREP_BACKEND") {
            config.backend = StoreBackend::from_str(backend.trim())
                .with_context(|| format!("Invalid LABREP_BACKEND value: {}", backend))?;
        }
        if let Ok(path) = std::env::var("LABREP_DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("LABREP_LOGO_PATH") {
            config.logo_path = Some(PathBuf::from(path));
        }
        if let Ok(value) = std::env::var("LABREP_MAX_IMAGE_DIMENSION") {
            config.max_image_dimension = value
                .trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid LABREP_MAX_IMAGE_DIMENSION value: {}", value))?;
        }
        Ok(config)
    }

    pub fn with_backend(mut self, backend: StoreBackend) -> ReportConfig {
        self.backend = backend;
        self
    }

    pub fn with_upload_dir(mut self, upload_dir: impl Into<PathBuf>) -> ReportConfig {
        self.upload_dir = upload_dir.into();
        self
    }

    /// Directory holding the images and generated files of one project.
    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.upload_dir.join(project_id)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.upload_dir.join(DEFAULT_DATABASE_FILENAME))
    }

    pub fn logo_path(&self) -> Option<&Path> {
        self.logo_path.as_deref()
    }
}

/// Opens the store selected by `config.backend`.
///
/// # Errors
///
/// Returns an error if the upload directory cannot be created or the SQLite
/// database cannot be opened.
pub fn open_store(config: &ReportConfig) -> Result<Box<dyn ReportStore>> {
    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!("Failed to create upload directory {}", config.upload_dir.display())
    })?;
    tracing::info!("Opening {} store under {}", config.backend, config.upload_dir.display());
    match config.backend {
        StoreBackend::Filesystem => Ok(Box::new(FsStore::new(&config.upload_dir))),
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&config.database_path())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lecturer() {
        assert_eq!(
            default_lecturer("Praktikum Struktur Data"),
            Some("Dr. Umar Taufiq, S.Kom., M.Cs.")
        );
        assert_eq!(
            default_lecturer("  praktikum basis data "),
            Some("Dinar Nugroho Pratomo, S.Kom., M.IM., M.Cs.")
        );
        assert_eq!(default_lecturer("Kalkulus"), None);
        assert_eq!(known_courses().count(), 3);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(StoreBackend::from_str("fs").unwrap(), StoreBackend::Filesystem);
        assert_eq!(StoreBackend::from_str("filesystem").unwrap(), StoreBackend::Filesystem);
        assert_eq!(StoreBackend::from_str("SQLite").unwrap(), StoreBackend::Sqlite);
        assert!(StoreBackend::from_str("postgres").is_err());
        assert_eq!(StoreBackend::Filesystem.to_string(), "fs");
        assert_eq!(StoreBackend::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_paths() {
        let config = ReportConfig::new("/tmp/uploads");
        assert_eq!(config.project_dir("a_1"), PathBuf::from("/tmp/uploads/a_1"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/uploads").join(DEFAULT_DATABASE_FILENAME)
        );

        let config = config.with_upload_dir("/srv/reports");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/reports").join(DEFAULT_DATABASE_FILENAME)
        );
    }

    #[test]
    fn test_open_store_creates_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().join("uploads");
        let config = ReportConfig::new(&upload_dir).with_backend(StoreBackend::Sqlite);
        let store = open_store(&config).unwrap();
        assert!(upload_dir.exists());
        assert!(store.list_projects().unwrap().is_empty());
    }
}
