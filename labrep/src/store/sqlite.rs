use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::ReportStore;
use crate::cleaner::ContentStats;
use crate::models::{MainSection, ProjectMetadata, ProjectSummary};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS laporan (
      filename TEXT PRIMARY KEY,
      metadata TEXT NOT NULL,
      updated_at_ms INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sections (
      id INTEGER PRIMARY KEY,
      filename TEXT NOT NULL,
      section_id TEXT NOT NULL,
      type TEXT NOT NULL,
      title TEXT NOT NULL DEFAULT '',
      content TEXT NOT NULL DEFAULT '',
      code TEXT NOT NULL DEFAULT '',
      explanation TEXT NOT NULL DEFAULT '',
      image TEXT NOT NULL DEFAULT '',
      parent_section TEXT,
      FOREIGN KEY(filename) REFERENCES laporan(filename) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_sections_filename ON sections(filename);

    CREATE TABLE IF NOT EXISTS section_content (
      filename TEXT NOT NULL,
      section_key TEXT NOT NULL,
      content TEXT NOT NULL,
      PRIMARY KEY(filename, section_key)
    );
";

/// Stores projects in one SQLite database.
///
/// The metadata blob is authoritative. The `sections` table mirrors it as one row per
/// theory section and results record and is rewritten on every save.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: &Path) -> Result<SqliteStore> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let connection = Connection::open(path)
            .with_context(|| format!("Could not open database '{}'", path.display()))?;
        SqliteStore::with_connection(connection)
    }

    pub fn open_in_memory() -> Result<SqliteStore> {
        SqliteStore::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<SqliteStore> {
        connection.execute_batch(SCHEMA).context("Could not apply database schema")?;
        Ok(SqliteStore { connection })
    }

    /// Number of mirrored section rows for `project_id`.
    pub fn section_row_count(&self, project_id: &str) -> Result<usize> {
        let count: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM sections WHERE filename = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl ReportStore for SqliteStore {
    fn load_project(&self, project_id: &str) -> Result<Option<ProjectMetadata>> {
        let json: Option<String> = self
            .connection
            .query_row(
                "SELECT metadata FROM laporan WHERE filename = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(
                serde_json::from_str(&json)
                    .with_context(|| format!("Invalid metadata for project {}", project_id))?,
            )),
            None => {
                tracing::warn!("Project {} not found in database", project_id);
                Ok(None)
            }
        }
    }

    fn save_project(&self, project_id: &str, metadata: &ProjectMetadata) -> Result<()> {
        let json = serde_json::to_string(metadata)?;
        let now = chrono::Utc::now().timestamp_millis();

        let tx = self.connection.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO laporan (filename, metadata, updated_at_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(filename) DO UPDATE SET
               metadata = excluded.metadata,
               updated_at_ms = excluded.updated_at_ms",
            params![project_id, json, now],
        )?;
        tx.execute("DELETE FROM sections WHERE filename = ?1", params![project_id])?;

        for (section_id, section) in &metadata.dasar_teori_sections {
            tx.execute(
                "INSERT INTO sections (filename, section_id, type, title, content, image)
                 VALUES (?1, ?2, 'dasar_teori', ?3, ?4, ?5)",
                params![project_id, section_id, section.title, section.content, section.image],
            )?;
        }
        for (section_id, section) in &metadata.main_sections {
            match section {
                MainSection::Section { title } => {
                    tx.execute(
                        "INSERT INTO sections (filename, section_id, type, title)
                         VALUES (?1, ?2, 'section', ?3)",
                        params![project_id, section_id, title],
                    )?;
                }
                MainSection::Subsection {
                    title,
                    code,
                    explanation,
                    image,
                    parent_section,
                } => {
                    tx.execute(
                        "INSERT INTO sections
                           (filename, section_id, type, title, code, explanation, image, parent_section)
                         VALUES (?1, ?2, 'subsection', ?3, ?4, ?5, ?6, ?7)",
                        params![project_id, section_id, title, code, explanation, image, parent_section],
                    )?;
                }
                MainSection::Other => {}
            }
        }
        tx.commit()?;
        tracing::info!("Metadata saved to database for {}", project_id);
        Ok(())
    }

    fn load_section_content(&self, project_id: &str, section_key: &str) -> Result<Option<String>> {
        let content: Option<String> = self
            .connection
            .query_row(
                "SELECT content FROM section_content WHERE filename = ?1 AND section_key = ?2",
                params![project_id, section_key],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(text) = &content {
            tracing::debug!("Read {} of {}: {}", section_key, project_id, ContentStats::of(text));
        }
        Ok(content)
    }

    fn save_section_content(&self, project_id: &str, section_key: &str, text: &str) -> Result<()> {
        self.connection.execute(
            "INSERT INTO section_content (filename, section_key, content) VALUES (?1, ?2, ?3)
             ON CONFLICT(filename, section_key) DO UPDATE SET content = excluded.content",
            params![project_id, section_key, text],
        )?;
        tracing::debug!("Saved {} of {}: {}", section_key, project_id, ContentStats::of(text));
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut statement = self
            .connection
            .prepare("SELECT filename, updated_at_ms FROM laporan ORDER BY updated_at_ms DESC")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut projects = Vec::new();
        for row in rows {
            let (project_id, updated_at_ms) = row?;
            let last_modified = chrono::DateTime::from_timestamp_millis(updated_at_ms)
                .with_context(|| format!("Invalid timestamp for project {}", project_id))?;
            projects.push(ProjectSummary {
                project_id,
                last_modified,
            });
        }
        Ok(projects)
    }
}
