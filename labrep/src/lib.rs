//! # labrep
//!
//! The `labrep` library turns a lab report ("laporan praktikum") described by a form
//! into a populated LaTeX document plus a ZIP of the images it references.
//!
//! ## Overview
//!
//! - [`cleaner`] normalizes raw textarea input before it is stored.
//! - [`store`] persists project metadata and section content behind one trait, with a
//!   filesystem and an SQLite backend selected through [`config`].
//! - [`assembler`] rebuilds the two-level section hierarchy from flat records.
//! - [`renderer`] fills the fixed LaTeX template.
//! - [`slug`] derives the project identifier from the student's identity fields.
//! - [`report`] wires the pieces into the save and generate pipelines.
//!
//! ## Examples
//!
//! ```rust
//! # use labrep::assembler::assemble;
//! # use labrep::models::{MainSection, ProjectMetadata};
//! # use labrep::renderer::render;
//! # use indexmap::IndexMap;
//! let mut sections = IndexMap::new();
//! sections.insert("1".to_string(), MainSection::section("Percobaan"));
//! sections.insert("2".to_string(), MainSection::subsection("Latihan 1", "1"));
//!
//! let groups = assemble(&sections); // Vec<SectionGroup>
//! let metadata = ProjectMetadata::default();
//! let latex = render(&metadata, &IndexMap::new(), &groups);
//! assert!(latex.contains("\\section{Percobaan}"));
//! ```
//!
//! ## Tests
//!
//! ```sh
//! cargo test
//! ```

pub mod assembler;
pub mod assets;
pub mod cleaner;
pub mod config;
pub mod llm;
pub mod loggers;
pub mod models;
pub mod renderer;
pub mod report;
pub mod slug;
pub mod store;
