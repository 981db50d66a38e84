use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A background ("dasar teori") block: title, LaTeX content and an optional image.
///
/// Theory sections have no parent. They are keyed by id in [`ProjectMetadata`] and
/// rendered in numeric id order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TheorySection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: String,
}

/// A record of the results ("hasil dan pembahasan") part, tagged by `type`.
///
/// # Variants
///
/// * `Section` - A grouping node carrying only a title.
/// * `Subsection` - A leaf with code, explanation and image, pointing at its parent
///   section through `parent_section`.
/// * `Other` - Any unknown `type`; kept so that foreign records never break loading,
///   ignored by the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MainSection {
    Section {
        #[serde(default)]
        title: String,
    },
    Subsection {
        #[serde(default)]
        title: String,
        #[serde(default)]
        code: String,
        #[serde(default, rename = "penjelasan")]
        explanation: String,
        #[serde(default)]
        image: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_section: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl MainSection {
    pub fn section(title: &str) -> MainSection {
        MainSection::Section {
            title: title.to_string(),
        }
    }

    /// Creates an empty subsection attached to `parent_section`.
    pub fn subsection(title: &str, parent_section: &str) -> MainSection {
        MainSection::Subsection {
            title: title.to_string(),
            code: String::new(),
            explanation: String::new(),
            image: String::new(),
            parent_section: Some(parent_section.to_string()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            MainSection::Section { title } | MainSection::Subsection { title, .. } => title,
            MainSection::Other => "",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MainSection::Section { .. } => "section",
            MainSection::Subsection { .. } => "subsection",
            MainSection::Other => "other",
        }
    }

    pub fn is_subsection(&self) -> bool {
        matches!(self, MainSection::Subsection { .. })
    }
}

/// The persisted state of one project.
///
/// Serialized field names follow the keys of the `metadata.json` files written by
/// earlier versions of the tool, so existing projects keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default, rename = "filename")]
    pub project_id: String,
    #[serde(default, rename = "matkul")]
    pub course: String,
    #[serde(default, rename = "pertemuan")]
    pub meeting: String,
    #[serde(default, rename = "judul")]
    pub title: String,
    #[serde(default, rename = "tanggal")]
    pub date: String,
    #[serde(default, rename = "nama")]
    pub name: String,
    #[serde(default)]
    pub npm: String,
    #[serde(default, rename = "kelas")]
    pub class: String,
    #[serde(default, rename = "dosen")]
    pub lecturer: String,
    #[serde(default, rename = "tujuan")]
    pub objectives: String,
    #[serde(default, rename = "kesimpulan")]
    pub conclusion: String,
    #[serde(default, rename = "referensi")]
    pub references: String,
    #[serde(default)]
    pub dasar_teori_sections: IndexMap<String, TheorySection>,
    #[serde(default)]
    pub main_sections: IndexMap<String, MainSection>,
}

/// One theory section as submitted by the form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TheorySectionInput {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: String,
}

/// One results record as submitted by the form, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MainSectionRecord {
    Section {
        id: String,
        #[serde(default)]
        title: String,
    },
    Subsection {
        id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        code: String,
        #[serde(default)]
        explanation: String,
        #[serde(default)]
        image: String,
        #[serde(default)]
        parent_section: Option<String>,
    },
}

impl MainSectionRecord {
    pub fn id(&self) -> &str {
        match self {
            MainSectionRecord::Section { id, .. } | MainSectionRecord::Subsection { id, .. } => id,
        }
    }
}

/// The structured save request.
///
/// Sections arrive as ordered lists of tagged records; their order is the order the
/// assembler later sees.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub npm: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub meeting: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub lecturer: String,
    #[serde(default)]
    pub objectives: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub references: String,
    #[serde(default)]
    pub theory_sections: Vec<TheorySectionInput>,
    #[serde(default)]
    pub main_sections: Vec<MainSectionRecord>,
    /// Project this request was edited from; images are carried over when the id changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

/// A subsection after assembly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SubsectionEntry {
    pub id: String,
    pub title: String,
    pub code: String,
    pub explanation: String,
    pub image: String,
}

/// A section with its ordered subsections, as produced by the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SectionGroup {
    pub id: String,
    pub title: String,
    pub subsections: Vec<SubsectionEntry>,
}

/// A project listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub last_modified: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_reads_legacy_keys() {
        let json = r#"{
            "filename": "Budi_123_Basis_Data_Join",
            "matkul": "Praktikum Basis Data",
            "pertemuan": "3",
            "judul": "Join",
            "nama": "Budi",
            "npm": "123",
            "tujuan": "Memahami join",
            "dasar_teori_sections": {
                "1": {"title": "Join", "content": "Isi", "content_file": "dasar_teori_1_raw.txt", "image": ""}
            },
            "main_sections": {
                "2": {"type": "section", "title": "Percobaan"},
                "3": {"type": "subsection", "title": "Inner", "parent_section": "2",
                      "code": "SELECT 1;", "penjelasan": "Contoh", "image": "/static/uploads/x/a.png"}
            }
        }"#;

        let metadata: ProjectMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.project_id, "Budi_123_Basis_Data_Join");
        assert_eq!(metadata.course, "Praktikum Basis Data");
        assert_eq!(metadata.objectives, "Memahami join");
        assert_eq!(metadata.conclusion, "");
        assert_eq!(metadata.dasar_teori_sections["1"].content, "Isi");
        assert_eq!(metadata.main_sections["2"], MainSection::section("Percobaan"));
        match &metadata.main_sections["3"] {
            MainSection::Subsection {
                explanation,
                parent_section,
                ..
            } => {
                assert_eq!(explanation, "Contoh");
                assert_eq!(parent_section.as_deref(), Some("2"));
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_metadata_writes_legacy_keys() {
        let mut metadata = ProjectMetadata::default();
        metadata.title = "Join".to_string();
        metadata
            .main_sections
            .insert("1".to_string(), MainSection::subsection("Sub", "0"));

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["judul"], "Join");
        assert_eq!(value["main_sections"]["1"]["type"], "subsection");
        assert_eq!(value["main_sections"]["1"]["penjelasan"], "");
        assert_eq!(value["main_sections"]["1"]["parent_section"], "0");
    }

    #[test]
    fn test_unknown_main_section_type() {
        let record: MainSection =
            serde_json::from_str(r#"{"type": "appendix", "title": "x"}"#).unwrap();
        assert_eq!(record, MainSection::Other);
        assert_eq!(record.title(), "");
        assert_eq!(record.kind(), "other");
    }

    #[test]
    fn test_report_request_schema() {
        let json = r#"{
            "name": "A B",
            "npm": "1",
            "course": "C D",
            "title": "E",
            "theory_sections": [{"id": "1", "title": "T", "content": "x"}],
            "main_sections": [
                {"type": "section", "id": "1", "title": "S1"},
                {"type": "subsection", "id": "2", "title": "Sub1", "parent_section": "1"}
            ]
        }"#;
        let request: ReportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.theory_sections.len(), 1);
        assert_eq!(request.main_sections.len(), 2);
        assert_eq!(request.main_sections[1].id(), "2");
        assert!(request.original_filename.is_none());
    }
}
