use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::assembler::sort_theory_sections;
use crate::assets::image_basename;
use crate::models::{ProjectMetadata, SectionGroup, TheorySection};

/// The fixed report template. Placeholders are the bare uppercase names in [`TOKENS`].
pub const LATEX_TEMPLATE: &str = include_str!("../templates/laporan.tex");

/// Sentinel tokens of [`LATEX_TEMPLATE`], in substitution order.
pub const TOKENS: [&str; 13] = [
    "MATKUL",
    "PERTEMUAN",
    "JUDUL",
    "TANGGAL",
    "NAMA",
    "NPM",
    "KELAS",
    "DOSEN",
    "TUJUAN",
    "DASAR_TEORI",
    "HASIL_PEMBAHASAN",
    "KESIMPULAN",
    "REFERENSI",
];

/// Item used when no objective was given.
pub const DEFAULT_OBJECTIVE_ITEM: &str = r"\item Memenuhi tugas praktikum";

/// Bibliography body used when no reference was given.
pub const EMPTY_REFERENCES: &str = "-";

/// Label in front of a subsection explanation.
pub const EXPLANATION_LABEL: &str = "Penjelasan:";

/// Results body used when main sections exist but none of them rendered.
pub const NO_RESULTS_PLACEHOLDER: &str =
    "\\section{Hasil dan Pembahasan}\nTidak ada data hasil dan pembahasan.\n\n";

/// Listing options for subsection code.
const CODE_LISTING_OPTIONS: &str = "language=Python, style=pythonstyle";

/// Matches any sentinel token. Longer names come first so a shorter token can never
/// claim the head of a longer one.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let mut tokens: Vec<&str> = TOKENS.to_vec();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()));
    Regex::new(&tokens.join("|")).unwrap()
});

/// Renders the whole report.
///
/// Theory sections are sorted by id here; `groups` is expected to come from
/// [`crate::assembler::assemble`]. Missing fields render as empty segments, never as
/// errors. A project without any main section gets an empty results chapter; one
/// whose groups were all dropped gets [`NO_RESULTS_PLACEHOLDER`].
///
/// # Arguments
///
/// * `metadata` - Identity fields, objectives, conclusion and references.
/// * `theory_sections` - Theory sections keyed by id, content already resolved.
/// * `groups` - Assembled results sections.
///
/// # Returns
///
/// The complete LaTeX document.
pub fn render(
    metadata: &ProjectMetadata,
    theory_sections: &IndexMap<String, TheorySection>,
    groups: &[SectionGroup],
) -> String {
    let theory = render_theory(theory_sections);
    let results = if groups.is_empty() && metadata.main_sections.is_empty() {
        String::new()
    } else {
        render_results(groups)
    };
    tracing::debug!(
        "Generated dasar teori LaTeX: {} chars, hasil pembahasan LaTeX: {} chars",
        theory.len(),
        results.len()
    );

    let values: [(&str, String); 13] = [
        ("MATKUL", metadata.course.clone()),
        ("PERTEMUAN", metadata.meeting.clone()),
        ("JUDUL", metadata.title.clone()),
        ("TANGGAL", metadata.date.clone()),
        ("NAMA", metadata.name.clone()),
        ("NPM", metadata.npm.clone()),
        ("KELAS", metadata.class.clone()),
        ("DOSEN", metadata.lecturer.clone()),
        ("TUJUAN", process_objectives(&metadata.objectives)),
        ("DASAR_TEORI", theory),
        ("HASIL_PEMBAHASAN", results),
        ("KESIMPULAN", metadata.conclusion.clone()),
        ("REFERENSI", process_references(&metadata.references)),
    ];
    substitute(LATEX_TEMPLATE, &values)
}

/// Replaces every sentinel token of `template` with its value in one pass.
///
/// Only the template text is scanned, so a value that happens to contain a token
/// name is inserted as-is. Tokens without a value become empty strings.
pub fn substitute(template: &str, values: &[(&str, String)]) -> String {
    TOKEN_PATTERN
        .replace_all(template, |caps: &Captures| {
            let token = &caps[0];
            values
                .iter()
                .find(|(name, _)| *name == token)
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        })
        .to_string()
}

/// Lists the sentinel tokens still present in `latex`.
pub fn remaining_tokens(latex: &str) -> Vec<&'static str> {
    TOKENS.iter().copied().filter(|token| latex.contains(token)).collect()
}

/// Turns newline-separated objectives into `\item` lines.
pub fn process_objectives(objectives: &str) -> String {
    let items: Vec<String> = objectives
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("\\item {}", line))
        .collect();
    if items.is_empty() {
        DEFAULT_OBJECTIVE_ITEM.to_string()
    } else {
        items.join("\n")
    }
}

/// Drops blank lines from the references; each line is kept verbatim otherwise.
pub fn process_references(references: &str) -> String {
    let items: Vec<&str> = references
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if items.is_empty() {
        EMPTY_REFERENCES.to_string()
    } else {
        items.join("\n")
    }
}

fn figure_block(image: &str, caption: &str, label: &str) -> String {
    format!(
        "\\begin{{figure}}[H]\n\
         \\centering\n\
         \\customfbox{{1pt}}{{\n    \
         \\includegraphics[width=0.78\\textwidth, keepaspectratio]{{{}}}\n\
         }}\n\
         \\caption{{{}}}\n\
         \\label{{fig:{}}}\n\
         \\end{{figure}}\n\n",
        image_basename(image),
        caption,
        label
    )
}

/// Body of the "Dasar Teori" chapter.
pub fn render_theory(sections: &IndexMap<String, TheorySection>) -> String {
    let mut latex = String::new();
    for (id, section) in sort_theory_sections(sections) {
        if !section.title.is_empty() {
            latex.push_str(&format!("\\section{{{}}}\n", section.title));
        }
        if !section.content.is_empty() {
            latex.push_str(&section.content);
            latex.push_str("\n\n");
        } else {
            tracing::warn!("Theory section {} has no content", id);
        }
        if !section.image.is_empty() {
            latex.push_str(&figure_block(&section.image, &section.title, id));
        }
    }
    latex
}

/// Body of the "Hasil dan Pembahasan" chapter; [`NO_RESULTS_PLACEHOLDER`] when no
/// group is left.
pub fn render_results(groups: &[SectionGroup]) -> String {
    if groups.is_empty() {
        tracing::warn!("No content generated for hasil dan pembahasan");
        return NO_RESULTS_PLACEHOLDER.to_string();
    }
    let mut latex = String::new();
    for group in groups {
        latex.push_str(&format!("\\section{{{}}}\n\n", group.title));
        for subsection in &group.subsections {
            latex.push_str(&format!("\\subsection{{{}}}\n\n", subsection.title));
            if !subsection.code.is_empty() {
                latex.push_str(&format!(
                    "\\begin{{lstlisting}}[{}]\n{}\n\\end{{lstlisting}}\n\n",
                    CODE_LISTING_OPTIONS, subsection.code
                ));
            }
            if !subsection.image.is_empty() {
                latex.push_str(&figure_block(
                    &subsection.image,
                    &subsection.title,
                    &subsection.id,
                ));
            }
            if !subsection.explanation.is_empty() {
                latex.push_str(&format!(
                    "\\textbf{{{}}} {}\n\n",
                    EXPLANATION_LABEL, subsection.explanation
                ));
            }
        }
    }
    latex
}
