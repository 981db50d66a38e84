use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::models::{MainSection, SectionGroup, SubsectionEntry, TheorySection};

/// Title of the group synthesized for subsections that have nowhere to go.
pub const DEFAULT_GROUP_TITLE: &str = "Latihan";

/// Key of the synthesized group. Only used when no real section exists, so it
/// cannot shadow one.
const DEFAULT_GROUP_KEY: &str = "default";

/// Rebuilds the section hierarchy from the flat record map.
///
/// 1. Every `section` record opens a group, in map order.
/// 2. Every `subsection` record is appended to the group named by its
///    `parent_section`, in map order. A missing or unknown parent falls back to the
///    first group; when no group exists yet, a group titled "Latihan" is created.
/// 3. Groups left without subsections are dropped.
///
/// Never fails: malformed parent references are absorbed by the fallback.
///
/// # Arguments
///
/// * `flat_sections` - Records keyed by id, in submission order.
///
/// # Returns
///
/// The surviving groups in creation order.
pub fn assemble(flat_sections: &IndexMap<String, MainSection>) -> Vec<SectionGroup> {
    let mut groups: IndexMap<String, SectionGroup> = IndexMap::new();

    for (id, record) in flat_sections {
        if let MainSection::Section { title } = record {
            groups.insert(
                id.clone(),
                SectionGroup {
                    id: id.clone(),
                    title: title.clone(),
                    subsections: Vec::new(),
                },
            );
        }
    }

    for (id, record) in flat_sections {
        let MainSection::Subsection {
            title,
            code,
            explanation,
            image,
            parent_section,
        } = record
        else {
            continue;
        };

        let first_group = groups.keys().next().cloned();
        let parent_id = match parent_section {
            Some(parent) if groups.contains_key(parent) => parent.clone(),
            _ => match first_group {
                Some(first) => {
                    tracing::debug!(
                        "Subsection {} has parent {:?}; attaching to first section {}",
                        id,
                        parent_section,
                        first
                    );
                    first
                }
                None => {
                    tracing::info!("Created default parent section for subsection {}", id);
                    groups.insert(
                        DEFAULT_GROUP_KEY.to_string(),
                        SectionGroup {
                            id: DEFAULT_GROUP_KEY.to_string(),
                            title: DEFAULT_GROUP_TITLE.to_string(),
                            subsections: Vec::new(),
                        },
                    );
                    DEFAULT_GROUP_KEY.to_string()
                }
            },
        };

        if let Some(group) = groups.get_mut(&parent_id) {
            group.subsections.push(SubsectionEntry {
                id: id.clone(),
                title: title.clone(),
                code: code.clone(),
                explanation: explanation.clone(),
                image: image.clone(),
            });
        }
    }

    groups
        .into_values()
        .filter(|group| {
            if group.subsections.is_empty() {
                tracing::debug!("Section {} has no subsections, skipping", group.id);
                false
            } else {
                true
            }
        })
        .collect()
}

/// Orders theory sections by the numeric value of their id.
///
/// Ids that are not plain digit strings sort after every numeric id and keep their
/// relative map order.
pub fn sort_theory_sections(
    sections: &IndexMap<String, TheorySection>,
) -> Vec<(&String, &TheorySection)> {
    let mut sorted: Vec<(&String, &TheorySection)> = sections.iter().collect();
    sorted.sort_by(|(a, _), (b, _)| compare_theory_ids(a, b));
    sorted
}

/// Digits of an all-digit id with leading zeros removed.
fn numeric_digits(id: &str) -> Option<&str> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(id.trim_start_matches('0'))
}

/// Numeric ids by value (any length), then everything else as equal.
fn compare_theory_ids(a: &str, b: &str) -> Ordering {
    match (numeric_digits(a), numeric_digits(b)) {
        (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
