use anyhow::{bail, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Characters that are not allowed in a project directory name.
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|]"#).unwrap());

/// Derives the project identifier from the student's identity fields.
///
/// The four fields are joined with underscores, then every character of
/// `/ \ : * ? " < > |` and every space becomes an underscore.
///
/// Distinct inputs can map to the same identifier (`"A B"` and `"A_B"` both give
/// `"A_B"`). Callers treat an equal identifier as the same project: a save under a
/// colliding identifier overwrites the earlier project.
pub fn slugify(name: &str, npm: &str, course: &str, title: &str) -> String {
    let base = format!("{}_{}_{}_{}", name, npm, course, title);
    UNSAFE_CHARS.replace_all(&base, "_").replace(' ', "_")
}

/// Checks that `value` can be used as a single path component under the upload root.
///
/// Project ids, section ids and upload folders all become file or directory names.
/// Empty values, `.`, `..` and anything containing `/`, `\` or NUL are rejected.
///
/// # Errors
///
/// Returns an error naming `what` when `value` is not a safe component.
pub fn ensure_path_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." {
        bail!("Invalid {}: {:?}", what, value);
    }
    if value.contains(['/', '\\', '\0']) {
        bail!("Invalid {} {:?}: contains a path separator or NUL", what, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_spaces() {
        assert_eq!(slugify("A B", "1", "C D", "E"), "A_B_1_C_D_E");
    }

    #[test]
    fn test_slugify_unsafe_characters() {
        for ch in ['/', '\\', ':', '*', '?', '"', '<', '>', '|'] {
            let title = format!("x{}y", ch);
            assert_eq!(slugify("n", "1", "c", &title), "n_1_c_x_y", "char {:?}", ch);
        }
        assert_eq!(
            slugify("Budi", "2024/01", "Basis Data", "Join: Inner?"),
            "Budi_2024_01_Basis_Data_Join__Inner_"
        );
    }

    #[test]
    fn test_slugify_collisions_are_not_detected() {
        assert_eq!(slugify("A B", "1", "C", "D"), slugify("A_B", "1", "C", "D"));
        assert_eq!(slugify("A", "1", "C", "D/E"), slugify("A", "1", "C", "D E"));
    }

    #[test]
    fn test_slugify_keeps_other_characters() {
        assert_eq!(slugify("Ána", "07", "Web-1", "CSS (dasar)"), "Ána_07_Web-1_CSS_(dasar)");
    }

    #[test]
    fn test_ensure_path_component() {
        for ok in ["1", "intro", "Budi_123_Basis_Data_Join", "a..b", ".hidden"] {
            assert!(ensure_path_component("id", ok).is_ok(), "{:?}", ok);
        }
        for bad in ["", ".", "..", "x/y", "../outside", "a\\b", "nul\0byte"] {
            let err = ensure_path_component("id", bad).unwrap_err();
            assert!(err.to_string().starts_with("Invalid id"), "{:?}", bad);
        }
    }

    #[test]
    fn test_slugify_output_is_a_path_component() {
        let slug = slugify("A/B", "1\\2", "..", "T");
        assert!(ensure_path_component("project id", &slug).is_ok());
    }
}
