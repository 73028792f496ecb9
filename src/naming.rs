//! Naming conventions shared by the manifest and the menu.
//!
//! Two conversions live here:
//!
//! - **Slugs**: auto-index pages are written as `<slug>.html`, where the slug
//!   is derived from the node title. `"Lab Activities"` → `lab-activities`.
//! - **Stem titles**: nodes produced by `.autogen` and `append_children`
//!   carry no authored title, so one is derived from the file stem using the
//!   `NNN-name` convention: `"02-free_fall"` → `"free fall"`.

use std::path::Path;

/// Display title of a file stem following the `NNN-name` (or `NNN_name`)
/// convention. The number prefix is dropped; `-` and `_` become spaces.
///
/// - `"02-free_fall"` → `"free fall"`
/// - `"intro"` → `"intro"`
/// - `"010"` → `""`
fn stem_title(stem: &str) -> String {
    if let Some(pos) = stem.find(['-', '_']) {
        if stem[..pos].parse::<u32>().is_ok() {
            return display(&stem[pos + 1..]);
        }
    }
    if stem.parse::<u32>().is_ok() {
        return String::new();
    }
    display(stem)
}

fn display(raw: &str) -> String {
    raw.replace(['-', '_'], " ").trim().to_string()
}

/// Title for a file that has no authored title.
///
/// Falls back to the raw stem when the parsed title is empty (a pure
/// number like `010.md`).
pub fn title_from_path(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = stem_title(&stem);
    if title.is_empty() { stem } else { title }
}

/// File stem of a manifest path (`content/ch1/intro.ipynb` → `intro`).
pub fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Slug used for auto-index page names.
///
/// Lowercases, trims, turns each whitespace run into one hyphen, then drops
/// every character outside `[a-z0-9-]`.
pub fn slugify(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_with_underscores() {
        assert_eq!(stem_title("02-free_fall"), "free fall");
    }

    #[test]
    fn numbered_with_underscore_separator() {
        assert_eq!(stem_title("01_vectors"), "vectors");
    }

    #[test]
    fn number_only() {
        assert_eq!(stem_title("010"), "");
    }

    #[test]
    fn unnumbered_keeps_words() {
        assert_eq!(stem_title("projectile-motion"), "projectile motion");
    }

    #[test]
    fn leading_word_with_dash_is_not_a_number() {
        assert_eq!(stem_title("lab-3"), "lab 3");
    }

    #[test]
    fn title_from_path_strips_dirs_and_extension() {
        assert_eq!(title_from_path("content/notebooks/03-energy.ipynb"), "energy");
    }

    #[test]
    fn title_from_path_number_only_uses_stem() {
        assert_eq!(title_from_path("content/010.md"), "010");
    }

    #[test]
    fn file_stem_of_nested_path() {
        assert_eq!(file_stem("content/ch1/intro.md"), "intro");
    }

    #[test]
    fn slugify_collapses_whitespace() {
        assert_eq!(slugify("  Lab   Activities "), "lab-activities");
    }

    #[test]
    fn slugify_strips_punctuation() {
        assert_eq!(slugify("Q&A: Week 1!"), "qa-week-1");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Über Physik"), "ber-physik");
    }

    #[test]
    fn slugify_all_symbols_is_empty() {
        assert_eq!(slugify("???"), "");
    }
}
