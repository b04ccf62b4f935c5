//! Definition file naming: `<revision>_<slug>.yml`.

use crate::revision::RevisionId;
use std::path::Path;

/// Maximum length of the descriptive slug in a file name.
pub const SLUG_MAX_LEN: usize = 40;

/// Turn free text into a file-name slug.
///
/// Lowercases ASCII letters and collapses every run of non-alphanumeric
/// characters to a single `_`. Leading and trailing separators are trimmed and
/// the result is cut to [`SLUG_MAX_LEN`] characters on a word boundary when
/// possible.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if slug.len() <= SLUG_MAX_LEN {
        return slug;
    }
    let cut = &slug[..SLUG_MAX_LEN];
    match cut.rfind('_') {
        Some(pos) if pos > 0 => cut[..pos].to_string(),
        _ => cut.to_string(),
    }
}

/// Build the file name for a new definition.
pub fn definition_file_name(revision: &RevisionId, description: &str) -> String {
    let slug = slugify(description);
    if slug.is_empty() {
        format!("{revision}.yml")
    } else {
        format!("{revision}_{slug}.yml")
    }
}

/// Extract the leading revision token from a definition path.
///
/// Returns the part of the file stem before the first `_`, or the whole stem
/// when there is no separator.
pub fn leading_token(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;
    Some(stem.split('_').next().unwrap_or(stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Rename users -> accounts"), "rename_users_accounts");
        assert_eq!(slugify("  add   NOT NULL!! column "), "add_not_null_column");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_slugify_truncates_on_word_boundary() {
        let slug = slugify("normalize the customer address table into street city and zip");
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert!(!slug.ends_with('_'));
        assert!(slug.starts_with("normalize_the_customer_address"));
    }

    #[test]
    fn test_definition_file_name() {
        let rev = RevisionId::try_new("1975ea83b712").unwrap();
        assert_eq!(
            definition_file_name(&rev, "Add account table"),
            "1975ea83b712_add_account_table.yml"
        );
        assert_eq!(definition_file_name(&rev, ""), "1975ea83b712.yml");
    }

    #[test]
    fn test_leading_token_ignores_suffix() {
        assert_eq!(
            leading_token(Path::new("migrations/ae10_whatever_i_renamed.yml")),
            Some("ae10")
        );
        assert_eq!(leading_token(Path::new("ae10.yaml")), Some("ae10"));
    }
}
