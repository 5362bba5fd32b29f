//! Recipient extraction
//!
//! Turns a free-text blob or a grid of spreadsheet cells into a de-duplicated,
//! order-preserving list of syntactically valid addresses.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Anchored pattern a whole value must match to count as an address
static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid address pattern"));

/// Unanchored pattern used to find addresses inside free text; list and
/// mailbox punctuation ends a match
static ADDRESS_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^\s@,;<>()"']+@[^\s@,;<>()"']+\.[^\s@,;<>()"']+"#)
        .expect("valid address pattern")
});

/// Extraction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Nothing in the input looked like an address
    #[error("No valid emails found.")]
    NoRecipients,
}

/// Whether `value` is a syntactically valid address (`local@domain.tld`)
#[must_use]
pub fn is_valid_address(value: &str) -> bool {
    ADDRESS.is_match(value)
}

/// Find every address in a free-text blob
///
/// Whitespace, commas, semicolons, quotes and angle brackets separate
/// candidates. Results keep first-seen order with duplicates removed.
///
/// # Errors
///
/// Returns [`ExtractError::NoRecipients`] if no address is found
///
/// ```rust
/// use bulkmail::recipients::extract_from_text;
///
/// let found = extract_from_text("a@b.com\nc@d.org a@b.com").unwrap();
/// assert_eq!(found, vec!["a@b.com", "c@d.org"]);
/// ```
pub fn extract_from_text(text: &str) -> Result<Vec<String>, ExtractError> {
    finish(ADDRESS_IN_TEXT.find_iter(text).map(|m| m.as_str().to_string()))
}

/// Collect addresses from a grid of cells
///
/// Each cell is trimmed and kept only if the whole cell is an address.
///
/// # Errors
///
/// Returns [`ExtractError::NoRecipients`] if no cell holds an address
pub fn extract_from_cells<R, C>(rows: R) -> Result<Vec<String>, ExtractError>
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = C>,
    C: AsRef<str>,
{
    let cells = rows
        .into_iter()
        .flat_map(IntoIterator::into_iter)
        .map(|cell| cell.as_ref().trim().to_string())
        .filter(|cell| is_valid_address(cell));
    finish(cells)
}

fn finish(found: impl Iterator<Item = String>) -> Result<Vec<String>, ExtractError> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = found.filter(|addr| seen.insert(addr.clone())).collect();

    if unique.is_empty() {
        Err(ExtractError::NoRecipients)
    } else {
        Ok(unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_address() {
        assert!(is_valid_address("user@example.com"));
        assert!(is_valid_address("first.last+tag@sub.example.co"));
        assert!(!is_valid_address("not-an-email"));
        assert!(!is_valid_address("user@localhost"));
        assert!(!is_valid_address("user @example.com"));
        assert!(!is_valid_address("a@b@c.com"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_extract_from_text_dedupes_in_order() {
        let text = "Contacts:\nzed@z.io, amy@a.io;\n amy@a.io\tBob <bob@b.io>";
        let found = extract_from_text(text).unwrap();
        assert_eq!(found, vec!["zed@z.io", "amy@a.io", "bob@b.io"]);
    }

    #[test]
    fn test_extract_from_text_is_case_sensitive() {
        let found = extract_from_text("A@b.com a@b.com").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_extract_from_text_none_found() {
        assert_eq!(
            extract_from_text("nothing to see here"),
            Err(ExtractError::NoRecipients)
        );
    }

    #[test]
    fn test_extract_from_cells() {
        let rows = vec![
            vec!["Name", "Email"],
            vec!["Amy", "  amy@a.io "],
            vec!["Bob", "bob@b.io"],
            vec!["Dup", "amy@a.io"],
            vec!["Bad", "bob at b.io"],
        ];
        let found = extract_from_cells(rows).unwrap();
        assert_eq!(found, vec!["amy@a.io", "bob@b.io"]);
    }

    #[test]
    fn test_extract_from_cells_requires_whole_cell() {
        let rows = vec![vec!["contact amy@a.io today"]];
        assert_eq!(extract_from_cells(rows), Err(ExtractError::NoRecipients));
    }
}
