//! Section Splitter: cuts a raw completion on the delimiter.
//!
//! Never fails and never judges cardinality; that is the validator's job.
//! A delimiter inside a table or a quote is indistinguishable from a real
//! separator here, so no repair is attempted.

use crate::protocol::section::RawCompletion;

/// Splits `text` on every `delimiter`, trimming each piece.
///
/// The protocol terminates every section with the delimiter, so a single
/// trailing empty piece is dropped. Whitespace-only input yields no pieces.
pub fn split_sections(text: &str, delimiter: char) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut pieces: Vec<String> = text
        .split(delimiter)
        .map(|piece| piece.trim().to_string())
        .collect();

    if text.ends_with(delimiter) && pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }

    pieces
}

/// Convenience wrapper over [`split_sections`] for a [`RawCompletion`].
pub fn split_completion(raw: &RawCompletion, delimiter: char) -> Vec<String> {
    split_sections(raw.as_str(), delimiter)
}

/// True when the text, ignoring trailing whitespace, ends with the delimiter.
pub fn is_delimiter_terminated(text: &str, delimiter: char) -> bool {
    text.trim_end().ends_with(delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_four_terminated_sections() {
        let raw = "Bonjour! §\n# Titre §\nCorps de l'article. §\nUne question ? §";
        let pieces = split_sections(raw, '§');
        assert_eq!(
            pieces,
            vec!["Bonjour!", "# Titre", "Corps de l'article.", "Une question ?"]
        );
    }

    #[test]
    fn test_missing_final_delimiter_still_yields_four() {
        let pieces = split_sections("a § # b § c § d ?", '§');
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces[3], "d ?");
    }

    #[test]
    fn test_only_one_trailing_empty_piece_is_dropped() {
        let pieces = split_sections("a § b §§", '§');
        assert_eq!(pieces, vec!["a", "b", ""]);
    }

    #[test]
    fn test_interior_empty_pieces_are_kept() {
        let pieces = split_sections("a §§ c §", '§');
        assert_eq!(pieces, vec!["a", "", "c"]);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split_sections("", '§').is_empty());
        assert!(split_sections("  \n\t ", '§').is_empty());
    }

    #[test]
    fn test_text_without_delimiter_is_one_piece() {
        assert_eq!(split_sections("  hello  ", '§'), vec!["hello"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let pieces = split_sections("a | b | c | d |", '|');
        assert_eq!(pieces, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_delimiter_terminated() {
        assert!(is_delimiter_terminated("Une question ? §\n", '§'));
        assert!(!is_delimiter_terminated("Une question ?", '§'));
    }

    #[test]
    fn test_split_completion_wraps_raw_text() {
        let raw = RawCompletion::new("x § y §");
        assert_eq!(split_completion(&raw, '§'), vec!["x", "y"]);
    }
}
