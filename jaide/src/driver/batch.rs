//! Command and target list normalisation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UsageError};

/// An ordered list of commands (or target hosts) with comments and blank
/// entries removed and every entry trimmed.
///
/// Accepted inputs:
/// - a path to a file with one entry per line
/// - a comma-separated string
/// - a single string
/// - an already-split list
///
/// In every form an entry whose first non-blank character is `#` is a
/// comment and is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandBatch {
    entries: Vec<String>,
}

impl CommandBatch {
    /// Normalise user input: a file path if one exists at `input`,
    /// otherwise a comma-separated (or single) string.
    pub fn parse(input: &str) -> Result<Self> {
        let candidate = input.trim();
        if !candidate.is_empty() && Path::new(candidate).is_file() {
            let text = std::fs::read_to_string(candidate).map_err(|e| UsageError::Invalid {
                message: format!("could not read '{candidate}': {e}"),
            })?;
            return Ok(Self::from_lines(&text));
        }
        Ok(Self::from_text(input))
    }

    /// Split a comma-separated string.
    pub fn from_text(input: &str) -> Self {
        Self::from_list(input.split(','))
    }

    /// Split file contents on line breaks.
    pub fn from_lines(text: &str) -> Self {
        Self::from_list(text.lines())
    }

    /// Normalise an already-split list.
    pub fn from_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = items
            .into_iter()
            .filter_map(|item| {
                let entry = item.as_ref().trim();
                if entry.is_empty() || entry.starts_with('#') {
                    None
                } else {
                    Some(entry.to_string())
                }
            })
            .collect();
        Self { entries }
    }

    /// The entries in order.
    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    /// Iterate the entries.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a CommandBatch {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_comma_list_drops_comment_tokens() {
        let batch = CommandBatch::from_text("show version, #comment, show interfaces");
        assert_eq!(batch.as_slice(), ["show version", "show interfaces"]);
    }

    #[test]
    fn test_single_command() {
        let batch = CommandBatch::parse("  show chassis hardware  ").unwrap();
        assert_eq!(batch.as_slice(), ["show chassis hardware"]);

        assert!(CommandBatch::parse("# just a note").unwrap().is_empty());
        assert!(CommandBatch::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_file_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# core routers").unwrap();
        writeln!(file, "set system host-name edge-r1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "   set system domain-name lab.example.net   ").unwrap();
        writeln!(file, "\t# trailing note").unwrap();

        let batch = CommandBatch::parse(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            batch.as_slice(),
            [
                "set system host-name edge-r1",
                "set system domain-name lab.example.net"
            ]
        );
    }

    #[test]
    fn test_all_forms_agree() {
        let expected = ["show version", "show interfaces terse"];
        let from_list = CommandBatch::from_list(["show version ", "#x", "", "show interfaces terse"]);
        let from_text = CommandBatch::from_text("show version,#x,,show interfaces terse");
        let from_lines = CommandBatch::from_lines("show version\n#x\n\nshow interfaces terse\n");
        assert_eq!(from_list.as_slice(), expected);
        assert_eq!(from_text, from_list);
        assert_eq!(from_lines, from_list);
    }
}
