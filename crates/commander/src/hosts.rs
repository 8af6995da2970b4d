//! Host file loading and validation
//!
//! A host file holds one IPv4 literal per line. Blank lines and lines whose
//! first non-whitespace character is `#` are skipped. Anything else that is
//! not a dotted quad is logged and dropped.

use crate::{CommanderError, Result};
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// Dotted quad of 1-3 digit groups. Octet range is not checked.
static IPV4_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("IPv4 literal pattern is valid")
});

/// A syntactically valid IPv4 literal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddress(String);

impl HostAddress {
    /// Validate a trimmed candidate, returning `None` if it is not a dotted quad
    pub fn parse(candidate: &str) -> Option<Self> {
        IPV4_LITERAL
            .is_match(candidate)
            .then(|| Self(candidate.to_string()))
    }

    /// The address as written in the host file
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HostAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A host file line that was neither blank, a comment, nor a valid address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    /// 1-based line number in the host file
    pub line: usize,
    /// Trimmed text of the line
    pub text: String,
}

/// Validated hosts in file order. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostList {
    hosts: Vec<HostAddress>,
    rejected: Vec<RejectedLine>,
}

impl HostList {
    /// Number of valid hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether no valid host was found
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Valid hosts in file order
    pub fn hosts(&self) -> &[HostAddress] {
        &self.hosts
    }

    /// Lines that were logged and dropped
    pub fn rejected(&self) -> &[RejectedLine] {
        &self.rejected
    }

    /// Iterate over the valid hosts
    pub fn iter(&self) -> std::slice::Iter<'_, HostAddress> {
        self.hosts.iter()
    }

    /// Parse host file content from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut list = Self::default();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let candidate = line.trim();
            if candidate.is_empty() || candidate.starts_with('#') {
                continue;
            }

            match HostAddress::parse(candidate) {
                Some(host) => list.hosts.push(host),
                None => {
                    warn!("The IP {} is NOT valid. Ignored!", candidate);
                    list.rejected.push(RejectedLine {
                        line: number + 1,
                        text: candidate.to_string(),
                    });
                }
            }
        }

        Ok(list)
    }
}

impl FromIterator<HostAddress> for HostList {
    fn from_iter<I: IntoIterator<Item = HostAddress>>(iter: I) -> Self {
        Self {
            hosts: iter.into_iter().collect(),
            rejected: Vec::new(),
        }
    }
}

impl IntoIterator for HostList {
    type Item = HostAddress;
    type IntoIter = std::vec::IntoIter<HostAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.into_iter()
    }
}

impl<'a> IntoIterator for &'a HostList {
    type Item = &'a HostAddress;
    type IntoIter = std::slice::Iter<'a, HostAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}

/// Read the host file at `path`.
///
/// Fails only if the file cannot be opened or read; invalid entries are
/// logged and reported through [`HostList::rejected`]. The result may be empty.
pub fn load_hosts(path: impl AsRef<Path>) -> Result<HostList> {
    let path = path.as_ref();
    let host_file_error = |source| CommanderError::HostFile {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(host_file_error)?;
    HostList::from_reader(BufReader::new(file)).map_err(host_file_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn host_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn addresses(list: &HostList) -> Vec<&str> {
        list.iter().map(HostAddress::as_str).collect()
    }

    #[test]
    fn test_host_address_validation() {
        assert!(HostAddress::parse("10.0.0.1").is_some());
        assert!(HostAddress::parse("192.168.100.254").is_some());
        // Syntax only: octets above 255 are accepted.
        assert!(HostAddress::parse("999.999.999.999").is_some());

        assert!(HostAddress::parse("10.0.0").is_none());
        assert!(HostAddress::parse("10.0.0.1.5").is_none());
        assert!(HostAddress::parse("1000.0.0.1").is_none());
        assert!(HostAddress::parse("not-an-ip").is_none());
        assert!(HostAddress::parse("web01.example.com").is_none());
        assert!(HostAddress::parse("10.0.0.1:22").is_none());
        assert!(HostAddress::parse("").is_none());
    }

    #[test]
    fn test_mixed_host_file() {
        let file = host_file("10.0.0.1\n#10.0.0.2\n\n999.1.1.1\nnot-an-ip\n");
        let list = load_hosts(file.path()).unwrap();

        assert_eq!(addresses(&list), vec!["10.0.0.1", "999.1.1.1"]);
        assert_eq!(
            list.rejected(),
            &[RejectedLine {
                line: 5,
                text: "not-an-ip".to_string()
            }]
        );
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let list = HostList::from_reader(Cursor::new("  10.0.0.1\t\n   # indented comment\n \t \n")).unwrap();

        assert_eq!(addresses(&list), vec!["10.0.0.1"]);
        assert!(list.rejected().is_empty());
    }

    #[test]
    fn test_comments_and_blanks_only() {
        let file = host_file("# production\n\n   \n# staging\n");
        let list = load_hosts(file.path()).unwrap();

        assert!(list.is_empty());
        assert!(list.rejected().is_empty());
    }

    #[test]
    fn test_empty_file() {
        let file = host_file("");
        let list = load_hosts(file.path()).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let list = HostList::from_reader(Cursor::new("10.0.0.1\n10.0.0.2\n10.0.0.1\n")).unwrap();
        assert_eq!(addresses(&list), vec!["10.0.0.1", "10.0.0.2", "10.0.0.1"]);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-hosts.txt");

        match load_hosts(&path) {
            Err(CommanderError::HostFile { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected HostFile error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_is_idempotent() {
        let file = host_file("10.1.1.1\nbad\n10.1.1.2\n# c\n10.1.1.3\n");

        let first = load_hosts(file.path()).unwrap();
        let second = load_hosts(file.path()).unwrap();
        assert_eq!(first, second);
    }

    #[derive(Debug, Clone)]
    enum Line {
        Valid(String),
        Comment(String),
        Blank(String),
        Junk(String),
    }

    impl Line {
        fn text(&self) -> &str {
            match self {
                Line::Valid(s) | Line::Comment(s) | Line::Blank(s) | Line::Junk(s) => s,
            }
        }
    }

    fn line_strategy() -> impl Strategy<Value = Line> {
        prop_oneof![
            "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}".prop_map(Line::Valid),
            "[ \t]{0,2}#[ -~]{0,12}".prop_map(Line::Comment),
            "[ \t]{0,3}".prop_map(Line::Blank),
            "[a-z][a-z.-]{0,10}".prop_map(Line::Junk),
        ]
    }

    proptest! {
        #[test]
        fn test_loader_keeps_valid_lines_in_order(lines in prop::collection::vec(line_strategy(), 0..40)) {
            let content = lines.iter().map(Line::text).collect::<Vec<_>>().join("\n");
            let list = HostList::from_reader(Cursor::new(content)).unwrap();

            let expected: Vec<&str> = lines
                .iter()
                .filter_map(|l| match l {
                    Line::Valid(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            let junk = lines.iter().filter(|l| matches!(l, Line::Junk(_))).count();

            prop_assert_eq!(addresses(&list), expected);
            prop_assert_eq!(list.rejected().len(), junk);
        }
    }
}
