//! Target-set definitions.
//!
//! Groups are read from a line-oriented stream:
//!
//! ```text
//! # comment
//! [web]
//! web[01:04]
//! -web03
//!
//! [db]
//! db01
//! ```
//!
//! `[name]` selects the current group and a blank line clears it. Every other
//! line is a member expression whose optional prefix picks the operation:
//! `-` difference, `|`/`+` union, `&`/`*` intersection, `^` symmetric
//! difference. No prefix means union. The value is either an existing group
//! (its members at that point in the stream) or a range token.
//!
//! Each member line applies to the current group and to the default group,
//! when one is configured. Groups must be defined before they are referenced.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use tracing::{debug, trace};

use crate::error::TaskmasterError;
use crate::range;
use crate::types::SetOperator;

/// Members of a single group, kept sorted so materialized target lists are stable.
pub type Group = BTreeSet<String>;

/// Mapping from group name to its members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTable {
    groups: BTreeMap<String, Group>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a targets file. A missing file yields an empty table.
    pub fn from_file(path: &Path, default_group: Option<&str>) -> Result<Self, TaskmasterError> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no targets file at {}", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(TaskmasterError::TargetsFile {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let lines = io::BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| TaskmasterError::TargetsFile {
                path: path.to_path_buf(),
                source,
            })?;

        let table = parse(lines, default_group, None);
        debug!(
            "read {} groups from targets file {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Members of `name` in dispatch order, or empty if the group is unknown.
    pub fn targets(&self, name: &str) -> Vec<String> {
        self.groups
            .get(name)
            .map(|group| group.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn apply(&mut self, name: &str, op: SetOperator, values: &Group) {
        let group = self.groups.entry(name.to_string()).or_default();
        match op {
            SetOperator::Union => group.extend(values.iter().cloned()),
            SetOperator::Difference => group.retain(|m| !values.contains(m)),
            SetOperator::Intersection => group.retain(|m| values.contains(m)),
            SetOperator::SymmetricDifference => {
                for value in values {
                    if !group.remove(value) {
                        group.insert(value.clone());
                    }
                }
            }
        }
    }
}

/// What a member expression's value token refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    /// Targets produced by range expansion.
    Literal(Group),
    /// A group name; `found` is false when no such group exists yet.
    GroupReference { found: bool, members: Group },
}

/// A member line split into its operator and value token.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MemberExpr<'a> {
    op: SetOperator,
    explicit: bool,
    value: &'a str,
}

impl<'a> MemberExpr<'a> {
    fn parse(line: &'a str) -> Self {
        let first = line.chars().next();
        let (op, explicit) = match first.and_then(SetOperator::from_prefix) {
            Some(op) => (op, true),
            None => (SetOperator::Union, false),
        };
        let value = line
            .trim_start_matches(|c: char| SetOperator::PREFIXES.contains(&c) || c.is_whitespace())
            .trim();
        Self {
            op,
            explicit,
            value,
        }
    }

    fn resolve(&self, table: &GroupTable) -> Resolution {
        if let Some(group) = table.get(self.value) {
            return Resolution::GroupReference {
                found: true,
                members: group.clone(),
            };
        }
        // An explicit union names a group to merge; a bare token is a literal.
        if self.explicit && self.op == SetOperator::Union {
            return Resolution::GroupReference {
                found: false,
                members: Group::new(),
            };
        }
        Resolution::Literal(range::expand(self.value).into_iter().collect())
    }
}

/// Parse a stream of set-expression lines into a group table.
///
/// `seed` layers the new definitions on top of a table from an earlier parse.
/// Literals land in the current group and in `default_group`.
pub fn parse<I, S>(lines: I, default_group: Option<&str>, seed: Option<GroupTable>) -> GroupTable
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut table = seed.unwrap_or_default();
    let mut current: Option<String> = None;

    for line in lines {
        let line = line.as_ref().trim();
        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            current = None;
            continue;
        }
        if line.starts_with('[') {
            current = Some(line.trim_matches(|c: char| c == '[' || c == ']').to_string());
            continue;
        }

        let expr = MemberExpr::parse(line);
        if expr.value.is_empty() {
            continue;
        }
        let values = match expr.resolve(&table) {
            Resolution::Literal(values) => values,
            Resolution::GroupReference { found: true, members } => members,
            Resolution::GroupReference { found: false, .. } => {
                trace!("skipping reference to undefined group {:?}", expr.value);
                continue;
            }
        };

        if let Some(name) = current.as_deref() {
            table.apply(name, expr.op, &values);
        }
        if let Some(name) = default_group.filter(|d| current.as_deref() != Some(*d)) {
            table.apply(name, expr.op, &values);
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Group {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn words(input: &str) -> Vec<&str> {
        input.split_whitespace().collect()
    }

    #[test]
    fn test_parse_basic_group() {
        let table = parse(words("[login] login01 login02 login03"), None, None);
        assert_eq!(
            table.get("login").unwrap(),
            &set(&["login01", "login02", "login03"])
        );
    }

    #[test]
    fn test_parse_default_group_accumulates() {
        let table = parse(words("[login] login01 login02 login03"), Some("all"), None);
        assert_eq!(
            table.get("all").unwrap(),
            &set(&["login01", "login02", "login03"])
        );
    }

    #[test]
    fn test_parse_include_group() {
        let table = parse("[a]\nfoo\nbar\n\n[b]\n|a\n".lines(), None, None);
        assert_eq!(table.get("b").unwrap(), &set(&["foo", "bar"]));
    }

    #[test]
    fn test_parse_bare_group_name_includes_group() {
        let table = parse("[a]\nfoo\nbar\n\n[b]\na\n".lines(), None, None);
        assert_eq!(table.get("b").unwrap(), &set(&["foo", "bar"]));
    }

    #[test]
    fn test_parse_exclusion() {
        let table = parse(
            "[login]\nlogin01\nlogin02\nlogin03\n-login02\n".lines(),
            None,
            None,
        );
        assert_eq!(table.get("login").unwrap(), &set(&["login01", "login03"]));
    }

    #[test]
    fn test_parse_exclude_group() {
        let input = "[a]\nfoo\nbar\n\n[b]\nfoo\nbar\nbaz\n\n[c]\nb\n-a\n";
        let table = parse(input.lines(), None, None);
        assert_eq!(table.get("c").unwrap(), &set(&["baz"]));
    }

    #[test]
    fn test_parse_intersection() {
        let table = parse(words("[a] foo bar [b] foo baz [c] |a &b"), None, None);
        assert_eq!(table.get("c").unwrap(), &set(&["foo"]));
    }

    #[test]
    fn test_parse_intersection_star_alias() {
        let table = parse(words("[a] foo bar [b] foo baz [c] +a *b"), None, None);
        assert_eq!(table.get("c").unwrap(), &set(&["foo"]));
    }

    #[test]
    fn test_parse_symmetric_difference() {
        let table = parse(words("[a] foo bar [b] foo baz [c] |a ^b"), None, None);
        assert_eq!(table.get("c").unwrap(), &set(&["bar", "baz"]));
    }

    #[test]
    fn test_parse_seeded_default_group() {
        let first = parse("[a]\nbaz\n".lines(), Some("all"), None);
        let table = parse(words("foo bar |a"), Some("all"), Some(first));
        assert_eq!(table.get("all").unwrap(), &set(&["baz", "foo", "bar"]));
    }

    #[test]
    fn test_parse_layering_matches_concatenation() {
        let a = "[web]\nweb[1:3]\n\n[db]\ndb1\n";
        let b = "[mixed]\n|web\n|db\n-web2\n";

        let layered = parse(b.lines(), Some("all"), Some(parse(a.lines(), Some("all"), None)));
        let joined = parse(format!("{a}\n{b}").lines(), Some("all"), None);
        assert_eq!(layered, joined);
        assert_eq!(layered.targets("mixed"), vec!["db1", "web1", "web3"]);
    }

    #[test]
    fn test_parse_range_members() {
        let table = parse("[n]\nnode[01:03]\n".lines(), None, None);
        assert_eq!(
            table.get("n").unwrap(),
            &set(&["node01", "node02", "node03"])
        );
    }

    #[test]
    fn test_parse_comments_ignored() {
        let table = parse("[a]\n# a comment\nfoo\n  # indented\n".lines(), None, None);
        assert_eq!(table.get("a").unwrap(), &set(&["foo"]));
    }

    #[test]
    fn test_parse_blank_line_resets_group() {
        let table = parse("[a]\nfoo\n\nbar\n".lines(), Some("all"), None);
        assert_eq!(table.get("a").unwrap(), &set(&["foo"]));
        assert_eq!(table.get("all").unwrap(), &set(&["foo", "bar"]));
    }

    #[test]
    fn test_parse_header_creates_nothing_alone() {
        let table = parse("[empty]\n".lines(), None, None);
        assert!(table.get("empty").is_none());
    }

    #[test]
    fn test_parse_top_level_without_default_is_dropped() {
        let table = parse(words("foo bar"), None, None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_parse_undefined_explicit_union_is_noop() {
        let table = parse(words("[a] foo |missing"), None, None);
        assert_eq!(table.get("a").unwrap(), &set(&["foo"]));
        assert!(table.get("missing").is_none());
    }

    #[test]
    fn test_parse_reference_is_snapshot() {
        let input = "[a]\nfoo\n\n[b]\n|a\n\n[a]\nbar\n";
        let table = parse(input.lines(), None, None);
        assert_eq!(table.get("a").unwrap(), &set(&["foo", "bar"]));
        assert_eq!(table.get("b").unwrap(), &set(&["foo"]));
    }

    #[test]
    fn test_parse_is_idempotent_for_unions() {
        let input = "[a]\nfoo\nfoo\nbar\n";
        let once = parse(input.lines(), Some("all"), None);
        let twice = parse(input.lines(), Some("all"), Some(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_default_group_header_applies_once() {
        let table = parse(words("[all] foo bar ^bar"), Some("all"), None);
        assert_eq!(table.get("all").unwrap(), &set(&["foo"]));
    }

    #[test]
    fn test_parse_operator_with_whitespace() {
        let table = parse("[a]\nfoo\nbar\n-  bar\n".lines(), None, None);
        assert_eq!(table.get("a").unwrap(), &set(&["foo"]));
    }

    #[test]
    fn test_parse_operator_alone_is_ignored() {
        let table = parse("[a]\nfoo\n-\n".lines(), None, None);
        assert_eq!(table.get("a").unwrap(), &set(&["foo"]));
    }

    #[test]
    fn test_member_expr_parse() {
        let expr = MemberExpr::parse("-web01");
        assert_eq!(expr.op, SetOperator::Difference);
        assert!(expr.explicit);
        assert_eq!(expr.value, "web01");

        let expr = MemberExpr::parse("web01-");
        assert_eq!(expr.op, SetOperator::Union);
        assert!(!expr.explicit);
        assert_eq!(expr.value, "web01-");
    }

    #[test]
    fn test_resolution_variants() {
        let table = parse(words("[a] foo"), None, None);

        assert_eq!(
            MemberExpr::parse("&a").resolve(&table),
            Resolution::GroupReference {
                found: true,
                members: set(&["foo"]),
            }
        );
        assert_eq!(
            MemberExpr::parse("|nope").resolve(&table),
            Resolution::GroupReference {
                found: false,
                members: Group::new(),
            }
        );
        assert_eq!(
            MemberExpr::parse("h[1:2]").resolve(&table),
            Resolution::Literal(set(&["h1", "h2"]))
        );
    }

    #[test]
    fn test_targets_sorted() {
        let table = parse(words("[a] zeta alpha mid"), None, None);
        assert_eq!(table.targets("a"), vec!["alpha", "mid", "zeta"]);
        assert!(table.targets("unknown").is_empty());
    }

    #[test]
    fn test_from_file_missing_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let table = GroupTable::from_file(&tmp.path().join("targets"), Some("all")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_file_reads_groups() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("targets");
        std::fs::write(&path, "[web]\nweb[1:2]\n\n[db]\ndb1\n").unwrap();

        let table = GroupTable::from_file(&path, Some("all")).unwrap();
        assert_eq!(table.targets("all"), vec!["db1", "web1", "web2"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.targets("web"), vec!["web1", "web2"]);
    }

    #[test]
    fn test_from_file_directory_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = GroupTable::from_file(tmp.path(), None);
        assert!(result.is_err());
    }
}
