//! Natural page ordering.
//!
//! Page files come named in one of three ways: with a numbered suffix after a
//! separator (`chapter-12.jpg`, `scan_3.png`, `page# 4.jpg`), as bare integers
//! (`7.png`), or as anything else. The whole set is classified at once: one
//! item that doesn't fit a convention drops the set to the next one.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::Item;

/// `<prefix><separator>[ ]<number>` where the number may carry a decimal part.
static NUMBERED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)[-_#] ?(\d+(?:\.\d+)?)$").expect("valid suffix pattern"));

/// Which naming convention a set of items was classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NumberedSuffix,
    IntegerNames,
    Lexicographic,
}

/// Sort items into page order.
pub fn sort<I>(items: I) -> Vec<Item>
where
    I: IntoIterator<Item = Item>,
{
    sort_with_strategy(items).0
}

/// Sort items into page order and report the convention that was used.
pub fn sort_with_strategy<I>(items: I) -> (Vec<Item>, Strategy)
where
    I: IntoIterator<Item = Item>,
{
    let items: Vec<Item> = items.into_iter().collect();

    if let Some(sorted) = by_numbered_suffix(&items) {
        return (sorted, Strategy::NumberedSuffix);
    }
    if let Some(sorted) = by_integer_name(&items) {
        return (sorted, Strategy::IntegerNames);
    }
    (lexicographic(items), Strategy::Lexicographic)
}

/// Exact decimal number parsed from a digit string.
///
/// Compares without going through floating point: integer parts by length
/// then digits (leading zeros stripped), fractional parts digit by digit
/// (trailing zeros stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecimalKey {
    integer: String,
    fraction: String,
}

impl DecimalKey {
    fn parse(text: &str) -> DecimalKey {
        let (integer, fraction) = text.split_once('.').unwrap_or((text, ""));
        DecimalKey {
            integer: integer.trim_start_matches('0').to_string(),
            fraction: fraction.trim_end_matches('0').to_string(),
        }
    }
}

impl Ord for DecimalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.integer
            .len()
            .cmp(&other.integer.len())
            .then_with(|| self.integer.cmp(&other.integer))
            .then_with(|| self.fraction.cmp(&other.fraction))
    }
}

impl PartialOrd for DecimalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn by_numbered_suffix(items: &[Item]) -> Option<Vec<Item>> {
    let mut directories: Vec<&Item> = Vec::new();
    let mut groups: BTreeMap<&str, Vec<(DecimalKey, &Item)>> = BTreeMap::new();

    for item in items {
        if item.is_dir() {
            directories.push(item);
            continue;
        }
        let captures = NUMBERED_SUFFIX.captures(item.stem())?;
        let prefix = captures.get(1).map_or("", |m| m.as_str());
        let number = captures.get(2).map_or("", |m| m.as_str());
        groups
            .entry(prefix)
            .or_default()
            .push((DecimalKey::parse(number), item));
    }

    directories.sort_by(|a, b| a.name().cmp(b.name()));

    let mut sorted: Vec<Item> = directories.into_iter().cloned().collect();
    for (_, mut group) in groups {
        group.sort_by(|(ka, a), (kb, b)| ka.cmp(kb).then_with(|| a.name().cmp(b.name())));
        sorted.extend(group.into_iter().map(|(_, item)| item.clone()));
    }
    Some(sorted)
}

/// Parse a canonical integer literal: no sign other than `-`, no leading zeros.
fn canonical_integer(text: &str) -> Option<i128> {
    let value = text.parse::<i128>().ok()?;
    (value.to_string() == text).then_some(value)
}

fn by_integer_name(items: &[Item]) -> Option<Vec<Item>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        if item.is_dir() {
            return None;
        }
        keyed.push((canonical_integer(item.stem())?, item));
    }
    keyed.sort_by(|(va, a), (vb, b)| va.cmp(vb).then_with(|| a.name().cmp(b.name())));
    Some(keyed.into_iter().map(|(_, item)| item.clone()).collect())
}

fn lexicographic(mut items: Vec<Item>) -> Vec<Item> {
    items.sort_by(|a, b| a.name().cmp(b.name()));
    items.dedup_by(|a, b| a.name() == b.name());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<Item> {
        names.iter().map(|n| Item::file(*n)).collect()
    }

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.name()).collect()
    }

    #[test]
    fn test_numbered_suffix_sorts_numerically() {
        let (sorted, strategy) = sort_with_strategy(files(&["ch-2.jpg", "ch-10.jpg", "ch-1.jpg"]));
        assert_eq!(strategy, Strategy::NumberedSuffix);
        assert_eq!(names(&sorted), vec!["ch-1.jpg", "ch-2.jpg", "ch-10.jpg"]);
    }

    #[test]
    fn test_decimal_suffix_sorts_between_integers() {
        let sorted = sort(files(&["p-2.jpg", "p-10.5.jpg", "p-11.jpg", "p-10.jpg"]));
        assert_eq!(names(&sorted), vec!["p-2.jpg", "p-10.jpg", "p-10.5.jpg", "p-11.jpg"]);
    }

    #[test]
    fn test_decimal_fraction_compared_exactly() {
        let sorted = sort(files(&["p-1.5.jpg", "p-1.45.jpg", "p-1.05.jpg", "p-01.jpg"]));
        assert_eq!(
            names(&sorted),
            vec!["p-01.jpg", "p-1.05.jpg", "p-1.45.jpg", "p-1.5.jpg"]
        );
    }

    #[test]
    fn test_groups_sorted_by_prefix() {
        let sorted = sort(files(&["a-2.jpg", "b-1.jpg", "a-1.jpg"]));
        assert_eq!(names(&sorted), vec!["a-1.jpg", "a-2.jpg", "b-1.jpg"]);
    }

    #[test]
    fn test_separator_variants() {
        let (sorted, strategy) =
            sort_with_strategy(files(&["scan_3.png", "scan_12.png", "scan# 1.png"]));
        assert_eq!(strategy, Strategy::NumberedSuffix);
        assert_eq!(names(&sorted), vec!["scan# 1.png", "scan_3.png", "scan_12.png"]);
    }

    #[test]
    fn test_directories_sort_first() {
        let mut items = files(&["x-2.jpg", "x-1.jpg"]);
        items.push(Item::directory("b"));
        items.push(Item::directory("a"));
        let sorted = sort(items);
        assert_eq!(names(&sorted), vec!["a", "b", "x-1.jpg", "x-2.jpg"]);
    }

    #[test]
    fn test_integer_names() {
        let (sorted, strategy) = sort_with_strategy(files(&["3.png", "10.png", "1.png", "2.png"]));
        assert_eq!(strategy, Strategy::IntegerNames);
        assert_eq!(names(&sorted), vec!["1.png", "2.png", "3.png", "10.png"]);
    }

    #[test]
    fn test_zero_padded_names_fall_back_to_lexicographic() {
        let (sorted, strategy) = sort_with_strategy(files(&["010.jpg", "002.jpg", "001.jpg"]));
        assert_eq!(strategy, Strategy::Lexicographic);
        assert_eq!(names(&sorted), vec!["001.jpg", "002.jpg", "010.jpg"]);
    }

    #[test]
    fn test_single_odd_name_changes_strategy() {
        let (sorted, strategy) =
            sort_with_strategy(files(&["ch-2.jpg", "ch-10.jpg", "cover.jpg"]));
        assert_eq!(strategy, Strategy::Lexicographic);
        assert_eq!(names(&sorted), vec!["ch-10.jpg", "ch-2.jpg", "cover.jpg"]);
    }

    #[test]
    fn test_lexicographic_removes_duplicate_names() {
        let sorted = sort(files(&["x.png", "x.png"]));
        assert_eq!(names(&sorted), vec!["x.png"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(sort(Vec::new()).is_empty());
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let forward = files(&["p-1.jpg", "p-1.png", "q-3.jpg", "p-2.jpg", "q-1.jpg"]);
        let mut reversed = forward.clone();
        reversed.reverse();
        let first = sort(forward.clone());
        assert_eq!(first, sort(reversed));
        assert_eq!(first, sort(forward));
        assert_eq!(
            names(&first),
            vec!["p-1.jpg", "p-1.png", "p-2.jpg", "q-1.jpg", "q-3.jpg"]
        );
    }

    #[test]
    fn test_decimal_key_ordering() {
        assert!(DecimalKey::parse("2") < DecimalKey::parse("10"));
        assert!(DecimalKey::parse("10") < DecimalKey::parse("10.5"));
        assert_eq!(
            DecimalKey::parse("007.50").cmp(&DecimalKey::parse("7.5")),
            Ordering::Equal
        );
    }
}
