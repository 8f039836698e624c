use std::collections::HashSet;

use crate::record::VariantKey;

/// Result of comparing the variant keys of two sources.
///
/// Every list is sorted lexicographically on
/// `(chromosome, position, reference, alternate)` and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetComparison {
    pub total_first: usize,
    pub total_second: usize,
    pub only_first: Vec<VariantKey>,
    pub only_second: Vec<VariantKey>,
    pub shared: Vec<VariantKey>,
}

/// Split two key collections into keys private to each side and keys they
/// share. Duplicate keys within one collection count once.
pub fn reconcile<I, J>(first: I, second: J) -> SetComparison
where
    I: IntoIterator<Item = VariantKey>,
    J: IntoIterator<Item = VariantKey>,
{
    let first: HashSet<VariantKey> = first.into_iter().collect();
    let second: HashSet<VariantKey> = second.into_iter().collect();

    let mut only_first = Vec::new();
    let mut shared = Vec::new();
    for key in &first {
        if second.contains(key) {
            shared.push(key.clone());
        } else {
            only_first.push(key.clone());
        }
    }
    let mut only_second: Vec<VariantKey> = second
        .iter()
        .filter(|key| !first.contains(*key))
        .cloned()
        .collect();

    only_first.sort_unstable();
    only_second.sort_unstable();
    shared.sort_unstable();

    SetComparison {
        total_first: first.len(),
        total_second: second.len(),
        only_first,
        only_second,
        shared,
    }
}
