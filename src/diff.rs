//! Pure, I/O-free diffing between two registry snapshots.

use std::collections::HashSet;

use crate::types::{IdMap, VersionMap};

/// For every subject present in `left`, returns the versions present in `left` but not
/// in `right`. A subject absent from `right` (or mapped to an empty list) contributes
/// its full version list.
pub fn subject_diff(left: &VersionMap, right: &VersionMap) -> VersionMap {
    let mut diff = VersionMap::new();

    for (subject, left_versions) in left {
        let right_versions = right.get(subject).map(Vec::as_slice).unwrap_or(&[]);
        let missing = version_diff(left_versions, right_versions);

        if !missing.is_empty() {
            diff.insert(subject.clone(), missing);
        }
    }

    diff
}

/// `a \ b`, preserving `a`'s relative order.
pub fn version_diff(a: &[u32], b: &[u32]) -> Vec<u32> {
    let present: HashSet<u32> = b.iter().copied().collect();
    a.iter().copied().filter(|v| !present.contains(v)).collect()
}

/// The id-level left-minus-right difference. Nested subjects absent from `right`
/// contribute all their `left` versions; subjects present in `right` contribute only
/// `left \ right`. Ids left with no surviving subjects are pruned from the result.
pub fn id_diff(left: &IdMap, right: &IdMap) -> IdMap {
    let mut diff = IdMap::new();

    for (id, left_subjects) in left {
        let right_subjects = right.get(id);
        let subject_diff = match right_subjects {
            Some(right_subjects) => subject_diff(left_subjects, right_subjects),
            None => left_subjects.clone(),
        };

        if !subject_diff.is_empty() {
            diff.insert(*id, subject_diff);
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: &[(&str, &[u32])]) -> VersionMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn version_diff_is_pure() {
        assert_eq!(version_diff(&[1, 2, 3], &[1, 2, 3]), Vec::<u32>::new());
        assert_eq!(version_diff(&[1, 2, 3], &[2]), vec![1, 3]);
    }

    #[test]
    fn subject_diff_self_is_empty() {
        let a = map(&[("x-value", &[1, 2]), ("y-value", &[1])]);
        assert!(subject_diff(&a, &a).is_empty());
    }

    #[test]
    fn subject_diff_treats_absent_and_empty_identically() {
        let left = map(&[("x-value", &[1, 2])]);

        let mut right_absent = VersionMap::new();
        let mut right_empty = VersionMap::new();
        right_empty.insert("x-value".to_string(), vec![]);
        let _ = &mut right_absent;

        assert_eq!(subject_diff(&left, &right_absent), subject_diff(&left, &right_empty));
    }

    #[test]
    fn subject_diff_returns_missing_versions_only() {
        let left = map(&[("x-value", &[1, 2, 3])]);
        let right = map(&[("x-value", &[1, 2])]);

        let diff = subject_diff(&left, &right);
        assert_eq!(diff.get("x-value"), Some(&vec![3]));
    }

    #[test]
    fn id_diff_self_is_empty() {
        let mut a = IdMap::new();
        a.insert(1, map(&[("x-value", &[1])]));

        assert!(id_diff(&a, &a).is_empty());
    }

    #[test]
    fn id_diff_prunes_empty_entries() {
        let mut left: IdMap = HashMap::new();
        left.insert(1, map(&[("x-value", &[1])]));

        let mut right: IdMap = HashMap::new();
        right.insert(1, map(&[("x-value", &[1])]));

        assert!(id_diff(&left, &right).is_empty());
    }

    #[test]
    fn id_diff_keeps_versions_missing_on_the_right() {
        let mut left: IdMap = HashMap::new();
        left.insert(1, map(&[("x-value", &[1, 2])]));

        let mut right: IdMap = HashMap::new();
        right.insert(1, map(&[("x-value", &[1])]));

        let diff = id_diff(&left, &right);
        assert_eq!(diff.get(&1).unwrap().get("x-value"), Some(&vec![2]));
    }
}
