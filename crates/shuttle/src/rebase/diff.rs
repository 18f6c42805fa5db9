//! Longest-common-subsequence diff over paragraph lists.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    Equal { old: usize, new: usize },
    Delete { old: usize },
    Insert { new: usize },
}

impl DiffOp {
    pub fn is_equal(&self) -> bool {
        matches!(self, DiffOp::Equal { .. })
    }
}

/// Edit script turning `old` into `new`, preferring deletions over
/// insertions when both keep the common subsequence maximal.
pub fn diff<T: PartialEq>(old: &[T], new: &[T]) -> Vec<DiffOp> {
    let (n, m) = (old.len(), new.len());
    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(DiffOp::Equal { old: i, new: j });
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(DiffOp::Delete { old: i });
            i += 1;
        } else {
            ops.push(DiffOp::Insert { new: j });
            j += 1;
        }
    }
    ops.extend((i..n).map(|old| DiffOp::Delete { old }));
    ops.extend((j..m).map(|new| DiffOp::Insert { new }));
    ops
}

/// Old indices of the `radius` nearest equal paragraphs on each side of
/// every run of changes.
pub fn changed_neighbors(ops: &[DiffOp], radius: usize) -> BTreeSet<usize> {
    let mut neighbors = BTreeSet::new();
    if radius == 0 {
        return neighbors;
    }

    let mut idx = 0;
    while idx < ops.len() {
        if ops[idx].is_equal() {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < ops.len() && !ops[idx].is_equal() {
            idx += 1;
        }

        let before = ops[..start].iter().rev();
        let after = ops[idx..].iter();
        for side in [before.collect::<Vec<_>>(), after.collect::<Vec<_>>()] {
            neighbors.extend(
                side.into_iter()
                    .filter_map(|op| match op {
                        DiffOp::Equal { old, .. } => Some(*old),
                        _ => None,
                    })
                    .take(radius),
            );
        }
    }
    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_in_the_middle() {
        let ops = diff(&["A", "B", "C"], &["A", "X", "B", "C"]);
        assert_eq!(
            ops,
            vec![
                DiffOp::Equal { old: 0, new: 0 },
                DiffOp::Insert { new: 1 },
                DiffOp::Equal { old: 1, new: 2 },
                DiffOp::Equal { old: 2, new: 3 },
            ]
        );
        assert_eq!(changed_neighbors(&ops, 1), BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_delete_and_replace() {
        let ops = diff(&["A", "B", "C", "D"], &["A", "C", "E"]);
        assert_eq!(
            ops,
            vec![
                DiffOp::Equal { old: 0, new: 0 },
                DiffOp::Delete { old: 1 },
                DiffOp::Equal { old: 2, new: 1 },
                DiffOp::Delete { old: 3 },
                DiffOp::Insert { new: 2 },
            ]
        );
        assert_eq!(changed_neighbors(&ops, 1), BTreeSet::from([0, 2]));
    }

    #[test]
    fn test_radius_widens_the_reset() {
        let old = ["A", "B", "C", "D", "E"];
        let new = ["A", "B", "X", "C", "D", "E"];
        let ops = diff(&old, &new);
        assert_eq!(changed_neighbors(&ops, 1), BTreeSet::from([1, 2]));
        assert_eq!(changed_neighbors(&ops, 2), BTreeSet::from([0, 1, 2, 3]));
        assert!(changed_neighbors(&ops, 0).is_empty());
    }

    #[test]
    fn test_edges() {
        assert!(diff::<&str>(&[], &[]).is_empty());
        assert_eq!(diff::<&str>(&[], &["A"]), vec![DiffOp::Insert { new: 0 }]);
        assert_eq!(diff::<&str>(&["A"], &[]), vec![DiffOp::Delete { old: 0 }]);
        let same = diff(&["A", "B"], &["A", "B"]);
        assert!(same.iter().all(DiffOp::is_equal));
        assert!(changed_neighbors(&same, 1).is_empty());
    }
}
