//! Round-robin catalog partitioning.

/// Splits `items` across at most `workers` assignments, round-robin.
///
/// The effective worker count is capped at the item count and floored at 1,
/// so no assignment is ever empty and sizes differ by at most one. The same
/// input always yields the same assignments.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }

    let count = workers.max(1).min(items.len());
    let mut assignments: Vec<Vec<T>> = (0..count).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        assignments[i % count].push(item);
    }
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_item_lands_in_exactly_one_assignment() {
        let items: Vec<u32> = (0..17).collect();
        let assignments = partition(items.clone(), 4);

        assert_eq!(assignments.len(), 4);
        let mut flattened: Vec<u32> = assignments.into_iter().flatten().collect();
        flattened.sort_unstable();
        assert_eq!(flattened, items);
    }

    #[test]
    fn assignment_sizes_differ_by_at_most_one() {
        let assignments = partition((0..17).collect::<Vec<u32>>(), 4);
        let sizes: Vec<usize> = assignments.iter().map(Vec::len).collect();
        let max = sizes.iter().copied().max().unwrap();
        let min = sizes.iter().copied().min().unwrap();
        assert!(max - min <= 1, "sizes {sizes:?} are unbalanced");
    }

    #[test]
    fn worker_count_is_capped_at_item_count() {
        let assignments = partition(vec![1, 2, 3], 8);
        assert_eq!(assignments.len(), 3);
        assert!(assignments.iter().all(|a| a.len() == 1));
    }

    #[test]
    fn zero_workers_still_yields_one_assignment() {
        let assignments = partition(vec![1, 2, 3], 0);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0], vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_yields_no_assignments() {
        let assignments = partition(Vec::<u32>::new(), 4);
        assert!(assignments.is_empty());
    }

    #[test]
    fn partitioning_is_deterministic() {
        let items: Vec<u32> = (0..23).collect();
        let first = partition(items.clone(), 5);
        let second = partition(items, 5);
        assert_eq!(first, second);
    }
}
