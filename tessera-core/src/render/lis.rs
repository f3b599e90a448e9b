//! Longest increasing subsequence.
//!
//! Patience sorting: `tails[k]` is the index of the smallest value that ends
//! an increasing run of length `k + 1`. Each value either extends the longest
//! run or replaces the first tail that is not smaller than it, and links to
//! the tail before it. Following the links back from the last tail yields
//! the subsequence. O(n log n).

/// Positions in `values` of a longest strictly increasing subsequence.
///
/// `None` entries are holes: they are never part of the result and do not
/// break a run.
pub fn longest_increasing_subsequence(values: &[Option<usize>]) -> Vec<usize> {
    let mut tails: Vec<(usize, usize)> = Vec::new();
    let mut predecessors: Vec<Option<usize>> = vec![None; values.len()];

    for (index, value) in values.iter().enumerate() {
        let Some(value) = *value else {
            continue;
        };

        let position = tails.partition_point(|&(_, tail)| tail < value);
        if position > 0 {
            predecessors[index] = Some(tails[position - 1].0);
        }
        if position == tails.len() {
            tails.push((index, value));
        } else {
            tails[position] = (index, value);
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().map(|&(index, _)| index);
    while let Some(index) = cursor {
        result.push(index);
        cursor = predecessors[index];
    }
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lis(values: &[usize]) -> Vec<usize> {
        let values: Vec<Option<usize>> = values.iter().copied().map(Some).collect();
        longest_increasing_subsequence(&values)
    }

    #[test]
    fn empty_input() {
        assert!(lis(&[]).is_empty());
    }

    #[test]
    fn already_sorted() {
        assert_eq!(lis(&[0, 1, 2, 3]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn reversed() {
        assert_eq!(lis(&[3, 2, 1, 0]).len(), 1);
    }

    #[test]
    fn classic_sequence() {
        // Several runs of length 6 exist; check the shape, not the choice
        let values = [2, 3, 1, 5, 6, 8, 7, 9, 4];
        let result = lis(&values);
        assert_eq!(result.len(), 6);
        for pair in result.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(values[pair[0]] < values[pair[1]]);
        }
    }

    #[test]
    fn holes_are_skipped() {
        let values = [Some(2), None, Some(3), Some(1), None];
        assert_eq!(longest_increasing_subsequence(&values), vec![0, 2]);
    }

    #[test]
    fn single_move_case() {
        // Old positions of [3, 4, 2] within [2, 3, 4]
        assert_eq!(lis(&[2, 3, 1]), vec![0, 1]);
    }
}
