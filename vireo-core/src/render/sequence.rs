//! Longest increasing subsequence, used by the keyed diff to find the
//! children that can stay where they are.

/// Indices of one longest strictly increasing subsequence of the non-zero
/// entries of `values`, in ascending order.
///
/// Zero marks "no old node" and is skipped. Runs in O(n log n): `tails[k]`
/// holds the index ending the smallest-valued increasing run of length
/// `k + 1`, and `prev` links each index to its predecessor in that run.
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    let mut prev = vec![0usize; values.len()];
    let mut tails: Vec<usize> = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        if value == 0 {
            continue;
        }
        match tails.last() {
            None => {
                tails.push(i);
                continue;
            }
            Some(&last) if values[last] < value => {
                prev[i] = last;
                tails.push(i);
                continue;
            }
            Some(_) => {}
        }

        // First tail whose value is not below `value`; exists since the
        // last tail is not below it.
        let pos = tails.partition_point(|&t| values[t] < value);
        if value < values[tails[pos]] {
            if pos > 0 {
                prev[i] = tails[pos - 1];
            }
            tails[pos] = i;
        }
    }

    let mut len = tails.len();
    let Some(&last) = tails.last() else {
        return tails;
    };
    let mut cursor = last;
    while len > 0 {
        len -= 1;
        tails[len] = cursor;
        cursor = prev[cursor];
    }
    tails
}
