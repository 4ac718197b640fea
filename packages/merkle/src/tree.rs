use crate::hash::NodeHasher;

/// Root of the RFC-6962 tree over `items`, in the provided order.
pub fn hash_from_byte_slices(items: Vec<Vec<u8>>) -> Vec<u8> {
    root_of(&mut NodeHasher::default(), &items)
}

fn root_of(hasher: &mut NodeHasher, items: &[Vec<u8>]) -> Vec<u8> {
    match items {
        [] => hasher.empty(),
        [leaf] => hasher.leaf(leaf),
        _ => {
            let (left, right) = items.split_at(split_point(items.len()));
            let left = root_of(hasher, left);
            let right = root_of(hasher, right);
            hasher.inner(&left, &right)
        }
    }
}

/// Largest power of two strictly below `length`, for non-empty trees
pub(crate) fn split_point(length: usize) -> usize {
    let bit_len = length.next_power_of_two().trailing_zeros();
    let k = 1 << bit_len.saturating_sub(1);
    if k == length {
        k >> 1
    } else {
        k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::hash::{inner_hash, leaf_hash};

    #[test]
    fn split_points() {
        for (length, want) in [(1, 0), (2, 1), (3, 2), (4, 2), (5, 4), (100, 64), (257, 256)] {
            assert_eq!(split_point(length), want, "length {length}");
        }
    }

    #[test]
    fn unbalanced_tree_root() {
        let items: Vec<Vec<u8>> = (0u8..3).map(|i| vec![i; 32]).collect();
        let left = inner_hash(&leaf_hash(&items[0]), &leaf_hash(&items[1]));
        let want = inner_hash(&left, &leaf_hash(&items[2]));
        assert_eq!(hash_from_byte_slices(items), want);
    }
}
