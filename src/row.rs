//! Step rows: the hash-prefix-plus-index-list entries the collision engine
//! sorts, merges and trims.

use std::cmp::Ordering;

use crate::params::Params;
use crate::{generate_hash, HashState};

/// The row algebra the collision engine is generic over.
///
/// A row exclusively owns its hash buffer and index list. At round `r` the
/// hash holds the current (post-trim) prefix of length `n/8 - r * l` bytes
/// (`l` the collision byte length) and the index list holds `2^(r+1)`
/// entries in canonical order.
pub(crate) trait StepRow: Clone + Ord {
    /// Creates the leaf row for index `i` from the seeded hash state.
    fn leaf(p: &Params, base_state: &HashState, i: u32) -> Self;

    /// The current hash prefix.
    fn hash(&self) -> &[u8];

    /// Drops the first `l` bytes of the hash prefix.
    fn trim_hash(&mut self, l: usize);

    /// XOR-merges two sibling rows. The index lists are concatenated with
    /// the half owning the smaller leading index first; the validator relies
    /// on this canonical ordering. Merging rows of unequal hash or index
    /// length is a contract violation and aborts.
    fn merge(a: &Self, b: &Self) -> Self;

    /// Whether the index lists of `a` and `b` are disjoint.
    fn distinct_indices(a: &Self, b: &Self) -> bool;

    fn is_zero(&self) -> bool {
        self.hash().iter().all(|v| *v == 0)
    }
}

/// Whether the first `len` hash bytes of `a` and `b` agree.
pub(crate) fn has_collision<R: StepRow>(a: &R, b: &R, len: usize) -> bool {
    a.hash()
        .iter()
        .zip(b.hash().iter())
        .take(len)
        .all(|(a, b)| a == b)
}

fn xor_hashes(a: &[u8], b: &[u8]) -> Vec<u8> {
    assert_eq!(a.len(), b.len(), "hash length differs");
    a.iter().zip(b.iter()).map(|(a, b)| a ^ b).collect()
}

/// Checks if the intersection of `a` and `b` is empty, by sorting copies and
/// scanning them together.
fn disjoint<T: Copy + Ord>(a: &[T], b: &[T]) -> bool {
    let mut a_srt = a.to_vec();
    let mut b_srt = b.to_vec();
    a_srt.sort_unstable();
    b_srt.sort_unstable();

    let mut i = 0;
    let mut j = 0;
    while i < a_srt.len() && j < b_srt.len() {
        match a_srt[i].cmp(&b_srt[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => return false,
        }
    }
    true
}

/// A row carrying full-width leaf indices.
#[derive(Clone, Debug)]
pub(crate) struct FullRow {
    pub(crate) hash: Vec<u8>,
    pub(crate) indices: Vec<u32>,
}

impl FullRow {
    /// Whether this row's leftmost index precedes the other's.
    pub(crate) fn indices_before(&self, other: &FullRow) -> bool {
        self.indices[0] < other.indices[0]
    }

    pub(crate) fn into_indices(self) -> Vec<u32> {
        self.indices
    }
}

impl StepRow for FullRow {
    fn leaf(p: &Params, base_state: &HashState, i: u32) -> Self {
        let hash = generate_hash(base_state, i).as_bytes().to_vec();
        debug_assert_eq!(hash.len(), p.hash_length());
        FullRow {
            hash,
            indices: vec![i],
        }
    }

    fn hash(&self) -> &[u8] {
        &self.hash
    }

    fn trim_hash(&mut self, l: usize) {
        self.hash.drain(..l);
    }

    fn merge(a: &Self, b: &Self) -> Self {
        assert_eq!(
            a.indices.len(),
            b.indices.len(),
            "number of indices differs"
        );
        let hash = xor_hashes(&a.hash, &b.hash);
        let (first, second) = if a.indices_before(b) { (a, b) } else { (b, a) };
        let mut indices = Vec::with_capacity(a.indices.len() + b.indices.len());
        indices.extend_from_slice(&first.indices);
        indices.extend_from_slice(&second.indices);
        FullRow { hash, indices }
    }

    fn distinct_indices(a: &Self, b: &Self) -> bool {
        disjoint(&a.indices, &b.indices)
    }
}

impl PartialEq for FullRow {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for FullRow {}

impl PartialOrd for FullRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FullRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

/// A row carrying the top 8 bits of each leaf index. The full indices are
/// retained alongside; distinctness is judged on them, since distinct leaves
/// routinely share a truncated prefix.
#[derive(Clone, Debug)]
pub(crate) struct TruncatedRow {
    pub(crate) hash: Vec<u8>,
    pub(crate) indices: Vec<u8>,
    pub(crate) full_indices: Vec<u32>,
}

impl TruncatedRow {
    pub(crate) fn into_partial_solution(self) -> Vec<u8> {
        self.indices
    }
}

impl StepRow for TruncatedRow {
    fn leaf(p: &Params, base_state: &HashState, i: u32) -> Self {
        let hash = generate_hash(base_state, i).as_bytes().to_vec();
        debug_assert_eq!(hash.len(), p.hash_length());
        TruncatedRow {
            hash,
            indices: vec![(i >> p.truncation_shift()) as u8],
            full_indices: vec![i],
        }
    }

    fn hash(&self) -> &[u8] {
        &self.hash
    }

    fn trim_hash(&mut self, l: usize) {
        self.hash.drain(..l);
    }

    fn merge(a: &Self, b: &Self) -> Self {
        assert_eq!(
            a.indices.len(),
            b.indices.len(),
            "number of indices differs"
        );
        let hash = xor_hashes(&a.hash, &b.hash);
        let (first, second) = if a.indices[0] < b.indices[0] { (a, b) } else { (b, a) };
        let mut indices = Vec::with_capacity(a.indices.len() + b.indices.len());
        indices.extend_from_slice(&first.indices);
        indices.extend_from_slice(&second.indices);
        let mut full_indices = Vec::with_capacity(a.full_indices.len() + b.full_indices.len());
        full_indices.extend_from_slice(&first.full_indices);
        full_indices.extend_from_slice(&second.full_indices);
        TruncatedRow {
            hash,
            indices,
            full_indices,
        }
    }

    fn distinct_indices(a: &Self, b: &Self) -> bool {
        disjoint(&a.full_indices, &b.full_indices)
    }
}

impl PartialEq for TruncatedRow {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for TruncatedRow {}

impl PartialOrd for TruncatedRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TruncatedRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::{disjoint, has_collision, FullRow, StepRow, TruncatedRow};
    use crate::params::Params;
    use crate::Equihash;

    fn row(hash: &[u8], indices: &[u32]) -> FullRow {
        FullRow {
            hash: hash.to_vec(),
            indices: indices.to_vec(),
        }
    }

    #[test]
    fn leaf_hashes_are_deterministic() {
        let eq = Equihash::new(96, 5).unwrap();
        let state = eq.initialise_state(b"");
        let p = Params::new(96, 5).unwrap();

        let a = FullRow::leaf(&p, &state, 0);
        let b = FullRow::leaf(&p, &state, 0);
        let c = FullRow::leaf(&p, &state, 1);
        assert_eq!(a.hash.len(), 12);
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
        assert_eq!(a.indices, &[0]);

        // A second engine with identical parameters and pre-image agrees.
        let state2 = Equihash::new(96, 5).unwrap().initialise_state(b"");
        assert_eq!(FullRow::leaf(&p, &state2, 7).hash, FullRow::leaf(&p, &state, 7).hash);
    }

    #[test]
    fn truncated_leaf_keeps_top_bits() {
        let eq = Equihash::new(48, 5).unwrap();
        let state = eq.initialise_state(b"");
        let p = Params::new(48, 5).unwrap();

        // 9-bit index space; the truncation drops the low bit.
        let t = TruncatedRow::leaf(&p, &state, 0b1_0110_1011);
        assert_eq!(t.indices, &[0b1011_0101]);
        assert_eq!(t.full_indices, &[0b1_0110_1011]);
        assert_eq!(t.hash, FullRow::leaf(&p, &state, 0b1_0110_1011).hash);
    }

    #[test]
    fn merge_is_canonical() {
        let a = row(&[0x0f, 0x01], &[5]);
        let b = row(&[0xf0, 0x10], &[2]);

        let ab = FullRow::merge(&a, &b);
        let ba = FullRow::merge(&b, &a);
        assert_eq!(ab.hash, vec![0xff, 0x11]);
        assert_eq!(ab.indices, vec![2, 5]);
        assert_eq!(ba.hash, ab.hash);
        assert_eq!(ba.indices, ab.indices);
    }

    #[test]
    fn merge_of_equal_rows_is_zero() {
        let a = row(&[0xaa, 0x55], &[1]);
        let b = row(&[0xaa, 0x55], &[9]);
        assert!(FullRow::merge(&a, &b).is_zero());
        assert!(!FullRow::merge(&a, &row(&[0xaa, 0x54], &[9])).is_zero());
    }

    #[test]
    #[should_panic(expected = "hash length differs")]
    fn merge_rejects_mismatched_hashes() {
        let a = row(&[0x00], &[1]);
        let b = row(&[0x00, 0x00], &[2]);
        FullRow::merge(&a, &b);
    }

    #[test]
    #[should_panic(expected = "number of indices differs")]
    fn merge_rejects_mismatched_indices() {
        let a = row(&[0x00], &[1]);
        let b = row(&[0x00], &[2, 3]);
        FullRow::merge(&a, &b);
    }

    #[test]
    fn trim_drops_leading_bytes() {
        let mut a = row(&[1, 2, 3, 4], &[0]);
        a.trim_hash(2);
        assert_eq!(a.hash, vec![3, 4]);
    }

    #[test]
    fn collision_compares_prefix_bytes() {
        let a = row(&[1, 2, 3], &[0]);
        let b = row(&[1, 2, 9], &[1]);
        assert!(has_collision(&a, &b, 2));
        assert!(!has_collision(&a, &b, 3));
    }

    #[test]
    fn rows_order_lexicographically() {
        let a = row(&[0x01, 0xff], &[0]);
        let b = row(&[0x02, 0x00], &[1]);
        assert!(a < b);
        assert!(row(&[0x01, 0x00], &[3]) < a);
    }

    #[test]
    fn disjoint_index_lists() {
        assert!(disjoint(&[1u32, 5, 9], &[2, 4, 8]));
        assert!(!disjoint(&[1u32, 5, 9], &[8, 5, 2]));
        assert!(disjoint::<u32>(&[], &[1]));
    }
}
