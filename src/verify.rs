//! Validation of claimed Equihash solutions.

use std::fmt;

use crate::params::Params;
use crate::row::{has_collision, FullRow, StepRow};
use crate::HashState;

/// An Equihash failure: invalid parameters, or a solution that failed to
/// verify.
#[derive(Debug)]
pub struct Error(pub(crate) Kind);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid solution: {}", self.0)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    InvalidParams,
    Collision,
    OutOfOrder,
    DuplicateIdxs,
    NonZeroRootHash,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::InvalidParams => f.write_str("invalid parameters"),
            Kind::Collision => f.write_str("invalid collision length between StepRows"),
            Kind::OutOfOrder => f.write_str("Index tree incorrectly ordered"),
            Kind::DuplicateIdxs => f.write_str("duplicate indices"),
            Kind::NonZeroRootHash => f.write_str("root hash of tree is non-zero"),
        }
    }
}

/// Checks the structural requirements on a sibling pair: collision on the
/// current prefix, left-before-right ordering of the leftmost indices, and
/// disjoint leaf sets.
fn validate_subtrees(p: &Params, a: &FullRow, b: &FullRow) -> Result<(), Kind> {
    if !has_collision(a, b, p.collision_byte_length()) {
        Err(Kind::Collision)
    } else if b.indices_before(a) {
        Err(Kind::OutOfOrder)
    } else if !FullRow::distinct_indices(a, b) {
        Err(Kind::DuplicateIdxs)
    } else {
        Ok(())
    }
}

/// Level-by-level validation: materialises all leaves, then collapses the
/// list pairwise until a single root remains.
#[cfg(test)]
pub(crate) fn is_valid_solution_iterative(
    p: &Params,
    base_state: &HashState,
    soln: &[u32],
) -> Result<(), Error> {
    if soln.len() != p.solution_size() {
        return Err(Error(Kind::InvalidParams));
    }

    let mut rows: Vec<FullRow> = soln
        .iter()
        .map(|i| FullRow::leaf(p, base_state, *i))
        .collect();

    while rows.len() > 1 {
        let mut cur_rows = Vec::new();
        for pair in rows.chunks(2) {
            let a = &pair[0];
            let b = &pair[1];
            validate_subtrees(p, a, b).map_err(Error)?;
            let mut merged = FullRow::merge(a, b);
            merged.trim_hash(p.collision_byte_length());
            cur_rows.push(merged);
        }
        rows = cur_rows;
    }

    assert!(rows.len() == 1);

    if rows[0].is_zero() {
        Ok(())
    } else {
        Err(Error(Kind::NonZeroRootHash))
    }
}

fn tree_validator(p: &Params, base_state: &HashState, soln: &[u32]) -> Result<FullRow, Error> {
    if soln.len() > 1 {
        let end = soln.len();
        let mid = end / 2;
        let a = tree_validator(p, base_state, &soln[0..mid])?;
        let b = tree_validator(p, base_state, &soln[mid..end])?;
        validate_subtrees(p, &a, &b).map_err(Error)?;
        let mut merged = FullRow::merge(&a, &b);
        merged.trim_hash(p.collision_byte_length());
        Ok(merged)
    } else {
        Ok(FullRow::leaf(p, base_state, soln[0]))
    }
}

/// Checks whether `soln` is a valid solution for the seeded state.
///
/// A wrong-length solution is rejected before any hashing happens.
pub(crate) fn is_valid_solution(
    p: &Params,
    base_state: &HashState,
    soln: &[u32],
) -> Result<(), Error> {
    if soln.len() != p.solution_size() {
        return Err(Error(Kind::InvalidParams));
    }

    // Recursive validation is faster
    let root = tree_validator(p, base_state, soln)?;

    // Hashes were trimmed at every merge, so only the residual is left to
    // check.
    if root.is_zero() {
        Ok(())
    } else {
        Err(Error(Kind::NonZeroRootHash))
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_solution, is_valid_solution_iterative, Kind};
    use crate::params::Params;
    use crate::row::{has_collision, FullRow, StepRow};
    use crate::testing::solve_until_found;
    use crate::Equihash;

    #[test]
    fn wrong_length_is_rejected() {
        let eq = Equihash::new(96, 5).unwrap();
        let state = eq.initialise_state(b"");
        let err = eq.is_valid_solution(&state, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.0, Kind::InvalidParams);
        let err = eq.is_valid_solution(&state, &[]).unwrap_err();
        assert_eq!(err.0, Kind::InvalidParams);
    }

    #[test]
    fn found_solutions_pass_both_validators() {
        let eq = Equihash::new(48, 5).unwrap();
        let (state, solns) = solve_until_found(&eq);
        let p = Params::new(48, 5).unwrap();

        for soln in &solns {
            is_valid_solution(&p, &state, soln).unwrap();
            is_valid_solution_iterative(&p, &state, soln).unwrap();
        }
    }

    #[test]
    fn reversed_sibling_pair_is_out_of_order() {
        let eq = Equihash::new(48, 5).unwrap();
        let (state, solns) = solve_until_found(&eq);

        for soln in &solns {
            let mut mutated = soln.clone();
            mutated.swap(0, 1);
            let err = eq.is_valid_solution(&state, &mutated).unwrap_err();
            assert_eq!(err.0, Kind::OutOfOrder);
        }
    }

    #[test]
    fn swapped_halves_are_out_of_order() {
        let eq = Equihash::new(48, 5).unwrap();
        let (state, solns) = solve_until_found(&eq);
        let half = eq.solution_size() / 2;

        for soln in &solns {
            let mut mutated = soln[half..].to_vec();
            mutated.extend_from_slice(&soln[..half]);
            let err = eq.is_valid_solution(&state, &mutated).unwrap_err();
            assert_eq!(err.0, Kind::OutOfOrder);
        }
    }

    #[test]
    fn duplicated_pair_has_duplicate_indices() {
        let eq = Equihash::new(48, 5).unwrap();
        let (state, solns) = solve_until_found(&eq);

        for soln in &solns {
            // Copy the first sibling pair over the second; the duplicate
            // only surfaces one level up.
            let mut mutated = soln.clone();
            mutated[2] = soln[0];
            mutated[3] = soln[1];
            let err = eq.is_valid_solution(&state, &mutated).unwrap_err();
            assert_eq!(err.0, Kind::DuplicateIdxs);
        }
    }

    #[test]
    fn swapped_non_sibling_indices_are_rejected() {
        let eq = Equihash::new(48, 5).unwrap();
        let (state, solns) = solve_until_found(&eq);
        let p = Params::new(48, 5).unwrap();
        let soln = solns.iter().next().unwrap();

        // Pick a non-sibling leaf that does not share the first pair's
        // collision prefix; swapping it into position 0 must then fail the
        // prefix check rather than the ordering check.
        let sibling = FullRow::leaf(&p, &state, soln[1]);
        let swap_with = (2..soln.len())
            .find(|j| {
                let leaf = FullRow::leaf(&p, &state, soln[*j]);
                !has_collision(&leaf, &sibling, p.collision_byte_length())
            })
            .unwrap();

        let mut mutated = soln.clone();
        mutated.swap(0, swap_with);
        let err = eq.is_valid_solution(&state, &mutated).unwrap_err();
        assert_eq!(err.0, Kind::Collision);
    }

    #[test]
    fn mutated_indices_are_rejected() {
        let eq = Equihash::new(48, 5).unwrap();
        let (state, solns) = solve_until_found(&eq);
        let soln = solns.iter().next().unwrap();

        for i in 0..soln.len() {
            let mut mutated = soln.clone();
            mutated[i] ^= 1 << 8;
            assert!(eq.is_valid_solution(&state, &mutated).is_err());
        }
    }

    #[test]
    fn all_bits_of_the_encoding_matter() {
        let eq = Equihash::new(48, 5).unwrap();
        let (state, solns) = solve_until_found(&eq);
        let soln = solns.iter().next().unwrap();

        let minimal = eq.minimal_from_indices(soln).unwrap();
        assert_eq!(&eq.indices_from_minimal(&minimal).unwrap(), soln);

        // Changing any single bit of the encoded solution makes it invalid.
        for i in 0..minimal.len() * 8 {
            let mut mutated = minimal.clone();
            mutated[i / 8] ^= 1 << (i % 8);
            let indices = eq.indices_from_minimal(&mutated).unwrap();
            assert!(eq.is_valid_solution(&state, &indices).is_err());
        }
    }
}
