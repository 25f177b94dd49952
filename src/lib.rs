//! Solver and verifier for the [Equihash] Proof-of-Work function.
//!
//! Equihash is a memory-hard proof-of-work based on the Generalized Birthday
//! Problem: find 2^k hash outputs that XOR to zero, subject to a
//! tree-structured collision schedule. Solutions are expensive (in memory) to
//! find and cheap to verify.
//!
//! The caller supplies the block-header pre-image; this crate owns everything
//! from the personalised hash state to the set of solution index vectors.
//! Solving is single-threaded and synchronous; callers exploring several
//! nonces in parallel instantiate independent states.
//!
//! Reference: Alex Biryukov and Dmitry Khovratovich, "Equihash: Asymmetric
//! Proof-of-Work Based on the Generalized Birthday Problem" (NDSS '16).
//!
//! [Equihash]: https://zips.z.cash/protocol/protocol.pdf#equihash

use std::collections::BTreeSet;

use blake2b_simd::{Hash as Blake2bHash, Params as Blake2bParams, State as Blake2bState};
use byteorder::{LittleEndian, WriteBytesExt};

mod minimal;
mod params;
mod row;
mod solve;
mod verify;

pub use verify::Error;

use params::Params;

/// A personalised BLAKE2b state, seeded with the block-header pre-image.
///
/// The state absorbs everything that precedes the trailing leaf index; the
/// solver and verifier clone it once per leaf.
#[derive(Clone)]
pub struct HashState(Blake2bState);

impl HashState {
    /// Absorbs further pre-image bytes (typically the nonce).
    pub fn update(&mut self, input: &[u8]) -> &mut Self {
        self.0.update(input);
        self
    }
}

/// The 16-byte BLAKE2b personalisation block: `"ZcashPOW"` followed by `n`
/// and `k` as little-endian 32-bit words.
fn personalisation(n: u32, k: u32) -> [u8; 16] {
    let mut personal = [0u8; 16];
    personal[..8].copy_from_slice(b"ZcashPOW");
    (&mut personal[8..12]).write_u32::<LittleEndian>(n).unwrap();
    (&mut personal[12..]).write_u32::<LittleEndian>(k).unwrap();
    personal
}

fn initialise_state(n: u32, k: u32, digest_len: usize) -> Blake2bState {
    Blake2bParams::new()
        .hash_length(digest_len)
        .personal(&personalisation(n, k))
        .to_state()
}

/// Hashes the 4-byte little-endian leaf index `i` on top of the seeded state.
pub(crate) fn generate_hash(base_state: &HashState, i: u32) -> Blake2bHash {
    let mut lei = [0u8; 4];
    (&mut lei[..]).write_u32::<LittleEndian>(i).unwrap();

    let mut state = base_state.0.clone();
    state.update(&lei);
    state.finalize()
}

/// An Equihash instance for one `(n, k)` parameterisation.
///
/// Indices are fixed at `u32`; this restricts the parameters to
/// `n/(k+1) + 1 < 32`, which is an implementation restriction rather than a
/// protocol rule.
#[derive(Clone, Copy, Debug)]
pub struct Equihash {
    params: Params,
}

impl Equihash {
    /// Creates an instance, rejecting parameters that violate the
    /// divisibility or magnitude invariants.
    pub fn new(n: u32, k: u32) -> Result<Self, Error> {
        Ok(Equihash {
            params: Params::new(n, k)?,
        })
    }

    pub fn n(&self) -> u32 {
        self.params.n
    }

    pub fn k(&self) -> u32 {
        self.params.k
    }

    /// The number of hash prefix bits on which sibling rows must agree at
    /// each round, `n/(k+1)`.
    pub fn collision_bit_length(&self) -> usize {
        self.params.collision_bit_length()
    }

    pub fn collision_byte_length(&self) -> usize {
        self.params.collision_byte_length()
    }

    /// The number of leaf indices in a solution, `2^k`.
    pub fn solution_size(&self) -> usize {
        self.params.solution_size()
    }

    /// Constructs the personalised hash state and absorbs `input`.
    ///
    /// `input` is whatever the header serializer wants hashed ahead of the
    /// leaf index; more bytes (such as a nonce) can be absorbed afterwards
    /// with [`HashState::update`].
    pub fn initialise_state(&self, input: &[u8]) -> HashState {
        let mut state = HashState(initialise_state(
            self.params.n,
            self.params.k,
            self.params.hash_length(),
        ));
        state.update(input);
        state
    }

    /// Runs the full-index solver, returning every solution for the seeded
    /// pre-image. An empty set is not an error; callers iterate by varying
    /// the nonce.
    pub fn solve_basic(&self, base_state: &HashState) -> BTreeSet<Vec<u32>> {
        solve::basic(&self.params, base_state)
    }

    /// Runs the memory-optimised two-pass solver: a truncated-index pass
    /// collecting partial solutions, then a refinement pass re-expanding each
    /// of them. Produces the same set of solutions as [`Self::solve_basic`].
    pub fn solve_optimised(&self, base_state: &HashState) -> BTreeSet<Vec<u32>> {
        solve::optimised(&self.params, base_state)
    }

    /// Checks whether `soln` is a valid solution for the seeded pre-image.
    pub fn is_valid_solution(&self, base_state: &HashState, soln: &[u32]) -> Result<(), Error> {
        verify::is_valid_solution(&self.params, base_state, soln)
    }

    /// Decodes a solution from its bit-packed wire encoding.
    pub fn indices_from_minimal(&self, minimal: &[u8]) -> Result<Vec<u32>, Error> {
        minimal::indices_from_minimal(&self.params, minimal)
    }

    /// Encodes a solution into its bit-packed wire encoding.
    pub fn minimal_from_indices(&self, indices: &[u32]) -> Result<Vec<u8>, Error> {
        minimal::minimal_from_indices(&self.params, indices)
    }
}
