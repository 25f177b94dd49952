//! The bit-packed ("minimal") wire encoding of solutions: `2^k` indices of
//! `CollisionBitLength + 1` bits each, big-endian within every chunk.

use std::io::Cursor;
use std::mem::size_of;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::params::Params;
use crate::verify::{Error, Kind};

/// A big-endian bit queue: whole bytes or chunks are pushed on the right,
/// and the oldest bits are drained from the left.
///
/// Capacity is 32 bits; callers drain between pushes, and the widths in use
/// (`bit_len <= 25` plus at most 7 residual bits) never exceed it.
#[derive(Default)]
struct BitQueue {
    value: u32,
    bits: usize,
}

impl BitQueue {
    fn push(&mut self, value: u32, bits: usize) {
        debug_assert!(self.bits + bits <= u32::BITS as usize);
        self.value = (self.value << bits) | value;
        self.bits += bits;
    }

    fn take(&mut self, bits: usize) -> u32 {
        debug_assert!(bits <= self.bits);
        self.bits -= bits;
        (self.value >> self.bits) & ((1 << bits) - 1)
    }
}

pub(crate) fn expand_array(vin: &[u8], bit_len: usize, byte_pad: usize) -> Vec<u8> {
    assert!(bit_len >= 8);
    assert!(u32::BITS as usize >= 7 + bit_len);

    let chunk_bytes = (bit_len + 7) / 8;
    let out_width = chunk_bytes + byte_pad;
    let out_len = 8 * out_width * vin.len() / bit_len;

    // Shortcut for parameters where the two layouts coincide
    if out_len == vin.len() {
        return vin.to_vec();
    }

    let mut vout = Vec::with_capacity(out_len);
    let mut queue = BitQueue::default();
    for b in vin {
        queue.push(u32::from(*b), 8);

        // Each whole chunk is written big-endian into its own zero-padded
        // window.
        if queue.bits >= bit_len {
            let chunk = queue.take(bit_len);
            vout.resize(vout.len() + byte_pad, 0);
            for x in (0..chunk_bytes).rev() {
                vout.push((chunk >> (8 * x)) as u8);
            }
        }
    }

    vout
}

pub(crate) fn compress_array(vin: &[u8], bit_len: usize, byte_pad: usize) -> Vec<u8> {
    assert!(bit_len >= 8);
    assert!(u32::BITS as usize >= 7 + bit_len);

    let in_width = (bit_len + 7) / 8 + byte_pad;
    let out_len = bit_len * vin.len() / (8 * in_width);

    // Shortcut for parameters where the two layouts coincide
    if out_len == vin.len() {
        return vin.to_vec();
    }

    let mask: u32 = (1 << bit_len) - 1;
    let mut vout = Vec::with_capacity(out_len);
    let mut queue = BitQueue::default();
    for window in vin.chunks_exact(in_width) {
        // Reassemble the chunk value, skipping its padding bytes; bits above
        // bit_len are ignored.
        let chunk = window[byte_pad..]
            .iter()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        queue.push(chunk & mask, bit_len);

        while queue.bits >= 8 {
            vout.push(queue.take(8) as u8);
        }
    }

    vout
}

/// Decodes a minimal-encoded solution into its leaf indices.
pub(crate) fn indices_from_minimal(p: &Params, minimal: &[u8]) -> Result<Vec<u32>, Error> {
    let c_bit_len = p.collision_bit_length();
    let digit_bits = p.solution_size() * (c_bit_len + 1);
    if digit_bits % 8 != 0 || minimal.len() != digit_bits / 8 {
        return Err(Error(Kind::InvalidParams));
    }

    assert!(((c_bit_len + 1) + 7) / 8 <= size_of::<u32>());
    let len_indices = u32::BITS as usize * minimal.len() / (c_bit_len + 1);
    let byte_pad = size_of::<u32>() - ((c_bit_len + 1) + 7) / 8;

    let mut csr = Cursor::new(expand_array(minimal, c_bit_len + 1, byte_pad));
    let mut ret = Vec::with_capacity(len_indices);

    // Big-endian so that lexicographic array comparison is equivalent to
    // integer comparison
    while let Ok(i) = csr.read_u32::<BigEndian>() {
        ret.push(i);
    }

    Ok(ret)
}

/// Encodes a solution's leaf indices into the minimal wire form.
pub(crate) fn minimal_from_indices(p: &Params, indices: &[u32]) -> Result<Vec<u8>, Error> {
    let c_bit_len = p.collision_bit_length();
    let digit_bits = indices.len() * (c_bit_len + 1);
    if indices.len() != p.solution_size() || digit_bits % 8 != 0 {
        return Err(Error(Kind::InvalidParams));
    }
    if indices.iter().any(|i| (*i >> (c_bit_len + 1)) != 0) {
        return Err(Error(Kind::InvalidParams));
    }

    let byte_pad = size_of::<u32>() - ((c_bit_len + 1) + 7) / 8;

    let mut array = Vec::with_capacity(indices.len() * size_of::<u32>());
    for i in indices {
        array.write_u32::<BigEndian>(*i).unwrap();
    }

    Ok(compress_array(&array, c_bit_len + 1, byte_pad))
}
