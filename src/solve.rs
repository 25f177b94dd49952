//! The generalised-birthday collision engine and the two solvers built on it.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::params::Params;
use crate::row::{has_collision, FullRow, StepRow, TruncatedRow};
use crate::HashState;

/// Generates the first list: one leaf per index in `[0, InitialListSize)`.
fn initial_list<R: StepRow>(p: &Params, base_state: &HashState) -> Vec<R> {
    (0..p.initial_list_size())
        .map(|i| R::leaf(p, base_state, i))
        .collect()
}

/// One sort-and-collide round over the current collision prefix.
///
/// Merged rows back-fill slots the scan has already consumed; the overflow
/// buffer holds whatever does not fit yet. `pos_free <= i + j` throughout,
/// so a slot is only overwritten once the cursor has passed it.
fn collision_round<R: StepRow>(p: &Params, x: &mut Vec<R>, filter_duplicates: bool) {
    if x.len() <= 1 {
        return;
    }

    trace!("sorting list");
    x.sort_unstable();

    trace!("finding collisions");
    let mut i = 0;
    let mut pos_free = 0;
    let mut xc: Vec<R> = Vec::new();
    while i + 1 < x.len() {
        // Size of the group sharing the current collision prefix. Sorting
        // makes equal prefixes contiguous, so comparing against the group
        // head is enough.
        let mut j = 1;
        while i + j < x.len() && has_collision(&x[i], &x[i + j], p.collision_byte_length()) {
            j += 1;
        }

        // Merge every unordered pair within the group.
        for l in 0..j - 1 {
            for m in (l + 1)..j {
                if !filter_duplicates || R::distinct_indices(&x[i + l], &x[i + m]) {
                    let mut merged = R::merge(&x[i + l], &x[i + m]);
                    merged.trim_hash(p.collision_byte_length());
                    xc.push(merged);
                }
            }
        }

        // Store merged rows in-place where possible.
        while pos_free < i + j && !xc.is_empty() {
            if let Some(row) = xc.pop() {
                x[pos_free] = row;
                pos_free += 1;
            }
        }

        i += j;
    }

    // A trailing singleton is never part of a group; recycle its slot too.
    while pos_free < x.len() && !xc.is_empty() {
        if let Some(row) = xc.pop() {
            x[pos_free] = row;
            pos_free += 1;
        }
    }

    if !xc.is_empty() {
        // Overflow goes to the end of the table.
        x.append(&mut xc);
    } else if pos_free < x.len() {
        x.truncate(pos_free);
        x.shrink_to_fit();
    }
}

/// Runs the `k - 1` reduction rounds, stopping early if the list empties.
fn collision_rounds<R: StepRow>(p: &Params, x: &mut Vec<R>, filter_duplicates: bool) {
    for r in 1..p.k {
        if x.is_empty() {
            break;
        }
        debug!(round = r, rows = x.len(), "collision round");
        collision_round(p, x, filter_duplicates);
    }
}

/// The final round: collides rows on their whole remaining hash.
///
/// Rows are grouped on the full residual width rather than scanned as
/// adjacent pairs, so that three or more rows sharing a residual value
/// still contribute every pairing.
fn final_round<R: StepRow>(x: &mut Vec<R>) -> Vec<R> {
    let mut out = Vec::new();
    if x.len() <= 1 {
        trace!("list is empty");
        return out;
    }

    trace!("sorting list");
    x.sort_unstable();

    trace!("finding collisions");
    let width = x[0].hash().len();
    let mut i = 0;
    while i + 1 < x.len() {
        let mut j = 1;
        while i + j < x.len() && has_collision(&x[i], &x[i + j], width) {
            j += 1;
        }

        for l in 0..j - 1 {
            for m in (l + 1)..j {
                let res = R::merge(&x[i + l], &x[i + m]);
                if res.is_zero() && R::distinct_indices(&x[i + l], &x[i + m]) {
                    out.push(res);
                }
            }
        }

        i += j;
    }
    out
}

/// The basic solver: full-width indices throughout, duplicate filtering on
/// during every round.
pub(crate) fn basic(p: &Params, base_state: &HashState) -> BTreeSet<Vec<u32>> {
    debug!(n = p.n, k = p.k, "generating first list");
    let mut x: Vec<FullRow> = initial_list(p, base_state);

    collision_rounds(p, &mut x, true);

    debug!(rows = x.len(), "final round");
    final_round(&mut x)
        .into_iter()
        .map(FullRow::into_indices)
        .collect()
}

/// The memory-optimised two-pass solver.
///
/// The first pass runs the engine over rows whose index lists hold only the
/// top 8 bits of each leaf index. Duplicate filtering stays off during its
/// rounds, since colliding truncations can still mean distinct originals.
/// Each surviving partial solution is then refined back into full solutions.
pub(crate) fn optimised(p: &Params, base_state: &HashState) -> BTreeSet<Vec<u32>> {
    debug!(n = p.n, k = p.k, "generating first list");
    let mut xt: Vec<TruncatedRow> = initial_list(p, base_state);

    collision_rounds(p, &mut xt, false);

    debug!(rows = xt.len(), "final round");
    let partial_solns: BTreeSet<Vec<u8>> = final_round(&mut xt)
        .into_iter()
        .map(TruncatedRow::into_partial_solution)
        .collect();
    debug!(count = partial_solns.len(), "found partial solutions");

    let mut solns = BTreeSet::new();
    for partial in &partial_solns {
        for row in refine_partial(p, base_state, partial) {
            solns.insert(row.into_indices());
        }
    }
    solns
}

/// Re-expands one partial solution: a sublist of candidate leaves per
/// truncated index, then pairwise sublist merging until one list remains.
fn refine_partial(p: &Params, base_state: &HashState, partial: &[u8]) -> Vec<FullRow> {
    let shift = p.truncation_shift();
    let recreate_size: u32 = 1 << shift;

    trace!(sublists = partial.len(), "generating candidate sublists");
    let mut lists: Vec<Vec<FullRow>> = partial
        .iter()
        .map(|t| {
            (0..recreate_size)
                .map(|j| FullRow::leaf(p, base_state, (u32::from(*t) << shift) | j))
                .collect()
        })
        .collect();

    // The sublist count is 2^k, so every level pairs them exactly.
    while lists.len() > 1 {
        trace!(sublists = lists.len(), "merging sublist pairs");
        for list in &mut lists {
            list.sort_unstable();
        }
        lists = lists
            .chunks(2)
            .map(|pair| merge_sublists(p, &pair[0], &pair[1]))
            .collect();
    }

    // Collisions at the last level only constrain the leading bytes; the
    // residual bytes of a candidate root must cancel as well.
    lists
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .filter(|row| row.is_zero())
        .collect()
}

/// Merges two sorted sibling sublists: rows sharing a collision prefix
/// across the two lists are cross-paired, merged and trimmed.
fn merge_sublists(p: &Params, left: &[FullRow], right: &[FullRow]) -> Vec<FullRow> {
    let len = p.collision_byte_length();
    let mut merged = Vec::new();
    let mut i_checked = 0;
    let mut j_checked = 0;
    while i_checked < left.len() && j_checked < right.len() {
        // Count the rows on each side colliding with the other side's head.
        let mut i = 0;
        while i_checked + i < left.len()
            && has_collision(&left[i_checked + i], &right[j_checked], len)
        {
            i += 1;
        }
        let mut j = 0;
        while j_checked + j < right.len()
            && has_collision(&left[i_checked], &right[j_checked + j], len)
        {
            j += 1;
        }

        for l in 0..i {
            for m in 0..j {
                if FullRow::distinct_indices(&left[i_checked + l], &right[j_checked + m]) {
                    let mut row = FullRow::merge(&left[i_checked + l], &right[j_checked + m]);
                    row.trim_hash(len);
                    merged.push(row);
                }
            }
        }

        if i == 0 && j == 0 {
            // The heads do not collide; the smaller one has no partner left.
            if left[i_checked] < right[j_checked] {
                i_checked += 1;
            } else {
                j_checked += 1;
            }
        } else {
            i_checked += i;
            j_checked += j;
        }
    }
    merged
}
