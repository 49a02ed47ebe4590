//! Shuffle order generation and the `iTunesShuffle` file.
//!
//! Smart mode spreads each domain's tracks across a virtual timeline of
//! slices so that tracks from one directory are rarely played back to back:
//!
//! ```text
//! domains:  A = [0 1 2 3 4]   B = [5 6 7]
//! slices:   | 0 5 | 1 | 2 6 | 3 | 4 7 |     (one possible placement)
//! shuffle each slice, fix boundaries, concatenate
//! ```
//!
//! The random source is always injected so placement can be replayed from a
//! seed.

use std::io::Write;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::binary::u24_le;
use crate::error::StateError;

/// One track placed on the timeline, remembering which domain it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    pub index: u32,
    pub domain: usize,
}

/// Produce the playback order for `domains`.
///
/// Either mode returns a permutation of every index in `domains`. Without
/// `smart` the indices are simply shuffled together.
pub fn generate<R: Rng + ?Sized>(domains: &[Vec<u32>], smart: bool, rng: &mut R) -> Vec<u32> {
    if smart {
        smart_shuffle(domains, rng)
    } else {
        let mut seq: Vec<u32> = domains.iter().flatten().copied().collect();
        seq.shuffle(rng);
        seq
    }
}

/// Balanced shuffle: place, shuffle slices, fix boundaries, concatenate.
pub fn smart_shuffle<R: Rng + ?Sized>(domains: &[Vec<u32>], rng: &mut R) -> Vec<u32> {
    let mut slices = balance_slices(domains, rng);
    for slice in &mut slices {
        slice.shuffle(rng);
    }
    fix_boundaries(&mut slices);
    slices.into_iter().flatten().map(|p| p.index).collect()
}

/// Distribute every track of every domain over `max(len(domain))` slices.
///
/// Slices come back in timeline order with tracks in placement order.
pub fn balance_slices<R: Rng + ?Sized>(domains: &[Vec<u32>], rng: &mut R) -> Vec<Vec<Placed>> {
    let slice_count = domains.iter().map(Vec::len).max().unwrap_or(0);
    let mut slices: Vec<Vec<Placed>> = vec![Vec::new(); slice_count];
    if slice_count == 0 {
        return slices;
    }

    for (domain, group) in domains.iter().enumerate() {
        let mut used: Vec<usize> = Vec::with_capacity(group.len());
        for &index in group {
            let pick = choose_slice(&slices, &used, rng);
            if let Some(slice) = slices.get_mut(pick) {
                slice.push(Placed { index, domain });
            }
            used.push(pick);
        }
    }

    debug!(
        slices = slice_count,
        domains = domains.len(),
        "balanced shuffle placement done"
    );
    slices
}

/// Pick a slice for the next track of a domain that already occupies `used`.
fn choose_slice<R: Rng + ?Sized>(slices: &[Vec<Placed>], used: &[usize], rng: &mut R) -> usize {
    let slice_count = slices.len();
    let metric: Vec<usize> = (0..slice_count)
        .map(|s| {
            used.iter()
                .map(|&u| circular_distance(s, u, slice_count))
                .min()
                .unwrap_or(slice_count)
        })
        .collect();
    let max_metric = metric.iter().copied().max().unwrap_or(0);
    let farthest: Vec<usize> = metric
        .iter()
        .enumerate()
        .filter(|&(_, &m)| m.saturating_mul(2) >= max_metric.saturating_add(1))
        .map(|(s, _)| s)
        .collect();

    let fill = |s: usize| slices.get(s).map_or(0, Vec::len);
    let min_fill = slices.iter().map(Vec::len).min().unwrap_or(0);
    let max_fill = slices.iter().map(Vec::len).max().unwrap_or(0);
    let limit = min_fill.saturating_add(max_fill).saturating_add(1);
    let emptiest: Vec<usize> = farthest
        .iter()
        .copied()
        .filter(|&s| fill(s).saturating_mul(2) <= limit)
        .collect();

    let candidates = if emptiest.is_empty() {
        &farthest
    } else {
        &emptiest
    };
    candidates.choose(rng).copied().unwrap_or(0)
}

/// Distance between slices `a` and `b` on a ring of `n` slices.
fn circular_distance(a: usize, b: usize, n: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(n.saturating_sub(d))
}

/// Rotate a slice's leading track to its end when it shares a domain with
/// the track just before the slice boundary.
///
/// Only slices of more than two tracks are touched.
pub fn fix_boundaries(slices: &mut [Vec<Placed>]) {
    let mut last_domain: Option<usize> = None;
    for slice in slices.iter_mut() {
        let leading = slice.first().map(|p| p.domain);
        if slice.len() > 2 && leading.is_some() && leading == last_domain {
            slice.rotate_left(1);
        }
        if let Some(last) = slice.last() {
            last_domain = Some(last.domain);
        }
    }
}

/// Serialize a shuffle order as 3-byte little-endian indices.
#[must_use]
pub fn encode_sequence(seq: &[u32]) -> Vec<u8> {
    seq.iter().flat_map(|&index| u24_le(index)).collect()
}

/// Write the `iTunesShuffle` contents for `seq`.
///
/// # Errors
///
/// Returns `StateError::Io` if the write fails.
pub fn write_sequence<W: Write>(mut out: W, seq: &[u32]) -> Result<(), StateError> {
    out.write_all(&encode_sequence(seq))?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn no_domains_no_sequence() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate(&[], true, &mut rng).is_empty());
        assert!(generate(&[], false, &mut rng).is_empty());
    }

    #[test]
    fn empty_domains_are_skipped() {
        let mut rng = StdRng::seed_from_u64(2);
        let domains = vec![vec![], vec![4, 5], vec![]];
        assert_eq!(sorted(generate(&domains, true, &mut rng)), vec![4, 5]);
    }

    #[test]
    fn both_modes_are_permutations() {
        let domains = vec![vec![0, 1, 2], vec![3], vec![4, 5, 6, 7, 8], vec![9, 10]];
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            for smart in [true, false] {
                let seq = generate(&domains, smart, &mut rng);
                assert_eq!(sorted(seq), (0..11).collect::<Vec<u32>>());
            }
        }
    }

    #[test]
    fn balanced_occupancy_and_no_domain_repeats_in_a_slice() {
        let domains = vec![vec![0, 1, 2, 3, 4], vec![5, 6, 7]];
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let slices = balance_slices(&domains, &mut rng);
            assert_eq!(slices.len(), 5);

            // mean is 8/5; every slice holds 1 or 2
            for slice in &slices {
                assert!((1..=2).contains(&slice.len()), "{slices:?}");
                let mut seen: Vec<usize> = slice.iter().map(|p| p.domain).collect();
                seen.sort_unstable();
                seen.dedup();
                assert_eq!(seen.len(), slice.len(), "{slices:?}");
            }
        }
    }

    #[test]
    fn longest_domain_fills_every_slice_once() {
        let domains = vec![vec![10, 11, 12, 13]];
        let mut rng = StdRng::seed_from_u64(7);
        let slices = balance_slices(&domains, &mut rng);
        assert!(slices.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn same_seed_same_order() {
        let domains = vec![vec![0, 1, 2, 3], vec![4, 5], vec![6, 7, 8]];
        let a = generate(&domains, true, &mut StdRng::seed_from_u64(42));
        let b = generate(&domains, true, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn boundary_fixup_rotates_leading_same_domain_track() {
        let p = |index, domain| Placed { index, domain };
        let mut slices = vec![
            vec![p(0, 0), p(1, 2)],
            vec![p(2, 2), p(3, 0), p(4, 1)],
        ];
        fix_boundaries(&mut slices);
        assert_eq!(slices[1], vec![p(3, 0), p(4, 1), p(2, 2)]);
        assert_eq!(slices[0], vec![p(0, 0), p(1, 2)]);
    }

    #[test]
    fn boundary_fixup_leaves_short_slices_alone() {
        let p = |index, domain| Placed { index, domain };
        let mut slices = vec![vec![p(0, 2)], vec![p(1, 2), p(2, 0)]];
        let before = slices.clone();
        fix_boundaries(&mut slices);
        assert_eq!(slices, before);
    }

    #[test]
    fn sequence_is_little_endian_triples() {
        assert_eq!(
            encode_sequence(&[1, 0x0203_04]),
            vec![0x01, 0x00, 0x00, 0x04, 0x03, 0x02]
        );
        let mut out = Vec::new();
        write_sequence(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }
}
