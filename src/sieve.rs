// sieve.rs — Segmented prime sieve, CPU reference.
//
// The device sieve in `gpu::sieve` is validated against this module, so
// the per-segment marking here is written to match the kernel step for step.
//
// TWO PHASES
// ──────────
//   Phase 1 (host, sequential): all primes ≤ ⌈√N⌉, the "base primes".
//   Phase 2 (one work-item per segment): every integer in [2, N] belongs to
//   exactly one closed-open segment [start, start + segment_size). Each
//   segment first assumes every member prime, then clears multiples of each
//   base prime p starting at max(p², first multiple ≥ start).
//
// A segment never reads another segment's flags. Clearing is an assignment,
// so a composite hit by several base primes (12 = 2·6 = 3·4) ends up in the
// same state no matter how many times or in what order it is cleared.
//
// Flags are indexed by the number itself; indices 0 and 1 stay 0.
//
//   index:  0 1 2 3 4 5 6 7 8 9 10 11
//   flag:   0 0 1 1 0 1 0 1 0 0 0  1
//
// Primes are reported inclusive of N.

use std::ops::Range;

/// Primes ≤ `limit` by a plain Sieve of Eratosthenes.
///
/// This is the trusted sequential sieve: phase 1 of the segmented sieve and
/// the oracle in tests.
pub fn simple_sieve(limit: u32) -> Vec<u32> {
    if limit < 2 {
        return Vec::new();
    }
    let n = limit as usize;
    let mut is_prime = vec![true; n + 1];
    is_prime[0] = false;
    is_prime[1] = false;
    let mut p = 2usize;
    while p * p <= n {
        if is_prime[p] {
            let mut m = p * p;
            while m <= n {
                is_prime[m] = false;
                m += p;
            }
        }
        p += 1;
    }
    is_prime
        .iter()
        .enumerate()
        .filter(|(_, &prime)| prime)
        .map(|(i, _)| i as u32)
        .collect()
}

/// ⌈√n⌉ in integer arithmetic.
pub fn ceil_sqrt(n: u32) -> u32 {
    if n < 2 {
        return n;
    }
    // Float estimate, then correct by at most a step either way.
    let mut r = (n as f64).sqrt() as u64;
    let n = n as u64;
    while r * r > n {
        r -= 1;
    }
    while r * r < n {
        r += 1;
    }
    r as u32
}

/// Base primes for sieving up to `limit`: every prime ≤ ⌈√limit⌉.
pub fn base_primes(limit: u32) -> Vec<u32> {
    simple_sieve(ceil_sqrt(limit))
}

/// Partition of [2, limit] into closed-open segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Largest number examined (inclusive).
    pub limit: u32,
    pub segment_size: u32,
}

impl SegmentPlan {
    /// # Panics
    /// Panics if `segment_size` is zero.
    pub fn new(limit: u32, segment_size: u32) -> Self {
        assert!(segment_size > 0, "segment size must be positive");
        SegmentPlan { limit, segment_size }
    }

    /// Number of segments (work-items). Zero when `limit < 2`.
    pub fn segment_count(&self) -> u32 {
        if self.limit < 2 {
            return 0;
        }
        let span = self.limit as u64 - 1; // count of integers in [2, limit]
        span.div_ceil(self.segment_size as u64) as u32
    }

    /// Closed-open range of segment `index`, clipped to `limit + 1`.
    pub fn segment(&self, index: u32) -> Range<u64> {
        let start = 2 + index as u64 * self.segment_size as u64;
        let end = (start + self.segment_size as u64).min(self.limit as u64 + 1);
        start..end.max(start)
    }

    /// Length of the flag array (indices 0..=limit).
    pub fn flag_len(&self) -> usize {
        self.limit as usize + 1
    }
}

/// Mark one segment of `flags` using `base` (ascending). Mirrors the kernel.
pub fn mark_segment(flags: &mut [u32], segment: Range<u64>, base: &[u32]) {
    for n in segment.clone() {
        flags[n as usize] = 1;
    }
    for &p in base {
        let p = p as u64;
        if p * p >= segment.end {
            break;
        }
        let first = segment.start.div_ceil(p) * p;
        let mut m = first.max(p * p);
        while m < segment.end {
            flags[m as usize] = 0;
            m += p;
        }
    }
}

/// Collect flagged indices in ascending order.
pub fn collect_primes(flags: &[u32]) -> Vec<u32> {
    flags
        .iter()
        .enumerate()
        .filter(|(_, &f)| f != 0)
        .map(|(i, _)| i as u32)
        .collect()
}

/// Full segmented sieve on the CPU: both phases plus the reduction.
pub fn segmented_sieve(limit: u32, segment_size: u32) -> Vec<u32> {
    let plan = SegmentPlan::new(limit, segment_size);
    if plan.segment_count() == 0 {
        return Vec::new();
    }
    let base = base_primes(limit);
    let mut flags = vec![0u32; plan.flag_len()];
    for i in 0..plan.segment_count() {
        mark_segment(&mut flags, plan.segment(i), &base);
    }
    collect_primes(&flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_sieve_small() {
        assert_eq!(simple_sieve(0), Vec::<u32>::new());
        assert_eq!(simple_sieve(1), Vec::<u32>::new());
        assert_eq!(simple_sieve(2), vec![2]);
        assert_eq!(simple_sieve(30), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_ceil_sqrt() {
        assert_eq!(ceil_sqrt(0), 0);
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(2), 2);
        assert_eq!(ceil_sqrt(4), 2);
        assert_eq!(ceil_sqrt(5), 3);
        assert_eq!(ceil_sqrt(25), 5);
        assert_eq!(ceil_sqrt(26), 6);
        assert_eq!(ceil_sqrt(u32::MAX), 65_536);
    }

    #[test]
    fn test_segments_cover_range_exactly_once() {
        let plan = SegmentPlan::new(100, 7);
        let mut seen = vec![0u32; plan.flag_len()];
        for i in 0..plan.segment_count() {
            for n in plan.segment(i) {
                seen[n as usize] += 1;
            }
        }
        assert_eq!(seen[0], 0);
        assert_eq!(seen[1], 0);
        assert!(seen[2..].iter().all(|&c| c == 1));
    }

    #[test]
    fn test_segment_count_edges() {
        assert_eq!(SegmentPlan::new(1, 8).segment_count(), 0);
        assert_eq!(SegmentPlan::new(2, 8).segment_count(), 1);
        assert_eq!(SegmentPlan::new(9, 8).segment_count(), 1);
        assert_eq!(SegmentPlan::new(10, 8).segment_count(), 2);
    }

    #[test]
    fn test_mark_segment_is_idempotent() {
        let plan = SegmentPlan::new(200, 16);
        let base = base_primes(200);
        let mut once = vec![0u32; plan.flag_len()];
        let mut twice = vec![0u32; plan.flag_len()];
        for i in 0..plan.segment_count() {
            mark_segment(&mut once, plan.segment(i), &base);
        }
        // Run every segment twice, in reverse order the second time.
        for i in 0..plan.segment_count() {
            mark_segment(&mut twice, plan.segment(i), &base);
        }
        for i in (0..plan.segment_count()).rev() {
            mark_segment(&mut twice, plan.segment(i), &base);
        }
        assert_eq!(once, twice);
    }

    #[test]
    fn test_segmented_matches_simple() {
        for limit in [2, 3, 4, 25, 97, 1000] {
            for seg in [1, 2, 5, 64] {
                assert_eq!(
                    segmented_sieve(limit, seg),
                    simple_sieve(limit),
                    "limit {limit}, segment {seg}"
                );
            }
        }
    }
}
