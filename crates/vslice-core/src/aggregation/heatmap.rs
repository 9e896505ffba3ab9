/// Rank-based heatmap buckets.
///
/// Values are sorted ascending and split into 100 equal-count buckets, filled
/// alternately from both ends: the cold end first, so a tree dominated by
/// zeros reads as cold, then the hot end, so the largest values always reach
/// the top bucket. A run of equal values always lands in a single bucket, even
/// when that pushes it past a bucket boundary.
use std::cmp::Ordering;

/// Hottest bucket.
pub const MAX_BUCKET: u8 = 99;

/// Assign a bucket in `0..=99` to every value.
///
/// Returns one entry per input, in input order. Fewer than two values cannot
/// be ranked, so every entry is `None` then.
pub fn bucketize(values: &[f64]) -> Vec<Option<u8>> {
    let n = values.len();
    let mut buckets = vec![None; n];
    if n < 2 {
        return buckets;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let sorted = |pos: isize| values[order[pos as usize]];
    let bucket_size = n as f64 / 100.0;
    let bucket_at = |pos: isize| (pos as f64 / bucket_size) as isize;

    let assign = |buckets: &mut Vec<Option<u8>>, pos: isize, bucket: isize| {
        buckets[order[pos as usize]] = Some(bucket.clamp(0, MAX_BUCKET as isize) as u8);
    };

    let mut left: isize = 0;
    let mut right: isize = n as isize - 1;

    while left < right {
        let left_bucket = bucket_at(left);
        let max_left = (((left_bucket + 1) as f64 * bucket_size) as isize).min(right);
        while left < max_left {
            let current = sorted(left);
            loop {
                assign(&mut buckets, left, left_bucket);
                left += 1;
                if left > right || !same_value(sorted(left), current) {
                    break;
                }
            }
        }

        let right_bucket = bucket_at(right);
        let min_right = ((((right_bucket - 1) as f64) * bucket_size).max(0.0) as isize).max(left);
        while right > min_right {
            let current = sorted(right);
            loop {
                assign(&mut buckets, right, right_bucket);
                right -= 1;
                if left > right || !same_value(sorted(right), current) {
                    break;
                }
            }
        }
    }

    // Both passes stop on value boundaries, so a single position the pointers
    // met on has no equal neighbour and takes its own rank.
    if left == right {
        assign(&mut buckets, left, bucket_at(left));
    }

    buckets
}

#[inline]
fn same_value(a: f64, b: f64) -> bool {
    a.total_cmp(&b) == Ordering::Equal || a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn too_few_values_get_no_bucket() {
        assert!(bucketize(&[]).is_empty());
        assert_eq!(bucketize(&[5.0]), vec![None]);
    }

    #[test]
    fn two_values_span_the_range() {
        let b = bucketize(&[10.0, 1.0]);
        assert_eq!(b[1], Some(0));
        assert!(b[0].unwrap() > 0);
    }

    #[test]
    fn hundred_distinct_values_get_their_rank() {
        let values: Vec<f64> = (0..100).rev().map(f64::from).collect();
        let b = bucketize(&values);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(b[i], Some(*v as u8));
        }
    }

    #[test]
    fn ties_share_a_bucket() {
        let mut values = vec![0.0; 60];
        values.extend((1..=40).map(f64::from));
        let b = bucketize(&values);
        let zero_bucket = b[0];
        assert!(b[..60].iter().all(|x| *x == zero_bucket));
        assert_eq!(zero_bucket, Some(0));
        assert_eq!(b[99], Some(99));
    }

    #[test]
    fn all_equal_values_land_together() {
        let b = bucketize(&[3.0; 7]);
        assert!(b.iter().all(|x| x.is_some() && *x == b[0]));
    }

    proptest! {
        #[test]
        fn buckets_are_monotone_tied_and_in_range(
            values in prop::collection::vec(prop_oneof![0.0..1000.0f64, (0u8..5).prop_map(f64::from)], 2..400)
        ) {
            let b = bucketize(&values);
            prop_assert!(b.iter().all(|x| matches!(x, Some(v) if *v <= MAX_BUCKET)));
            for i in 0..values.len() {
                for j in 0..values.len() {
                    if values[i] < values[j] {
                        prop_assert!(b[i] <= b[j]);
                    } else if values[i] == values[j] {
                        prop_assert_eq!(b[i], b[j]);
                    }
                }
            }
        }
    }
}
