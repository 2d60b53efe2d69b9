//! Hybrid quicksort → insertion-sort used to order (distance², index) pairs
//! ascending by distance. Shared by: sorting a query's output arrays, and
//! sorting candidate cells by lower-bound distance before visitation.
//!
//! A direct, safe-Rust transcription of the original's median-of-three
//! quicksort (tail-recursing on the larger partition, bailing to insertion
//! sort once a subrange drops to 12 or fewer elements) followed by a final
//! insertion-sort cleanup pass over the whole range.

const INSERTION_THRESHOLD: usize = 12;

/// Sorts `keys` ascending, permuting `values` in lockstep.
pub fn sort_by_key(keys: &mut [f32], values: &mut [i32]) {
    debug_assert_eq!(keys.len(), values.len());
    quicksort(keys, values);
    insertion_sort(keys, values);
}

fn quicksort(keys: &mut [f32], values: &mut [i32]) {
    let mut keys = keys;
    let mut values = values;
    loop {
        let n = keys.len();
        if n <= INSERTION_THRESHOLD {
            return;
        }

        let m = n / 2;
        // Median-of-three: order keys[0], keys[m], keys[n-1] by swapping
        // the median into position 0 ahead of partitioning.
        let c01 = keys[0] < keys[m];
        let c12 = keys[m] < keys[n - 1];
        if c01 != c12 {
            let c = keys[0] < keys[n - 1];
            let z = if c == c12 { 0 } else { n - 1 };
            keys.swap(z, m);
            values.swap(z, m);
        }
        keys.swap(0, m);
        values.swap(0, m);

        let pivot = keys[0];
        let mut i = 1;
        let mut j = n - 1;
        loop {
            while keys[i] < pivot {
                i += 1;
            }
            while pivot < keys[j] {
                j -= 1;
            }
            if i >= j {
                break;
            }
            keys.swap(i, j);
            values.swap(i, j);
            i += 1;
            j -= 1;
        }

        // Recurse on the smaller partition, iterate on the larger one.
        if j < n - i {
            quicksort(&mut keys[..j], &mut values[..j]);
            let (_, rest_k) = keys.split_at_mut(i);
            let (_, rest_v) = values.split_at_mut(i);
            keys = rest_k;
            values = rest_v;
        } else {
            {
                let (_, rest_k) = keys.split_at_mut(i);
                let (_, rest_v) = values.split_at_mut(i);
                quicksort(rest_k, rest_v);
            }
            keys = &mut keys[..j];
            values = &mut values[..j];
        }
    }
}

fn insertion_sort(keys: &mut [f32], values: &mut [i32]) {
    for i in 1..keys.len() {
        let ka = keys[i];
        let va = values[i];
        let mut j = i;
        while j > 0 && ka < keys[j - 1] {
            keys[j] = keys[j - 1];
            values[j] = values[j - 1];
            j -= 1;
        }
        if j != i {
            keys[j] = ka;
            values[j] = va;
        }
    }
}
