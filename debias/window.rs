use std::collections::{BTreeMap, VecDeque};

const SIGN_BIT: u64 = 1 << 63;

/// Maps an `f64` to a `u64` whose unsigned order matches `f64::total_cmp`.
#[inline]
fn order_key(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT
    }
}

#[inline]
fn from_order_key(key: u64) -> f64 {
    if key & SIGN_BIT != 0 {
        f64::from_bits(key ^ SIGN_BIT)
    } else {
        f64::from_bits(!key)
    }
}

/// Ordered multiset of floats with O(log n) insert, remove and extreme queries.
#[derive(Debug, Default)]
struct Multiset {
    counts: BTreeMap<u64, usize>,
    len: usize,
}

impl Multiset {
    fn insert(&mut self, key: u64) {
        *self.counts.entry(key).or_insert(0) += 1;
        self.len += 1;
    }

    fn remove(&mut self, key: u64) -> bool {
        match self.counts.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.counts.remove(&key);
            }
            None => return false,
        }
        self.len -= 1;
        true
    }

    fn first(&self) -> Option<u64> {
        self.counts.keys().next().copied()
    }

    fn last(&self) -> Option<u64> {
        self.counts.keys().next_back().copied()
    }

    fn pop_first(&mut self) -> Option<u64> {
        let key = self.first()?;
        self.remove(key);
        Some(key)
    }

    fn pop_last(&mut self) -> Option<u64> {
        let key = self.last()?;
        self.remove(key);
        Some(key)
    }
}

/// Median of the most recent `capacity` pushed values.
///
/// The lower half lives in `low`, the upper half in `high`; `low` holds the extra element when
/// the count is odd. With an even count the median is the mean of the two middle values.
#[derive(Debug)]
pub struct MovingMedian {
    capacity: usize,
    recent: VecDeque<f64>,
    low: Multiset,
    high: Multiset,
}

impl MovingMedian {
    /// `capacity` is clamped to at least one value.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
            low: Multiset::default(),
            high: Multiset::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Adds `value`, evicting the oldest value once the window is full.
    pub fn push(&mut self, value: f64) {
        if self.recent.len() == self.capacity {
            if let Some(oldest) = self.recent.pop_front() {
                let key = order_key(oldest);
                if !self.low.remove(key) {
                    self.high.remove(key);
                }
            }
        }

        let key = order_key(value);
        let belongs_low = match self.low.last() {
            Some(top) => key <= top,
            None => self.high.first().is_none_or(|bottom| key <= bottom),
        };
        if belongs_low {
            self.low.insert(key);
        } else {
            self.high.insert(key);
        }
        self.recent.push_back(value);
        self.rebalance();
    }

    fn rebalance(&mut self) {
        while self.low.len > self.high.len + 1 {
            if let Some(key) = self.low.pop_last() {
                self.high.insert(key);
            }
        }
        while self.high.len > self.low.len {
            if let Some(key) = self.high.pop_first() {
                self.low.insert(key);
            }
        }
    }

    /// `None` until the first push.
    pub fn median(&self) -> Option<f64> {
        let low = from_order_key(self.low.last()?);
        if self.low.len > self.high.len {
            return Some(low);
        }
        let high = from_order_key(self.high.first()?);
        Some(0.5 * (low + high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force_median(values: &[f64]) -> f64 {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        if n % 2 == 1 {
            sorted[n / 2]
        } else {
            0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
        }
    }

    #[test]
    fn order_key_round_trips_and_preserves_order() {
        let values = [-3.5, -0.0, 0.0, 1e-300, 2.0, f64::INFINITY, f64::NEG_INFINITY];
        for &v in &values {
            assert_eq!(from_order_key(order_key(v)).to_bits(), v.to_bits());
        }
        for &a in &values {
            for &b in &values {
                assert_eq!(order_key(a).cmp(&order_key(b)), a.total_cmp(&b));
            }
        }
    }

    #[test]
    fn median_is_none_before_first_push() {
        let window = MovingMedian::new(3);
        assert!(window.is_empty());
        assert_eq!(window.median(), None);
    }

    #[test]
    fn growing_window_reports_running_median() {
        let mut window = MovingMedian::new(5);
        window.push(4.0);
        assert_eq!(window.median(), Some(4.0));
        window.push(1.0);
        assert_eq!(window.median(), Some(2.5));
        window.push(3.0);
        assert_eq!(window.median(), Some(3.0));
    }

    #[test]
    fn full_window_evicts_oldest() {
        let mut window = MovingMedian::new(3);
        for v in [10.0, 1.0, 2.0, 3.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.median(), Some(2.0));
    }

    #[test]
    fn duplicates_are_tracked_individually() {
        let mut window = MovingMedian::new(3);
        for v in [5.0, 5.0, 5.0, 1.0, 1.0] {
            window.push(v);
        }
        assert_eq!(window.median(), Some(1.0));
    }

    #[test]
    fn matches_sorting_on_random_stream() {
        let mut rng = StdRng::seed_from_u64(0xD0_5E);
        for capacity in [1_usize, 2, 4, 7, 16] {
            let mut window = MovingMedian::new(capacity);
            let mut history = Vec::new();
            for _ in 0..200 {
                let value = (rng.gen_range(-50..50) as f64) * 0.25;
                window.push(value);
                history.push(value);
                let start = history.len().saturating_sub(capacity);
                assert_eq!(window.median(), Some(brute_force_median(&history[start..])));
            }
        }
    }
}
