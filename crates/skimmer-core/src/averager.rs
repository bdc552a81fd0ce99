// ── Delta-time averager ──
//
// Rolling mean over the most recent decode time offsets. Lives for the
// whole process, across reconnects.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Sample count used by the supervisor.
pub const DELTA_TIME_WINDOW: usize = 100;

/// Buffer plus running sum. `sum` always equals the sum of `samples`.
#[derive(Debug)]
struct DeltaTimeWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl DeltaTimeWindow {
    fn push(&mut self, sample: f64) -> f64 {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(sample);
        self.sum += sample;
        self.mean()
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn mean(&self) -> f64 {
        self.sum / self.samples.len() as f64
    }
}

/// Fixed-capacity running mean, shareable across tasks.
///
/// All reads and updates go through one lock, so concurrent pushes never
/// interleave the evict-subtract-add sequence.
#[derive(Debug)]
pub struct CircularAverager {
    window: Mutex<DeltaTimeWindow>,
}

impl CircularAverager {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: Mutex::new(DeltaTimeWindow {
                samples: VecDeque::with_capacity(capacity),
                capacity,
                sum: 0.0,
            }),
        }
    }

    /// Record a sample and return the mean of the retained window.
    pub fn push(&self, sample: f64) -> f64 {
        self.window
            .lock()
            .expect("averager lock poisoned")
            .push(sample)
    }

    /// Mean of the retained window, `None` before the first sample.
    pub fn average(&self) -> Option<f64> {
        let window = self.window.lock().expect("averager lock poisoned");
        if window.samples.is_empty() {
            None
        } else {
            Some(window.mean())
        }
    }

    pub fn len(&self) -> usize {
        self.window.lock().expect("averager lock poisoned").samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.window.lock().expect("averager lock poisoned").capacity
    }
}

impl Default for CircularAverager {
    fn default() -> Self {
        Self::new(DELTA_TIME_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_has_no_average() {
        let avg = CircularAverager::new(4);
        assert!(avg.average().is_none());
        assert!(avg.is_empty());
    }

    #[test]
    fn mean_of_partial_window() {
        let avg = CircularAverager::new(4);
        avg.push(1.0);
        assert!(close(avg.push(2.0), 1.5));
        assert_eq!(avg.len(), 2);
    }

    #[test]
    fn mean_covers_last_n_after_wraparound() {
        let n = 5;
        let avg = CircularAverager::new(n);
        let samples: Vec<f64> = (0..23).map(|i| f64::from(i) * 0.37 - 2.0).collect();

        for (pushed, &s) in samples.iter().enumerate() {
            let got = avg.push(s);
            let start = (pushed + 1).saturating_sub(n);
            let window = &samples[start..=pushed];
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            let expected = window.iter().sum::<f64>() / window.len() as f64;
            assert!(close(got, expected), "push {pushed}: {got} != {expected}");
        }
        assert_eq!(avg.len(), n);
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let avg = CircularAverager::new(0);
        assert_eq!(avg.capacity(), 1);
        avg.push(3.0);
        assert!(close(avg.push(-1.0), -1.0));
    }

    #[test]
    fn concurrent_pushes_keep_sum_consistent() {
        let avg = Arc::new(CircularAverager::new(DELTA_TIME_WINDOW));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let avg = Arc::clone(&avg);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        avg.push(0.5);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(avg.len(), DELTA_TIME_WINDOW);
        assert!(close(avg.average().unwrap(), 0.5));
    }
}
