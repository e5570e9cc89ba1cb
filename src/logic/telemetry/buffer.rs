//! Sample Window - fixed-capacity ring buffer for timing samples
//!
//! Oldest sample is evicted when a push overflows the window. Deserialized
//! buffers are trimmed to their capacity the same way.

use std::collections::VecDeque;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredBuffer")]
pub struct RingBuffer {
    capacity: usize,
    samples: VecDeque<f64>,
}

#[derive(Deserialize)]
struct StoredBuffer {
    #[serde(default)]
    capacity: usize,
    #[serde(default)]
    samples: VecDeque<f64>,
}

impl From<StoredBuffer> for RingBuffer {
    fn from(stored: StoredBuffer) -> Self {
        RingBuffer::from_samples(stored.capacity, stored.samples)
    }
}

/// Deserialize a stored buffer into a fixed `capacity`, ignoring the
/// capacity it was stored with
pub(crate) fn deserialize_with_window<'de, D: Deserializer<'de>>(
    deserializer: D,
    capacity: usize,
) -> Result<RingBuffer, D::Error> {
    let stored = StoredBuffer::deserialize(deserializer)?;
    Ok(RingBuffer::from_samples(capacity, stored.samples))
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Buffer holding the newest `capacity` of `samples`
    pub fn from_samples(capacity: usize, samples: impl IntoIterator<Item = f64>) -> Self {
        let mut buffer = RingBuffer::new(capacity);
        for sample in samples {
            buffer.push(sample);
        }
        buffer
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    /// Arithmetic mean (0.0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Population standard deviation (0.0 when empty)
    pub fn std_dev(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let n = self.samples.len() as f64;
        let mean = self.mean();
        let variance = self.samples.iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>() / n;
        variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_on_overflow() {
        let mut buffer = RingBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            buffer.push(v);
        }

        assert_eq!(buffer.len(), 3);
        let kept: Vec<f64> = buffer.iter().copied().collect();
        assert_eq!(kept, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_population_std_dev() {
        let mut buffer = RingBuffer::new(10);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            buffer.push(v);
        }

        assert_eq!(buffer.mean(), 5.0);
        assert_eq!(buffer.std_dev(), 2.0);
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let buffer = RingBuffer::new(5);
        assert_eq!(buffer.mean(), 0.0);
        assert_eq!(buffer.std_dev(), 0.0);
    }

    #[test]
    fn test_deserialize_trims_to_capacity() {
        let buffer: RingBuffer =
            serde_json::from_str(r#"{"capacity":2,"samples":[1.0,2.0,3.0,4.0]}"#).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3.0, 4.0]);

        let empty: RingBuffer = serde_json::from_str(r#"{"capacity":0,"samples":[1.0]}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_from_samples_keeps_newest() {
        let buffer = RingBuffer::from_samples(2, [1.0, 2.0, 3.0]);
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0]);
    }
}
