use std::collections::HashMap;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Hands every engine its own ChaCha stream derived from the master seed, so
/// adding draws in one engine never shifts the sequence seen by another.
pub struct RngManager {
    master: ChaCha8Rng,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
            streams: HashMap::new(),
        }
    }

    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let master = &mut self.master;
        let entry = self.streams.entry(name.to_string()).or_insert_with(|| {
            let mut seed_bytes = [0u8; 8];
            master.fill_bytes(&mut seed_bytes);
            ChaCha8Rng::seed_from_u64(u64::from_le_bytes(seed_bytes))
        });
        SystemRng { inner: entry }
    }
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl<'a> RngCore for SystemRng<'a> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// Helper draws shared by the engines.
pub trait RngExt {
    /// Uniform draw in `[min, max]`; swapped bounds are repaired rather than
    /// panicking.
    fn uniform(&mut self, min: f32, max: f32) -> f32;
    /// True with the given probability, clamped to `[0, 1]`.
    fn chance(&mut self, probability: f32) -> bool;
}

impl<R: Rng + ?Sized> RngExt for R {
    fn uniform(&mut self, min: f32, max: f32) -> f32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if (hi - lo).abs() < f32::EPSILON {
            return lo;
        }
        lo + self.gen::<f32>() * (hi - lo)
    }

    fn chance(&mut self, probability: f32) -> bool {
        let p = probability.clamp(0.0, 1.0);
        p > 0.0 && self.gen::<f32>() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = RngManager::new(42);
        let mut b = RngManager::new(42);
        let x: f32 = a.stream("climate").gen();
        let y: f32 = b.stream("climate").gen();
        assert_eq!(x, y);
    }

    #[test]
    fn streams_are_independent() {
        let mut rng = RngManager::new(42);
        let x: f32 = rng.stream("climate").gen();
        let y: f32 = rng.stream("biome").gen();
        assert_ne!(x, y);
    }

    #[test]
    fn uniform_repairs_swapped_bounds() {
        let mut rng = RngManager::new(7);
        let mut stream = rng.stream("test");
        for _ in 0..100 {
            let value = stream.uniform(2.0, 1.0);
            assert!((1.0..=2.0).contains(&value));
        }
        assert_eq!(stream.uniform(0.5, 0.5), 0.5);
    }

    #[test]
    fn chance_respects_extremes() {
        let mut rng = RngManager::new(7);
        let mut stream = rng.stream("test");
        for _ in 0..100 {
            assert!(!stream.chance(0.0));
            assert!(stream.chance(1.0));
        }
    }
}
