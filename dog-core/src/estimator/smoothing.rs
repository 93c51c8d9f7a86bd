// estimator/smoothing.rs
use heapless::Deque;

/// Moving average over the last `N` samples of `AXES` integer axes.
///
/// The window starts full of zero samples, so the mean ramps up from zero
/// over the first `N` pushes instead of jumping to the first reading.
pub struct SmoothingBuffer<const N: usize, const AXES: usize> {
    samples: Deque<[i32; AXES], N>,
    sum: [i64; AXES],
}

impl<const N: usize, const AXES: usize> SmoothingBuffer<N, AXES> {
    const NONEMPTY: () = assert!(N > 0, "Smoothing window must hold at least one sample");

    pub fn new() -> Self {
        let () = Self::NONEMPTY;
        let mut samples = Deque::new();
        while samples.push_back([0; AXES]).is_ok() {}
        Self {
            samples,
            sum: [0; AXES],
        }
    }

    /// Admits `sample`, evicting the oldest one.
    pub fn push(&mut self, sample: [i32; AXES]) {
        if let Some(oldest) = self.samples.pop_front() {
            for (sum, old) in self.sum.iter_mut().zip(oldest) {
                *sum -= old as i64;
            }
        }
        for (sum, new) in self.sum.iter_mut().zip(sample) {
            *sum += new as i64;
        }
        // Room was made above, so this cannot fail.
        let _ = self.samples.push_back(sample);
    }

    /// Per-axis mean, rounded toward negative infinity.
    pub fn mean(&self) -> [i32; AXES] {
        self.sum.map(|sum| sum.div_euclid(N as i64) as i32)
    }

    pub fn sum(&self) -> [i64; AXES] {
        self.sum
    }
}

impl<const N: usize, const AXES: usize> Default for SmoothingBuffer<N, AXES> {
    fn default() -> Self {
        Self::new()
    }
}
