//! Exponential moving averages of behavioral statistics.

/// A plain exponential moving average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    value: f64,
    alpha: f64,
    initialized: bool,
}

impl Ema {
    /// Creates an EMA with smoothing factor `alpha` in (0, 1]; higher
    /// alpha weights new samples more.
    pub fn new(alpha: f64) -> Self {
        Self {
            value: 0.0,
            alpha: alpha.clamp(1e-6, 1.0),
            initialized: false,
        }
    }

    /// Folds in a new sample. The first sample seeds the average.
    pub fn update(&mut self, sample: f64) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    /// Current average (0 until the first sample).
    pub fn get(&self) -> f64 {
        self.value
    }

    /// Whether at least one sample has been folded in.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Rolling entropy profile for one player: EMAs of inter-action timing,
/// spatial displacement, and action-kind surprise.
///
/// The behavior validator computes exact window statistics itself; this
/// profile is the cheap longitudinal signal that survives ring-buffer
/// eviction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyProfile {
    /// EMA of inter-action gaps, ms.
    pub timing: Ema,
    /// EMA of spatial displacement between consecutive actions, blocks.
    pub spatial: Ema,
    /// EMA of per-action kind surprise, −log2 p(kind), bits.
    pub kind_surprise: Ema,
}

impl EntropyProfile {
    /// Default smoothing factor tuned for ~20 events/s streams.
    const ALPHA: f64 = 0.05;

    /// Creates an empty profile.
    pub fn new() -> Self {
        Self {
            timing: Ema::new(Self::ALPHA),
            spatial: Ema::new(Self::ALPHA),
            kind_surprise: Ema::new(Self::ALPHA),
        }
    }

    /// Folds in one action observation.
    pub fn observe(&mut self, gap_ms: f64, displacement: f64, surprise_bits: f64) {
        self.timing.update(gap_ms);
        self.spatial.update(displacement);
        self.kind_surprise.update(surprise_bits);
    }
}

impl Default for EntropyProfile {
    fn default() -> Self {
        Self::new()
    }
}
