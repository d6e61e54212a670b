use crate::config::Config;
use crate::matcher::{self, Decision};
use crate::storage::{self, IdentityStore};
use crate::Result;
use ndarray::Array2;
use std::time::{Duration, Instant};
use svdface_vision::{extract, Descriptor, ExtractorConfig};

/// Time spent in each verification stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    /// Capture and preprocessing; zero when the caller passed a ready image.
    pub acquire: Duration,
    pub extract: Duration,
    pub compare: Duration,
}

impl Timings {
    pub fn total(&self) -> Duration {
        self.acquire + self.extract + self.compare
    }
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub decision: Decision,
    pub timings: Timings,
}

/// Extractor, matcher and store behind one enroll/verify interface.
pub struct Recognizer<S> {
    extractor: ExtractorConfig,
    threshold: f64,
    store: S,
}

impl<S: IdentityStore> Recognizer<S> {
    pub fn new(config: &Config, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: config.extractor(),
            threshold: config.threshold(),
            store,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn describe(&self, image: &Array2<f64>) -> Result<Descriptor> {
        Ok(extract(&self.extractor, image)?)
    }

    pub fn enroll_image(&self, name: &str, image: &Array2<f64>) -> Result<()> {
        let descriptor = self.describe(image)?;
        storage::enroll(&self.store, name, descriptor)
    }

    pub fn verify_descriptor(&self, probe: &Descriptor) -> Result<Decision> {
        let gallery = self.store.load()?;
        matcher::verify(&gallery, probe, self.threshold)
    }

    pub fn verify_image(&self, image: &Array2<f64>) -> Result<Verification> {
        self.verify_timed(image, Duration::ZERO)
    }

    /// Run `acquire` to obtain the intensity matrix, then verify it, timing
    /// the acquisition alongside extraction and comparison.
    pub fn verify_acquired<E>(
        &self,
        acquire: impl FnOnce() -> std::result::Result<Array2<f64>, E>,
    ) -> std::result::Result<Verification, E>
    where
        E: From<crate::Error>,
    {
        let start = Instant::now();
        let image = acquire()?;
        Ok(self.verify_timed(&image, start.elapsed())?)
    }

    fn verify_timed(&self, image: &Array2<f64>, acquire: Duration) -> Result<Verification> {
        let start = Instant::now();
        let probe = self.describe(image)?;
        let extracted = Instant::now();
        let decision = self.verify_descriptor(&probe)?;

        let timings = Timings {
            acquire,
            extract: extracted - start,
            compare: extracted.elapsed(),
        };
        log::info!(
            "capture {:.4}s, svd {:.4}s, compare {:.4}s, total {:.4}s",
            timings.acquire.as_secs_f64(),
            timings.extract.as_secs_f64(),
            timings.compare.as_secs_f64(),
            timings.total().as_secs_f64()
        );
        Ok(Verification { decision, timings })
    }
}
