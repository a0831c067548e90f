//! # Publication
//!
//! Readers only ever see a complete, accepted pass. Each recompilation
//! builds a brand-new [`Ir`] from scratch; only if it is accepted is it
//! swapped in, with a compare-and-swap against the publication it was
//! numbered from. A rejected pass is dropped and the previous publication
//! stays visible. Generations never go backwards.

use std::sync::Arc;

use agw_core::{ContentDigest, Resource};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

use crate::diagnostics::PassHealth;
use crate::error::{PassError, PublishError};
use crate::ir::Ir;
use crate::settings::PassSettings;

/// Run one complete pass.
///
/// # Errors
///
/// Returns [`PassError::Rejected`] if any fatal error occurred.
pub fn compile<I>(settings: PassSettings, resources: I) -> Result<(Ir, PassHealth), PassError>
where
    I: IntoIterator<Item = Resource>,
{
    let mut ir = Ir::new(settings);
    let health = ir.load_all(resources)?;
    Ok((ir, health))
}

/// An accepted pass, as seen by readers.
#[derive(Debug)]
pub struct PublishedIr {
    /// The aggregate.
    pub ir: Arc<Ir>,
    /// Health at acceptance time.
    pub health: PassHealth,
    /// Digest of [`Ir::snapshot`].
    pub digest: ContentDigest,
    /// Publication counter, starting at 1. Each publication is exactly one
    /// more than the one it replaced.
    pub generation: u64,
    /// When this pass was published.
    pub published_at: DateTime<Utc>,
}

/// Holder of the most recently accepted pass.
#[derive(Debug, Default)]
pub struct Publisher {
    current: ArcSwapOption<PublishedIr>,
}

impl Publisher {
    /// A publisher with nothing published yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current publication, if any pass has been accepted.
    pub fn current(&self) -> Option<Arc<PublishedIr>> {
        self.current.load_full()
    }

    /// Compile a fresh pass and publish it if accepted.
    ///
    /// If the accepted pass has the same digest as the current
    /// publication, nothing is swapped and the current publication is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`PublishError::Pass`] if the pass was rejected;
    /// [`PublishError::Digest`] if the accepted IR could not be
    /// fingerprinted. Either way the previous publication is untouched.
    pub fn recompile<I>(
        &self,
        settings: PassSettings,
        resources: I,
    ) -> Result<Arc<PublishedIr>, PublishError>
    where
        I: IntoIterator<Item = Resource>,
    {
        let (ir, health) = compile(settings, resources).map_err(|e| {
            tracing::error!(error = %e, "pass rejected, keeping previous configuration");
            e
        })?;
        let digest = ir.snapshot().digest()?;
        let ir = Arc::new(ir);

        loop {
            let cur = self.current.load_full();
            if let Some(previous) = cur.as_ref().filter(|p| p.digest == digest) {
                tracing::debug!(
                    %digest,
                    generation = previous.generation,
                    "configuration unchanged"
                );
                return Ok(Arc::clone(previous));
            }

            let generation = cur.as_ref().map_or(0, |p| p.generation) + 1;
            let next = Arc::new(PublishedIr {
                ir: Arc::clone(&ir),
                health,
                digest,
                generation,
                published_at: Utc::now(),
            });

            // Retry if another publication landed since `cur` was loaded.
            let prev = self.current.compare_and_swap(&cur, Some(Arc::clone(&next)));
            if same_publication(&*prev, &cur) {
                tracing::info!(generation, %digest, ?health, "published configuration");
                return Ok(next);
            }
        }
    }
}

fn same_publication(a: &Option<Arc<PublishedIr>>, b: &Option<Arc<PublishedIr>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
