//! Load-once cells for backends.
use crate::{
    backend::Backend,
    error::LoadError,
    registry::{BackendDescriptor, Tier},
};
use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A backend that is loaded on first use.
///
/// However many threads race on [`acquire`](Self::acquire), the descriptor's
/// `load` runs once. Later calls get the cached backend, or the cached
/// failure if loading failed.
pub struct LazyBackend {
    descriptor: BackendDescriptor,
    cell: OnceLock<Result<Box<dyn Backend>, LoadError>>,
    loads: AtomicUsize,
}

impl LazyBackend {
    /// Wraps a descriptor. Nothing is loaded yet.
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self {
            descriptor,
            cell: OnceLock::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// The backend, loading it if this is the first call.
    pub fn acquire(&self) -> Result<&dyn Backend, &LoadError> {
        self.cell
            .get_or_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                let loaded = (self.descriptor.load)();
                match &loaded {
                    Ok(backend) => {
                        debug!(backend = backend.name(), tier = ?self.descriptor.tier, "loaded backend")
                    }
                    Err(e) => warn!(backend = self.descriptor.name, error = %e, "backend failed to load"),
                }
                loaded
            })
            .as_ref()
            .map(|backend| &**backend)
    }

    /// How many times `load` has run. Never more than one.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Whether a load has completed (successfully or not).
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The descriptor's name.
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// The descriptor's tier.
    pub fn tier(&self) -> Tier {
        self.descriptor.tier
    }
}

impl fmt::Debug for LazyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBackend")
            .field("descriptor", &self.descriptor)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
