//! The ordered set of backends a [`Dispatcher`] may use.
//!
//! A registry only describes backends. Nothing is loaded until the dispatcher
//! first needs a backend, and then only through the [`LazyBackend`] cells the
//! registry owns.
//!
//! [`Dispatcher`]: crate::Dispatcher
use crate::{
    backend::{Backend, K256Backend},
    error::{LoadError, RegistryError},
    loader::LazyBackend,
    probe::CapabilityTier,
};
use core::fmt;

/// Where a backend sits in the fallback order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tier {
    /// Fast but possibly incomplete. Tried first.
    Preferred,
    /// Complete and always available. Used when a preferred backend can't
    /// serve a call.
    Reference,
}

/// Constructor for a backend.
pub type LoadFn = Box<dyn Fn() -> Result<Box<dyn Backend>, LoadError> + Send + Sync>;

/// Describes a backend without loading it.
pub struct BackendDescriptor {
    /// Name used in logs and load errors.
    pub name: &'static str,
    /// Fallback position.
    pub tier: Tier,
    /// Builds the backend. Called at most once per descriptor.
    pub load: LoadFn,
}

impl BackendDescriptor {
    /// A descriptor from a loading closure.
    pub fn new(
        name: &'static str,
        tier: Tier,
        load: impl Fn() -> Result<Box<dyn Backend>, LoadError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            tier,
            load: Box::new(load),
        }
    }

    /// The complete `k256` backend.
    pub fn k256(tier: Tier) -> Self {
        Self::new("k256", tier, || Ok(Box::new(K256Backend)))
    }

    /// The libsecp256k1 backend.
    #[cfg(feature = "libsecp")]
    pub fn libsecp(tier: Tier) -> Self {
        Self::new("libsecp256k1", tier, || {
            Ok(Box::new(crate::backend::LibsecpBackend::new()))
        })
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

/// Backends in fallback order, each behind a load-once cell.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<LazyBackend>,
    preferred: usize,
    reference: usize,
}

impl Registry {
    /// Builds a registry from `descriptors`.
    ///
    /// The first reference descriptor becomes the fallback. The first
    /// preferred descriptor is tried first; without one the reference backend
    /// is used for everything.
    pub fn new(descriptors: Vec<BackendDescriptor>) -> Result<Self, RegistryError> {
        let reference = descriptors
            .iter()
            .position(|d| d.tier == Tier::Reference)
            .ok_or(RegistryError::MissingReference)?;
        let preferred = descriptors
            .iter()
            .position(|d| d.tier == Tier::Preferred)
            .unwrap_or(reference);
        Ok(Self {
            entries: descriptors.into_iter().map(LazyBackend::new).collect(),
            preferred,
            reference,
        })
    }

    /// The registry for a probed capability tier.
    pub fn for_capability(tier: CapabilityTier) -> Self {
        let mut descriptors = Vec::with_capacity(2);
        if tier == CapabilityTier::Native {
            descriptors.extend(native_descriptor());
        }
        descriptors.push(BackendDescriptor::k256(Tier::Reference));
        Self {
            preferred: 0,
            reference: descriptors.len() - 1,
            entries: descriptors.into_iter().map(LazyBackend::new).collect(),
        }
    }

    /// The backend tried first.
    pub fn preferred(&self) -> &LazyBackend {
        &self.entries[self.preferred]
    }

    /// The backend that is fallen back to.
    pub fn reference(&self) -> &LazyBackend {
        &self.entries[self.reference]
    }

    /// Whether the preferred slot is held by the reference backend.
    pub fn is_reference_only(&self) -> bool {
        self.preferred == self.reference
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[LazyBackend] {
        &self.entries
    }
}

#[cfg(feature = "libsecp")]
fn native_descriptor() -> Option<BackendDescriptor> {
    Some(BackendDescriptor::libsecp(Tier::Preferred))
}

#[cfg(not(feature = "libsecp"))]
fn native_descriptor() -> Option<BackendDescriptor> {
    None
}
