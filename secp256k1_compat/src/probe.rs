//! Decides which backends this process can use.
use std::sync::OnceLock;
use tracing::debug;

/// What the running host can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CapabilityTier {
    /// The native library is compiled in and the host does exact wide
    /// multiplication. The native backend is preferred.
    Native,
    /// Only the portable backend is used.
    Portable,
}

static PROBED: OnceLock<CapabilityTier> = OnceLock::new();

/// Probes the host. The result is computed once per process.
///
/// Never fails: a host that can't run the check gets
/// [`CapabilityTier::Portable`].
pub fn probe() -> CapabilityTier {
    *PROBED.get_or_init(|| {
        let tier = detect();
        debug!(?tier, "probed capability tier");
        tier
    })
}

fn detect() -> CapabilityTier {
    if native_compiled_in() && wide_multiply_is_exact() {
        CapabilityTier::Native
    } else {
        CapabilityTier::Portable
    }
}

fn native_compiled_in() -> bool {
    cfg!(all(feature = "libsecp", not(target_arch = "wasm32")))
}

/// Known answer test for 64x64 -> 128 bit multiplication.
fn wide_multiply_is_exact() -> bool {
    // black_box keeps the check at runtime
    let a = core::hint::black_box(0xffff_ffff_ffff_ffffu64);
    let b = core::hint::black_box(0xffff_ffff_ffff_fffeu64);
    let product = u128::from(a) * u128::from(b);
    product == 0xffff_ffff_ffff_fffd_0000_0000_0000_0002
}
