#![doc = include_str!("../README.md")]
#![allow(non_snake_case)]
#![deny(missing_docs)]

pub mod backend;
pub mod buffer;
mod code;
pub mod der;
mod dispatch;
pub mod error;
pub mod loader;
pub mod normalize;
mod operation;
pub mod probe;
pub mod registry;

pub use buffer::{DerSignature, InputError, PointFormat, SerializedPoint};
pub use code::ResultCode;
pub use dispatch::{Dispatcher, EcdhOptions, HashFunction, NonceFunction, SignOptions};
pub use operation::Operation;
pub use probe::{probe, CapabilityTier};
pub use registry::{BackendDescriptor, Registry, Tier};

/// The process-wide [`Dispatcher`].
///
/// ```
/// use secp256k1_compat::{dispatcher, ResultCode};
/// let mut seckey = [0u8; 32];
/// seckey[31] = 1;
/// let mut pubkey = [0u8; 33];
/// assert_eq!(dispatcher().public_key_create(&mut pubkey, &seckey), Ok(ResultCode::Ok));
/// assert_eq!(pubkey[0], 0x02);
/// ```
pub fn dispatcher() -> &'static Dispatcher {
    Dispatcher::global()
}

#[doc(hidden)]
pub const TEST_SOUNDNESS: usize = 20;
