//! The contract every arithmetic backend implements.
//!
//! A backend returns values instead of writing into caller buffers and
//! reports failures through [`BackendError`]. Every method has a default that
//! signals [`BackendError::Unimplemented`] so a partial backend only overrides
//! what it actually supports. The dispatcher takes care of buffers, fallback
//! and result codes.
mod k256;
pub use self::k256::K256Backend;

#[cfg(feature = "libsecp")]
mod libsecp;
#[cfg(feature = "libsecp")]
pub use libsecp::LibsecpBackend;

use crate::{
    buffer::{PointFormat, SerializedPoint},
    dispatch::NonceFunction,
    error::BackendError,
    operation::Operation,
    DerSignature,
};

/// A compact signature together with its recovery id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// `r || s` with `s` in the lower half of the group order.
    pub signature: [u8; 64],
    /// Recovery id in `0..=3`.
    pub recovery_id: u8,
}

/// The affine coordinates of an ECDH shared point.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SharedPoint {
    /// Big-endian x-coordinate.
    pub x: [u8; 32],
    /// Big-endian y-coordinate.
    pub y: [u8; 32],
}

impl SharedPoint {
    /// The compressed SEC1 encoding of the point.
    pub fn compressed(&self) -> [u8; 33] {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02 | (self.y[31] & 1);
        bytes[1..].copy_from_slice(&self.x);
        bytes
    }
}

impl core::fmt::Debug for SharedPoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // shared secrets are not printed
        f.debug_struct("SharedPoint").finish_non_exhaustive()
    }
}

macro_rules! unimplemented_by_default {
    ($op:ident) => {
        Err(BackendError::Unimplemented(Operation::$op))
    };
}

/// An implementation of the secp256k1 operation set.
///
/// Conventions:
///
/// - `Ok(None)` and `Ok(false)` are "falsy" returns. What they mean depends on
///   the operation (see [`normalize::falsy`]).
/// - [`BackendError::Unimplemented`] and [`BackendError::Unsupported`] make the
///   dispatcher retry on the reference backend.
/// - Any other error is final.
///
/// Public keys passed to a backend are 33 or 65 bytes. Nothing else about them
/// has been checked.
///
/// [`normalize::falsy`]: crate::normalize::falsy
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether `seckey` is in `[1, n-1]`.
    fn private_key_verify(&self, seckey: &[u8; 32]) -> Result<bool, BackendError> {
        let _ = seckey;
        unimplemented_by_default!(PrivateKeyVerify)
    }

    /// `-seckey mod n`.
    fn private_key_negate(&self, seckey: &[u8; 32]) -> Result<Option<[u8; 32]>, BackendError> {
        let _ = seckey;
        unimplemented_by_default!(PrivateKeyNegate)
    }

    /// `seckey + tweak mod n`. `None` if the sum is zero.
    fn private_key_tweak_add(
        &self,
        seckey: &[u8; 32],
        tweak: &[u8; 32],
    ) -> Result<Option<[u8; 32]>, BackendError> {
        let _ = (seckey, tweak);
        unimplemented_by_default!(PrivateKeyTweakAdd)
    }

    /// `seckey * tweak mod n`.
    fn private_key_tweak_mul(
        &self,
        seckey: &[u8; 32],
        tweak: &[u8; 32],
    ) -> Result<Option<[u8; 32]>, BackendError> {
        let _ = (seckey, tweak);
        unimplemented_by_default!(PrivateKeyTweakMul)
    }

    /// Whether `pubkey` decodes to a point on the curve.
    fn public_key_verify(&self, pubkey: &[u8]) -> Result<bool, BackendError> {
        let _ = pubkey;
        unimplemented_by_default!(PublicKeyVerify)
    }

    /// `seckey * G`.
    fn public_key_create(
        &self,
        seckey: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let _ = (seckey, format);
        unimplemented_by_default!(PublicKeyCreate)
    }

    /// Re-encodes `pubkey` in `format`.
    fn public_key_convert(
        &self,
        pubkey: &[u8],
        format: PointFormat,
    ) -> Result<SerializedPoint, BackendError> {
        let _ = (pubkey, format);
        unimplemented_by_default!(PublicKeyConvert)
    }

    /// `-pubkey`.
    fn public_key_negate(
        &self,
        pubkey: &[u8],
        format: PointFormat,
    ) -> Result<SerializedPoint, BackendError> {
        let _ = (pubkey, format);
        unimplemented_by_default!(PublicKeyNegate)
    }

    /// The sum of `pubkeys` (never empty). `None` if it's the point at infinity.
    fn public_key_combine(
        &self,
        pubkeys: &[&[u8]],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let _ = (pubkeys, format);
        unimplemented_by_default!(PublicKeyCombine)
    }

    /// `pubkey + tweak * G`. `None` if it's the point at infinity.
    fn public_key_tweak_add(
        &self,
        pubkey: &[u8],
        tweak: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let _ = (pubkey, tweak, format);
        unimplemented_by_default!(PublicKeyTweakAdd)
    }

    /// `tweak * pubkey`.
    fn public_key_tweak_mul(
        &self,
        pubkey: &[u8],
        tweak: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let _ = (pubkey, tweak, format);
        unimplemented_by_default!(PublicKeyTweakMul)
    }

    /// Replaces a high `s` with `n - s`.
    fn signature_normalize(&self, sig: &[u8; 64]) -> Result<[u8; 64], BackendError> {
        let _ = sig;
        unimplemented_by_default!(SignatureNormalize)
    }

    /// Compact to DER.
    fn signature_export(&self, sig: &[u8; 64]) -> Result<DerSignature, BackendError> {
        let _ = sig;
        unimplemented_by_default!(SignatureExport)
    }

    /// DER to compact.
    fn signature_import(&self, der: &[u8]) -> Result<[u8; 64], BackendError> {
        let _ = der;
        unimplemented_by_default!(SignatureImport)
    }

    /// Signs a 32-byte message hash.
    ///
    /// `data` is extra entropy for the default nonce derivation, or is passed
    /// along to `nonce_fn` when one is given.
    fn ecdsa_sign(
        &self,
        msg32: &[u8; 32],
        seckey: &[u8; 32],
        data: Option<&[u8; 32]>,
        nonce_fn: Option<&dyn NonceFunction>,
    ) -> Result<RecoverableSignature, BackendError> {
        let _ = (msg32, seckey, data, nonce_fn);
        unimplemented_by_default!(EcdsaSign)
    }

    /// `Ok(false)` for a well formed signature that doesn't verify.
    fn ecdsa_verify(
        &self,
        sig: &[u8; 64],
        msg32: &[u8; 32],
        pubkey: &[u8],
    ) -> Result<bool, BackendError> {
        let _ = (sig, msg32, pubkey);
        unimplemented_by_default!(EcdsaVerify)
    }

    /// Recovers the public key that produced `sig` over `msg32`.
    fn ecdsa_recover(
        &self,
        sig: &[u8; 64],
        recovery_id: u8,
        msg32: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let _ = (sig, recovery_id, msg32, format);
        unimplemented_by_default!(EcdsaRecover)
    }

    /// `seckey * pubkey` as affine coordinates.
    fn ecdh(&self, pubkey: &[u8], seckey: &[u8; 32]) -> Result<SharedPoint, BackendError> {
        let _ = (pubkey, seckey);
        unimplemented_by_default!(Ecdh)
    }
}
