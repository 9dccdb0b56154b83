//! The public operation surface.
//!
//! Every operation follows the same steps:
//!
//! 1. Check buffer shapes. A wrong length is the caller's bug and is reported
//!    as an [`InputError`] before any backend runs.
//! 2. Run the call on the preferred backend.
//! 3. If that backend can't serve it (unimplemented, unsupported or failed
//!    to load) run it once on the reference backend.
//! 4. Turn the outcome into a [`ResultCode`] and write outputs in place.
//!
//! Outputs are only written on success.
use crate::{
    backend::{Backend, SharedPoint},
    buffer::{check_public_key, InputError, PointFormat, SerializedPoint, SCALAR_LEN},
    code::ResultCode,
    error::BackendError,
    normalize::{self, Disposition},
    operation::Operation,
    probe::{probe, CapabilityTier},
    registry::Registry,
    DerSignature,
};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Derives signing nonces in place of RFC 6979.
///
/// Called with an increasing `counter` until it returns a usable nonce. A
/// nonce that is zero or not below the group order is skipped. Returning
/// `None` aborts signing.
pub trait NonceFunction {
    /// Produces the nonce for attempt `counter`.
    fn nonce(
        &self,
        message: &[u8; 32],
        seckey: &[u8; 32],
        data: Option<&[u8; 32]>,
        counter: u32,
    ) -> Option<[u8; 32]>;
}

impl<F> NonceFunction for F
where
    F: Fn(&[u8; 32], &[u8; 32], Option<&[u8; 32]>, u32) -> Option<[u8; 32]>,
{
    fn nonce(
        &self,
        message: &[u8; 32],
        seckey: &[u8; 32],
        data: Option<&[u8; 32]>,
        counter: u32,
    ) -> Option<[u8; 32]> {
        self(message, seckey, data, counter)
    }
}

/// Turns an ECDH shared point into the output bytes.
pub trait HashFunction {
    /// Hashes the affine coordinates. The result must be exactly as long as
    /// the caller's output buffer.
    fn hash(&self, x: &[u8; 32], y: &[u8; 32], data: Option<&[u8]>) -> Option<Vec<u8>>;
}

impl<F> HashFunction for F
where
    F: Fn(&[u8; 32], &[u8; 32], Option<&[u8]>) -> Option<Vec<u8>>,
{
    fn hash(&self, x: &[u8; 32], y: &[u8; 32], data: Option<&[u8]>) -> Option<Vec<u8>> {
        self(x, y, data)
    }
}

/// Optional inputs to [`Dispatcher::ecdsa_sign`].
#[derive(Clone, Copy, Default)]
pub struct SignOptions<'a> {
    /// Extra entropy for the nonce. Passed through to `nonce_fn` if there is
    /// one.
    pub data: Option<&'a [u8; 32]>,
    /// Replaces the default nonce derivation. Only the reference backend
    /// supports this.
    pub nonce_fn: Option<&'a dyn NonceFunction>,
}

/// Optional inputs to [`Dispatcher::ecdh`].
#[derive(Default)]
pub struct EcdhOptions<'a> {
    /// Passed through to `hash_fn`.
    pub data: Option<&'a [u8]>,
    /// Replaces SHA-256 of the compressed shared point.
    pub hash_fn: Option<&'a dyn HashFunction>,
    /// Receives the shared x-coordinate when `hash_fn` is set.
    pub x_scratch: Option<&'a mut [u8; 32]>,
    /// Receives the shared y-coordinate when `hash_fn` is set.
    pub y_scratch: Option<&'a mut [u8; 32]>,
}

/// Runs operations over a [`Registry`] of backends.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    /// A dispatcher over a custom registry.
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// A dispatcher with the backends for `tier`.
    pub fn for_capability(tier: CapabilityTier) -> Self {
        Self::new(Registry::for_capability(tier))
    }

    /// The process-wide dispatcher, set up from [`probe`] on first use.
    pub fn global() -> &'static Dispatcher {
        static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();
        GLOBAL.get_or_init(|| Dispatcher::for_capability(probe()))
    }

    /// The backends this dispatcher uses.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn run<T>(
        &self,
        op: Operation,
        call: impl Fn(&dyn Backend) -> Result<Option<T>, BackendError>,
    ) -> Result<T, ResultCode> {
        if !self.registry.is_reference_only() {
            let preferred = self.registry.preferred();
            match preferred.acquire() {
                Ok(backend) => match call(backend) {
                    Ok(Some(value)) => return Ok(value),
                    Ok(None) => return Err(normalize::falsy(op)),
                    Err(e) => match normalize::classify(&e, op) {
                        Disposition::Code(code) => return Err(code),
                        Disposition::Fallback => {
                            debug!(operation = %op, backend = backend.name(), reason = %e, "falling back to reference backend")
                        }
                    },
                },
                Err(e) => {
                    debug!(operation = %op, backend = preferred.name(), error = %e, "preferred backend unavailable")
                }
            }
        }
        self.run_reference(op, call)
    }

    /// Runs `call` on the reference backend only.
    fn run_reference<T>(
        &self,
        op: Operation,
        call: impl Fn(&dyn Backend) -> Result<Option<T>, BackendError>,
    ) -> Result<T, ResultCode> {
        let reference = self.registry.reference();
        let backend = match reference.acquire() {
            Ok(backend) => backend,
            Err(e) => {
                warn!(operation = %op, error = %e, "reference backend unavailable");
                return Err(ResultCode::Failed);
            }
        };
        match call(backend) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(normalize::falsy(op)),
            Err(e) => match normalize::classify(&e, op) {
                Disposition::Code(code) => Err(code),
                Disposition::Fallback => {
                    warn!(operation = %op, backend = backend.name(), reason = %e, "reference backend cannot serve the call");
                    Err(ResultCode::Failed)
                }
            },
        }
    }

    /// Kept for compatibility. Backends source their own blinding randomness.
    pub fn context_randomize(&self) -> ResultCode {
        ResultCode::Ok
    }

    /// Whether `seckey` is a valid private key.
    pub fn private_key_verify(&self, seckey: &[u8; 32]) -> bool {
        self.run(Operation::PrivateKeyVerify, |b| {
            b.private_key_verify(seckey).map(|valid| valid.then_some(()))
        })
        .is_ok()
    }

    /// Negates `seckey` modulo the group order.
    pub fn private_key_negate(&self, seckey: &mut [u8; 32]) -> ResultCode {
        let input = *seckey;
        self.run(Operation::PrivateKeyNegate, |b| b.private_key_negate(&input))
            .map(|negated| *seckey = negated)
            .into()
    }

    /// Adds `tweak` to `seckey`.
    pub fn private_key_tweak_add(&self, seckey: &mut [u8; 32], tweak: &[u8; 32]) -> ResultCode {
        let input = *seckey;
        self.run(Operation::PrivateKeyTweakAdd, |b| {
            b.private_key_tweak_add(&input, tweak)
        })
        .map(|tweaked| *seckey = tweaked)
        .into()
    }

    /// Multiplies `seckey` by `tweak`.
    pub fn private_key_tweak_mul(&self, seckey: &mut [u8; 32], tweak: &[u8; 32]) -> ResultCode {
        let input = *seckey;
        self.run(Operation::PrivateKeyTweakMul, |b| {
            b.private_key_tweak_mul(&input, tweak)
        })
        .map(|tweaked| *seckey = tweaked)
        .into()
    }

    /// Whether `pubkey` is a valid public key encoding.
    pub fn public_key_verify(&self, pubkey: &[u8]) -> Result<bool, InputError> {
        check_public_key(pubkey)?;
        Ok(self
            .run(Operation::PublicKeyVerify, |b| {
                b.public_key_verify(pubkey).map(|valid| valid.then_some(()))
            })
            .is_ok())
    }

    /// Writes `seckey * G` to `output`, compressed if it's 33 bytes long.
    pub fn public_key_create(
        &self,
        output: &mut [u8],
        seckey: &[u8; 32],
    ) -> Result<ResultCode, InputError> {
        let format = PointFormat::from_output(output)?;
        Ok(self
            .run(Operation::PublicKeyCreate, |b| {
                b.public_key_create(seckey, format)
            })
            .and_then(|point| emit_point(Operation::PublicKeyCreate, output, point))
            .into())
    }

    /// Re-encodes `pubkey` in the format selected by `output`'s length.
    pub fn public_key_convert(
        &self,
        output: &mut [u8],
        pubkey: &[u8],
    ) -> Result<ResultCode, InputError> {
        let format = PointFormat::from_output(output)?;
        check_public_key(pubkey)?;
        Ok(self
            .run(Operation::PublicKeyConvert, |b| {
                b.public_key_convert(pubkey, format).map(Some)
            })
            .and_then(|point| emit_point(Operation::PublicKeyConvert, output, point))
            .into())
    }

    /// Writes `-pubkey` to `output`.
    pub fn public_key_negate(
        &self,
        output: &mut [u8],
        pubkey: &[u8],
    ) -> Result<ResultCode, InputError> {
        let format = PointFormat::from_output(output)?;
        check_public_key(pubkey)?;
        Ok(self
            .run(Operation::PublicKeyNegate, |b| {
                b.public_key_negate(pubkey, format).map(Some)
            })
            .and_then(|point| emit_point(Operation::PublicKeyNegate, output, point))
            .into())
    }

    /// Writes the sum of `pubkeys` to `output`.
    pub fn public_key_combine(
        &self,
        output: &mut [u8],
        pubkeys: &[&[u8]],
    ) -> Result<ResultCode, InputError> {
        let format = PointFormat::from_output(output)?;
        if pubkeys.is_empty() {
            return Err(InputError::EmptyPublicKeys);
        }
        for pubkey in pubkeys {
            check_public_key(pubkey)?;
        }
        Ok(self
            .run(Operation::PublicKeyCombine, |b| {
                b.public_key_combine(pubkeys, format)
            })
            .and_then(|point| emit_point(Operation::PublicKeyCombine, output, point))
            .into())
    }

    /// Writes `pubkey + tweak * G` to `output`.
    pub fn public_key_tweak_add(
        &self,
        output: &mut [u8],
        pubkey: &[u8],
        tweak: &[u8; 32],
    ) -> Result<ResultCode, InputError> {
        let format = PointFormat::from_output(output)?;
        check_public_key(pubkey)?;
        Ok(self
            .run(Operation::PublicKeyTweakAdd, |b| {
                b.public_key_tweak_add(pubkey, tweak, format)
            })
            .and_then(|point| emit_point(Operation::PublicKeyTweakAdd, output, point))
            .into())
    }

    /// Writes `tweak * pubkey` to `output`.
    pub fn public_key_tweak_mul(
        &self,
        output: &mut [u8],
        pubkey: &[u8],
        tweak: &[u8; 32],
    ) -> Result<ResultCode, InputError> {
        let format = PointFormat::from_output(output)?;
        check_public_key(pubkey)?;
        Ok(self
            .run(Operation::PublicKeyTweakMul, |b| {
                b.public_key_tweak_mul(pubkey, tweak, format)
            })
            .and_then(|point| emit_point(Operation::PublicKeyTweakMul, output, point))
            .into())
    }

    /// Puts `sig` in low-s form.
    pub fn signature_normalize(&self, sig: &mut [u8; 64]) -> ResultCode {
        let input = *sig;
        self.run(Operation::SignatureNormalize, |b| {
            b.signature_normalize(&input).map(Some)
        })
        .map(|normalized| *sig = normalized)
        .into()
    }

    /// Encodes a compact signature as DER.
    pub fn signature_export(&self, output: &mut DerSignature, sig: &[u8; 64]) -> ResultCode {
        self.run(Operation::SignatureExport, |b| {
            b.signature_export(sig).map(Some)
        })
        .map(|der| *output = der)
        .into()
    }

    /// Decodes a DER signature into compact form.
    pub fn signature_import(&self, output: &mut [u8; 64], der: &[u8]) -> ResultCode {
        self.run(Operation::SignatureImport, |b| {
            b.signature_import(der).map(Some)
        })
        .map(|sig| *output = sig)
        .into()
    }

    /// Signs `msg32`, writing the signature and its recovery id.
    ///
    /// With a [`NonceFunction`] the call goes straight to the reference
    /// backend.
    pub fn ecdsa_sign(
        &self,
        sig: &mut [u8; 64],
        recovery_id: &mut u8,
        msg32: &[u8; 32],
        seckey: &[u8; 32],
        options: SignOptions<'_>,
    ) -> ResultCode {
        let call = |b: &dyn Backend| {
            b.ecdsa_sign(msg32, seckey, options.data, options.nonce_fn)
                .map(Some)
        };
        let signed = match options.nonce_fn {
            Some(_) => self.run_reference(Operation::EcdsaSign, call),
            None => self.run(Operation::EcdsaSign, call),
        };
        signed
            .map(|signed| {
                *sig = signed.signature;
                *recovery_id = signed.recovery_id;
            })
            .into()
    }

    /// Verifies `sig` over `msg32`.
    ///
    /// [`ResultCode::Invalid`] for a malformed signature,
    /// [`ResultCode::Failed`] for a malformed public key and
    /// [`ResultCode::Mismatch`] when the signature simply doesn't verify.
    pub fn ecdsa_verify(
        &self,
        sig: &[u8; 64],
        msg32: &[u8; 32],
        pubkey: &[u8],
    ) -> Result<ResultCode, InputError> {
        check_public_key(pubkey)?;
        Ok(self
            .run(Operation::EcdsaVerify, |b| {
                b.ecdsa_verify(sig, msg32, pubkey)
                    .map(|valid| valid.then_some(()))
            })
            .into())
    }

    /// Writes the public key recovered from `sig` to `output`.
    pub fn ecdsa_recover(
        &self,
        output: &mut [u8],
        sig: &[u8; 64],
        recovery_id: u8,
        msg32: &[u8; 32],
    ) -> Result<ResultCode, InputError> {
        let format = PointFormat::from_output(output)?;
        if recovery_id > 3 {
            return Err(InputError::RecoveryId(recovery_id));
        }
        Ok(self
            .run(Operation::EcdsaRecover, |b| {
                b.ecdsa_recover(sig, recovery_id, msg32, format)
            })
            .and_then(|point| emit_point(Operation::EcdsaRecover, output, point))
            .into())
    }

    /// Computes an ECDH shared secret into `output`.
    ///
    /// Without a hash function `output` must be 32 bytes and receives SHA-256
    /// of the compressed shared point.
    pub fn ecdh(
        &self,
        output: &mut [u8],
        pubkey: &[u8],
        seckey: &[u8; 32],
        options: EcdhOptions<'_>,
    ) -> Result<ResultCode, InputError> {
        check_public_key(pubkey)?;
        let bad_length = match options.hash_fn {
            None => output.len() != SCALAR_LEN,
            Some(_) => output.is_empty(),
        };
        if bad_length {
            return Err(InputError::EcdhOutputLength(output.len()));
        }

        let shared = match self.run_reference(Operation::Ecdh, |b| b.ecdh(pubkey, seckey).map(Some))
        {
            Ok(shared) => shared,
            Err(code) => return Ok(code),
        };
        Ok(hash_shared_point(output, &shared, options).into())
    }
}

fn hash_shared_point(
    output: &mut [u8],
    shared: &SharedPoint,
    options: EcdhOptions<'_>,
) -> Result<(), ResultCode> {
    let hash_fn = match options.hash_fn {
        Some(hash_fn) => hash_fn,
        None => {
            output.copy_from_slice(&Sha256::digest(shared.compressed()));
            return Ok(());
        }
    };
    if let Some(x) = options.x_scratch {
        *x = shared.x;
    }
    if let Some(y) = options.y_scratch {
        *y = shared.y;
    }
    match hash_fn.hash(&shared.x, &shared.y, options.data) {
        Some(hash) if hash.len() == output.len() => {
            output.copy_from_slice(&hash);
            Ok(())
        }
        _ => Err(ResultCode::Failed),
    }
}

fn emit_point(op: Operation, output: &mut [u8], point: SerializedPoint) -> Result<(), ResultCode> {
    let bytes = point.as_bytes();
    if bytes.len() != output.len() {
        warn!(operation = %op, expected = output.len(), got = bytes.len(), "backend returned the wrong point encoding");
        return Err(ResultCode::Failed);
    }
    output.copy_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn portable() -> Dispatcher {
        Dispatcher::for_capability(CapabilityTier::Portable)
    }

    #[test]
    fn shape_errors_come_before_dispatch() {
        let dispatcher = portable();
        let seckey = [1u8; 32];
        assert_eq!(
            dispatcher.public_key_create(&mut [0u8; 64], &seckey),
            Err(InputError::PointOutputLength(64))
        );
        assert_eq!(
            dispatcher.public_key_combine(&mut [0u8; 33], &[]),
            Err(InputError::EmptyPublicKeys)
        );
        assert_eq!(
            dispatcher.ecdsa_recover(&mut [0u8; 33], &[1u8; 64], 4, &[0u8; 32]),
            Err(InputError::RecoveryId(4))
        );
        assert_eq!(
            dispatcher.ecdh(&mut [0u8; 31], &[2u8; 33], &seckey, EcdhOptions::default()),
            Err(InputError::EcdhOutputLength(31))
        );
        assert_eq!(
            dispatcher.public_key_verify(&[2u8; 32]),
            Err(InputError::PublicKeyLength(32))
        );
        // nothing had to be loaded to reject these
        assert!(!dispatcher.registry().reference().is_loaded());
    }

    #[test]
    fn context_randomize_is_a_no_op() {
        let dispatcher = portable();
        assert_eq!(dispatcher.context_randomize(), ResultCode::Ok);
        assert!(!dispatcher.registry().reference().is_loaded());
    }

    #[test]
    fn outputs_untouched_on_failure() {
        let dispatcher = portable();
        let mut output = [0xaa; 33];
        assert_eq!(
            dispatcher.public_key_create(&mut output, &[0u8; 32]),
            Ok(ResultCode::Invalid)
        );
        assert_eq!(output, [0xaa; 33]);

        let mut seckey = [0u8; 32];
        assert_eq!(
            dispatcher.private_key_tweak_add(&mut seckey, &[1u8; 32]),
            ResultCode::Invalid
        );
        assert_eq!(seckey, [0u8; 32]);
    }

    #[test]
    fn ecdh_custom_hash_length_must_match() {
        let dispatcher = portable();
        let mut seckey = [0u8; 32];
        seckey[31] = 7;
        let mut pubkey = [0u8; 33];
        assert_eq!(
            dispatcher.public_key_create(&mut pubkey, &seckey),
            Ok(ResultCode::Ok)
        );

        let x_only = |x: &[u8; 32], _: &[u8; 32], _: Option<&[u8]>| -> Option<Vec<u8>> {
            Some(x.to_vec())
        };
        let x_only: &dyn HashFunction = &x_only;
        let mut x = [0u8; 32];
        let mut output = [0u8; 32];
        let code = dispatcher
            .ecdh(
                &mut output,
                &pubkey,
                &seckey,
                EcdhOptions {
                    hash_fn: Some(x_only),
                    x_scratch: Some(&mut x),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(code, ResultCode::Ok);
        assert_eq!(output, x);

        let mut short = [0u8; 16];
        let code = dispatcher
            .ecdh(
                &mut short,
                &pubkey,
                &seckey,
                EcdhOptions {
                    hash_fn: Some(x_only),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(code, ResultCode::Failed);
    }
}
