//! The preferred backend, binding the C library through the [`secp256k1`] crate.
//!
//! It covers the hot paths: key validation, key tweaks, signing, verification
//! and recovery. Everything else is left to the reference backend.
use super::{Backend, RecoverableSignature};
use crate::{
    buffer::{PointFormat, SerializedPoint},
    dispatch::NonceFunction,
    error::{BackendError, Rejection},
};
use secp256k1::{
    ecdsa::{self, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};

/// Backend over libsecp256k1.
pub struct LibsecpBackend {
    secp: Secp256k1<All>,
}

impl LibsecpBackend {
    /// Creates the backend with a fresh signing and verification context.
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }
}

impl Default for LibsecpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for LibsecpBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LibsecpBackend").finish_non_exhaustive()
    }
}

impl From<secp256k1::Error> for BackendError {
    fn from(error: secp256k1::Error) -> Self {
        use secp256k1::Error::*;
        match error {
            InvalidPublicKey => Rejection::InvalidPoint.into(),
            InvalidSecretKey => Rejection::InvalidPrivateKey.into(),
            InvalidSignature | InvalidRecoveryId => Rejection::InvalidSignature.into(),
            InvalidTweak => Rejection::InvalidTweak.into(),
            InvalidPublicKeySum => Rejection::Degenerate.into(),
            other => BackendError::message(other),
        }
    }
}

fn secret_key(seckey: &[u8; 32]) -> Result<SecretKey, BackendError> {
    Ok(SecretKey::from_slice(seckey)?)
}

fn public_key(pubkey: &[u8]) -> Result<PublicKey, BackendError> {
    Ok(PublicKey::from_slice(pubkey)?)
}

fn tweak(tweak: &[u8; 32]) -> Result<secp256k1::Scalar, BackendError> {
    secp256k1::Scalar::from_be_bytes(*tweak).map_err(|_| Rejection::InvalidTweak.into())
}

fn serialize(pubkey: &PublicKey, format: PointFormat) -> Option<SerializedPoint> {
    match format {
        PointFormat::Compressed => SerializedPoint::from_slice(&pubkey.serialize()),
        PointFormat::Uncompressed => SerializedPoint::from_slice(&pubkey.serialize_uncompressed()),
    }
}

fn encoded(pubkey: &PublicKey, format: PointFormat) -> Result<SerializedPoint, BackendError> {
    serialize(pubkey, format).ok_or(BackendError::Unsupported("unexpected encoding length"))
}

impl Backend for LibsecpBackend {
    fn name(&self) -> &'static str {
        "libsecp256k1"
    }

    fn private_key_verify(&self, seckey: &[u8; 32]) -> Result<bool, BackendError> {
        Ok(SecretKey::from_slice(seckey).is_ok())
    }

    fn private_key_negate(&self, seckey: &[u8; 32]) -> Result<Option<[u8; 32]>, BackendError> {
        // the C library only negates valid keys
        let sk = SecretKey::from_slice(seckey)
            .map_err(|_| BackendError::Unsupported("negating an out of range key"))?;
        Ok(Some(sk.negate().secret_bytes()))
    }

    fn private_key_tweak_add(
        &self,
        seckey: &[u8; 32],
        tweak: &[u8; 32],
    ) -> Result<Option<[u8; 32]>, BackendError> {
        let sk = secret_key(seckey)?;
        let tweak = self::tweak(tweak)?;
        // fails only when the sum is zero
        Ok(sk.add_tweak(&tweak).ok().map(|sk| sk.secret_bytes()))
    }

    fn public_key_verify(&self, pubkey: &[u8]) -> Result<bool, BackendError> {
        Ok(PublicKey::from_slice(pubkey).is_ok())
    }

    fn public_key_create(
        &self,
        seckey: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let sk = secret_key(seckey)?;
        Ok(serialize(&PublicKey::from_secret_key(&self.secp, &sk), format))
    }

    fn public_key_convert(
        &self,
        pubkey: &[u8],
        format: PointFormat,
    ) -> Result<SerializedPoint, BackendError> {
        encoded(&public_key(pubkey)?, format)
    }

    fn public_key_negate(
        &self,
        pubkey: &[u8],
        format: PointFormat,
    ) -> Result<SerializedPoint, BackendError> {
        encoded(&public_key(pubkey)?.negate(&self.secp), format)
    }

    fn public_key_tweak_add(
        &self,
        pubkey: &[u8],
        tweak: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let pk = public_key(pubkey)?;
        let tweak = self::tweak(tweak)?;
        // fails only at the point at infinity
        Ok(pk
            .add_exp_tweak(&self.secp, &tweak)
            .ok()
            .and_then(|pk| serialize(&pk, format)))
    }

    fn public_key_tweak_mul(
        &self,
        pubkey: &[u8],
        tweak: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let pk = public_key(pubkey)?;
        if tweak == &[0u8; 32] {
            return Err(Rejection::InvalidTweak.into());
        }
        let tweak = self::tweak(tweak)?;
        let pk = pk.mul_tweak(&self.secp, &tweak)?;
        Ok(serialize(&pk, format))
    }

    fn ecdsa_sign(
        &self,
        msg32: &[u8; 32],
        seckey: &[u8; 32],
        data: Option<&[u8; 32]>,
        nonce_fn: Option<&dyn NonceFunction>,
    ) -> Result<RecoverableSignature, BackendError> {
        if nonce_fn.is_some() {
            return Err(BackendError::Unsupported("custom nonce functions"));
        }
        let sk = secret_key(seckey)?;
        let msg = Message::from_digest(*msg32);
        let sig = match data {
            Some(data) => self
                .secp
                .sign_ecdsa_recoverable_with_noncedata(&msg, &sk, data),
            None => self.secp.sign_ecdsa_recoverable(&msg, &sk),
        };
        let (recovery_id, signature) = sig.serialize_compact();
        Ok(RecoverableSignature {
            signature,
            recovery_id: recovery_id.to_i32() as u8,
        })
    }

    fn ecdsa_verify(
        &self,
        sig: &[u8; 64],
        msg32: &[u8; 32],
        pubkey: &[u8],
    ) -> Result<bool, BackendError> {
        let sig = ecdsa::Signature::from_compact(sig)?;
        let pk = public_key(pubkey)?;
        let msg = Message::from_digest(*msg32);
        Ok(self.secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
    }

    fn ecdsa_recover(
        &self,
        sig: &[u8; 64],
        recovery_id: u8,
        msg32: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let recovery_id = RecoveryId::from_i32(i32::from(recovery_id))?;
        let sig = ecdsa::RecoverableSignature::from_compact(sig, recovery_id)?;
        let msg = Message::from_digest(*msg32);
        let pk = self
            .secp
            .recover_ecdsa(&msg, &sig)
            .map_err(|_| BackendError::Rejected(Rejection::Degenerate))?;
        Ok(serialize(&pk, format))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::Rejection, operation::Operation};

    #[test]
    fn errors_are_typed() {
        assert_eq!(
            BackendError::from(secp256k1::Error::InvalidPublicKey),
            Rejection::InvalidPoint.into()
        );
        assert_eq!(
            BackendError::from(secp256k1::Error::InvalidSecretKey),
            Rejection::InvalidPrivateKey.into()
        );
        assert!(matches!(
            BackendError::from(secp256k1::Error::NotEnoughMemory),
            BackendError::Message(_)
        ));
    }

    #[test]
    fn leaves_gaps_for_the_reference() {
        let backend = LibsecpBackend::new();
        assert_eq!(
            backend.public_key_combine(&[], PointFormat::Compressed),
            Err(BackendError::Unimplemented(Operation::PublicKeyCombine))
        );
        assert_eq!(
            backend.ecdh(&[2; 33], &[1; 32]),
            Err(BackendError::Unimplemented(Operation::Ecdh))
        );
        assert!(matches!(
            backend.private_key_negate(&[0u8; 32]),
            Err(BackendError::Unsupported(_))
        ));
    }

    #[test]
    fn negate_valid_key() {
        let backend = LibsecpBackend::new();
        let mut one = [0u8; 32];
        one[31] = 1;
        let negated = backend.private_key_negate(&one).unwrap().unwrap();
        let back = backend.private_key_negate(&negated).unwrap().unwrap();
        assert_eq!(back, one);
    }
}
