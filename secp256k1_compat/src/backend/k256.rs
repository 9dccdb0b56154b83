//! The reference backend, built on the pure Rust [`k256`] crate.
//!
//! It implements the whole operation set, including the caller supplied nonce
//! hook and ECDH, and is always available. It accepts everything
//! libsecp256k1 accepts so results don't depend on which backend ran.
use super::{Backend, RecoverableSignature, SharedPoint};
use crate::{
    buffer::{
        is_below_order, join_signature, split_signature, PointFormat, SerializedPoint,
        COMPRESSED_LEN, CURVE_ORDER, FIELD_PRIME, UNCOMPRESSED_LEN,
    },
    der,
    dispatch::NonceFunction,
    error::{BackendError, Rejection},
    DerSignature,
};
use k256::{
    elliptic_curve::{
        bigint::U256,
        ops::Reduce,
        point::{AffineCoordinates, DecompressPoint},
        scalar::IsHigh,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        subtle::Choice,
        Group, PrimeField,
    },
    AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar,
};
use sha2::Sha256;

/// Backend over [`k256`].
#[derive(Clone, Copy, Debug, Default)]
pub struct K256Backend;

/// Parses a scalar that must be below the group order.
fn scalar(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::from(*bytes)))
}

fn reduced_scalar(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(*bytes))
}

fn secret(bytes: &[u8; 32]) -> Result<Scalar, BackendError> {
    scalar(bytes)
        .filter(|s| !bool::from(s.is_zero()))
        .ok_or(BackendError::Rejected(Rejection::InvalidPrivateKey))
}

fn scalar_bytes(scalar: &Scalar) -> [u8; 32] {
    scalar.to_bytes().into()
}

/// Decodes a SEC1 point: compressed, uncompressed or hybrid (`06`/`07`).
fn point(bytes: &[u8]) -> Result<AffinePoint, BackendError> {
    let invalid = || BackendError::Rejected(Rejection::InvalidPoint);
    let mut unhybrid = [0u8; UNCOMPRESSED_LEN];
    let (encoding, hybrid_y_odd) = match (bytes.len(), bytes.first().copied()) {
        (COMPRESSED_LEN, Some(0x02 | 0x03)) | (UNCOMPRESSED_LEN, Some(0x04)) => (bytes, None),
        (UNCOMPRESSED_LEN, Some(tag @ (0x06 | 0x07))) => {
            unhybrid.copy_from_slice(bytes);
            unhybrid[0] = 0x04;
            (&unhybrid[..], Some(tag == 0x07))
        }
        _ => return Err(invalid()),
    };
    let encoded = EncodedPoint::from_bytes(encoding).map_err(|_| invalid())?;
    let point: AffinePoint =
        Option::from(AffinePoint::from_encoded_point(&encoded)).ok_or_else(invalid)?;
    if let Some(y_odd) = hybrid_y_odd {
        if bool::from(point.y_is_odd()) != y_odd {
            return Err(invalid());
        }
    }
    Ok(point)
}

/// Serializes a point. `None` for the point at infinity.
fn serialize(point: &ProjectivePoint, format: PointFormat) -> Option<SerializedPoint> {
    if bool::from(point.is_identity()) {
        return None;
    }
    let encoded = point.to_affine().to_encoded_point(format.is_compressed());
    SerializedPoint::from_slice(encoded.as_bytes())
}

/// Checks `r` and `s` are below the group order.
fn signature_scalars(sig: &[u8; 64]) -> Result<(Scalar, Scalar), BackendError> {
    let (r, s) = split_signature(sig);
    match (scalar(&r), scalar(&s)) {
        (Some(r), Some(s)) => Ok((r, s)),
        _ => Err(BackendError::Rejected(Rejection::InvalidSignature)),
    }
}

/// `x + n` if the sum is still a valid field element.
fn add_order(x: &[u8; 32]) -> Option<[u8; 32]> {
    let mut sum = [0u8; 32];
    let mut carry = 0u16;
    for i in (0..32).rev() {
        let digit = u16::from(x[i]) + u16::from(CURVE_ORDER[i]) + carry;
        sum[i] = digit as u8;
        carry = digit >> 8;
    }
    (carry == 0 && sum < FIELD_PRIME).then_some(sum)
}

/// ECDSA with a given nonce. `None` when the nonce yields a zero `r` or `s`.
fn sign_with_nonce(z: &Scalar, x: &Scalar, k: &Scalar) -> Option<RecoverableSignature> {
    let R = (ProjectivePoint::GENERATOR * k).to_affine();
    let R_x: [u8; 32] = R.x().into();
    let r = reduced_scalar(&R_x);
    let k_inv: Scalar = Option::from(k.invert())?;
    let mut s = k_inv * (*z + r * x);
    if bool::from(r.is_zero() | s.is_zero()) {
        return None;
    }

    let mut recovery_id = R.y_is_odd().unwrap_u8() | (u8::from(!is_below_order(&R_x)) << 1);
    if bool::from(s.is_high()) {
        s = -s;
        recovery_id ^= 1;
    }

    Some(RecoverableSignature {
        signature: join_signature(&scalar_bytes(&r), &scalar_bytes(&s)),
        recovery_id,
    })
}

/// RFC 6979 nonce with the optional extra entropy as additional data.
///
/// On retries the attempt counter is appended to the additional data.
fn rfc6979_nonce(x: &Scalar, z: &Scalar, data: Option<&[u8; 32]>, counter: u32) -> Scalar {
    let mut additional = Vec::with_capacity(36);
    if let Some(data) = data {
        additional.extend_from_slice(data);
    }
    if counter > 0 {
        additional.extend_from_slice(&counter.to_le_bytes());
    }
    let k = rfc6979::generate_k::<Sha256, _>(
        &x.to_bytes(),
        &FieldBytes::from(CURVE_ORDER),
        &z.to_bytes(),
        &additional,
    );
    reduced_scalar(&k.into())
}

impl Backend for K256Backend {
    fn name(&self) -> &'static str {
        "k256"
    }

    fn private_key_verify(&self, seckey: &[u8; 32]) -> Result<bool, BackendError> {
        Ok(secret(seckey).is_ok())
    }

    fn private_key_negate(&self, seckey: &[u8; 32]) -> Result<Option<[u8; 32]>, BackendError> {
        Ok(Some(scalar_bytes(&-reduced_scalar(seckey))))
    }

    fn private_key_tweak_add(
        &self,
        seckey: &[u8; 32],
        tweak: &[u8; 32],
    ) -> Result<Option<[u8; 32]>, BackendError> {
        let x = secret(seckey)?;
        let t = scalar(tweak).ok_or(BackendError::Rejected(Rejection::InvalidTweak))?;
        let sum = x + t;
        Ok((!bool::from(sum.is_zero())).then(|| scalar_bytes(&sum)))
    }

    fn private_key_tweak_mul(
        &self,
        seckey: &[u8; 32],
        tweak: &[u8; 32],
    ) -> Result<Option<[u8; 32]>, BackendError> {
        let x = secret(seckey)?;
        let t = scalar(tweak)
            .filter(|t| !bool::from(t.is_zero()))
            .ok_or(BackendError::Rejected(Rejection::InvalidTweak))?;
        Ok(Some(scalar_bytes(&(x * t))))
    }

    fn public_key_verify(&self, pubkey: &[u8]) -> Result<bool, BackendError> {
        Ok(point(pubkey).is_ok())
    }

    fn public_key_create(
        &self,
        seckey: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let x = secret(seckey)?;
        Ok(serialize(&(ProjectivePoint::GENERATOR * x), format))
    }

    fn public_key_convert(
        &self,
        pubkey: &[u8],
        format: PointFormat,
    ) -> Result<SerializedPoint, BackendError> {
        let P = ProjectivePoint::from(point(pubkey)?);
        serialize(&P, format).ok_or(BackendError::Rejected(Rejection::InvalidPoint))
    }

    fn public_key_negate(
        &self,
        pubkey: &[u8],
        format: PointFormat,
    ) -> Result<SerializedPoint, BackendError> {
        let P = ProjectivePoint::from(point(pubkey)?);
        serialize(&-P, format).ok_or(BackendError::Rejected(Rejection::InvalidPoint))
    }

    fn public_key_combine(
        &self,
        pubkeys: &[&[u8]],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let mut sum = ProjectivePoint::IDENTITY;
        for pubkey in pubkeys {
            sum += ProjectivePoint::from(point(pubkey)?);
        }
        Ok(serialize(&sum, format))
    }

    fn public_key_tweak_add(
        &self,
        pubkey: &[u8],
        tweak: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let P = ProjectivePoint::from(point(pubkey)?);
        let t = scalar(tweak).ok_or(BackendError::Rejected(Rejection::InvalidTweak))?;
        Ok(serialize(&(ProjectivePoint::GENERATOR * t + P), format))
    }

    fn public_key_tweak_mul(
        &self,
        pubkey: &[u8],
        tweak: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let P = ProjectivePoint::from(point(pubkey)?);
        let t = scalar(tweak)
            .filter(|t| !bool::from(t.is_zero()))
            .ok_or(BackendError::Rejected(Rejection::InvalidTweak))?;
        Ok(serialize(&(P * t), format))
    }

    fn signature_normalize(&self, sig: &[u8; 64]) -> Result<[u8; 64], BackendError> {
        let (r, mut s) = signature_scalars(sig)?;
        if bool::from(s.is_high()) {
            s = -s;
        }
        Ok(join_signature(&scalar_bytes(&r), &scalar_bytes(&s)))
    }

    fn signature_export(&self, sig: &[u8; 64]) -> Result<DerSignature, BackendError> {
        signature_scalars(sig)?;
        Ok(der::encode(sig))
    }

    fn signature_import(&self, der: &[u8]) -> Result<[u8; 64], BackendError> {
        der::decode(der).ok_or(BackendError::Rejected(Rejection::InvalidSignature))
    }

    fn ecdsa_sign(
        &self,
        msg32: &[u8; 32],
        seckey: &[u8; 32],
        data: Option<&[u8; 32]>,
        nonce_fn: Option<&dyn NonceFunction>,
    ) -> Result<RecoverableSignature, BackendError> {
        let x = secret(seckey)?;
        let z = reduced_scalar(msg32);
        for counter in 0u32.. {
            let k = match nonce_fn {
                Some(nonce_fn) => {
                    let nonce = nonce_fn
                        .nonce(msg32, seckey, data, counter)
                        .ok_or(BackendError::Rejected(Rejection::InvalidNonce))?;
                    // out of range nonces are skipped, not rejected
                    match scalar(&nonce).filter(|k| !bool::from(k.is_zero())) {
                        Some(k) => k,
                        None => continue,
                    }
                }
                None => rfc6979_nonce(&x, &z, data, counter),
            };
            if let Some(signature) = sign_with_nonce(&z, &x, &k) {
                return Ok(signature);
            }
        }
        Err(BackendError::Rejected(Rejection::InvalidNonce))
    }

    fn ecdsa_verify(
        &self,
        sig: &[u8; 64],
        msg32: &[u8; 32],
        pubkey: &[u8],
    ) -> Result<bool, BackendError> {
        let (r, s) = signature_scalars(sig)?;
        let P = ProjectivePoint::from(point(pubkey)?);
        // only low-s signatures are accepted
        if bool::from(r.is_zero() | s.is_zero() | s.is_high()) {
            return Ok(false);
        }
        let z = reduced_scalar(msg32);
        let s_inv: Scalar = Option::from(s.invert()).ok_or(Rejection::InvalidSignature)?;

        let implied_R = ProjectivePoint::GENERATOR * (z * s_inv) + P * (r * s_inv);
        if bool::from(implied_R.is_identity()) {
            return Ok(false);
        }
        let R_x: [u8; 32] = implied_R.to_affine().x().into();
        Ok(reduced_scalar(&R_x) == r)
    }

    fn ecdsa_recover(
        &self,
        sig: &[u8; 64],
        recovery_id: u8,
        msg32: &[u8; 32],
        format: PointFormat,
    ) -> Result<Option<SerializedPoint>, BackendError> {
        let (r, s) = signature_scalars(sig)?;
        if bool::from(r.is_zero() | s.is_zero()) {
            return Err(Rejection::Degenerate.into());
        }

        let (r_bytes, _) = split_signature(sig);
        let R_x = if recovery_id & 2 != 0 {
            add_order(&r_bytes).ok_or(Rejection::Degenerate)?
        } else {
            r_bytes
        };
        let R: AffinePoint = Option::from(AffinePoint::decompress(
            &FieldBytes::from(R_x),
            Choice::from(recovery_id & 1),
        ))
        .ok_or(Rejection::Degenerate)?;

        let z = reduced_scalar(msg32);
        let r_inv: Scalar = Option::from(r.invert()).ok_or(Rejection::Degenerate)?;
        let P = (ProjectivePoint::from(R) * s - ProjectivePoint::GENERATOR * z) * r_inv;
        Ok(serialize(&P, format))
    }

    fn ecdh(&self, pubkey: &[u8], seckey: &[u8; 32]) -> Result<SharedPoint, BackendError> {
        let P = ProjectivePoint::from(point(pubkey)?);
        let x = secret(seckey)?;
        let shared = (P * x).to_affine().to_encoded_point(false);
        let bytes = shared.as_bytes();
        if bytes.len() != UNCOMPRESSED_LEN {
            return Err(Rejection::Degenerate.into());
        }
        let mut point = SharedPoint {
            x: [0u8; 32],
            y: [0u8; 32],
        };
        point.x.copy_from_slice(&bytes[1..33]);
        point.y.copy_from_slice(&bytes[33..65]);
        Ok(point)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    const G_COMPRESSED: [u8; 33] =
        hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
    const G_UNCOMPRESSED: [u8; 65] = hex!(
        "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"
    );

    fn one() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        bytes
    }

    #[test]
    fn generator_from_one() {
        let backend = K256Backend;
        let compressed = backend
            .public_key_create(&one(), PointFormat::Compressed)
            .unwrap()
            .unwrap();
        assert_eq!(compressed.as_bytes(), &G_COMPRESSED[..]);
        let uncompressed = backend
            .public_key_create(&one(), PointFormat::Uncompressed)
            .unwrap()
            .unwrap();
        assert_eq!(uncompressed.as_bytes(), &G_UNCOMPRESSED[..]);
    }

    #[test]
    fn hybrid_encoding() {
        let mut hybrid = G_UNCOMPRESSED;
        // G has an even y
        hybrid[0] = 0x06;
        assert!(point(&hybrid).is_ok());
        hybrid[0] = 0x07;
        assert!(point(&hybrid).is_err());
    }

    #[test]
    fn rejects_off_curve_and_bad_tags() {
        let mut bad = G_UNCOMPRESSED;
        bad[64] ^= 1;
        assert!(point(&bad).is_err());
        let mut bad_tag = G_COMPRESSED;
        bad_tag[0] = 0x04;
        assert!(point(&bad_tag).is_err());
        assert!(point(&[0u8; 33]).is_err());
    }

    #[test]
    fn add_order_bounds() {
        let mut one = [0u8; 32];
        one[31] = 1;
        let sum = add_order(&one).unwrap();
        let mut n_plus_one = CURVE_ORDER;
        n_plus_one[31] += 1;
        assert_eq!(sum, n_plus_one);
        // p - n is about 2^128 so anything larger overflows the field
        assert!(add_order(&[0xff; 32]).is_none());
    }

    #[test]
    fn sign_recover_roundtrip() {
        let backend = K256Backend;
        let seckey = hex!("c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721");
        let msg = hex!("af2bdbe1aa9b6ec1e2ade1d694f41fc71a831d0268e9891562113d8a62add1bf");
        let sig = backend.ecdsa_sign(&msg, &seckey, None, None).unwrap();
        let pubkey = backend
            .public_key_create(&seckey, PointFormat::Compressed)
            .unwrap()
            .unwrap();
        assert!(backend.ecdsa_verify(&sig.signature, &msg, pubkey.as_bytes()).unwrap());
        let recovered = backend
            .ecdsa_recover(&sig.signature, sig.recovery_id, &msg, PointFormat::Compressed)
            .unwrap()
            .unwrap();
        assert_eq!(recovered, pubkey);
    }

    #[test]
    fn nonce_function_is_retried_on_invalid_nonce() {
        let backend = K256Backend;
        let seckey = [0x11; 32];
        let msg = [0x22; 32];
        let zero_first =
            |_: &[u8; 32], _: &[u8; 32], _: Option<&[u8; 32]>, counter: u32| -> Option<[u8; 32]> {
                // zero is not a usable nonce
                Some(if counter == 0 { [0u8; 32] } else { [0x33; 32] })
            };
        let nonce_fn: &dyn NonceFunction = &zero_first;
        let sig = backend
            .ecdsa_sign(&msg, &seckey, None, Some(nonce_fn))
            .unwrap();
        let expected = sign_with_nonce(
            &reduced_scalar(&msg),
            &scalar(&seckey).unwrap(),
            &scalar(&[0x33; 32]).unwrap(),
        )
        .unwrap();
        assert_eq!(sig, expected);

        let refuse =
            |_: &[u8; 32], _: &[u8; 32], _: Option<&[u8; 32]>, _: u32| -> Option<[u8; 32]> { None };
        let nonce_fn: &dyn NonceFunction = &refuse;
        assert_eq!(
            backend.ecdsa_sign(&msg, &seckey, None, Some(nonce_fn)),
            Err(Rejection::InvalidNonce.into())
        );
    }
}
