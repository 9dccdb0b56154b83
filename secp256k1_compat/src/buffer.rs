//! The byte-buffer contract shared by every operation and every backend.
//!
//! Keys, tweaks and messages are fixed size arrays so their length is checked
//! by the compiler. Points are variable length: an output buffer of
//! [`COMPRESSED_LEN`] bytes asks for a compressed point and one of
//! [`UNCOMPRESSED_LEN`] bytes for an uncompressed one. Nothing else selects the
//! encoding.
use core::fmt;

/// Length of a private key, tweak, message hash or scalar.
pub const SCALAR_LEN: usize = 32;
/// Length of a compressed SEC1 point.
pub const COMPRESSED_LEN: usize = 33;
/// Length of an uncompressed SEC1 point.
pub const UNCOMPRESSED_LEN: usize = 65;
/// Length of a compact `r || s` signature.
pub const SIGNATURE_LEN: usize = 64;
/// Upper bound on a DER encoded signature with 32 byte `r` and `s`.
pub const MAX_DER_LEN: usize = 72;

/// The order `n` of the secp256k1 group.
pub const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// The prime `p` of the secp256k1 base field.
pub const FIELD_PRIME: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

/// Whether the big-endian integer is strictly below the group order.
pub fn is_below_order(bytes: &[u8; 32]) -> bool {
    // lexicographic order on equal length big-endian arrays is numeric order
    bytes < &CURVE_ORDER
}

/// Whether `bytes` encodes a valid private key i.e. an integer in `[1, n-1]`.
pub fn is_valid_secret(bytes: &[u8; 32]) -> bool {
    is_below_order(bytes) && bytes != &[0u8; 32]
}

/// Splits a compact signature into its `r` and `s` halves.
pub fn split_signature(sig: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&sig[..SCALAR_LEN]);
    s.copy_from_slice(&sig[SCALAR_LEN..]);
    (r, s)
}

/// Joins `r` and `s` into a compact signature.
pub fn join_signature(r: &[u8; 32], s: &[u8; 32]) -> [u8; 64] {
    let mut sig = [0u8; SIGNATURE_LEN];
    sig[..SCALAR_LEN].copy_from_slice(r);
    sig[SCALAR_LEN..].copy_from_slice(s);
    sig
}

/// The SEC1 encoding requested by an output buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointFormat {
    /// 33 bytes, `02`/`03` prefix.
    Compressed,
    /// 65 bytes, `04` prefix.
    Uncompressed,
}

impl PointFormat {
    /// Infers the format from the length of the buffer the point will be written to.
    pub fn from_output(output: &[u8]) -> Result<Self, InputError> {
        match output.len() {
            COMPRESSED_LEN => Ok(PointFormat::Compressed),
            UNCOMPRESSED_LEN => Ok(PointFormat::Uncompressed),
            len => Err(InputError::PointOutputLength(len)),
        }
    }

    /// Whether points in this format are compressed.
    pub fn is_compressed(self) -> bool {
        self == PointFormat::Compressed
    }

    /// Length in bytes of a point in this format.
    pub fn len(self) -> usize {
        match self {
            PointFormat::Compressed => COMPRESSED_LEN,
            PointFormat::Uncompressed => UNCOMPRESSED_LEN,
        }
    }
}

/// Checks that a public key input has one of the two SEC1 lengths.
///
/// Only the length is checked here. Whether the bytes are a point on the
/// curve is for the backend to decide.
pub fn check_public_key(pubkey: &[u8]) -> Result<(), InputError> {
    match pubkey.len() {
        COMPRESSED_LEN | UNCOMPRESSED_LEN => Ok(()),
        len => Err(InputError::PublicKeyLength(len)),
    }
}

/// A serialized point returned by a backend before it's copied into the
/// caller's buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SerializedPoint {
    bytes: [u8; UNCOMPRESSED_LEN],
    len: usize,
}

impl SerializedPoint {
    /// Copies a SEC1 encoding. Returns `None` unless it is 33 or 65 bytes long.
    pub fn from_slice(encoding: &[u8]) -> Option<Self> {
        if !matches!(encoding.len(), COMPRESSED_LEN | UNCOMPRESSED_LEN) {
            return None;
        }
        let mut bytes = [0u8; UNCOMPRESSED_LEN];
        bytes[..encoding.len()].copy_from_slice(encoding);
        Some(Self {
            bytes,
            len: encoding.len(),
        })
    }

    /// The encoded point.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The format the point is encoded in.
    pub fn format(&self) -> PointFormat {
        if self.len == COMPRESSED_LEN {
            PointFormat::Compressed
        } else {
            PointFormat::Uncompressed
        }
    }
}

impl AsRef<[u8]> for SerializedPoint {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for SerializedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializedPoint(")?;
        for byte in self.as_bytes() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Output buffer for [`signature_export`].
///
/// [`signature_export`]: crate::Dispatcher::signature_export
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DerSignature {
    bytes: [u8; MAX_DER_LEN],
    len: usize,
}

impl Default for DerSignature {
    fn default() -> Self {
        Self {
            bytes: [0u8; MAX_DER_LEN],
            len: 0,
        }
    }
}

impl DerSignature {
    pub(crate) fn from_parts(bytes: [u8; MAX_DER_LEN], len: usize) -> Self {
        debug_assert!(len <= MAX_DER_LEN);
        Self { bytes, len }
    }

    /// The DER encoding. Empty until something has been exported into it.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Length of the encoding.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for DerSignature {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for DerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerSignature(")?;
        for byte in self.as_bytes() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// A violation of the buffer contract by the caller.
///
/// These are programming errors rather than cryptographic rejections so they
/// are reported before any backend is consulted and never as a [`ResultCode`].
///
/// [`ResultCode`]: crate::ResultCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// A point output buffer was neither 33 nor 65 bytes long.
    PointOutputLength(usize),
    /// A public key input was neither 33 nor 65 bytes long.
    PublicKeyLength(usize),
    /// `public_key_combine` was given no points.
    EmptyPublicKeys,
    /// A recovery id outside `0..=3`.
    RecoveryId(u8),
    /// An ECDH output buffer of the wrong length for the selected hash.
    EcdhOutputLength(usize),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use InputError::*;
        match self {
            PointOutputLength(len) => {
                write!(f, "point output buffer must be 33 or 65 bytes, got {}", len)
            }
            PublicKeyLength(len) => write!(f, "public key must be 33 or 65 bytes, got {}", len),
            EmptyPublicKeys => write!(f, "expected at least one public key to combine"),
            RecoveryId(id) => write!(f, "recovery id must be in 0..=3, got {}", id),
            EcdhOutputLength(len) => write!(f, "ECDH output buffer has invalid length {}", len),
        }
    }
}

impl std::error::Error for InputError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_bounds() {
        let mut n_minus_one = CURVE_ORDER;
        n_minus_one[31] -= 1;
        assert!(is_valid_secret(&n_minus_one));
        assert!(!is_valid_secret(&CURVE_ORDER));
        assert!(!is_valid_secret(&[0u8; 32]));
        assert!(!is_valid_secret(&[0xff; 32]));
        let mut one = [0u8; 32];
        one[31] = 1;
        assert!(is_valid_secret(&one));
    }

    #[test]
    fn format_from_output_length() {
        assert_eq!(
            PointFormat::from_output(&[0u8; 33]),
            Ok(PointFormat::Compressed)
        );
        assert_eq!(
            PointFormat::from_output(&[0u8; 65]),
            Ok(PointFormat::Uncompressed)
        );
        assert_eq!(
            PointFormat::from_output(&[0u8; 64]),
            Err(InputError::PointOutputLength(64))
        );
        assert_eq!(
            PointFormat::from_output(&[]),
            Err(InputError::PointOutputLength(0))
        );
    }

    #[test]
    fn serialized_point_rejects_odd_lengths() {
        assert!(SerializedPoint::from_slice(&[2u8; 32]).is_none());
        let point = SerializedPoint::from_slice(&[4u8; 65]).unwrap();
        assert_eq!(point.format(), PointFormat::Uncompressed);
        assert_eq!(point.as_bytes().len(), 65);
    }

    #[test]
    fn split_halves() {
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(&[1u8; 32]);
        sig[32..].copy_from_slice(&[2u8; 32]);
        let (r, s) = split_signature(&sig);
        assert_eq!(r, [1u8; 32]);
        assert_eq!(s, [2u8; 32]);
        assert_eq!(join_signature(&r, &s), sig);
    }
}
