//! Conversion between compact and DER encoded ECDSA signatures.
//!
//! Import is strict in the way BIP-66 is: a single SEQUENCE of two INTEGERs
//! with exact lengths and minimally encoded positive values. An `r` or `s` at
//! or above the group order is accepted but decoded as zero, which later fails
//! verification.
use crate::buffer::{
    is_below_order, join_signature, split_signature, DerSignature, MAX_DER_LEN, SCALAR_LEN,
};

const SEQUENCE: u8 = 0x30;
const INTEGER: u8 = 0x02;

/// Encodes a compact signature as DER.
///
/// `r` and `s` must already be below the group order.
pub fn encode(sig: &[u8; 64]) -> DerSignature {
    let (r, s) = split_signature(sig);
    let (r, r_len) = integer(&r);
    let (s, s_len) = integer(&s);

    let len = 6 + r_len + s_len;
    let mut out = [0u8; MAX_DER_LEN];
    out[0] = SEQUENCE;
    out[1] = (len - 2) as u8;
    out[2] = INTEGER;
    out[3] = r_len as u8;
    out[4..4 + r_len].copy_from_slice(&r[..r_len]);
    out[4 + r_len] = INTEGER;
    out[5 + r_len] = s_len as u8;
    out[6 + r_len..len].copy_from_slice(&s[..s_len]);
    DerSignature::from_parts(out, len)
}

/// Minimal DER INTEGER content for a 32-byte unsigned value.
fn integer(value: &[u8; 32]) -> ([u8; SCALAR_LEN + 1], usize) {
    let start = value
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(SCALAR_LEN - 1);
    let trimmed = &value[start..];
    // a set high bit would read as negative so it needs a zero in front
    let pad = usize::from(trimmed[0] & 0x80 != 0);
    let mut out = [0u8; SCALAR_LEN + 1];
    out[pad..pad + trimmed.len()].copy_from_slice(trimmed);
    (out, pad + trimmed.len())
}

/// Decodes a DER signature. `None` if the encoding is malformed.
pub fn decode(der: &[u8]) -> Option<[u8; 64]> {
    if der.len() < 8 || der.len() > MAX_DER_LEN {
        return None;
    }
    if der[0] != SEQUENCE || usize::from(der[1]) != der.len() - 2 || der[2] != INTEGER {
        return None;
    }

    let r_len = usize::from(der[3]);
    if r_len == 0 || 5 + r_len >= der.len() || der[4 + r_len] != INTEGER {
        return None;
    }
    let s_len = usize::from(der[5 + r_len]);
    if s_len == 0 || 6 + r_len + s_len != der.len() {
        return None;
    }

    let r = parse_integer(&der[4..4 + r_len])?;
    let s = parse_integer(&der[6 + r_len..])?;
    Some(join_signature(&r, &s))
}

/// Parses a minimally encoded positive INTEGER into 32 bytes, mapping values
/// at or above the group order to zero.
fn parse_integer(content: &[u8]) -> Option<[u8; 32]> {
    // negative
    if content[0] & 0x80 != 0 {
        return None;
    }
    // superfluous leading zero
    if content.len() > 1 && content[0] == 0 && content[1] & 0x80 == 0 {
        return None;
    }
    let content = match content {
        [0, rest @ ..] if rest.len() == SCALAR_LEN => rest,
        _ => content,
    };
    if content.len() > SCALAR_LEN {
        return None;
    }
    let mut value = [0u8; SCALAR_LEN];
    value[SCALAR_LEN - content.len()..].copy_from_slice(content);
    if !is_below_order(&value) {
        value = [0u8; SCALAR_LEN];
    }
    Some(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::CURVE_ORDER;
    use hex_literal::hex;

    #[test]
    fn minimal_integers() {
        let mut sig = [0u8; 64];
        sig[31] = 1;
        sig[63] = 0x80;
        let der = encode(&sig);
        assert_eq!(der.as_bytes(), &hex!("300702010102020080")[..]);
        assert_eq!(decode(der.as_bytes()), Some(sig));
    }

    #[test]
    fn zero_values_encode() {
        let der = encode(&[0u8; 64]);
        assert_eq!(der.as_bytes(), &hex!("3006020100020100")[..]);
        assert_eq!(decode(der.as_bytes()), Some([0u8; 64]));
    }

    #[test]
    fn full_width_values() {
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(&[0x81; 32]);
        sig[32..].copy_from_slice(&[0x7f; 32]);
        let der = encode(&sig);
        assert_eq!(der.len(), 6 + 33 + 32);
        assert_eq!(decode(der.as_bytes()), Some(sig));
    }

    #[test]
    fn rejects_malformed() {
        let good = hex!("3006020101020101");
        assert!(decode(&good).is_some());
        // wrong sequence tag
        assert!(decode(&hex!("3106020101020101")).is_none());
        // sequence length disagrees with the buffer
        assert!(decode(&hex!("3007020101020101")).is_none());
        // zero length r
        assert!(decode(&hex!("30060200020201010000")[..8]).is_none());
        // negative r
        assert!(decode(&hex!("3006020181020101")).is_none());
        // superfluous leading zero on s
        assert!(decode(&hex!("300702010102020001")).is_none());
        // trailing garbage
        assert!(decode(&hex!("300602010102010100")).is_none());
        // too short
        assert!(decode(&hex!("30050201010201")).is_none());
    }

    #[test]
    fn overflowing_values_decode_as_zero() {
        let mut der = [0u8; 6 + 33 + 1];
        der[0] = SEQUENCE;
        der[1] = (der.len() - 2) as u8;
        der[2] = INTEGER;
        der[3] = 33;
        der[5..37].copy_from_slice(&CURVE_ORDER);
        der[37] = INTEGER;
        der[38] = 1;
        der[39] = 1;
        let sig = decode(&der).unwrap();
        assert_eq!(&sig[..32], &[0u8; 32]);
        assert_eq!(sig[63], 1);
    }
}
