//! Maps backend failure signals onto [`ResultCode`]s.
//!
//! A backend can report the same problem in three ways: a typed [`Rejection`],
//! an error message, or a "falsy" return (`None`/`false`). Typed signals are
//! trusted first. Messages are only consulted when nothing else is available
//! and are matched against the phrases the known backends use. This is the
//! only place in the crate that looks at message text.
use crate::{
    code::ResultCode,
    error::{BackendError, Rejection},
    operation::Operation,
};
use tracing::warn;

/// What the dispatcher should do with a failed backend call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The backend lacks the capability. Retry on the reference backend.
    Fallback,
    /// The failure is final and is reported as this code.
    Code(ResultCode),
}

/// Phrases (lowercase) used by backends for rejections they only report as text.
const MESSAGE_PATTERNS: &[(&str, Rejection)] = &[
    ("expected private", Rejection::InvalidPrivateKey),
    ("private scalar", Rejection::InvalidPrivateKey),
    ("secret key", Rejection::InvalidPrivateKey),
    ("expected signature", Rejection::InvalidSignature),
    ("invalid signature tag", Rejection::InvalidSignature),
    ("malformed signature", Rejection::InvalidSignature),
    ("valid signature", Rejection::InvalidSignature),
    ("expected point", Rejection::InvalidPoint),
    ("invalid point", Rejection::InvalidPoint),
    ("valid point", Rejection::InvalidPoint),
    ("public key", Rejection::InvalidPoint),
    ("bad tweak", Rejection::InvalidTweak),
];

/// Classifies a backend error raised while running `op`.
pub fn classify(error: &BackendError, op: Operation) -> Disposition {
    match error {
        BackendError::Unimplemented(_) | BackendError::Unsupported(_) => Disposition::Fallback,
        BackendError::Rejected(rejection) => Disposition::Code(rejection_code(*rejection, op)),
        BackendError::Message(message) => match classify_message(message) {
            Some(rejection) => Disposition::Code(rejection_code(rejection, op)),
            None => {
                warn!(operation = %op, error = %message, "unclassified backend failure");
                Disposition::Code(ResultCode::Failed)
            }
        },
    }
}

/// Finds the rejection a backend message describes, if any.
pub fn classify_message(message: &str) -> Option<Rejection> {
    let message = message.to_ascii_lowercase();
    MESSAGE_PATTERNS
        .iter()
        .find(|(pattern, _)| message.contains(pattern))
        .map(|(_, rejection)| *rejection)
}

/// The code for a typed rejection in the context of `op`.
pub fn rejection_code(rejection: Rejection, op: Operation) -> ResultCode {
    use Operation::*;
    use Rejection::*;
    match (rejection, op) {
        // verification distinguishes a bad signature (1) from a bad key (2)
        (InvalidPoint, EcdsaVerify) => ResultCode::Failed,
        (InvalidPrivateKey, Ecdh) => ResultCode::Failed,
        (InvalidTweak, PublicKeyTweakAdd | PublicKeyTweakMul) => ResultCode::Failed,
        (Degenerate, op) if !op.tweaks_private_key() => ResultCode::Failed,
        _ => ResultCode::Invalid,
    }
}

/// The code for a backend returning nothing (or `false`) from `op`.
pub fn falsy(op: Operation) -> ResultCode {
    use Operation::*;
    match op {
        EcdsaVerify => ResultCode::Mismatch,
        PrivateKeyVerify | PublicKeyVerify | PrivateKeyNegate | PrivateKeyTweakAdd
        | PrivateKeyTweakMul => ResultCode::Invalid,
        _ => ResultCode::Failed,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn capability_signals_fall_back() {
        for op in Operation::ALL {
            assert_eq!(
                classify(&BackendError::Unimplemented(op), op),
                Disposition::Fallback
            );
            assert_eq!(
                classify(&BackendError::Unsupported("no"), op),
                Disposition::Fallback
            );
        }
    }

    #[test]
    fn typed_before_text() {
        // a typed rejection wins even if a message would have said otherwise
        assert_eq!(
            classify(
                &BackendError::Rejected(Rejection::InvalidPoint),
                Operation::EcdsaVerify
            ),
            Disposition::Code(ResultCode::Failed)
        );
        assert_eq!(
            classify(
                &BackendError::Rejected(Rejection::InvalidSignature),
                Operation::EcdsaVerify
            ),
            Disposition::Code(ResultCode::Invalid)
        );
    }

    #[test]
    fn known_messages() {
        let cases = [
            ("Expected Private", Some(Rejection::InvalidPrivateKey)),
            (
                "Expected 32 bytes of private scalar",
                Some(Rejection::InvalidPrivateKey),
            ),
            ("Expected Point", Some(Rejection::InvalidPoint)),
            (
                "Point.fromHex: received invalid point.",
                Some(Rejection::InvalidPoint),
            ),
            ("malformed public key", Some(Rejection::InvalidPoint)),
            ("Expected Signature", Some(Rejection::InvalidSignature)),
            ("Invalid signature tag", Some(Rejection::InvalidSignature)),
            ("expected valid signature", Some(Rejection::InvalidSignature)),
            ("Expected valid point", Some(Rejection::InvalidPoint)),
            (
                "Expected valid private scalar",
                Some(Rejection::InvalidPrivateKey),
            ),
            ("bad tweak", Some(Rejection::InvalidTweak)),
            ("out of memory", None),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_message(message), expected, "{}", message);
        }
    }

    #[test]
    fn unclassified_message_is_failure() {
        assert_eq!(
            classify(
                &BackendError::message("something exploded"),
                Operation::PublicKeyConvert
            ),
            Disposition::Code(ResultCode::Failed)
        );
        assert_eq!(
            classify(
                &BackendError::message("Expected Point"),
                Operation::PublicKeyConvert
            ),
            Disposition::Code(ResultCode::Invalid)
        );
    }

    #[test]
    fn valid_phrasing_is_classified() {
        assert_eq!(
            classify(
                &BackendError::message("expected valid signature"),
                Operation::EcdsaVerify
            ),
            Disposition::Code(ResultCode::Invalid)
        );
        assert_eq!(
            classify(
                &BackendError::message("expected valid point"),
                Operation::PublicKeyConvert
            ),
            Disposition::Code(ResultCode::Invalid)
        );
        assert_eq!(
            classify(
                &BackendError::message("expected valid point"),
                Operation::EcdsaVerify
            ),
            Disposition::Code(ResultCode::Failed)
        );
    }

    #[test]
    fn context_dependent_codes() {
        use Operation::*;
        use Rejection::*;
        assert_eq!(rejection_code(InvalidTweak, PrivateKeyTweakAdd), ResultCode::Invalid);
        assert_eq!(rejection_code(InvalidTweak, PublicKeyTweakAdd), ResultCode::Failed);
        assert_eq!(rejection_code(Degenerate, PrivateKeyTweakAdd), ResultCode::Invalid);
        assert_eq!(rejection_code(Degenerate, PublicKeyCombine), ResultCode::Failed);
        assert_eq!(rejection_code(InvalidPrivateKey, PublicKeyCreate), ResultCode::Invalid);
        assert_eq!(rejection_code(InvalidPrivateKey, Ecdh), ResultCode::Failed);
        assert_eq!(rejection_code(InvalidPoint, Ecdh), ResultCode::Invalid);
        assert_eq!(falsy(EcdsaVerify), ResultCode::Mismatch);
        assert_eq!(falsy(PublicKeyTweakAdd), ResultCode::Failed);
        assert_eq!(falsy(PrivateKeyTweakAdd), ResultCode::Invalid);
    }
}
