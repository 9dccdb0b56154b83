//! Failure signals produced by backends and by backend loading.
//!
//! Backends don't agree on how to report a failure. Some produce a typed
//! [`Rejection`], some only have an error message, some simply return nothing.
//! None of these ever reach the caller: the [`normalize`] module turns them all
//! into a [`ResultCode`].
//!
//! [`normalize`]: crate::normalize
//! [`ResultCode`]: crate::ResultCode
use crate::operation::Operation;
use core::fmt;

/// A typed reason for a backend to refuse an input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Not a private key in `[1, n-1]`.
    InvalidPrivateKey,
    /// Not the encoding of a point on the curve.
    InvalidPoint,
    /// Not a valid signature encoding (`r` or `s` out of range, malformed DER).
    InvalidSignature,
    /// A tweak that is out of range for the operation.
    InvalidTweak,
    /// A caller supplied nonce function refused to produce a nonce.
    InvalidNonce,
    /// The result was the zero scalar or the point at infinity.
    Degenerate,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Rejection::*;
        match self {
            InvalidPrivateKey => write!(f, "expected private key"),
            InvalidPoint => write!(f, "expected point"),
            InvalidSignature => write!(f, "expected signature"),
            InvalidTweak => write!(f, "tweak out of range"),
            InvalidNonce => write!(f, "nonce function failed"),
            Degenerate => write!(f, "degenerate result"),
        }
    }
}

/// A failure reported by a [`Backend`].
///
/// [`Backend`]: crate::backend::Backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// The backend does not implement the operation at all.
    Unimplemented(Operation),
    /// The backend implements the operation but can't handle these particular
    /// inputs (or can't run in this environment).
    Unsupported(&'static str),
    /// The backend rejected the input with a typed reason.
    Rejected(Rejection),
    /// The backend failed and all we have is its message.
    Message(String),
}

impl BackendError {
    /// Wraps an opaque error from an underlying library by its message.
    pub fn message(error: impl fmt::Display) -> Self {
        BackendError::Message(error.to_string())
    }
}

impl From<Rejection> for BackendError {
    fn from(rejection: Rejection) -> Self {
        BackendError::Rejected(rejection)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use BackendError::*;
        match self {
            Unimplemented(op) => write!(f, "{} is not implemented by this backend", op),
            Unsupported(why) => write!(f, "unsupported: {}", why),
            Rejected(rejection) => write!(f, "{}", rejection),
            Message(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// A backend could not be loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadError {
    /// Name of the backend.
    pub backend: &'static str,
    /// Why it couldn't be loaded.
    pub reason: String,
}

impl LoadError {
    /// Creates a load error for `backend`.
    pub fn new(backend: &'static str, reason: impl Into<String>) -> Self {
        Self {
            backend,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "backend {} is unavailable: {}", self.backend, self.reason)
    }
}

impl std::error::Error for LoadError {}

/// A [`Registry`] was built from an unusable set of descriptors.
///
/// [`Registry`]: crate::Registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// No descriptor of the reference tier was given.
    MissingReference,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegistryError::MissingReference => {
                write!(f, "a registry needs at least one reference backend")
            }
        }
    }
}

impl std::error::Error for RegistryError {}
