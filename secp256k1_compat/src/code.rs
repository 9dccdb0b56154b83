use core::fmt;

/// The outcome of an operation.
///
/// This is the primary success/failure channel for every operation rather
/// than an error type. The discriminants are stable and match the integers
/// callers of the classic C-style API compare against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResultCode {
    /// Success.
    Ok = 0,
    /// The primary input of the operation is invalid: not a valid private
    /// key, point or signature encoding.
    Invalid = 1,
    /// The operation ran but produced a degenerate result (zero scalar, point
    /// at infinity) or failed for a reason that couldn't be classified. For
    /// `ecdsa_verify` this is the code for an invalid public key.
    Failed = 2,
    /// A well formed signature did not verify.
    Mismatch = 3,
}

impl ResultCode {
    /// The integer value of the code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether this is [`ResultCode::Ok`].
    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }

    /// Looks up a code from its integer value.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ResultCode::Ok,
            1 => ResultCode::Invalid,
            2 => ResultCode::Failed,
            3 => ResultCode::Mismatch,
            _ => return None,
        })
    }
}

impl From<ResultCode> for u8 {
    fn from(code: ResultCode) -> u8 {
        code.code()
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> i32 {
        code.code().into()
    }
}

impl<E: Into<ResultCode>> From<Result<(), E>> for ResultCode {
    fn from(outcome: Result<(), E>) -> Self {
        match outcome {
            Ok(()) => ResultCode::Ok,
            Err(code) => code.into(),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let what = match self {
            ResultCode::Ok => "ok",
            ResultCode::Invalid => "invalid input",
            ResultCode::Failed => "operation failed",
            ResultCode::Mismatch => "signature mismatch",
        };
        write!(f, "{} ({})", what, self.code())
    }
}
