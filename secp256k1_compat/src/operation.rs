use core::fmt;

/// Identifies an operation of the public surface.
///
/// Used as context when classifying backend failures and in log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operation {
    ContextRandomize,
    PrivateKeyVerify,
    PrivateKeyNegate,
    PrivateKeyTweakAdd,
    PrivateKeyTweakMul,
    PublicKeyVerify,
    PublicKeyCreate,
    PublicKeyConvert,
    PublicKeyNegate,
    PublicKeyCombine,
    PublicKeyTweakAdd,
    PublicKeyTweakMul,
    SignatureNormalize,
    SignatureExport,
    SignatureImport,
    EcdsaSign,
    EcdsaVerify,
    EcdsaRecover,
    Ecdh,
}

impl Operation {
    /// Every operation in the order of the public surface.
    pub const ALL: [Operation; 19] = [
        Operation::ContextRandomize,
        Operation::PrivateKeyVerify,
        Operation::PrivateKeyNegate,
        Operation::PrivateKeyTweakAdd,
        Operation::PrivateKeyTweakMul,
        Operation::PublicKeyVerify,
        Operation::PublicKeyCreate,
        Operation::PublicKeyConvert,
        Operation::PublicKeyNegate,
        Operation::PublicKeyCombine,
        Operation::PublicKeyTweakAdd,
        Operation::PublicKeyTweakMul,
        Operation::SignatureNormalize,
        Operation::SignatureExport,
        Operation::SignatureImport,
        Operation::EcdsaSign,
        Operation::EcdsaVerify,
        Operation::EcdsaRecover,
        Operation::Ecdh,
    ];

    /// The name of the operation in the classic camelCase API.
    pub fn name(self) -> &'static str {
        use Operation::*;
        match self {
            ContextRandomize => "contextRandomize",
            PrivateKeyVerify => "privateKeyVerify",
            PrivateKeyNegate => "privateKeyNegate",
            PrivateKeyTweakAdd => "privateKeyTweakAdd",
            PrivateKeyTweakMul => "privateKeyTweakMul",
            PublicKeyVerify => "publicKeyVerify",
            PublicKeyCreate => "publicKeyCreate",
            PublicKeyConvert => "publicKeyConvert",
            PublicKeyNegate => "publicKeyNegate",
            PublicKeyCombine => "publicKeyCombine",
            PublicKeyTweakAdd => "publicKeyTweakAdd",
            PublicKeyTweakMul => "publicKeyTweakMul",
            SignatureNormalize => "signatureNormalize",
            SignatureExport => "signatureExport",
            SignatureImport => "signatureImport",
            EcdsaSign => "ecdsaSign",
            EcdsaVerify => "ecdsaVerify",
            EcdsaRecover => "ecdsaRecover",
            Ecdh => "ecdh",
        }
    }

    /// Whether the operation's primary subject is a private key that it tweaks.
    pub fn tweaks_private_key(self) -> bool {
        matches!(
            self,
            Operation::PrivateKeyTweakAdd | Operation::PrivateKeyTweakMul
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
