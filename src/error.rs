//! Script verification errors.

use crate::interpreter::SignatureEncodingError;
use crate::num::NumError;
use crate::opcode::Opcode;
use crate::stack::StackError;

/// Errors returned by script verification.
///
/// Verification yields exactly one of these (the first failure encountered)
/// or success. The set is closed; no variant is ever produced by more than
/// one consensus rule category.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    // Structural decode failures, detected before execution.
    #[error("malformed script")]
    InvalidScript,
    #[error("script exceeds maximum allowed size")]
    InvalidScriptSize,
    #[error("push exceeds maximum element size or is non-minimal")]
    InvalidPushDataSize,

    // Runtime limits and stack discipline.
    #[error("too many non-push operations")]
    InvalidOperationCount,
    #[error("stack size invalid for operation")]
    InvalidStackSize,
    #[error("unbalanced conditional scope")]
    InvalidStackScope,
    #[error("embedded script extraction failed")]
    InvalidScriptEmbed,
    #[error(transparent)]
    Num(NumError),

    // Per-opcode failures.
    #[error("disabled opcode {0}")]
    DisabledOpcode(Opcode),
    #[error("reserved opcode {0}")]
    ReservedOpcode(Opcode),
    #[error("OP_RETURN encountered")]
    OpReturn,
    #[error("{0} check failed")]
    Verify(Opcode),
    #[error("conditional operand is not minimal true or false")]
    MinimalIf,
    #[error("negative lock time operand")]
    NegativeLocktime,
    #[error("lock time requirement not satisfied")]
    UnsatisfiedLocktime,

    // Signature checks.
    #[error(transparent)]
    InvalidSignatureEncoding(#[from] SignatureEncodingError),
    #[error("signature check failed")]
    IncorrectSignature,
    #[error("multisig public key count out of range")]
    MultisigPubkeyCount,
    #[error("multisig signature count out of range")]
    MultisigSigCount,
    #[error("multisig dummy element must be empty")]
    MultisigDummy,
    #[error("tapscript validation weight exhausted")]
    ValidationWeight,
    #[error("sighash refers to an output that does not exist")]
    SighashSingleBug,

    // Terminal result checks.
    #[error("script evaluated to false")]
    StackFalse,
    #[error("stack not clean after evaluation")]
    CleanStack,

    // Witness structure.
    #[error("witness data present where none is expected")]
    UnexpectedWitness,
    #[error("witness does not satisfy the program structure")]
    InvalidWitness,
    #[error("taproot commitment mismatch")]
    InvalidCommitment,
    #[error("witness script did not leave exactly one stack element")]
    DirtyWitness,

    // Discouraged upgradable constructs (flag-gated).
    #[error("upgradable NOP executed")]
    DiscourageUpgradableNops,
    #[error("upgradable witness program version")]
    DiscourageUpgradableWitnessProgram,
    #[error("upgradable taproot leaf version")]
    DiscourageUpgradableTaprootVersion,
    #[error("upgradable OP_SUCCESS opcode")]
    DiscourageOpSuccess,
    #[error("upgradable public key type")]
    DiscourageUpgradablePubkeyType,
}

impl From<StackError> for Error {
    fn from(err: StackError) -> Self {
        match err {
            StackError::Underflow => Self::InvalidStackSize,
            StackError::Num(err) => Self::Num(err),
        }
    }
}

impl From<NumError> for Error {
    fn from(err: NumError) -> Self {
        Self::Num(err)
    }
}
