//! Consensus-critical Bitcoin script verification.
//!
//! The crate owns the full verification pipeline for one transaction input:
//! the script decoder, the stack machine, the legacy/p2sh/segwit/taproot
//! spending paths and the three signature-hash constructions they rely on.
//! Everything is pure computation over immutable, reference-counted inputs;
//! independent inputs can be verified from separate threads without locking.

mod chain;
pub mod constants;
mod error;
pub mod interpreter;
pub mod num;
pub mod opcode;
pub mod script;
pub mod sighash;
mod signature_checker;
pub mod stack;
pub mod transaction;


use bitflags::bitflags;
use std::sync::Arc;
use transaction::{Transaction, TxOut};

pub use error::Error;
pub use interpreter::{verify_script, SignatureEncodingError};
pub use signature_checker::{NoSignatureCheck, SignatureChecker, TransactionSignatureChecker};

bitflags! {
    /// Script verification flags.
    ///
    /// Consensus rules that activated at a fork height are represented as
    /// flags so historical scripts keep validating under the rules they were
    /// mined under.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VerifyFlags: u32 {
        const NONE = 0;
        /// Evaluate p2sh subscripts (BIP16).
        const P2SH = 1 << 0;
        /// Enforce strict DER plus compressed/uncompressed key encodings.
        const STRICTENC = 1 << 1;
        /// Enforce strict DER (BIP66).
        const DERSIG = 1 << 2;
        /// Reject ECDSA signatures with a high S value.
        const LOW_S = 1 << 3;
        /// The CHECKMULTISIG dummy element must be empty.
        const NULLDUMMY = 1 << 4;
        /// The input script must be push-only.
        const SIGPUSHONLY = 1 << 5;
        /// Require minimal push encodings and minimal numbers.
        const MINIMALDATA = 1 << 6;
        const DISCOURAGE_UPGRADABLE_NOPS = 1 << 7;
        /// Exactly one stack element may remain after evaluation.
        const CLEANSTACK = 1 << 8;
        /// Enable OP_CHECKLOCKTIMEVERIFY (BIP65).
        const CHECKLOCKTIMEVERIFY = 1 << 9;
        /// Enable OP_CHECKSEQUENCEVERIFY (BIP112).
        const CHECKSEQUENCEVERIFY = 1 << 10;
        /// Enable witness program evaluation (BIP141).
        const WITNESS = 1 << 11;
        const DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM = 1 << 12;
        /// The operand of a witness-v0 OP_IF must be empty or exactly `[1]`.
        const MINIMALIF = 1 << 13;
        /// A failed signature check must consume an empty signature.
        const NULLFAIL = 1 << 14;
        /// Witness-v0 public keys must be compressed.
        const WITNESS_PUBKEYTYPE = 1 << 15;
        /// Enable taproot verification (BIP341/BIP342).
        const TAPROOT = 1 << 16;
        const DISCOURAGE_UPGRADABLE_TAPROOT_VERSION = 1 << 17;
        const DISCOURAGE_OP_SUCCESS = 1 << 18;
        const DISCOURAGE_UPGRADABLE_PUBKEYTYPE = 1 << 19;
    }
}

impl VerifyFlags {
    pub fn verify_minimaldata(&self) -> bool {
        self.contains(Self::MINIMALDATA)
    }
}

/// Which rule set the running script executes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigVersion {
    /// Bare, p2sh and input scripts.
    Base,
    /// Witness v0 (BIP143 sighash, segwit rules).
    WitnessV0,
    /// Taproot key-path spend.
    Taproot,
    /// Taproot script-path spend under BIP342 rules.
    Tapscript,
}

/// Per-spend state threaded between witness extraction, the interpreter and
/// the taproot sighash.
#[derive(Debug, Clone)]
pub struct ScriptExecutionData {
    /// The annex element, if the witness carried one.
    pub annex: Option<Arc<[u8]>>,
    /// Hash of the leaf being executed on a script-path spend.
    pub tapleaf_hash: [u8; 32],
    /// Opcode position of the last executed `OP_CODESEPARATOR`,
    /// `u32::MAX` before any has executed.
    pub codeseparator_pos: u32,
    /// Remaining tapscript signature-operation budget.
    pub validation_weight_left: i64,
}

impl Default for ScriptExecutionData {
    fn default() -> Self {
        Self {
            annex: None,
            tapleaf_hash: [0; 32],
            codeseparator_pos: u32::MAX,
            validation_weight_left: 0,
        }
    }
}

pub use chain::ChainContext;

/// Verifies one input of `tx` against the output it spends.
///
/// `spent_outputs` carries one entry per transaction input; taproot
/// signature hashing commits to all of them.
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    spent_outputs: &[Arc<TxOut>],
    flags: VerifyFlags,
) -> Result<(), Error> {
    debug_assert_eq!(tx.inputs.len(), spent_outputs.len());
    let spent = &spent_outputs[input_index];
    let checker = TransactionSignatureChecker::new(tx, input_index, spent.value, spent_outputs);
    let input = &tx.inputs[input_index];
    verify_script(
        &input.script_sig,
        &spent.script_pubkey,
        &input.witness,
        flags,
        &checker,
    )
}
