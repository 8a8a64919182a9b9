//! The boundary between script execution and transaction/curve context.

use crate::constants::*;
use crate::error::Error;
use crate::interpreter::SignatureEncodingError;
use crate::sighash::{
    legacy_sighash, segwit_v0_sighash, taproot_sighash, SegwitV0Cache, SighashError, TapscriptExt,
    TaprootCache,
};
use crate::transaction::{Transaction, TxOut};
use crate::{ScriptExecutionData, SigVersion};
use secp256k1::{ecdsa, schnorr, Message, PublicKey, Secp256k1, VerifyOnly, XOnlyPublicKey};
use std::sync::{Arc, LazyLock, OnceLock};

pub(crate) static SECP: LazyLock<Secp256k1<VerifyOnly>> =
    LazyLock::new(Secp256k1::verification_only);

impl From<SighashError> for Error {
    fn from(_: SighashError) -> Self {
        Error::SighashSingleBug
    }
}

/// What the interpreter needs from its caller to judge signatures and
/// transaction-level lock fields.
///
/// `Ok(false)` means the signature did not verify (the interpreter decides
/// whether that is fatal); `Err` means the check could not even be formed.
pub trait SignatureChecker {
    fn check_ecdsa_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sig_version: SigVersion,
    ) -> Result<bool, Error>;

    fn check_schnorr_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        sig_version: SigVersion,
        exec_data: &ScriptExecutionData,
    ) -> Result<bool, Error>;

    fn check_lock_time(&self, lock_time: i64) -> bool;

    fn check_sequence(&self, sequence: i64) -> bool;
}

/// Accepts every signature and lock field. For script-machine tests that do
/// not exercise transaction context.
pub struct NoSignatureCheck;

impl SignatureChecker for NoSignatureCheck {
    fn check_ecdsa_signature(
        &self,
        _: &[u8],
        _: &[u8],
        _: &[u8],
        _: SigVersion,
    ) -> Result<bool, Error> {
        Ok(true)
    }

    fn check_schnorr_signature(
        &self,
        _: &[u8],
        _: &[u8],
        _: SigVersion,
        _: &ScriptExecutionData,
    ) -> Result<bool, Error> {
        Ok(true)
    }

    fn check_lock_time(&self, _: i64) -> bool {
        true
    }

    fn check_sequence(&self, _: i64) -> bool {
        true
    }
}

/// Checks signatures against one input of a concrete transaction.
///
/// The BIP143 and BIP341 per-transaction aggregates are built on first use
/// and shared across every signature check for this input.
pub struct TransactionSignatureChecker<'a> {
    tx: &'a Transaction,
    input_index: usize,
    input_value: u64,
    /// One spent output per transaction input. May be empty when only
    /// legacy and v0 paths are exercised; taproot checks require it.
    spent_outputs: &'a [Arc<TxOut>],
    segwit_cache: OnceLock<SegwitV0Cache>,
    taproot_cache: OnceLock<TaprootCache>,
}

impl<'a> TransactionSignatureChecker<'a> {
    pub fn new(
        tx: &'a Transaction,
        input_index: usize,
        input_value: u64,
        spent_outputs: &'a [Arc<TxOut>],
    ) -> Self {
        Self {
            tx,
            input_index,
            input_value,
            spent_outputs,
            segwit_cache: OnceLock::new(),
            taproot_cache: OnceLock::new(),
        }
    }

    fn segwit_cache(&self) -> &SegwitV0Cache {
        self.segwit_cache.get_or_init(|| SegwitV0Cache::new(self.tx))
    }

    fn taproot_cache(&self) -> &TaprootCache {
        self.taproot_cache
            .get_or_init(|| TaprootCache::new(self.tx, self.spent_outputs))
    }
}

impl SignatureChecker for TransactionSignatureChecker<'_> {
    fn check_ecdsa_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sig_version: SigVersion,
    ) -> Result<bool, Error> {
        let Some((&type_byte, sig_bytes)) = sig.split_last() else {
            return Ok(false);
        };
        let hash_type = type_byte as u32;

        let digest = match sig_version {
            SigVersion::Base => {
                legacy_sighash(self.tx, self.input_index, script_code, hash_type)?
            }
            SigVersion::WitnessV0 => segwit_v0_sighash(
                self.tx,
                self.segwit_cache(),
                self.input_index,
                script_code,
                self.input_value,
                hash_type,
            ),
            SigVersion::Taproot | SigVersion::Tapscript => {
                debug_assert!(false, "ECDSA has no taproot sighash");
                return Ok(false);
            }
        };

        // A signature or key that does not parse simply fails to verify;
        // whether that aborts the script is the NULLFAIL rule's call.
        let Ok(mut signature) = ecdsa::Signature::from_der_lax(sig_bytes) else {
            return Ok(false);
        };
        let Ok(key) = PublicKey::from_slice(pubkey) else {
            return Ok(false);
        };
        signature.normalize_s();
        Ok(SECP
            .verify_ecdsa(&Message::from_digest(digest), &signature, &key)
            .is_ok())
    }

    fn check_schnorr_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        sig_version: SigVersion,
        exec_data: &ScriptExecutionData,
    ) -> Result<bool, Error> {
        let hash_type = match sig.len() {
            64 => SIGHASH_DEFAULT,
            65 => {
                let hash_type = sig[64];
                // The explicit byte form may not spell out DEFAULT.
                if hash_type == SIGHASH_DEFAULT || !is_taproot_hash_type(hash_type) {
                    return Err(SignatureEncodingError::SchnorrSigHashType.into());
                }
                hash_type
            }
            _ => return Err(SignatureEncodingError::SchnorrSigSize.into()),
        };

        // An x coordinate off the curve verifies nothing; that is a failed
        // signature check, not an encoding violation.
        let Ok(key) = XOnlyPublicKey::from_slice(pubkey) else {
            return Ok(false);
        };
        let Ok(signature) = schnorr::Signature::from_slice(&sig[..64]) else {
            return Ok(false);
        };

        let ext = matches!(sig_version, SigVersion::Tapscript).then(|| TapscriptExt {
            tapleaf_hash: exec_data.tapleaf_hash,
            codeseparator_pos: exec_data.codeseparator_pos,
        });
        let digest = taproot_sighash(
            self.tx,
            self.taproot_cache(),
            self.input_index,
            self.spent_outputs,
            hash_type,
            exec_data.annex.as_deref(),
            ext,
        )?;

        Ok(SECP
            .verify_schnorr(&signature, &Message::from_digest(digest), &key)
            .is_ok())
    }

    fn check_lock_time(&self, lock_time: i64) -> bool {
        let tx_lock_time = self.tx.lock_time as i64;
        // Heights only compare against heights, timestamps against
        // timestamps; a final sequence opts the input out entirely.
        let same_kind =
            (tx_lock_time < LOCKTIME_THRESHOLD) == (lock_time < LOCKTIME_THRESHOLD);
        same_kind
            && lock_time <= tx_lock_time
            && self.tx.inputs[self.input_index].sequence != SEQUENCE_FINAL
    }

    fn check_sequence(&self, sequence: i64) -> bool {
        let tx_sequence = self.tx.inputs[self.input_index].sequence as i64;

        // Relative lock times only exist from version 2 on.
        if (self.tx.version as u32) < 2 {
            return false;
        }
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 != 0 {
            return false;
        }

        let mask = (SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK) as i64;
        let tx_masked = tx_sequence & mask;
        let op_masked = sequence & mask;
        let type_flag = SEQUENCE_LOCKTIME_TYPE_FLAG as i64;

        let same_kind = (tx_masked < type_flag) == (op_masked < type_flag);
        same_kind && op_masked <= tx_masked
    }
}

fn is_taproot_hash_type(hash_type: u8) -> bool {
    matches!(
        hash_type & !SIGHASH_ANYONECANPAY,
        SIGHASH_ALL | SIGHASH_NONE | SIGHASH_SINGLE
    )
}
