//! Signature and public key encoding policy, and the single-signature
//! checking opcodes.

use crate::constants::*;
use crate::error::Error;
use crate::script::{Script, ScriptBuilder};
use crate::signature_checker::SignatureChecker;
use crate::{ScriptExecutionData, SigVersion, VerifyFlags};
use num_bigint::{BigInt, Sign};

/// Malformed signature or public key material, distinct from a signature
/// that is well-formed but does not verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureEncodingError {
    #[error("signature is not strict DER")]
    SigDer,
    #[error("signature S value is not in the lower half of the order")]
    SigHighS,
    #[error("signature hash type is undefined")]
    SigHashType,
    #[error("public key is not canonically encoded")]
    PubkeyType,
    #[error("schnorr signature has an invalid length")]
    SchnorrSigSize,
    #[error("schnorr signature hash type is undefined")]
    SchnorrSigHashType,
}

/// Strict DER check over a signature with its trailing hash type byte,
/// as consensus-enforced since BIP66.
fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    // Layout: 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S]
    // [sighash], with bounds 8 < len < 74.
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != sig.len() - 3 {
        return false;
    }

    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 7 != sig.len() {
        return false;
    }

    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    // No superfluous leading zero unless needed for the sign bit.
    if len_r > 1 && sig[4] == 0 && sig[5] & 0x80 == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }

    true
}

/// Whether the S value of an already strict-DER signature is in the lower
/// half of the curve order.
fn is_low_s(sig: &[u8]) -> bool {
    let len_r = sig[3] as usize;
    let len_s = sig[5 + len_r] as usize;
    let s = BigInt::from_bytes_be(Sign::Plus, &sig[6 + len_r..6 + len_r + len_s]);
    s <= *HALF_ORDER
}

fn is_defined_hash_type(sig: &[u8]) -> bool {
    let hash_type = sig[sig.len() - 1] & !SIGHASH_ANYONECANPAY;
    (SIGHASH_ALL..=SIGHASH_SINGLE).contains(&hash_type)
}

/// The flag-gated encoding rules applied to an ECDSA signature before it is
/// handed to the curve. An empty signature is always acceptable here; it
/// simply fails to verify.
pub(super) fn check_signature_encoding(
    sig: &[u8],
    flags: VerifyFlags,
) -> Result<(), SignatureEncodingError> {
    if sig.is_empty() {
        return Ok(());
    }
    if flags
        .intersects(VerifyFlags::DERSIG | VerifyFlags::LOW_S | VerifyFlags::STRICTENC)
        && !is_valid_signature_encoding(sig)
    {
        return Err(SignatureEncodingError::SigDer);
    }
    if flags.contains(VerifyFlags::LOW_S) && !is_low_s(sig) {
        return Err(SignatureEncodingError::SigHighS);
    }
    if flags.contains(VerifyFlags::STRICTENC) && !is_defined_hash_type(sig) {
        return Err(SignatureEncodingError::SigHashType);
    }
    Ok(())
}

fn is_canonical_pubkey(pubkey: &[u8]) -> bool {
    match pubkey.first() {
        Some(0x02) | Some(0x03) => pubkey.len() == COMPRESSED_PUBKEY_SIZE,
        Some(0x04) => pubkey.len() == 65,
        _ => false,
    }
}

fn is_compressed_pubkey(pubkey: &[u8]) -> bool {
    pubkey.len() == COMPRESSED_PUBKEY_SIZE && matches!(pubkey[0], 0x02 | 0x03)
}

pub(super) fn check_pubkey_encoding(
    pubkey: &[u8],
    flags: VerifyFlags,
    sig_version: SigVersion,
) -> Result<(), SignatureEncodingError> {
    if flags.contains(VerifyFlags::STRICTENC) && !is_canonical_pubkey(pubkey) {
        return Err(SignatureEncodingError::PubkeyType);
    }
    // Witness v0 committed to compressed keys only.
    if flags.contains(VerifyFlags::WITNESS_PUBKEYTYPE)
        && sig_version == SigVersion::WitnessV0
        && !is_compressed_pubkey(pubkey)
    {
        return Err(SignatureEncodingError::PubkeyType);
    }
    Ok(())
}

/// `OP_CHECKSIG` family semantics for one signature/key pair, dispatched on
/// the script environment.
#[allow(clippy::too_many_arguments)]
pub(super) fn eval_checksig<C: SignatureChecker>(
    sig: &[u8],
    pubkey: &[u8],
    script: &Script,
    begin_op: usize,
    exec_data: &mut ScriptExecutionData,
    flags: VerifyFlags,
    checker: &C,
    sig_version: SigVersion,
) -> Result<bool, Error> {
    match sig_version {
        SigVersion::Base | SigVersion::WitnessV0 => {
            eval_checksig_ecdsa(sig, pubkey, script, begin_op, flags, checker, sig_version)
        }
        SigVersion::Taproot | SigVersion::Tapscript => {
            eval_checksig_tapscript(sig, pubkey, exec_data, flags, checker, sig_version)
        }
    }
}

fn eval_checksig_ecdsa<C: SignatureChecker>(
    sig: &[u8],
    pubkey: &[u8],
    script: &Script,
    begin_op: usize,
    flags: VerifyFlags,
    checker: &C,
    sig_version: SigVersion,
) -> Result<bool, Error> {
    check_signature_encoding(sig, flags)?;
    check_pubkey_encoding(pubkey, flags, sig_version)?;

    let script_code = match sig_version {
        // The legacy script code drops codeseparators and any embedded copy
        // of the signature itself.
        SigVersion::Base => {
            let sig_push = ScriptBuilder::new().push_slice(sig).into_script();
            script.subscript(begin_op, &[sig_push.as_bytes().to_vec()])
        }
        _ => script.tail_bytes(begin_op).to_vec(),
    };

    let success = checker.check_ecdsa_signature(sig, pubkey, &script_code, sig_version)?;
    if !success && flags.contains(VerifyFlags::NULLFAIL) && !sig.is_empty() {
        return Err(Error::IncorrectSignature);
    }
    Ok(success)
}

fn eval_checksig_tapscript<C: SignatureChecker>(
    sig: &[u8],
    pubkey: &[u8],
    exec_data: &mut ScriptExecutionData,
    flags: VerifyFlags,
    checker: &C,
    sig_version: SigVersion,
) -> Result<bool, Error> {
    let success = !sig.is_empty();
    if success {
        // BIP342 budgets signature checks against the witness size.
        exec_data.validation_weight_left -= VALIDATION_WEIGHT_PER_SIGOP_PASSED;
        if exec_data.validation_weight_left < 0 {
            return Err(Error::ValidationWeight);
        }
    }

    match pubkey.len() {
        0 => Err(SignatureEncodingError::PubkeyType.into()),
        32 => {
            if success
                && !checker.check_schnorr_signature(sig, pubkey, sig_version, exec_data)?
            {
                return Err(Error::IncorrectSignature);
            }
            Ok(success)
        }
        // Unknown key types verify trivially, reserved for future soft forks.
        _ => {
            if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_PUBKEYTYPE) {
                return Err(Error::DiscourageUpgradablePubkeyType);
            }
            Ok(success)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A correctly formed signature plus hash type byte.
    fn valid_sig() -> Vec<u8> {
        let mut sig = hex::decode(
            "3045\
             0221008fcbb6e90a204bf1d10335ca8810baabed45cce6fa5c1f56791a1d4a3b0e2a2c\
             02205e4d49d80c86e1278f2029322b2a79cb5b4ed17e25ba896e4e507d0b326a6bf8",
        )
        .unwrap();
        sig.push(SIGHASH_ALL);
        sig
    }

    #[test]
    fn der_acceptance() {
        assert!(is_valid_signature_encoding(&valid_sig()));

        // Too short and too long.
        assert!(!is_valid_signature_encoding(&[0x30; 8]));
        assert!(!is_valid_signature_encoding(&[0x30; 74]));

        // Wrong sequence tag.
        let mut sig = valid_sig();
        sig[0] = 0x31;
        assert!(!is_valid_signature_encoding(&sig));

        // Declared length disagreeing with the buffer.
        let mut sig = valid_sig();
        sig[1] += 1;
        assert!(!is_valid_signature_encoding(&sig));

        // R marked negative.
        let mut sig = valid_sig();
        sig[4] |= 0x80;
        assert!(!is_valid_signature_encoding(&sig));

        // Zero-length R.
        let sig = hex::decode("3006020002045e4d4901").unwrap();
        assert!(!is_valid_signature_encoding(&sig));
    }

    #[test]
    fn padded_r_rejected() {
        // R padded with a zero byte that the sign bit does not require.
        let mut sig = hex::decode(
            "3046\
             022200008fcbb6e90a204bf1d10335ca8810baabed45cce6fa5c1f56791a1d4a3b0e2a2c\
             02205e4d49d80c86e1278f2029322b2a79cb5b4ed17e25ba896e4e507d0b326a6bf8",
        )
        .unwrap();
        sig.push(SIGHASH_ALL);
        assert!(!is_valid_signature_encoding(&sig));
    }

    #[test]
    fn flag_gating() {
        let mut bad = valid_sig();
        bad[0] = 0x31;

        // Without flags, anything goes.
        assert_eq!(check_signature_encoding(&bad, VerifyFlags::NONE), Ok(()));
        assert_eq!(
            check_signature_encoding(&bad, VerifyFlags::DERSIG),
            Err(SignatureEncodingError::SigDer)
        );
        // Empty signatures always pass the encoding gate.
        assert_eq!(check_signature_encoding(&[], VerifyFlags::DERSIG), Ok(()));

        // An undefined hash type only matters under STRICTENC.
        let mut sig = valid_sig();
        let last = sig.len() - 1;
        sig[last] = 0x04;
        assert_eq!(check_signature_encoding(&sig, VerifyFlags::DERSIG), Ok(()));
        assert_eq!(
            check_signature_encoding(&sig, VerifyFlags::STRICTENC),
            Err(SignatureEncodingError::SigHashType)
        );
        sig[last] = SIGHASH_SINGLE | SIGHASH_ANYONECANPAY;
        assert_eq!(
            check_signature_encoding(&sig, VerifyFlags::STRICTENC),
            Ok(())
        );
    }

    #[test]
    fn high_s_rejected_under_low_s() {
        // S = order - 1, maximally high.
        let mut sig = hex::decode(
            "3045\
             0220180ea6c0c7ba00c023947e0ffbb17403b87b0f51cba6b2e5d300952c0ef6b887\
             0221\
             00fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140",
        )
        .unwrap();
        sig.push(SIGHASH_ALL);
        assert!(is_valid_signature_encoding(&sig));
        assert_eq!(check_signature_encoding(&sig, VerifyFlags::DERSIG), Ok(()));
        assert_eq!(
            check_signature_encoding(&sig, VerifyFlags::DERSIG | VerifyFlags::LOW_S),
            Err(SignatureEncodingError::SigHighS)
        );

        assert_eq!(
            check_signature_encoding(&valid_sig(), VerifyFlags::DERSIG | VerifyFlags::LOW_S),
            Ok(())
        );
    }

    #[test]
    fn pubkey_forms() {
        let compressed = {
            let mut k = vec![0x02];
            k.extend_from_slice(&[0x11; 32]);
            k
        };
        let uncompressed = {
            let mut k = vec![0x04];
            k.extend_from_slice(&[0x11; 64]);
            k
        };
        let hybrid = {
            let mut k = vec![0x06];
            k.extend_from_slice(&[0x11; 64]);
            k
        };

        for key in [&compressed, &uncompressed] {
            assert_eq!(
                check_pubkey_encoding(key, VerifyFlags::STRICTENC, SigVersion::Base),
                Ok(())
            );
        }
        assert_eq!(
            check_pubkey_encoding(&hybrid, VerifyFlags::STRICTENC, SigVersion::Base),
            Err(SignatureEncodingError::PubkeyType)
        );
        assert_eq!(
            check_pubkey_encoding(&hybrid, VerifyFlags::NONE, SigVersion::Base),
            Ok(())
        );

        // Witness v0 rejects uncompressed keys under WITNESS_PUBKEYTYPE.
        assert_eq!(
            check_pubkey_encoding(
                &uncompressed,
                VerifyFlags::WITNESS_PUBKEYTYPE,
                SigVersion::WitnessV0
            ),
            Err(SignatureEncodingError::PubkeyType)
        );
        assert_eq!(
            check_pubkey_encoding(
                &uncompressed,
                VerifyFlags::WITNESS_PUBKEYTYPE,
                SigVersion::Base
            ),
            Ok(())
        );
        assert_eq!(
            check_pubkey_encoding(
                &compressed,
                VerifyFlags::WITNESS_PUBKEYTYPE,
                SigVersion::WitnessV0
            ),
            Ok(())
        );
    }

    #[test]
    fn tapscript_weight_budget() {
        struct AlwaysValid;
        impl SignatureChecker for AlwaysValid {
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

        let mut exec = ScriptExecutionData {
            validation_weight_left: 60,
            ..Default::default()
        };
        let pubkey = [0x11; 32];

        assert_eq!(
            eval_checksig_tapscript(
                &[0xab; 64],
                &pubkey,
                &mut exec,
                VerifyFlags::NONE,
                &AlwaysValid,
                SigVersion::Tapscript,
            ),
            Ok(true)
        );
        assert_eq!(exec.validation_weight_left, 10);

        // An empty signature fails the check without spending budget.
        assert_eq!(
            eval_checksig_tapscript(
                &[],
                &pubkey,
                &mut exec,
                VerifyFlags::NONE,
                &AlwaysValid,
                SigVersion::Tapscript,
            ),
            Ok(false)
        );
        assert_eq!(exec.validation_weight_left, 10);

        // The next passing check exhausts it.
        assert_eq!(
            eval_checksig_tapscript(
                &[0xab; 64],
                &pubkey,
                &mut exec,
                VerifyFlags::NONE,
                &AlwaysValid,
                SigVersion::Tapscript,
            ),
            Err(Error::ValidationWeight)
        );
    }

    #[test]
    fn tapscript_pubkey_types() {
        let mut exec = ScriptExecutionData {
            validation_weight_left: 1000,
            ..Default::default()
        };
        assert_eq!(
            eval_checksig_tapscript(
                &[0xab; 64],
                &[],
                &mut exec,
                VerifyFlags::NONE,
                &crate::signature_checker::NoSignatureCheck,
                SigVersion::Tapscript,
            ),
            Err(SignatureEncodingError::PubkeyType.into())
        );
        // A 33-byte key is an unknown type: trivially valid unless
        // discouraged.
        assert_eq!(
            eval_checksig_tapscript(
                &[0xab; 64],
                &[0x02; 33],
                &mut exec,
                VerifyFlags::NONE,
                &crate::signature_checker::NoSignatureCheck,
                SigVersion::Tapscript,
            ),
            Ok(true)
        );
        assert_eq!(
            eval_checksig_tapscript(
                &[0xab; 64],
                &[0x02; 33],
                &mut exec,
                VerifyFlags::DISCOURAGE_UPGRADABLE_PUBKEYTYPE,
                &crate::signature_checker::NoSignatureCheck,
                SigVersion::Tapscript,
            ),
            Err(Error::DiscourageUpgradablePubkeyType)
        );
    }
}
