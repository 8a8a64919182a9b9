//! `OP_CHECKMULTISIG` semantics.

use super::sig::{check_pubkey_encoding, check_signature_encoding};
use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::error::Error;
use crate::interpreter::Program;
use crate::script::{Script, ScriptBuilder};
use crate::signature_checker::SignatureChecker;
use crate::{SigVersion, VerifyFlags};

/// Pops `dummy sig..m m key..n n` and reports whether `m` signatures match
/// `m` of the `n` keys in order.
///
/// Keys are consumed top-down and a signature that fails one key is retried
/// against the next, so signature order must follow key order. Encoding
/// violations abort; a mere verification miss moves on.
pub(super) fn eval_checkmultisig<C: SignatureChecker>(
    program: &mut Program,
    script: &Script,
    begin_op: usize,
    flags: VerifyFlags,
    checker: &C,
    sig_version: SigVersion,
) -> Result<bool, Error> {
    let require_minimal = flags.contains(VerifyFlags::MINIMALDATA);

    let keys_count = program.stack_mut().pop_num(require_minimal)?.value();
    if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&keys_count) {
        return Err(Error::MultisigPubkeyCount);
    }
    program.count_ops(keys_count as usize)?;
    let mut keys = Vec::with_capacity(keys_count as usize);
    for _ in 0..keys_count {
        keys.push(program.stack_mut().pop()?.as_bytes().into_owned());
    }

    let sigs_count = program.stack_mut().pop_num(require_minimal)?.value();
    if !(0..=keys_count).contains(&sigs_count) {
        return Err(Error::MultisigSigCount);
    }
    let mut sigs = Vec::with_capacity(sigs_count as usize);
    for _ in 0..sigs_count {
        sigs.push(program.stack_mut().pop()?.as_bytes().into_owned());
    }

    // The off-by-one dummy, consumed but (absent NULLDUMMY) never inspected.
    let dummy = program.stack_mut().pop()?;

    let script_code = match sig_version {
        SigVersion::Base => {
            let sig_pushes: Vec<Vec<u8>> = sigs
                .iter()
                .map(|sig| {
                    ScriptBuilder::new()
                        .push_slice(sig)
                        .into_script()
                        .as_bytes()
                        .to_vec()
                })
                .collect();
            script.subscript(begin_op, &sig_pushes)
        }
        _ => script.tail_bytes(begin_op).to_vec(),
    };

    let mut success = true;
    let mut key_index = 0;
    let mut sig_index = 0;
    while success && sig_index < sigs.len() {
        let sig = &sigs[sig_index];
        let key = &keys[key_index];

        check_signature_encoding(sig, flags)?;
        check_pubkey_encoding(key, flags, sig_version)?;

        if checker.check_ecdsa_signature(sig, key, &script_code, sig_version)? {
            sig_index += 1;
        }
        key_index += 1;

        // Not enough keys left for the remaining signatures.
        if sigs.len() - sig_index > keys.len() - key_index {
            success = false;
        }
    }

    if !success
        && flags.contains(VerifyFlags::NULLFAIL)
        && sigs.iter().any(|sig| !sig.is_empty())
    {
        return Err(Error::IncorrectSignature);
    }

    if flags.contains(VerifyFlags::NULLDUMMY) && !dummy.is_empty() {
        return Err(Error::MultisigDummy);
    }

    Ok(success)
}
