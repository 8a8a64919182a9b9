//! The spending-path driver: decides which scripts run under which rules
//! and chains their stacks together.

use super::eval::eval_script;
use super::program::Program;
use crate::constants::*;
use crate::error::Error;
use crate::script::{p2pkh_script, Script, ScriptBuilder};
use crate::sighash::tagged_hash;
use crate::signature_checker::{SignatureChecker, SECP};
use crate::stack::Stack;
use crate::transaction::{write_varint, Witness};
use crate::{ScriptExecutionData, SigVersion, VerifyFlags};
use bitcoin_hashes::{sha256, Hash};
use secp256k1::{Parity, Scalar, XOnlyPublicKey};
use std::sync::Arc;
use tracing::debug;

/// Verifies that `script_sig` and `witness` satisfy `script_pubkey`.
///
/// This is the one consensus entry point: it runs the input script, the
/// output script, and whichever embedded script (p2sh redeem script, witness
/// script, tapscript leaf) the output pattern selects.
pub fn verify_script<C: SignatureChecker>(
    script_sig: &Script,
    script_pubkey: &Script,
    witness: &Witness,
    flags: VerifyFlags,
    checker: &C,
) -> Result<(), Error> {
    if flags.contains(VerifyFlags::SIGPUSHONLY) && !script_sig.is_push_only() {
        return Err(Error::InvalidScriptEmbed);
    }

    let mut exec_data = ScriptExecutionData::default();

    let mut program = Program::new();
    eval_script(
        &mut program,
        script_sig,
        flags,
        checker,
        SigVersion::Base,
        &mut exec_data,
    )?;
    let stack_copy = (flags.contains(VerifyFlags::P2SH) && script_pubkey.is_p2sh())
        .then(|| program.stack().clone());

    let mut program = Program::with_stack(program.into_stack());
    if !eval_script(
        &mut program,
        script_pubkey,
        flags,
        checker,
        SigVersion::Base,
        &mut exec_data,
    )? {
        return Err(Error::StackFalse);
    }
    let mut final_stack_len = program.stack().len();

    let mut had_witness = false;
    if flags.contains(VerifyFlags::WITNESS) {
        if let Some((version, wprogram)) = script_pubkey.witness_program() {
            had_witness = true;
            // A native witness spend leaves nothing for the input script to
            // say; anything there is malleation.
            if !script_sig.is_empty() {
                return Err(Error::InvalidWitness);
            }
            verify_witness_program(witness, version, wprogram, flags, checker, false)?;
            final_stack_len = 1;
        }
    }

    if let Some(saved) = stack_copy {
        // The input script provided the redeem script as data; rerun it as
        // code against the rest of what the input pushed.
        if !script_sig.is_push_only() {
            return Err(Error::InvalidScriptEmbed);
        }
        let mut stack = saved;
        let redeem_script = Script::new(stack.pop()?.as_bytes().into_owned());
        debug!(script = ?redeem_script, "evaluating p2sh redeem script");

        let mut program = Program::with_stack(stack);
        if !eval_script(
            &mut program,
            &redeem_script,
            flags,
            checker,
            SigVersion::Base,
            &mut exec_data,
        )? {
            return Err(Error::StackFalse);
        }
        final_stack_len = program.stack().len();

        if flags.contains(VerifyFlags::WITNESS) {
            if let Some((version, wprogram)) = redeem_script.witness_program() {
                had_witness = true;
                // The input script must be exactly the redeem script push.
                let expected = ScriptBuilder::new()
                    .push_slice(redeem_script.as_bytes())
                    .into_script();
                if *script_sig != expected {
                    return Err(Error::InvalidScriptEmbed);
                }
                verify_witness_program(witness, version, wprogram, flags, checker, true)?;
                final_stack_len = 1;
            }
        }
    }

    if flags.contains(VerifyFlags::CLEANSTACK) && final_stack_len != 1 {
        return Err(Error::CleanStack);
    }

    if !had_witness && !witness.is_empty() {
        return Err(Error::UnexpectedWitness);
    }

    Ok(())
}

fn verify_witness_program<C: SignatureChecker>(
    witness: &Witness,
    version: u8,
    program: &[u8],
    flags: VerifyFlags,
    checker: &C,
    is_p2sh: bool,
) -> Result<(), Error> {
    match version {
        0 => match program.len() {
            WITNESS_V0_SCRIPTHASH_SIZE => {
                let Some((script_bytes, stack)) = witness.elements().split_last() else {
                    return Err(Error::InvalidWitness);
                };
                let witness_script = Script::new(script_bytes.to_vec());
                let digest = sha256::Hash::hash(witness_script.as_bytes());
                if digest.as_byte_array() != program {
                    return Err(Error::InvalidWitness);
                }
                execute_witness_script(
                    stack,
                    &witness_script,
                    flags,
                    checker,
                    SigVersion::WitnessV0,
                    &mut ScriptExecutionData::default(),
                )
            }
            WITNESS_V0_KEYHASH_SIZE => {
                // The implied script is DUP HASH160 <program> EQUALVERIFY
                // CHECKSIG over exactly signature and key.
                if witness.len() != 2 {
                    return Err(Error::InvalidWitness);
                }
                execute_witness_script(
                    witness.elements(),
                    &p2pkh_script(program),
                    flags,
                    checker,
                    SigVersion::WitnessV0,
                    &mut ScriptExecutionData::default(),
                )
            }
            _ => Err(Error::InvalidWitness),
        },
        1 if program.len() == WITNESS_V1_TAPROOT_SIZE && !is_p2sh => {
            if !flags.contains(VerifyFlags::TAPROOT) {
                return Ok(());
            }
            verify_taproot_spend(witness, program, flags, checker)
        }
        _ => {
            if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
                return Err(Error::DiscourageUpgradableWitnessProgram);
            }
            // Unknown versions verify trivially, reserved for soft forks.
            Ok(())
        }
    }
}

fn verify_taproot_spend<C: SignatureChecker>(
    witness: &Witness,
    output_key: &[u8],
    flags: VerifyFlags,
    checker: &C,
) -> Result<(), Error> {
    let mut elements = witness.elements().to_vec();
    if elements.is_empty() {
        return Err(Error::InvalidWitness);
    }

    let mut exec_data = ScriptExecutionData::default();
    if elements.len() >= 2
        && elements
            .last()
            .is_some_and(|e| e.first() == Some(&ANNEX_TAG))
    {
        exec_data.annex = elements.pop();
    }

    if elements.len() == 1 {
        // Key path: the single element is a signature by the output key.
        if !checker.check_schnorr_signature(
            &elements[0],
            output_key,
            SigVersion::Taproot,
            &exec_data,
        )? {
            return Err(Error::IncorrectSignature);
        }
        return Ok(());
    }

    // Script path: the top element is the control block, below it the leaf
    // script, below that the initial stack.
    let control = elements.pop().ok_or(Error::InvalidWitness)?;
    let script_bytes = elements.pop().ok_or(Error::InvalidWitness)?;

    if control.len() < TAPROOT_CONTROL_BASE_SIZE
        || (control.len() - TAPROOT_CONTROL_BASE_SIZE) % TAPROOT_CONTROL_NODE_SIZE != 0
        || (control.len() - TAPROOT_CONTROL_BASE_SIZE) / TAPROOT_CONTROL_NODE_SIZE
            > TAPROOT_CONTROL_MAX_NODE_COUNT
    {
        return Err(Error::InvalidCommitment);
    }

    let leaf_script = Script::new(script_bytes.to_vec());
    let leaf_version = control[0] & TAPROOT_LEAF_MASK;
    let leaf_hash = tapleaf_hash(leaf_version, leaf_script.as_bytes());
    if !verify_taproot_commitment(&control, output_key, leaf_hash) {
        return Err(Error::InvalidCommitment);
    }

    if leaf_version == TAPROOT_LEAF_TAPSCRIPT {
        exec_data.tapleaf_hash = leaf_hash;
        exec_data.validation_weight_left =
            witness.serialized_len() as i64 + VALIDATION_WEIGHT_OFFSET;
        return execute_witness_script(
            &elements,
            &leaf_script,
            flags,
            checker,
            SigVersion::Tapscript,
            &mut exec_data,
        );
    }

    if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_TAPROOT_VERSION) {
        return Err(Error::DiscourageUpgradableTaprootVersion);
    }
    Ok(())
}

fn execute_witness_script<C: SignatureChecker>(
    stack_elements: &[Arc<[u8]>],
    script: &Script,
    flags: VerifyFlags,
    checker: &C,
    sig_version: SigVersion,
    exec_data: &mut ScriptExecutionData,
) -> Result<(), Error> {
    if sig_version == SigVersion::Tapscript {
        // An OP_SUCCESS opcode anywhere before the first decode failure makes
        // the whole script pass unconditionally.
        for op in script.ops() {
            if op.opcode().is_op_success() {
                if flags.contains(VerifyFlags::DISCOURAGE_OP_SUCCESS) {
                    return Err(Error::DiscourageOpSuccess);
                }
                return Ok(());
            }
        }
        if !script.is_well_formed() {
            return Err(Error::InvalidScript);
        }
        // BIP342 bounds the initial stack before anything executes.
        if stack_elements.len() > MAX_STACK_SIZE {
            return Err(Error::InvalidStackSize);
        }
    }

    for element in stack_elements {
        if element.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(Error::InvalidPushDataSize);
        }
    }

    let mut program = Program::with_stack(Stack::from_witness(stack_elements));
    let truthy = eval_script(&mut program, script, flags, checker, sig_version, exec_data)?;
    // Witness scripts have cleanstack semantics built in.
    if program.stack().len() != 1 {
        return Err(Error::DirtyWitness);
    }
    if !truthy {
        return Err(Error::StackFalse);
    }
    Ok(())
}

fn tapleaf_hash(leaf_version: u8, script: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(script.len() + 10);
    data.push(leaf_version);
    write_varint(&mut data, script.len() as u64);
    data.extend_from_slice(script);
    tagged_hash("TapLeaf", &data)
}

/// Checks that the output key commits to the internal key and the merkle
/// path carried by the control block (BIP341).
fn verify_taproot_commitment(control: &[u8], output_key: &[u8], leaf_hash: [u8; 32]) -> bool {
    let Ok(internal_key) = XOnlyPublicKey::from_slice(&control[1..TAPROOT_CONTROL_BASE_SIZE])
    else {
        return false;
    };
    let Ok(output_key) = XOnlyPublicKey::from_slice(output_key) else {
        return false;
    };

    let mut node = leaf_hash;
    for branch in control[TAPROOT_CONTROL_BASE_SIZE..].chunks_exact(TAPROOT_CONTROL_NODE_SIZE) {
        let mut pair = [0u8; 64];
        // Branch hashes commit to their children in lexicographic order.
        if node.as_slice() <= branch {
            pair[..32].copy_from_slice(&node);
            pair[32..].copy_from_slice(branch);
        } else {
            pair[..32].copy_from_slice(branch);
            pair[32..].copy_from_slice(&node);
        }
        node = tagged_hash("TapBranch", &pair);
    }

    let mut tweak_input = [0u8; 64];
    tweak_input[..32].copy_from_slice(&internal_key.serialize());
    tweak_input[32..].copy_from_slice(&node);
    let Ok(tweak) = Scalar::from_be_bytes(tagged_hash("TapTweak", &tweak_input)) else {
        return false;
    };

    let parity = if control[0] & 1 == 1 {
        Parity::Odd
    } else {
        Parity::Even
    };
    internal_key.tweak_add_check(&SECP, &output_key, parity, tweak)
}
