//! The opcode dispatch loop.

mod multisig;
pub(crate) mod sig;

pub use self::sig::SignatureEncodingError;

use super::program::Program;
use crate::constants::*;
use crate::error::Error;
use crate::num::ScriptNum;
use crate::opcode::all::*;
use crate::script::Script;
use crate::signature_checker::SignatureChecker;
use crate::{ScriptExecutionData, SigVersion, VerifyFlags};
use bitcoin_hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash};
use std::sync::Arc;
use tracing::trace;

/// Runs `script` against the program's stacks.
///
/// `Ok(true)` means the run finished with a truthy top element; whether a
/// false or empty final stack is fatal depends on the spending path, so the
/// driver decides. All rule violations come back as `Err`.
pub fn eval_script<C: SignatureChecker>(
    program: &mut Program,
    script: &Script,
    flags: VerifyFlags,
    checker: &C,
    sig_version: SigVersion,
    exec_data: &mut ScriptExecutionData,
) -> Result<bool, Error> {
    let is_legacy_version = matches!(sig_version, SigVersion::Base | SigVersion::WitnessV0);
    if is_legacy_version && script.len() > MAX_SCRIPT_SIZE {
        return Err(Error::InvalidScriptSize);
    }

    trace!(
        len = script.len(),
        ?sig_version,
        "evaluating script"
    );

    let require_minimal = flags.contains(VerifyFlags::MINIMALDATA);
    // First operation of the current signing subscript (advanced by
    // OP_CODESEPARATOR).
    let mut begin_op = 0usize;

    for (op_index, op) in script.ops().iter().enumerate() {
        let opcode = op.opcode();
        let executing = program.condition().all_true();

        if let Some(data) = op.data() {
            if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(Error::InvalidPushDataSize);
            }
            if executing {
                if require_minimal && !op.is_minimal_push() {
                    return Err(Error::InvalidPushDataSize);
                }
                program.stack_mut().push_chunk(Arc::clone(data));
            }
            program.check_stack_limit()?;
            continue;
        }

        if is_legacy_version && !opcode.is_push() {
            program.count_op()?;
        }

        // A disabled opcode poisons the script wherever it sits, executed
        // branch or not.
        if opcode.is_disabled() {
            return Err(Error::DisabledOpcode(opcode));
        }

        // Inside a false branch only the conditional family runs.
        // OP_VERIF/OP_VERNOTIF sit inside that opcode range and fail even
        // there.
        let branch_evaluated =
            opcode.is_conditional() || opcode == OP_VERIF || opcode == OP_VERNOTIF;
        if !executing && !branch_evaluated {
            program.check_stack_limit()?;
            continue;
        }

        if let Some(n) = opcode.decode_pushnum() {
            program.stack_mut().push_num(n);
            program.check_stack_limit()?;
            continue;
        }

        match opcode {
            OP_0 => program.stack_mut().push_num(0),

            // Flow control.
            OP_NOP => {}
            OP_IF | OP_NOTIF => {
                let mut value = false;
                if executing {
                    let top = program
                        .stack_mut()
                        .pop()
                        .map_err(|_| Error::InvalidStackScope)?;
                    let minimal_required = sig_version == SigVersion::Tapscript
                        || (sig_version == SigVersion::WitnessV0
                            && flags.contains(VerifyFlags::MINIMALIF));
                    if minimal_required {
                        let bytes = top.as_bytes();
                        if !(bytes.is_empty() || (bytes.len() == 1 && bytes[0] == 1)) {
                            return Err(Error::MinimalIf);
                        }
                    }
                    value = top.cast_to_bool();
                    if opcode == OP_NOTIF {
                        value = !value;
                    }
                }
                program.condition_mut().push(value);
            }
            OP_ELSE => {
                if !program.condition_mut().toggle_top() {
                    return Err(Error::InvalidStackScope);
                }
            }
            OP_ENDIF => {
                if !program.condition_mut().pop() {
                    return Err(Error::InvalidStackScope);
                }
            }
            OP_VERIF | OP_VERNOTIF => return Err(Error::ReservedOpcode(opcode)),
            OP_VERIFY => {
                if !program.stack_mut().pop_bool()? {
                    return Err(Error::Verify(opcode));
                }
            }
            OP_RETURN => return Err(Error::OpReturn),

            // Stack shuffles.
            OP_TOALTSTACK => {
                let value = program.stack_mut().pop()?;
                program.alt_stack_mut().push(value);
            }
            OP_FROMALTSTACK => {
                let value = program.alt_stack_mut().pop()?;
                program.stack_mut().push(value);
            }
            OP_2DROP => program.stack_mut().drop(2)?,
            OP_2DUP => program.stack_mut().dup(2)?,
            OP_3DUP => program.stack_mut().dup(3)?,
            OP_2OVER => program.stack_mut().over(2)?,
            OP_2ROT => program.stack_mut().rot(2)?,
            OP_2SWAP => program.stack_mut().swap(2)?,
            OP_IFDUP => {
                if program.stack().last()?.cast_to_bool() {
                    program.stack_mut().dup(1)?;
                }
            }
            OP_DEPTH => {
                let depth = program.stack().len() as i64;
                program.stack_mut().push_num(depth);
            }
            OP_DROP => program.stack_mut().drop(1)?,
            OP_DUP => program.stack_mut().dup(1)?,
            OP_NIP => program.stack_mut().nip()?,
            OP_OVER => program.stack_mut().over(1)?,
            OP_PICK | OP_ROLL => {
                let n = program.stack_mut().pop_num(require_minimal)?.value();
                if n < 0 || n >= program.stack().len() as i64 {
                    return Err(Error::InvalidStackSize);
                }
                let value = if opcode == OP_PICK {
                    program.stack().peek(n as usize)?.clone()
                } else {
                    program.stack_mut().remove(n as usize)?
                };
                program.stack_mut().push(value);
            }
            OP_ROT => program.stack_mut().rot(1)?,
            OP_SWAP => program.stack_mut().swap(1)?,
            OP_TUCK => program.stack_mut().tuck()?,

            OP_SIZE => {
                let len = program.stack().last()?.len() as i64;
                program.stack_mut().push_num(len);
            }

            OP_EQUAL | OP_EQUALVERIFY => {
                let a = program.stack_mut().pop()?;
                let b = program.stack_mut().pop()?;
                let equal = a == b;
                if opcode == OP_EQUAL {
                    program.stack_mut().push_bool(equal);
                } else if !equal {
                    return Err(Error::Verify(opcode));
                }
            }

            // Arithmetic. Operands are bounded to 4 bytes; results are not,
            // and only fail once reused as operands.
            OP_1ADD => {
                let n = program
                    .stack_mut()
                    .pop_num(require_minimal)?
                    .checked_add(1.into())?;
                program.stack_mut().push_num(n);
            }
            OP_1SUB => {
                let n = program
                    .stack_mut()
                    .pop_num(require_minimal)?
                    .checked_sub(1.into())?;
                program.stack_mut().push_num(n);
            }
            OP_NEGATE => {
                let n = program.stack_mut().pop_num(require_minimal)?.checked_neg()?;
                program.stack_mut().push_num(n);
            }
            OP_ABS => {
                let n = program.stack_mut().pop_num(require_minimal)?.abs();
                program.stack_mut().push_num(n);
            }
            OP_NOT => {
                let zero = program.stack_mut().pop_num(require_minimal)?.is_zero();
                program.stack_mut().push_bool(zero);
            }
            OP_0NOTEQUAL => {
                let nonzero = !program.stack_mut().pop_num(require_minimal)?.is_zero();
                program.stack_mut().push_bool(nonzero);
            }
            OP_ADD => {
                let b = program.stack_mut().pop_num(require_minimal)?;
                let a = program.stack_mut().pop_num(require_minimal)?;
                program.stack_mut().push_num(a.checked_add(b)?);
            }
            OP_SUB => {
                let b = program.stack_mut().pop_num(require_minimal)?;
                let a = program.stack_mut().pop_num(require_minimal)?;
                program.stack_mut().push_num(a.checked_sub(b)?);
            }
            OP_BOOLAND | OP_BOOLOR => {
                let b = !program.stack_mut().pop_num(require_minimal)?.is_zero();
                let a = !program.stack_mut().pop_num(require_minimal)?.is_zero();
                program.stack_mut().push_bool(if opcode == OP_BOOLAND {
                    a && b
                } else {
                    a || b
                });
            }
            OP_NUMEQUAL | OP_NUMNOTEQUAL | OP_NUMEQUALVERIFY => {
                let b = program.stack_mut().pop_num(require_minimal)?;
                let a = program.stack_mut().pop_num(require_minimal)?;
                match opcode {
                    OP_NUMEQUAL => program.stack_mut().push_bool(a == b),
                    OP_NUMNOTEQUAL => program.stack_mut().push_bool(a != b),
                    _ => {
                        if a != b {
                            return Err(Error::Verify(opcode));
                        }
                    }
                }
            }
            OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL | OP_GREATERTHANOREQUAL => {
                let b = program.stack_mut().pop_num(require_minimal)?;
                let a = program.stack_mut().pop_num(require_minimal)?;
                let result = match opcode {
                    OP_LESSTHAN => a < b,
                    OP_GREATERTHAN => a > b,
                    OP_LESSTHANOREQUAL => a <= b,
                    _ => a >= b,
                };
                program.stack_mut().push_bool(result);
            }
            OP_MIN | OP_MAX => {
                let b = program.stack_mut().pop_num(require_minimal)?;
                let a = program.stack_mut().pop_num(require_minimal)?;
                program.stack_mut().push_num(if opcode == OP_MIN {
                    a.min(b)
                } else {
                    a.max(b)
                });
            }
            OP_WITHIN => {
                let max = program.stack_mut().pop_num(require_minimal)?;
                let min = program.stack_mut().pop_num(require_minimal)?;
                let x = program.stack_mut().pop_num(require_minimal)?;
                program.stack_mut().push_bool(min <= x && x < max);
            }

            // Crypto.
            OP_RIPEMD160 => {
                let data = program.stack_mut().pop()?;
                let digest = ripemd160::Hash::hash(&data.as_bytes());
                program.stack_mut().push_chunk(digest.to_byte_array().to_vec());
            }
            OP_SHA1 => {
                let data = program.stack_mut().pop()?;
                let digest = sha1::Hash::hash(&data.as_bytes());
                program.stack_mut().push_chunk(digest.to_byte_array().to_vec());
            }
            OP_SHA256 => {
                let data = program.stack_mut().pop()?;
                let digest = sha256::Hash::hash(&data.as_bytes());
                program.stack_mut().push_chunk(digest.to_byte_array().to_vec());
            }
            OP_HASH160 => {
                let data = program.stack_mut().pop()?;
                let digest = hash160::Hash::hash(&data.as_bytes());
                program.stack_mut().push_chunk(digest.to_byte_array().to_vec());
            }
            OP_HASH256 => {
                let data = program.stack_mut().pop()?;
                let digest = sha256d::Hash::hash(&data.as_bytes());
                program.stack_mut().push_chunk(digest.to_byte_array().to_vec());
            }

            OP_CODESEPARATOR => {
                begin_op = op_index + 1;
                if sig_version == SigVersion::Tapscript {
                    exec_data.codeseparator_pos = op_index as u32;
                }
            }

            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                let pubkey = program.stack_mut().pop()?;
                let sig = program.stack_mut().pop()?;
                let success = sig::eval_checksig(
                    sig.as_bytes().as_ref(),
                    pubkey.as_bytes().as_ref(),
                    script,
                    begin_op,
                    exec_data,
                    flags,
                    checker,
                    sig_version,
                )?;
                if opcode == OP_CHECKSIG {
                    program.stack_mut().push_bool(success);
                } else if !success {
                    return Err(Error::Verify(opcode));
                }
            }
            OP_CHECKSIGADD => {
                if sig_version != SigVersion::Tapscript {
                    return Err(Error::ReservedOpcode(opcode));
                }
                let pubkey = program.stack_mut().pop()?;
                let n = program
                    .stack_mut()
                    .pop()?
                    .cast_to_num(require_minimal, None)?;
                let sig = program.stack_mut().pop()?;
                let success = sig::eval_checksig(
                    sig.as_bytes().as_ref(),
                    pubkey.as_bytes().as_ref(),
                    script,
                    begin_op,
                    exec_data,
                    flags,
                    checker,
                    sig_version,
                )?;
                program
                    .stack_mut()
                    .push_num(n.checked_add(ScriptNum::from(success as i64))?);
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                if sig_version == SigVersion::Tapscript {
                    return Err(Error::DisabledOpcode(opcode));
                }
                let success = multisig::eval_checkmultisig(
                    program,
                    script,
                    begin_op,
                    flags,
                    checker,
                    sig_version,
                )?;
                if opcode == OP_CHECKMULTISIG {
                    program.stack_mut().push_bool(success);
                } else if !success {
                    return Err(Error::Verify(opcode));
                }
            }

            // Locktime.
            OP_CHECKLOCKTIMEVERIFY => {
                if !flags.contains(VerifyFlags::CHECKLOCKTIMEVERIFY) {
                    if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                        return Err(Error::DiscourageUpgradableNops);
                    }
                } else {
                    // The operand stays on the stack. 5-byte operands keep
                    // timestamp locks meaningful past the 4-byte range.
                    let lock_time = program
                        .stack()
                        .last()?
                        .cast_to_num(require_minimal, Some(5))?;
                    if lock_time.is_negative() {
                        return Err(Error::NegativeLocktime);
                    }
                    if !checker.check_lock_time(lock_time.value()) {
                        return Err(Error::UnsatisfiedLocktime);
                    }
                }
            }
            OP_CHECKSEQUENCEVERIFY => {
                if !flags.contains(VerifyFlags::CHECKSEQUENCEVERIFY) {
                    if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                        return Err(Error::DiscourageUpgradableNops);
                    }
                } else {
                    let sequence = program
                        .stack()
                        .last()?
                        .cast_to_num(require_minimal, Some(5))?;
                    if sequence.is_negative() {
                        return Err(Error::NegativeLocktime);
                    }
                    // With the disable bit set the operand is a NOP; the
                    // field carries no relative lock time.
                    if sequence.value() & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 == 0
                        && !checker.check_sequence(sequence.value())
                    {
                        return Err(Error::UnsatisfiedLocktime);
                    }
                }
            }

            OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {
                if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                    return Err(Error::DiscourageUpgradableNops);
                }
            }

            OP_RESERVED | OP_VER | OP_RESERVED1 | OP_RESERVED2 => {
                return Err(Error::ReservedOpcode(opcode));
            }

            // Everything above OP_CHECKSIGADD, and OP_CHECKSIGADD itself in
            // pre-taproot scripts, has no assigned meaning.
            _ => return Err(Error::ReservedOpcode(opcode)),
        }

        program.check_stack_limit()?;
    }

    if !script.is_well_formed() {
        return Err(Error::InvalidScript);
    }

    if !program.condition().is_empty() {
        return Err(Error::InvalidStackScope);
    }

    Ok(!program.stack().is_empty() && program.stack().last()?.cast_to_bool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptBuilder;
    use crate::signature_checker::NoSignatureCheck;
    use crate::stack::StackValue;

    fn eval(script: &Script, flags: VerifyFlags) -> (Result<bool, Error>, Program) {
        let mut program = Program::new();
        let result = eval_script(
            &mut program,
            script,
            flags,
            &NoSignatureCheck,
            SigVersion::Base,
            &mut ScriptExecutionData::default(),
        );
        (result, program)
    }

    fn eval_ok(script: &Script) -> (Result<bool, Error>, Program) {
        eval(script, VerifyFlags::NONE)
    }

    #[test]
    fn equal_and_equalverify() {
        let script = ScriptBuilder::new()
            .push_slice(&[4])
            .push_slice(&[4])
            .push_opcode(OP_EQUAL)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().len(), 1);

        let script = ScriptBuilder::new()
            .push_slice(&[4])
            .push_slice(&[3])
            .push_opcode(OP_EQUALVERIFY)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::Verify(OP_EQUALVERIFY)));

        let script = ScriptBuilder::new()
            .push_slice(&[4])
            .push_opcode(OP_EQUAL)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::InvalidStackSize));
    }

    #[test]
    fn dup_depth_semantics() {
        let script = ScriptBuilder::new()
            .push_slice(&[7])
            .push_opcode(OP_DUP)
            .push_opcode(OP_EQUAL)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Ok(true));

        let script = ScriptBuilder::new().push_opcode(OP_DUP).into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::InvalidStackSize));
    }

    #[test]
    fn arithmetic_overflow_discipline() {
        // 2147483647 1ADD: result exceeds 4 bytes but is a valid result.
        let script = ScriptBuilder::new()
            .push_slice(&i32::MAX.to_le_bytes()[..4])
            .push_opcode(OP_1ADD)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(
            program.stack().last().unwrap(),
            &StackValue::Num(i32::MAX as i64 + 1)
        );

        // Reusing the 5-byte result as an operand overflows.
        let script = ScriptBuilder::new()
            .push_slice(&i32::MAX.to_le_bytes()[..4])
            .push_opcode(OP_1ADD)
            .push_opcode(OP_1ADD)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(
            result,
            Err(Error::Num(crate::num::NumError::Overflow))
        );
    }

    #[test]
    fn conditional_branches() {
        // 1 IF 2 ELSE 3 ENDIF
        let script = ScriptBuilder::new()
            .push_opcode(OP_1)
            .push_opcode(OP_IF)
            .push_opcode(OP_2)
            .push_opcode(OP_ELSE)
            .push_opcode(OP_3)
            .push_opcode(OP_ENDIF)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().last().unwrap(), &StackValue::Num(2));

        // 0 NOTIF 5 ENDIF
        let script = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_opcode(OP_NOTIF)
            .push_opcode(OP_5)
            .push_opcode(OP_ENDIF)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().last().unwrap(), &StackValue::Num(5));

        // Missing ENDIF.
        let script = ScriptBuilder::new()
            .push_opcode(OP_1)
            .push_opcode(OP_IF)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::InvalidStackScope));

        // ELSE without IF.
        let script = ScriptBuilder::new().push_opcode(OP_ELSE).into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::InvalidStackScope));
    }

    #[test]
    fn skipped_branches_have_no_stack_effect() {
        // 0 IF DUP ENDIF 1: the DUP on an empty stack never runs.
        let script = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_opcode(OP_IF)
            .push_opcode(OP_DUP)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_1)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().len(), 1);

        // A disabled opcode fails even in the skipped branch.
        let script = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_opcode(OP_IF)
            .push_opcode(OP_CAT)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_1)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::DisabledOpcode(OP_CAT)));

        // A reserved opcode does not.
        let script = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_opcode(OP_IF)
            .push_opcode(OP_RESERVED)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_1)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn alt_stack_round_trip() {
        let script = ScriptBuilder::new()
            .push_opcode(OP_5)
            .push_opcode(OP_TOALTSTACK)
            .push_opcode(OP_FROMALTSTACK)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().last().unwrap(), &StackValue::Num(5));

        let script = ScriptBuilder::new()
            .push_opcode(OP_FROMALTSTACK)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::InvalidStackSize));
    }

    #[test]
    fn pick_and_roll() {
        // a b c 2 PICK -> a b c a
        let script = ScriptBuilder::new()
            .push_opcode(OP_1)
            .push_opcode(OP_2)
            .push_opcode(OP_3)
            .push_opcode(OP_2)
            .push_opcode(OP_PICK)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().len(), 4);
        assert_eq!(program.stack().last().unwrap(), &StackValue::Num(1));

        // a b c 2 ROLL -> b c a
        let script = ScriptBuilder::new()
            .push_opcode(OP_1)
            .push_opcode(OP_2)
            .push_opcode(OP_3)
            .push_opcode(OP_2)
            .push_opcode(OP_ROLL)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().len(), 3);
        assert_eq!(program.stack().last().unwrap(), &StackValue::Num(1));

        // Out of range index.
        let script = ScriptBuilder::new()
            .push_opcode(OP_1)
            .push_opcode(OP_1)
            .push_opcode(OP_PICK)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Err(Error::InvalidStackSize));
    }

    #[test]
    fn hash_opcodes() {
        let script = ScriptBuilder::new()
            .push_slice(b"abc")
            .push_opcode(OP_SHA256)
            .push_slice(
                &hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                    .unwrap(),
            )
            .push_opcode(OP_EQUAL)
            .into_script();
        let (result, _) = eval_ok(&script);
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn return_and_reserved() {
        let script = ScriptBuilder::new().push_opcode(OP_RETURN).into_script();
        assert_eq!(eval_ok(&script).0, Err(Error::OpReturn));

        let script = ScriptBuilder::new().push_opcode(OP_RESERVED).into_script();
        assert_eq!(eval_ok(&script).0, Err(Error::ReservedOpcode(OP_RESERVED)));

        // VERIF fails even unexecuted.
        let script = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_opcode(OP_IF)
            .push_opcode(OP_VERIF)
            .push_opcode(OP_ENDIF)
            .into_script();
        assert_eq!(eval_ok(&script).0, Err(Error::ReservedOpcode(OP_VERIF)));
    }

    #[test]
    fn minimaldata_rejects_sloppy_pushes() {
        // PUSHDATA1 for 2 bytes.
        let script = Script::new(vec![0x4c, 0x02, 0xaa, 0xbb]);
        assert_eq!(
            eval(&script, VerifyFlags::MINIMALDATA).0,
            Err(Error::InvalidPushDataSize)
        );
        assert_eq!(eval(&script, VerifyFlags::NONE).0, Ok(true));

        // Non-minimal number operand.
        let script = Script::new(vec![0x02, 0x01, 0x00, 0x8b]); // push [1,0]; 1ADD
        assert_eq!(
            eval(&script, VerifyFlags::MINIMALDATA).0,
            Err(Error::Num(crate::num::NumError::NotMinimallyEncoded))
        );
        assert_eq!(eval(&script, VerifyFlags::NONE).0, Ok(true));
    }

    #[test]
    fn malformed_script_fails_after_prefix() {
        // OP_1 then a truncated push.
        let script = Script::new(vec![0x51, 0x05, 0xaa]);
        assert_eq!(eval_ok(&script).0, Err(Error::InvalidScript));
    }

    #[test]
    fn op_count_ceiling() {
        let mut bytes = vec![0x51]; // OP_1
        bytes.extend(std::iter::repeat(0x61).take(MAX_OPS_PER_SCRIPT)); // NOPs
        assert_eq!(eval_ok(&Script::new(bytes.clone())).0, Ok(true));
        bytes.push(0x61);
        assert_eq!(
            eval_ok(&Script::new(bytes)).0,
            Err(Error::InvalidOperationCount)
        );
    }

    #[test]
    fn oversized_script_rejected() {
        let script = Script::new(vec![0x61; MAX_SCRIPT_SIZE + 1]);
        assert_eq!(eval_ok(&script).0, Err(Error::InvalidScriptSize));
    }

    #[test]
    fn numeric_comparisons() {
        // 2 3 LESSTHAN
        let script = ScriptBuilder::new()
            .push_opcode(OP_2)
            .push_opcode(OP_3)
            .push_opcode(OP_LESSTHAN)
            .into_script();
        assert_eq!(eval_ok(&script).0, Ok(true));

        // 2 WITHIN [1, 3)
        let script = ScriptBuilder::new()
            .push_opcode(OP_2)
            .push_opcode(OP_1)
            .push_opcode(OP_3)
            .push_opcode(OP_WITHIN)
            .into_script();
        assert_eq!(eval_ok(&script).0, Ok(true));

        // 3 WITHIN [1, 3) is false (max exclusive).
        let script = ScriptBuilder::new()
            .push_opcode(OP_3)
            .push_opcode(OP_1)
            .push_opcode(OP_3)
            .push_opcode(OP_WITHIN)
            .into_script();
        assert_eq!(eval_ok(&script).0, Ok(false));
    }

    #[test]
    fn size_and_ifdup() {
        let script = ScriptBuilder::new()
            .push_slice(&[1, 2, 3])
            .push_opcode(OP_SIZE)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().last().unwrap(), &StackValue::Num(3));

        let script = ScriptBuilder::new()
            .push_opcode(OP_1)
            .push_opcode(OP_IFDUP)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(true));
        assert_eq!(program.stack().len(), 2);

        let script = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_opcode(OP_IFDUP)
            .into_script();
        let (result, program) = eval_ok(&script);
        assert_eq!(result, Ok(false));
        assert_eq!(program.stack().len(), 1);
    }

    #[test]
    fn upgradable_nops() {
        let script = ScriptBuilder::new()
            .push_opcode(OP_1)
            .push_opcode(OP_NOP1)
            .into_script();
        assert_eq!(eval_ok(&script).0, Ok(true));
        assert_eq!(
            eval(&script, VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS).0,
            Err(Error::DiscourageUpgradableNops)
        );
    }
}
