//! Consensus limits and signature-hash constants.

use num_traits::Num;
use std::sync::LazyLock;

/// Maximum script length in bytes.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum number of bytes pushable to the stack.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum number of non-push operations per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// The maximum combined depth of the primary and alternate stacks.
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of public keys per multisig.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

/// Compressed public key serialization length.
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Witness v0 program length encoding Hash160(pubkey).
pub const WITNESS_V0_KEYHASH_SIZE: usize = 20;

/// Witness v0 program length encoding SHA256(script).
pub const WITNESS_V0_SCRIPTHASH_SIZE: usize = 32;

/// Witness v1 program length encoding an x-only taproot output key.
pub const WITNESS_V1_TAPROOT_SIZE: usize = 32;

/// First byte of a taproot annex witness element.
pub const ANNEX_TAG: u8 = 0x50;

/// Control block length without any merkle path: control byte + internal key.
pub const TAPROOT_CONTROL_BASE_SIZE: usize = 33;

/// Length of one merkle path element.
pub const TAPROOT_CONTROL_NODE_SIZE: usize = 32;

/// Maximum merkle path depth.
pub const TAPROOT_CONTROL_MAX_NODE_COUNT: usize = 128;

/// Mask extracting the leaf version from the control byte.
pub const TAPROOT_LEAF_MASK: u8 = 0xfe;

/// The tapscript leaf version (BIP342).
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xc0;

/// Validation weight granted per witness byte plus this offset (BIP342).
pub const VALIDATION_WEIGHT_OFFSET: i64 = 50;

/// Validation weight consumed per passing signature check (BIP342).
pub const VALIDATION_WEIGHT_PER_SIGOP_PASSED: i64 = 50;

pub const SIGHASH_DEFAULT: u8 = 0x00;
pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Mask extracting the output-coverage part of a sighash type.
pub const SIGHASH_OUTPUT_MASK: u8 = 0x1f;

/// Lock time values at or above this threshold are unix timestamps,
/// below it block heights.
pub const LOCKTIME_THRESHOLD: i64 = 500_000_000;

/// Sequence number marking an input as final.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// BIP68: sequence is not a relative lock time when this bit is set.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// BIP68: relative lock time is time-based when this bit is set.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// BIP68: mask of the sequence bits carrying the relative lock time value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// Half the order of secp256k1, the upper bound for a low S value.
pub static HALF_ORDER: LazyLock<num_bigint::BigInt> = LazyLock::new(|| {
    const HALF_N: &str = "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0";
    num_bigint::BigInt::from_str_radix(HALF_N, 16).expect("static value must be valid")
});
