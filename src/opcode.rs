//! The script opcode space.
//!
//! Every byte value is a valid opcode as far as decoding is concerned; the
//! interpreter decides at execution time whether an opcode is executable,
//! disabled, reserved or an `OP_SUCCESSx` placeholder (tapscript).

use std::fmt;

/// A single opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(u8);

/// How a push opcode encodes the length of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushLen {
    /// The opcode byte itself is the payload length (0x01..=0x4b).
    Direct(usize),
    /// `OP_PUSHDATA1`: one length byte follows.
    OneByte,
    /// `OP_PUSHDATA2`: two little-endian length bytes follow.
    TwoBytes,
    /// `OP_PUSHDATA4`: four little-endian length bytes follow.
    FourBytes,
}

impl Opcode {
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn to_u8(self) -> u8 {
        self.0
    }

    /// Returns how this opcode encodes push data, or `None` for non-data
    /// opcodes (`OP_0`, the pushnums and everything above `OP_PUSHDATA4`).
    pub const fn push_len(self) -> Option<PushLen> {
        match self.0 {
            0x01..=0x4b => Some(PushLen::Direct(self.0 as usize)),
            0x4c => Some(PushLen::OneByte),
            0x4d => Some(PushLen::TwoBytes),
            0x4e => Some(PushLen::FourBytes),
            _ => None,
        }
    }

    /// Anything up to and including `OP_16` only places data on the stack.
    /// These do not count towards the operation ceiling.
    #[inline]
    pub const fn is_push(self) -> bool {
        self.0 <= all::OP_16.0
    }

    /// Small-number opcodes: `OP_1NEGATE` and `OP_1`..`OP_16`.
    pub const fn decode_pushnum(self) -> Option<i64> {
        match self.0 {
            0x4f => Some(-1),
            0x51..=0x60 => Some((self.0 - 0x50) as i64),
            _ => None,
        }
    }

    /// Opcodes whose mere presence in a script invalidates it, executed or not.
    pub const fn is_disabled(self) -> bool {
        matches!(
            self.0,
            0x7e..=0x81 // CAT SUBSTR LEFT RIGHT
                | 0x83..=0x86 // INVERT AND OR XOR
                | 0x8d | 0x8e // 2MUL 2DIV
                | 0x95..=0x99 // MUL DIV MOD LSHIFT RSHIFT
        )
    }

    /// Reserved opcodes fail only when actually executed.
    pub const fn is_reserved(self) -> bool {
        matches!(self.0, 0x50 | 0x62 | 0x89 | 0x8a)
    }

    /// Conditional flow control, evaluated even inside a false branch.
    pub const fn is_conditional(self) -> bool {
        matches!(self.0, 0x63 | 0x64 | 0x67 | 0x68)
    }

    /// The `OP_SUCCESSx` set defined by BIP342 for tapscript.
    pub const fn is_op_success(self) -> bool {
        matches!(
            self.0,
            80 | 98
                | 126..=129
                | 131..=134
                | 137..=138
                | 141..=142
                | 149..=153
                | 187..=254
        )
    }

    const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x00 => "OP_0",
            0x4c => "OP_PUSHDATA1",
            0x4d => "OP_PUSHDATA2",
            0x4e => "OP_PUSHDATA4",
            0x4f => "OP_1NEGATE",
            0x50 => "OP_RESERVED",
            0x51 => "OP_1",
            0x52 => "OP_2",
            0x53 => "OP_3",
            0x54 => "OP_4",
            0x55 => "OP_5",
            0x56 => "OP_6",
            0x57 => "OP_7",
            0x58 => "OP_8",
            0x59 => "OP_9",
            0x5a => "OP_10",
            0x5b => "OP_11",
            0x5c => "OP_12",
            0x5d => "OP_13",
            0x5e => "OP_14",
            0x5f => "OP_15",
            0x60 => "OP_16",
            0x61 => "OP_NOP",
            0x62 => "OP_VER",
            0x63 => "OP_IF",
            0x64 => "OP_NOTIF",
            0x65 => "OP_VERIF",
            0x66 => "OP_VERNOTIF",
            0x67 => "OP_ELSE",
            0x68 => "OP_ENDIF",
            0x69 => "OP_VERIFY",
            0x6a => "OP_RETURN",
            0x6b => "OP_TOALTSTACK",
            0x6c => "OP_FROMALTSTACK",
            0x6d => "OP_2DROP",
            0x6e => "OP_2DUP",
            0x6f => "OP_3DUP",
            0x70 => "OP_2OVER",
            0x71 => "OP_2ROT",
            0x72 => "OP_2SWAP",
            0x73 => "OP_IFDUP",
            0x74 => "OP_DEPTH",
            0x75 => "OP_DROP",
            0x76 => "OP_DUP",
            0x77 => "OP_NIP",
            0x78 => "OP_OVER",
            0x79 => "OP_PICK",
            0x7a => "OP_ROLL",
            0x7b => "OP_ROT",
            0x7c => "OP_SWAP",
            0x7d => "OP_TUCK",
            0x7e => "OP_CAT",
            0x7f => "OP_SUBSTR",
            0x80 => "OP_LEFT",
            0x81 => "OP_RIGHT",
            0x82 => "OP_SIZE",
            0x83 => "OP_INVERT",
            0x84 => "OP_AND",
            0x85 => "OP_OR",
            0x86 => "OP_XOR",
            0x87 => "OP_EQUAL",
            0x88 => "OP_EQUALVERIFY",
            0x89 => "OP_RESERVED1",
            0x8a => "OP_RESERVED2",
            0x8b => "OP_1ADD",
            0x8c => "OP_1SUB",
            0x8d => "OP_2MUL",
            0x8e => "OP_2DIV",
            0x8f => "OP_NEGATE",
            0x90 => "OP_ABS",
            0x91 => "OP_NOT",
            0x92 => "OP_0NOTEQUAL",
            0x93 => "OP_ADD",
            0x94 => "OP_SUB",
            0x95 => "OP_MUL",
            0x96 => "OP_DIV",
            0x97 => "OP_MOD",
            0x98 => "OP_LSHIFT",
            0x99 => "OP_RSHIFT",
            0x9a => "OP_BOOLAND",
            0x9b => "OP_BOOLOR",
            0x9c => "OP_NUMEQUAL",
            0x9d => "OP_NUMEQUALVERIFY",
            0x9e => "OP_NUMNOTEQUAL",
            0x9f => "OP_LESSTHAN",
            0xa0 => "OP_GREATERTHAN",
            0xa1 => "OP_LESSTHANOREQUAL",
            0xa2 => "OP_GREATERTHANOREQUAL",
            0xa3 => "OP_MIN",
            0xa4 => "OP_MAX",
            0xa5 => "OP_WITHIN",
            0xa6 => "OP_RIPEMD160",
            0xa7 => "OP_SHA1",
            0xa8 => "OP_SHA256",
            0xa9 => "OP_HASH160",
            0xaa => "OP_HASH256",
            0xab => "OP_CODESEPARATOR",
            0xac => "OP_CHECKSIG",
            0xad => "OP_CHECKSIGVERIFY",
            0xae => "OP_CHECKMULTISIG",
            0xaf => "OP_CHECKMULTISIGVERIFY",
            0xb0 => "OP_NOP1",
            0xb1 => "OP_CHECKLOCKTIMEVERIFY",
            0xb2 => "OP_CHECKSEQUENCEVERIFY",
            0xb3 => "OP_NOP4",
            0xb4 => "OP_NOP5",
            0xb5 => "OP_NOP6",
            0xb6 => "OP_NOP7",
            0xb7 => "OP_NOP8",
            0xb8 => "OP_NOP9",
            0xb9 => "OP_NOP10",
            0xba => "OP_CHECKSIGADD",
            _ => return None,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None if self.0 <= 0x4b => write!(f, "OP_PUSHBYTES_{}", self.0),
            None => write!(f, "OP_UNKNOWN_{:#04x}", self.0),
        }
    }
}

/// Named opcode constants.
#[rustfmt::skip]
pub mod all {
    use super::Opcode;

    pub const OP_0: Opcode = Opcode(0x00);
    pub const OP_PUSHDATA1: Opcode = Opcode(0x4c);
    pub const OP_PUSHDATA2: Opcode = Opcode(0x4d);
    pub const OP_PUSHDATA4: Opcode = Opcode(0x4e);
    pub const OP_1NEGATE: Opcode = Opcode(0x4f);
    pub const OP_RESERVED: Opcode = Opcode(0x50);
    pub const OP_1: Opcode = Opcode(0x51);
    pub const OP_2: Opcode = Opcode(0x52);
    pub const OP_3: Opcode = Opcode(0x53);
    pub const OP_4: Opcode = Opcode(0x54);
    pub const OP_5: Opcode = Opcode(0x55);
    pub const OP_6: Opcode = Opcode(0x56);
    pub const OP_7: Opcode = Opcode(0x57);
    pub const OP_8: Opcode = Opcode(0x58);
    pub const OP_9: Opcode = Opcode(0x59);
    pub const OP_10: Opcode = Opcode(0x5a);
    pub const OP_11: Opcode = Opcode(0x5b);
    pub const OP_12: Opcode = Opcode(0x5c);
    pub const OP_13: Opcode = Opcode(0x5d);
    pub const OP_14: Opcode = Opcode(0x5e);
    pub const OP_15: Opcode = Opcode(0x5f);
    pub const OP_16: Opcode = Opcode(0x60);
    pub const OP_NOP: Opcode = Opcode(0x61);
    pub const OP_VER: Opcode = Opcode(0x62);
    pub const OP_IF: Opcode = Opcode(0x63);
    pub const OP_NOTIF: Opcode = Opcode(0x64);
    pub const OP_VERIF: Opcode = Opcode(0x65);
    pub const OP_VERNOTIF: Opcode = Opcode(0x66);
    pub const OP_ELSE: Opcode = Opcode(0x67);
    pub const OP_ENDIF: Opcode = Opcode(0x68);
    pub const OP_VERIFY: Opcode = Opcode(0x69);
    pub const OP_RETURN: Opcode = Opcode(0x6a);
    pub const OP_TOALTSTACK: Opcode = Opcode(0x6b);
    pub const OP_FROMALTSTACK: Opcode = Opcode(0x6c);
    pub const OP_2DROP: Opcode = Opcode(0x6d);
    pub const OP_2DUP: Opcode = Opcode(0x6e);
    pub const OP_3DUP: Opcode = Opcode(0x6f);
    pub const OP_2OVER: Opcode = Opcode(0x70);
    pub const OP_2ROT: Opcode = Opcode(0x71);
    pub const OP_2SWAP: Opcode = Opcode(0x72);
    pub const OP_IFDUP: Opcode = Opcode(0x73);
    pub const OP_DEPTH: Opcode = Opcode(0x74);
    pub const OP_DROP: Opcode = Opcode(0x75);
    pub const OP_DUP: Opcode = Opcode(0x76);
    pub const OP_NIP: Opcode = Opcode(0x77);
    pub const OP_OVER: Opcode = Opcode(0x78);
    pub const OP_PICK: Opcode = Opcode(0x79);
    pub const OP_ROLL: Opcode = Opcode(0x7a);
    pub const OP_ROT: Opcode = Opcode(0x7b);
    pub const OP_SWAP: Opcode = Opcode(0x7c);
    pub const OP_TUCK: Opcode = Opcode(0x7d);
    pub const OP_CAT: Opcode = Opcode(0x7e);
    pub const OP_SUBSTR: Opcode = Opcode(0x7f);
    pub const OP_LEFT: Opcode = Opcode(0x80);
    pub const OP_RIGHT: Opcode = Opcode(0x81);
    pub const OP_SIZE: Opcode = Opcode(0x82);
    pub const OP_INVERT: Opcode = Opcode(0x83);
    pub const OP_AND: Opcode = Opcode(0x84);
    pub const OP_OR: Opcode = Opcode(0x85);
    pub const OP_XOR: Opcode = Opcode(0x86);
    pub const OP_EQUAL: Opcode = Opcode(0x87);
    pub const OP_EQUALVERIFY: Opcode = Opcode(0x88);
    pub const OP_RESERVED1: Opcode = Opcode(0x89);
    pub const OP_RESERVED2: Opcode = Opcode(0x8a);
    pub const OP_1ADD: Opcode = Opcode(0x8b);
    pub const OP_1SUB: Opcode = Opcode(0x8c);
    pub const OP_2MUL: Opcode = Opcode(0x8d);
    pub const OP_2DIV: Opcode = Opcode(0x8e);
    pub const OP_NEGATE: Opcode = Opcode(0x8f);
    pub const OP_ABS: Opcode = Opcode(0x90);
    pub const OP_NOT: Opcode = Opcode(0x91);
    pub const OP_0NOTEQUAL: Opcode = Opcode(0x92);
    pub const OP_ADD: Opcode = Opcode(0x93);
    pub const OP_SUB: Opcode = Opcode(0x94);
    pub const OP_MUL: Opcode = Opcode(0x95);
    pub const OP_DIV: Opcode = Opcode(0x96);
    pub const OP_MOD: Opcode = Opcode(0x97);
    pub const OP_LSHIFT: Opcode = Opcode(0x98);
    pub const OP_RSHIFT: Opcode = Opcode(0x99);
    pub const OP_BOOLAND: Opcode = Opcode(0x9a);
    pub const OP_BOOLOR: Opcode = Opcode(0x9b);
    pub const OP_NUMEQUAL: Opcode = Opcode(0x9c);
    pub const OP_NUMEQUALVERIFY: Opcode = Opcode(0x9d);
    pub const OP_NUMNOTEQUAL: Opcode = Opcode(0x9e);
    pub const OP_LESSTHAN: Opcode = Opcode(0x9f);
    pub const OP_GREATERTHAN: Opcode = Opcode(0xa0);
    pub const OP_LESSTHANOREQUAL: Opcode = Opcode(0xa1);
    pub const OP_GREATERTHANOREQUAL: Opcode = Opcode(0xa2);
    pub const OP_MIN: Opcode = Opcode(0xa3);
    pub const OP_MAX: Opcode = Opcode(0xa4);
    pub const OP_WITHIN: Opcode = Opcode(0xa5);
    pub const OP_RIPEMD160: Opcode = Opcode(0xa6);
    pub const OP_SHA1: Opcode = Opcode(0xa7);
    pub const OP_SHA256: Opcode = Opcode(0xa8);
    pub const OP_HASH160: Opcode = Opcode(0xa9);
    pub const OP_HASH256: Opcode = Opcode(0xaa);
    pub const OP_CODESEPARATOR: Opcode = Opcode(0xab);
    pub const OP_CHECKSIG: Opcode = Opcode(0xac);
    pub const OP_CHECKSIGVERIFY: Opcode = Opcode(0xad);
    pub const OP_CHECKMULTISIG: Opcode = Opcode(0xae);
    pub const OP_CHECKMULTISIGVERIFY: Opcode = Opcode(0xaf);
    pub const OP_NOP1: Opcode = Opcode(0xb0);
    pub const OP_CHECKLOCKTIMEVERIFY: Opcode = Opcode(0xb1);
    pub const OP_CHECKSEQUENCEVERIFY: Opcode = Opcode(0xb2);
    pub const OP_NOP4: Opcode = Opcode(0xb3);
    pub const OP_NOP5: Opcode = Opcode(0xb4);
    pub const OP_NOP6: Opcode = Opcode(0xb5);
    pub const OP_NOP7: Opcode = Opcode(0xb6);
    pub const OP_NOP8: Opcode = Opcode(0xb7);
    pub const OP_NOP9: Opcode = Opcode(0xb8);
    pub const OP_NOP10: Opcode = Opcode(0xb9);
    pub const OP_CHECKSIGADD: Opcode = Opcode(0xba);
}

#[cfg(test)]
mod tests {
    use super::all::*;
    use super::*;

    #[test]
    fn push_classification() {
        assert_eq!(Opcode::from_u8(0x01).push_len(), Some(PushLen::Direct(1)));
        assert_eq!(Opcode::from_u8(0x4b).push_len(), Some(PushLen::Direct(75)));
        assert_eq!(OP_PUSHDATA1.push_len(), Some(PushLen::OneByte));
        assert_eq!(OP_PUSHDATA2.push_len(), Some(PushLen::TwoBytes));
        assert_eq!(OP_PUSHDATA4.push_len(), Some(PushLen::FourBytes));
        assert_eq!(OP_0.push_len(), None);
        assert_eq!(OP_1.push_len(), None);
        assert_eq!(OP_DUP.push_len(), None);
    }

    #[test]
    fn pushnum_decoding() {
        assert_eq!(OP_1NEGATE.decode_pushnum(), Some(-1));
        assert_eq!(OP_1.decode_pushnum(), Some(1));
        assert_eq!(OP_16.decode_pushnum(), Some(16));
        assert_eq!(OP_0.decode_pushnum(), None);
        assert_eq!(OP_NOP.decode_pushnum(), None);
    }

    #[test]
    fn disabled_and_reserved() {
        for op in [OP_CAT, OP_SUBSTR, OP_INVERT, OP_XOR, OP_2MUL, OP_MUL, OP_RSHIFT] {
            assert!(op.is_disabled(), "{op} must be disabled");
        }
        for op in [OP_RESERVED, OP_VER, OP_RESERVED1, OP_RESERVED2] {
            assert!(op.is_reserved(), "{op} must be reserved");
        }
        assert!(!OP_ADD.is_disabled());
        assert!(!OP_NOP.is_reserved());
    }

    #[test]
    fn op_success_set_matches_bip342() {
        let mut count = 0;
        for b in 0u8..=255 {
            if Opcode::from_u8(b).is_op_success() {
                count += 1;
            }
        }
        // 80, 98, 126-129, 131-134, 137-138, 141-142, 149-153, 187-254
        assert_eq!(count, 1 + 1 + 4 + 4 + 2 + 2 + 5 + 68);
        assert!(!OP_CHECKSIGADD.is_op_success());
        assert!(Opcode::from_u8(0xbb).is_op_success());
        assert!(Opcode::from_u8(0xfe).is_op_success());
        assert!(!Opcode::from_u8(0xff).is_op_success());
    }
}
