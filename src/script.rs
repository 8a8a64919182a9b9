//! Script container, decoder and builder.
//!
//! A [`Script`] is an immutable byte buffer. The operation list is decoded
//! lazily, exactly once, and cached; decoding never fails outright — it stops
//! at the first structural problem (truncated length prefix, declared length
//! past the end of the buffer), keeps the successfully parsed prefix and marks
//! the script malformed. Serialization is the identity on the underlying
//! bytes, so any well-formed script round-trips byte-for-byte.

use crate::opcode::{all::*, Opcode, PushLen};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A decoded script operation: an opcode plus, for data pushes, the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    opcode: Opcode,
    data: Option<Arc<[u8]>>,
    /// Byte offset of the opcode within the script.
    offset: usize,
    /// The push used a longer-than-minimal encoding for its payload.
    non_minimal: bool,
}

impl Operation {
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The push payload, if this operation carries one.
    pub fn data(&self) -> Option<&Arc<[u8]>> {
        self.data.as_ref()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_minimal_push(&self) -> bool {
        !self.non_minimal
    }

    /// Serialized length: opcode byte, length prefix and payload.
    pub fn encoded_len(&self) -> usize {
        let data_len = self.data.as_ref().map_or(0, |d| d.len());
        let prefix_len = match self.opcode.push_len() {
            None | Some(PushLen::Direct(_)) => 0,
            Some(PushLen::OneByte) => 1,
            Some(PushLen::TwoBytes) => 2,
            Some(PushLen::FourBytes) => 4,
        };
        1 + prefix_len + data_len
    }
}

/// An immutable script, decoded on first use.
pub struct Script {
    bytes: Vec<u8>,
    decoded: OnceLock<Decoded>,
}

struct Decoded {
    ops: Vec<Operation>,
    well_formed: bool,
}

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            decoded: OnceLock::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The successfully decoded operation prefix. For a well-formed script
    /// this is the whole operation list.
    pub fn ops(&self) -> &[Operation] {
        &self.decoded().ops
    }

    /// Whether the whole byte buffer decoded into operations.
    pub fn is_well_formed(&self) -> bool {
        self.decoded().well_formed
    }

    fn decoded(&self) -> &Decoded {
        self.decoded.get_or_init(|| decode_operations(&self.bytes))
    }

    /// Pay-to-script-hash template: `HASH160 <20 bytes> EQUAL`.
    pub fn is_p2sh(&self) -> bool {
        self.bytes.len() == 23
            && self.bytes[0] == OP_HASH160.to_u8()
            && self.bytes[1] == 0x14
            && self.bytes[22] == OP_EQUAL.to_u8()
    }

    /// A witness program is a version opcode (`OP_0`, `OP_1`..`OP_16`)
    /// followed by a single direct push of 2 to 40 bytes.
    pub fn witness_program(&self) -> Option<(u8, &[u8])> {
        if !(4..=42).contains(&self.bytes.len()) {
            return None;
        }
        let version_op = Opcode::from_u8(self.bytes[0]);
        let version = if version_op == OP_0 {
            0
        } else {
            u8::try_from(version_op.decode_pushnum()?).ok()?
        };
        if self.bytes[1] as usize != self.bytes.len() - 2 {
            return None;
        }
        Some((version, &self.bytes[2..]))
    }

    /// Whether every operation is a data push (`OP_16` or below).
    pub fn is_push_only(&self) -> bool {
        self.is_well_formed() && self.ops().iter().all(|op| op.opcode().is_push())
    }

    /// Re-serializes the operations from `start_index` onwards, dropping
    /// every `OP_CODESEPARATOR` and every push whose serialized form appears
    /// in `drop_pushes` (signature stripping for the legacy sighash).
    pub fn subscript(&self, start_index: usize, drop_pushes: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len());
        for op in self.ops().iter().skip(start_index) {
            if op.opcode() == OP_CODESEPARATOR {
                continue;
            }
            let raw = &self.bytes[op.offset()..op.offset() + op.encoded_len()];
            if drop_pushes.iter().any(|target| raw == &target[..]) {
                continue;
            }
            out.extend_from_slice(raw);
        }
        out
    }

    /// The raw bytes from operation `start_index` to the end of the script.
    /// This is the witness-v0 script code: nothing is stripped.
    pub fn tail_bytes(&self, start_index: usize) -> &[u8] {
        let offset = self
            .ops()
            .get(start_index)
            .map_or(self.bytes.len(), |op| op.offset());
        &self.bytes[offset..]
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Script {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl Clone for Script {
    fn clone(&self) -> Self {
        Self::new(self.bytes.clone())
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Script {}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.bytes))
    }
}

fn decode_operations(bytes: &[u8]) -> Decoded {
    let mut ops = Vec::new();
    let mut cursor = 0;
    while cursor < bytes.len() {
        let offset = cursor;
        let opcode = Opcode::from_u8(bytes[cursor]);
        cursor += 1;

        let Some(push_len) = opcode.push_len() else {
            ops.push(Operation {
                opcode,
                data: None,
                offset,
                non_minimal: false,
            });
            continue;
        };

        let (len, prefix_minimal) = match push_len {
            PushLen::Direct(n) => (n, true),
            PushLen::OneByte => {
                let Some(&len) = bytes.get(cursor) else {
                    return Decoded {
                        ops,
                        well_formed: false,
                    };
                };
                cursor += 1;
                (len as usize, len as usize > 75)
            }
            PushLen::TwoBytes => {
                let Some(prefix) = bytes.get(cursor..cursor + 2) else {
                    return Decoded {
                        ops,
                        well_formed: false,
                    };
                };
                cursor += 2;
                let len = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
                (len, len > u8::MAX as usize)
            }
            PushLen::FourBytes => {
                let Some(prefix) = bytes.get(cursor..cursor + 4) else {
                    return Decoded {
                        ops,
                        well_formed: false,
                    };
                };
                cursor += 4;
                let len =
                    u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
                (len, len > u16::MAX as usize)
            }
        };

        let Some(data) = bytes.get(cursor..cursor + len) else {
            return Decoded {
                ops,
                well_formed: false,
            };
        };
        cursor += len;

        // A push is minimal when the shortest opcode expressed it: small
        // values belong in the pushnum opcodes, short payloads in direct
        // pushes, and each PUSHDATA width only covers lengths the narrower
        // prefix cannot.
        let payload_minimal = match data {
            [] => false,
            [b] => !(*b == 0x81 || (1..=16).contains(b)),
            _ => true,
        };

        ops.push(Operation {
            opcode,
            data: Some(Arc::from(data)),
            offset,
            non_minimal: !(prefix_minimal && payload_minimal),
        });
    }
    Decoded {
        ops,
        well_formed: true,
    }
}

/// Incremental script construction with minimal push encoding.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_opcode(mut self, opcode: Opcode) -> Self {
        self.bytes.push(opcode.to_u8());
        self
    }

    /// Appends a data push using the narrowest length prefix. Small numeric
    /// values are not folded into pushnum opcodes; callers synthesizing
    /// templates need the literal push layout.
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        match data.len() {
            n @ 0..=75 => self.bytes.push(n as u8),
            n @ 76..=255 => {
                self.bytes.push(OP_PUSHDATA1.to_u8());
                self.bytes.push(n as u8);
            }
            n @ 256..=65535 => {
                self.bytes.push(OP_PUSHDATA2.to_u8());
                self.bytes.extend_from_slice(&(n as u16).to_le_bytes());
            }
            n => {
                self.bytes.push(OP_PUSHDATA4.to_u8());
                self.bytes.extend_from_slice(&(n as u32).to_le_bytes());
            }
        }
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn into_script(self) -> Script {
        Script::new(self.bytes)
    }
}

/// The implied script a version-0 keyhash witness program executes.
pub fn p2pkh_script(key_hash: &[u8]) -> Script {
    ScriptBuilder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(key_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}
