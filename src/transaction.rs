//! Transaction data model and wire codec.
//!
//! Scripts and outputs are shared by reference count: sibling inputs of one
//! verification batch spend outputs of the same earlier transaction, and the
//! objects are immutable once constructed, so no copying or locking is ever
//! needed across worker threads.

use crate::script::Script;
use bitcoin_hashes::{sha256d, Hash};
use std::sync::Arc;

/// Transaction identifier: double SHA-256 of the legacy serialization.
pub type Txid = sha256d::Hash;

/// Wire decode errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("non-canonical compact size encoding")]
    NonCanonicalVarint,
    #[error("unsupported segwit flag {0:#04x}")]
    InvalidSegwitFlag(u8),
    #[error("witness marker present but all witness stacks are empty")]
    SuperfluousWitness,
    #[error("trailing bytes after transaction")]
    TrailingBytes,
}

/// A reference to a spent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

/// One witness stack: ordered byte chunks, bottom-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witness {
    elements: Vec<Arc<[u8]>>,
}

impl Witness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: impl Into<Arc<[u8]>>) {
        self.elements.push(element.into());
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&Arc<[u8]>> {
        self.elements.last()
    }

    pub fn elements(&self) -> &[Arc<[u8]>] {
        &self.elements
    }

    /// Serialized size contribution, for the tapscript validation budget.
    pub fn serialized_len(&self) -> usize {
        varint_len(self.elements.len() as u64)
            + self
                .elements
                .iter()
                .map(|e| varint_len(e.len() as u64) + e.len())
                .sum::<usize>()
    }
}

impl From<Vec<Vec<u8>>> for Witness {
    fn from(elements: Vec<Vec<u8>>) -> Self {
        Self {
            elements: elements.into_iter().map(Arc::from).collect(),
        }
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Arc<Script>,
    pub sequence: u32,
    pub witness: Witness,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in satoshis.
    pub value: u64,
    pub script_pubkey: Arc<Script>,
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Legacy serialization, witness stacks excluded.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len_hint());
        self.encode_common(&mut out, false);
        out
    }

    /// BIP144 serialization: marker/flag and per-input witness stacks,
    /// falling back to the legacy layout when no input carries a witness.
    pub fn encode_with_witness(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len_hint());
        self.encode_common(&mut out, self.has_witness());
        out
    }

    fn encode_common(&self, out: &mut Vec<u8>, witness: bool) {
        out.extend_from_slice(&self.version.to_le_bytes());
        if witness {
            out.push(0x00);
            out.push(0x01);
        }
        write_varint(out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(&input.previous_output.txid.to_byte_array());
            out.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_varint(out, input.script_sig.len() as u64);
            out.extend_from_slice(input.script_sig.as_bytes());
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_varint(out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_varint(out, output.script_pubkey.len() as u64);
            out.extend_from_slice(output.script_pubkey.as_bytes());
        }
        if witness {
            for input in &self.inputs {
                write_varint(out, input.witness.len() as u64);
                for element in input.witness.elements() {
                    write_varint(out, element.len() as u64);
                    out.extend_from_slice(element);
                }
            }
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    fn encoded_len_hint(&self) -> usize {
        64 + self
            .inputs
            .iter()
            .map(|i| 48 + i.script_sig.len() + i.witness.serialized_len())
            .sum::<usize>()
            + self
                .outputs
                .iter()
                .map(|o| 16 + o.script_pubkey.len())
                .sum::<usize>()
    }

    /// Decodes either serialization form, rejecting trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(bytes);
        let tx = Self::decode_from(&mut cursor)?;
        if !cursor.is_at_end() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(tx)
    }

    fn decode_from(cursor: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let version = i32::from_le_bytes(cursor.read_array()?);

        let mut input_count = cursor.read_varint()?;
        let mut segwit = false;
        if input_count == 0 {
            // BIP144 marker: a zero "input count" followed by the flag byte.
            let flag = cursor.read_u8()?;
            if flag != 0x01 {
                return Err(DecodeError::InvalidSegwitFlag(flag));
            }
            segwit = true;
            input_count = cursor.read_varint()?;
        }

        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            let txid = Txid::from_byte_array(cursor.read_array()?);
            let vout = u32::from_le_bytes(cursor.read_array()?);
            let script_len = cursor.read_varint()? as usize;
            let script_sig = Arc::new(Script::new(cursor.read_bytes(script_len)?.to_vec()));
            let sequence = u32::from_le_bytes(cursor.read_array()?);
            inputs.push(TxIn {
                previous_output: OutPoint { txid, vout },
                script_sig,
                sequence,
                witness: Witness::new(),
            });
        }

        let output_count = cursor.read_varint()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            let value = u64::from_le_bytes(cursor.read_array()?);
            let script_len = cursor.read_varint()? as usize;
            let script_pubkey = Arc::new(Script::new(cursor.read_bytes(script_len)?.to_vec()));
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        if segwit {
            let mut any = false;
            for input in &mut inputs {
                let element_count = cursor.read_varint()?;
                for _ in 0..element_count {
                    let len = cursor.read_varint()? as usize;
                    input.witness.push(cursor.read_bytes(len)?.to_vec());
                    any = true;
                }
            }
            if !any {
                return Err(DecodeError::SuperfluousWitness);
            }
        }

        let lock_time = u32::from_le_bytes(cursor.read_array()?);

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn txid(&self) -> Txid {
        Txid::hash(&self.encode())
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::UnexpectedEof)?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Bitcoin compact size, canonical encoding required.
    fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let value = match self.read_u8()? {
            n @ 0..=0xfc => n as u64,
            0xfd => {
                let v = u16::from_le_bytes(self.read_array()?) as u64;
                if v < 0xfd {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                v
            }
            0xfe => {
                let v = u32::from_le_bytes(self.read_array()?) as u64;
                if v <= u16::MAX as u64 {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                v
            }
            0xff => {
                let v = u64::from_le_bytes(self.read_array()?);
                if v <= u32::MAX as u64 {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                v
            }
        };
        Ok(value)
    }
}

pub(crate) fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

fn varint_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}
