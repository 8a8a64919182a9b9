//! Chain context for verification.

use crate::VerifyFlags;

/// Block-level context a verification batch runs under.
///
/// `Copy`; each worker thread carries its own value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainContext {
    pub height: u32,
    pub timestamp: u32,
    pub median_time_past: u32,
}

impl ChainContext {
    /// Consensus flags active at this context's height on the Bitcoin
    /// network (soft-fork activation schedule).
    pub fn consensus_flags(&self) -> VerifyFlags {
        let mut flags = VerifyFlags::NONE;
        if self.height >= 173_805 {
            flags |= VerifyFlags::P2SH;
        }
        if self.height >= 363_725 {
            flags |= VerifyFlags::DERSIG;
        }
        if self.height >= 388_381 {
            flags |= VerifyFlags::CHECKLOCKTIMEVERIFY;
        }
        if self.height >= 419_328 {
            flags |= VerifyFlags::CHECKSEQUENCEVERIFY;
        }
        if self.height >= 481_824 {
            flags |= VerifyFlags::NULLDUMMY | VerifyFlags::WITNESS;
        }
        if self.height >= 709_632 {
            flags |= VerifyFlags::TAPROOT;
        }
        flags
    }
}
