//! Script execution: the dispatch loop, the spending-path driver and the
//! signature-check opcodes.

mod eval;
mod program;
mod verify;

pub use self::eval::{eval_script, SignatureEncodingError};
pub use self::program::Program;
pub use self::verify::verify_script;
