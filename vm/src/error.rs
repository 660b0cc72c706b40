//! Runtime error variants produced by the executor.
//!
//! Every variant here is fatal to the running guest: the outer loop
//! ([`crate::vm::Vm::run`]) reports it and stops. Syscall failures are
//! not represented here — they are handled entirely inside the syscall
//! bridge, which reports them to the guest as -1 rather than unwinding the
//! host.

use i8086_asm::Mnemonic;
use thiserror::Error;

/// Fatal interpreter error variants.
#[derive(Debug, Error)]
pub enum VmError {
    /// A mnemonic the executor has no semantic function for.
    #[error("unsupported opcode: {0}")]
    UnsupportedOpcode(Mnemonic),
    /// A rotate with a count other than 1 (RCL/RCR count !=1 is unimplemented;
    /// see the open question recorded in DESIGN.md).
    #[error("unsupported rotate count for {0}")]
    UnsupportedRotateCount(Mnemonic),
    /// `INT n` with `n != 32`.
    #[error("unsupported interrupt vector: {0:#x}")]
    UnsupportedInterrupt(u8),
    /// `DIV`/`IDIV` with a zero divisor.
    #[error("guest divide by zero")]
    GuestDivideByZero,
    /// A `REP`/`REPE`/`REPNE` prefix wrapping something other than a string
    /// primitive.
    #[error("rep prefix wraps a non-string instruction: {0}")]
    RepOnNonString(Mnemonic),
}
