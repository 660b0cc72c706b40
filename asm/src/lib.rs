//! Decoder and disassembler for the 8086 instruction set: turns a byte
//! stream into [`Opcode`] values (mnemonic, operands, raw encoding) without
//! any dependency on how a concrete machine stores its registers or memory.
//! Execution semantics and machine state live in the `vm` crate, which
//! implements [`Machine`] and drives the operand model this crate builds.

mod bytes;
mod decode;
mod disasm;
mod machine;
mod mnemonic;
mod modrm;
mod opcode;
mod operand;
mod registers;

pub use machine::{Flag, Machine};
pub use mnemonic::Mnemonic;
pub use opcode::Opcode;
pub use operand::{Counter, CounterKind, DirectFarAddress, Immediate, IndirectFarAddress, Memory, Operand};
pub use registers::{MemBase, Reg16, Reg8, SegReg};
