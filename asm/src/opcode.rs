//! The decoded instruction record the executor and disassembler both consume.

use crate::mnemonic::Mnemonic;
use crate::operand::Operand;
use crate::registers::SegReg;

/// Which operand of a ModR/M pair holds the register named by the `reg`
/// field: the source (`FromReg`, reg -> r/m) or the destination (`ToReg`,
/// r/m -> reg).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    FromReg,
    ToReg,
}

/// A fully decoded instruction.
///
/// `following` is non-empty only when `mnemonic` is one of the meta-prefixes
/// (`Rep`/`Repne`/`Lock`/`Wait`); it then holds the wrapped instruction and
/// `raw_bytes` spans the prefix byte plus the wrapped instruction's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub opr1: Option<Operand>,
    pub opr2: Option<Operand>,
    pub raw_bytes: Vec<u8>,
    pub guest_address: u16,
    pub seg_override: Option<SegReg>,
    pub following: Option<Box<Opcode>>,
}

impl Opcode {
    /// Decodes one instruction from `bytes`, which must start at the
    /// instruction's first byte and extend at least as far as its longest
    /// possible encoding. `address` is the guest IP of the first byte.
    ///
    /// Never panics: any byte sequence this function cannot make sense of —
    /// including a trailing byte too short for the encoding it starts,
    /// which would otherwise index out of bounds — decodes as a
    /// single-byte `db` instead.
    pub fn decode(bytes: &[u8], address: u16) -> Opcode {
        let first = bytes.first().copied();
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| crate::decode::decode_at(bytes, address, None)))
            .unwrap_or_else(|_| Opcode {
                mnemonic: Mnemonic::Db,
                opr1: None,
                opr2: None,
                raw_bytes: first.into_iter().collect(),
                guest_address: address,
                seg_override: None,
                following: None,
            })
    }

    /// Renders this instruction the way the reference disassembler would.
    pub fn disasm(&self) -> String {
        crate::disasm::disasm(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_modrm_encoding_degrades_to_db_instead_of_panicking() {
        // 0x01 (ADD r/m16, r16) with no ModR/M byte following.
        let op = Opcode::decode(&[0x01], 0);
        assert_eq!(op.mnemonic, Mnemonic::Db);
        assert_eq!(op.raw_bytes, vec![0x01]);
    }
}
