//! Decodes the ModR/M byte (and its optional displacement/immediate tail)
//! into the reg-field selector and the two operands it names.

use crate::bytes::{read_u16_le, read_u8};
use crate::operand::{Immediate, Memory, Operand};
use crate::registers::{MemBase, Reg16, Reg8, SegReg};

fn register_operand(width: u8, field: u8) -> Operand {
    match width {
        8 => Operand::Reg8(Reg8::from_field(field)),
        16 => Operand::Reg16(Reg16::from_field(field)),
        _ => unreachable!("operand width is always 8 or 16"),
    }
}

/// Decodes a ModR/M byte at `bytes[0]`.
///
/// Returns `(reg_field, reg_operand, rm_operand, consumed)` where `consumed`
/// is the number of bytes read starting at `bytes[0]` (1 to 3, honoring the
/// `mod=00, rm=110` direct-address exception).
pub fn decode_modrm(bytes: &[u8], width: u8, seg_override: Option<SegReg>) -> (u8, Operand, Operand, usize) {
    let b = bytes[0];
    let md = b >> 6;
    let reg = (b >> 3) & 0x7;
    let rm = b & 0x7;

    let reg_operand = register_operand(width, reg);

    let (rm_operand, consumed) = match md {
        0b00 => {
            if rm == 0b110 {
                let disp = Immediate::new(read_u16_le(&bytes[1..]), false, 16);
                (
                    Operand::Mem(Memory {
                        base: MemBase::Direct,
                        disp: Some(disp),
                        width,
                        seg_override,
                    }),
                    3,
                )
            } else {
                (
                    Operand::Mem(Memory {
                        base: MemBase::from_rm(rm),
                        disp: None,
                        width,
                        seg_override,
                    }),
                    1,
                )
            }
        }
        0b01 => {
            let disp = Immediate::new(read_u8(&bytes[1..]), true, 8);
            (
                Operand::Mem(Memory {
                    base: MemBase::from_rm(rm),
                    disp: Some(disp),
                    width,
                    seg_override,
                }),
                2,
            )
        }
        0b10 => {
            let disp = Immediate::new(read_u16_le(&bytes[1..]), true, 16);
            (
                Operand::Mem(Memory {
                    base: MemBase::from_rm(rm),
                    disp: Some(disp),
                    width,
                    seg_override,
                }),
                3,
            )
        }
        0b11 => (register_operand(width, rm), 1),
        _ => unreachable!(),
    };

    (reg, reg_operand, rm_operand, consumed)
}

/// ModR/M followed by an immediate: decodes the r/m operand (the reg field
/// selects a group mnemonic rather than a register operand) then appends an
/// 8- or 16-bit immediate, sign-extending it to `width` when `signed`.
pub fn decode_modrm_imm(bytes: &[u8], width: u8, signed: bool, seg_override: Option<SegReg>) -> (u8, Operand, Immediate, usize) {
    let (reg, _reg_operand, rm_operand, modrm_len) = decode_modrm(bytes, width, seg_override);
    let data = &bytes[modrm_len..];
    let (imm, imm_len) = match width {
        8 => (Immediate::new(read_u8(data), false, 8), 1),
        16 => {
            if signed {
                (Immediate::new(read_u8(data), true, 8), 1)
            } else {
                (Immediate::new(read_u16_le(data), false, 16), 2)
            }
        }
        _ => unreachable!(),
    };
    (reg, rm_operand, imm, modrm_len + imm_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod00_rm_si_plus_bx() {
        let bytes = [0x00, 0xff, 0x12];
        let (_reg, reg_op, rm_op, consumed) = decode_modrm(&bytes, 8, None);
        assert_eq!(rm_op.disasm(), "[bx+si]");
        assert_eq!(reg_op.disasm(), "al");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn mod00_rm110_is_direct() {
        let bytes = [0x36, 0xff, 0x12];
        let (_reg, reg_op, rm_op, consumed) = decode_modrm(&bytes, 8, None);
        assert_eq!(rm_op.disasm(), "[0x12ff]");
        assert_eq!(reg_op.disasm(), "dh");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn mod01_rm000_signed_disp() {
        let bytes = [0x40, 0xff, 0x12];
        let (_reg, _reg_op, rm_op, consumed) = decode_modrm(&bytes, 8, None);
        assert_eq!(rm_op.disasm(), "[bx+si-0x1]");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn segment_override_is_reflected_in_disasm() {
        let bytes = [0x00, 0xff, 0x12];
        let (_reg, _reg_op, rm_op, _consumed) = decode_modrm(&bytes, 8, Some(SegReg::Es));
        assert_eq!(rm_op.disasm(), "[es:bx+si]");
    }
}
