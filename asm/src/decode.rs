//! The primary opcode dispatch table: maps the first byte of an instruction
//! (plus whatever ModR/M, displacement or immediate bytes follow it) to a
//! mnemonic and its operands.
//!
//! Structured as one function per instruction shape, mirroring the way the
//! reference decoder separates "how ADD reads itself" from "which opcodes
//! are ADD" — the table at the bottom only picks a shape and feeds it the
//! handful of parameters (width, direction, fixed registers) that vary.

use crate::bytes::{read_u16_le, read_u8};
use crate::modrm::{decode_modrm, decode_modrm_imm};
use crate::mnemonic::Mnemonic;
use crate::opcode::{Direction, Opcode};
use crate::operand::{Counter, CounterKind, DirectFarAddress, Immediate, IndirectFarAddress, Operand};
use crate::registers::{Reg16, Reg8, SegReg};

struct Decoded {
    mnemonic: Mnemonic,
    opr1: Option<Operand>,
    opr2: Option<Operand>,
    /// Bytes consumed from `rest` (i.e. not counting the opcode byte itself).
    extra: usize,
}

impl Decoded {
    fn db() -> Decoded {
        Decoded { mnemonic: Mnemonic::Db, opr1: None, opr2: None, extra: 0 }
    }

    fn no_operand(mnemonic: Mnemonic) -> Decoded {
        Decoded { mnemonic, opr1: None, opr2: None, extra: 0 }
    }

    fn one(mnemonic: Mnemonic, opr1: Operand, extra: usize) -> Decoded {
        Decoded { mnemonic, opr1: Some(opr1), opr2: None, extra }
    }

    fn two(mnemonic: Mnemonic, opr1: Operand, opr2: Operand, extra: usize) -> Decoded {
        Decoded { mnemonic, opr1: Some(opr1), opr2: Some(opr2), extra }
    }
}

fn by_modrm(mnemonic: Mnemonic, width: u8, direction: Direction, rest: &[u8], seg: Option<SegReg>) -> Decoded {
    let (_reg, reg_operand, rm_operand, consumed) = decode_modrm(rest, width, seg);
    let (opr1, opr2) = match direction {
        Direction::FromReg => (rm_operand, reg_operand),
        Direction::ToReg => (reg_operand, rm_operand),
    };
    Decoded::two(mnemonic, opr1, opr2, consumed)
}

/// `MOV sreg, r/m16` / `MOV r/m16, sreg` (0x8C/0x8E): the reg field selects
/// a segment register and only the 4 valid encodings exist.
fn by_modrm_sreg(mnemonic: Mnemonic, direction: Direction, rest: &[u8], seg: Option<SegReg>) -> Decoded {
    let (reg, _reg_operand, rm_operand, consumed) = decode_modrm(rest, 16, seg);
    if reg >= 4 {
        return Decoded::db();
    }
    let sreg_operand = Operand::Seg(SegReg::from_field(reg));
    let (opr1, opr2) = match direction {
        Direction::FromReg => (rm_operand, sreg_operand),
        Direction::ToReg => (sreg_operand, rm_operand),
    };
    Decoded::two(mnemonic, opr1, opr2, consumed)
}

/// `LEA`/`LDS`/`LES` (0x8D/0xC4/0xC5): the r/m operand must name memory.
fn by_modrm_load(mnemonic: Mnemonic, rest: &[u8], seg: Option<SegReg>) -> Decoded {
    let (_reg, reg_operand, rm_operand, consumed) = decode_modrm(rest, 16, seg);
    if !rm_operand.is_memory() {
        return Decoded::db();
    }
    Decoded::two(mnemonic, reg_operand, rm_operand, consumed)
}

fn imm_acc(mnemonic: Mnemonic, width: u8, imm_width: u8, direction: Direction, rest: &[u8]) -> Decoded {
    let acc = if width == 8 { Operand::Reg8(Reg8::Al) } else { Operand::Reg16(Reg16::Ax) };
    let (imm, consumed) = match imm_width {
        8 => (Immediate::new(read_u8(rest), false, 8), 1),
        16 => (Immediate::new(read_u16_le(rest), false, 16), 2),
        _ => unreachable!(),
    };
    let imm_operand = Operand::Imm(imm);
    let (opr1, opr2) = match direction {
        Direction::FromReg => (imm_operand, acc),
        Direction::ToReg => (acc, imm_operand),
    };
    Decoded::two(mnemonic, opr1, opr2, consumed)
}

fn mem_acc(mnemonic: Mnemonic, width: u8, direction: Direction, rest: &[u8], seg: Option<SegReg>) -> Decoded {
    let addr = Immediate::new(read_u16_le(rest), false, 16);
    let mem = Operand::Mem(crate::operand::Memory {
        base: crate::registers::MemBase::Direct,
        disp: Some(addr),
        width,
        seg_override: seg,
    });
    let acc = if width == 8 { Operand::Reg8(Reg8::Al) } else { Operand::Reg16(Reg16::Ax) };
    let (opr1, opr2) = match direction {
        Direction::FromReg => (mem, acc),
        Direction::ToReg => (acc, mem),
    };
    Decoded::two(mnemonic, opr1, opr2, 2)
}

fn reg_imm(mnemonic: Mnemonic, width: u8, reg_field: u8, rest: &[u8]) -> Decoded {
    let (dest, imm, consumed) = match width {
        8 => (Operand::Reg8(Reg8::from_field(reg_field)), Immediate::new(read_u8(rest), false, 8), 1),
        16 => (Operand::Reg16(Reg16::from_field(reg_field)), Immediate::new(read_u16_le(rest), false, 16), 2),
        _ => unreachable!(),
    };
    Decoded::two(mnemonic, dest, Operand::Imm(imm), consumed)
}

/// The `80`/`81`/`83`/`C6`/`C7` groups: reg field selects the mnemonic, r/m
/// is the destination, and an immediate (sign-extended to `width` when
/// `signed`) follows.
fn multi_mnemonics(width: u8, signed: bool, mnemonics: [Option<Mnemonic>; 8], rest: &[u8], seg: Option<SegReg>) -> Decoded {
    let (reg, rm_operand, imm, consumed) = decode_modrm_imm(rest, width, signed, seg);
    match mnemonics[reg as usize] {
        Some(mnemonic) => Decoded::two(mnemonic, rm_operand, Operand::Imm(imm), consumed),
        None => Decoded::db(),
    }
}

/// The `D0`-`D3` shift/rotate group: reg field selects the mnemonic, r/m is
/// the operand, and the count is either the literal 1 or CL.
fn count_multi_mnemonics(kind: CounterKind, width: u8, mnemonics: [Option<Mnemonic>; 8], rest: &[u8], seg: Option<SegReg>) -> Decoded {
    let (reg, _reg_operand, rm_operand, consumed) = decode_modrm(rest, width, seg);
    match mnemonics[reg as usize] {
        Some(mnemonic) => Decoded::two(mnemonic, rm_operand, Operand::Counter(Counter { kind, width }), consumed),
        None => Decoded::db(),
    }
}

/// The `F6`/`F7`/`FE`/`FF`/`8F` groups: reg field selects the mnemonic and
/// (bar `TEST`, which also reads a trailing immediate, and the far `CALL`/
/// `JMP` forms, which require a memory operand) the r/m operand stands alone.
fn one_operand_multi_mnemonics(width: u8, mnemonics: [Option<Mnemonic>; 8], rest: &[u8], seg: Option<SegReg>) -> Decoded {
    let (reg, _reg_operand, rm_operand, consumed) = decode_modrm(rest, width, seg);
    let mnemonic = match mnemonics[reg as usize] {
        Some(m) => m,
        None => return Decoded::db(),
    };
    match mnemonic {
        Mnemonic::Test => {
            let (_reg, rm_operand, imm, consumed) = decode_modrm_imm(rest, width, false, seg);
            Decoded::two(Mnemonic::Test, rm_operand, Operand::Imm(imm), consumed)
        }
        Mnemonic::Call | Mnemonic::Jmp if reg == 3 || reg == 5 => {
            if !rm_operand.is_memory() {
                return Decoded::db();
            }
            let Operand::Mem(memory) = rm_operand else { unreachable!() };
            Decoded::one(mnemonic, Operand::IndirectFar(IndirectFarAddress { memory }), consumed)
        }
        _ => Decoded::one(mnemonic, rm_operand, consumed),
    }
}

fn reg_reg(mnemonic: Mnemonic, opr1: Operand, opr2: Operand) -> Decoded {
    Decoded::two(mnemonic, opr1, opr2, 0)
}

fn reg(mnemonic: Mnemonic, reg_field: u8) -> Decoded {
    Decoded::one(mnemonic, Operand::Reg16(Reg16::from_field(reg_field)), 0)
}

fn sreg(mnemonic: Mnemonic, field: u8) -> Decoded {
    Decoded::one(mnemonic, Operand::Seg(SegReg::from_field(field)), 0)
}

fn imm(mnemonic: Mnemonic, width: u8, signed: bool, rest: &[u8]) -> Decoded {
    let i = match width {
        8 => Immediate::new(read_u8(rest), signed, 8),
        16 => Immediate::new(read_u16_le(rest), signed, 16),
        _ => unreachable!(),
    };
    Decoded::one(mnemonic, Operand::Imm(i), (width / 8) as usize)
}

fn direct_far_address(mnemonic: Mnemonic, rest: &[u8]) -> Decoded {
    let offset = read_u16_le(rest);
    let segment = read_u16_le(&rest[2..]);
    Decoded::one(mnemonic, Operand::DirectFar(DirectFarAddress { segment, offset }), 4)
}

/// `AAM`/`AAD` (0xD4/0xD5): valid only when followed by the literal byte
/// 0x0A; any other trailing byte decodes as `db`.
fn no_operand_checked(mnemonic: Mnemonic, expected: u8, rest: &[u8]) -> Decoded {
    if rest.first() == Some(&expected) {
        Decoded { mnemonic, opr1: None, opr2: None, extra: 1 }
    } else {
        Decoded::db()
    }
}

fn decode_primary(byte: u8, rest: &[u8], seg: Option<SegReg>) -> Decoded {
    use Direction::{FromReg, ToReg};
    use Mnemonic::*;

    match byte {
        0x00 => by_modrm(Add, 8, FromReg, rest, seg),
        0x01 => by_modrm(Add, 16, FromReg, rest, seg),
        0x02 => by_modrm(Add, 8, ToReg, rest, seg),
        0x03 => by_modrm(Add, 16, ToReg, rest, seg),
        0x04 => imm_acc(Add, 8, 8, ToReg, rest),
        0x05 => imm_acc(Add, 16, 16, ToReg, rest),
        0x06 => sreg(Push, 0),
        0x07 => sreg(Pop, 0),
        0x08 => by_modrm(Or, 8, FromReg, rest, seg),
        0x09 => by_modrm(Or, 16, FromReg, rest, seg),
        0x0A => by_modrm(Or, 8, ToReg, rest, seg),
        0x0B => by_modrm(Or, 16, ToReg, rest, seg),
        0x0C => imm_acc(Or, 8, 8, ToReg, rest),
        0x0D => imm_acc(Or, 16, 16, ToReg, rest),
        0x0E => sreg(Push, 1),

        0x10 => by_modrm(Adc, 8, FromReg, rest, seg),
        0x11 => by_modrm(Adc, 16, FromReg, rest, seg),
        0x12 => by_modrm(Adc, 8, ToReg, rest, seg),
        0x13 => by_modrm(Adc, 16, ToReg, rest, seg),
        0x14 => imm_acc(Adc, 8, 8, ToReg, rest),
        0x15 => imm_acc(Adc, 16, 16, ToReg, rest),
        0x16 => sreg(Push, 2),
        0x17 => sreg(Pop, 2),
        0x18 => by_modrm(Sbb, 8, FromReg, rest, seg),
        0x19 => by_modrm(Sbb, 16, FromReg, rest, seg),
        0x1A => by_modrm(Sbb, 8, ToReg, rest, seg),
        0x1B => by_modrm(Sbb, 16, ToReg, rest, seg),
        0x1C => imm_acc(Sbb, 8, 8, ToReg, rest),
        0x1D => imm_acc(Sbb, 16, 16, ToReg, rest),
        0x1E => sreg(Push, 3),
        0x1F => sreg(Pop, 3),

        0x20 => by_modrm(And, 8, FromReg, rest, seg),
        0x21 => by_modrm(And, 16, FromReg, rest, seg),
        0x22 => by_modrm(And, 8, ToReg, rest, seg),
        0x23 => by_modrm(And, 16, ToReg, rest, seg),
        0x24 => imm_acc(And, 8, 8, ToReg, rest),
        0x25 => imm_acc(And, 16, 16, ToReg, rest),
        // 0x26 (ES override) is handled by the caller, not this table.
        0x27 => Decoded::no_operand(Daa),
        0x28 => by_modrm(Sub, 8, FromReg, rest, seg),
        0x29 => by_modrm(Sub, 16, FromReg, rest, seg),
        0x2A => by_modrm(Sub, 8, ToReg, rest, seg),
        0x2B => by_modrm(Sub, 16, ToReg, rest, seg),
        0x2C => imm_acc(Sub, 8, 8, ToReg, rest),
        0x2D => imm_acc(Sub, 16, 16, ToReg, rest),
        0x2F => Decoded::no_operand(Das),

        0x30 => by_modrm(Xor, 8, FromReg, rest, seg),
        0x31 => by_modrm(Xor, 16, FromReg, rest, seg),
        0x32 => by_modrm(Xor, 8, ToReg, rest, seg),
        0x33 => by_modrm(Xor, 16, ToReg, rest, seg),
        0x34 => imm_acc(Xor, 8, 8, ToReg, rest),
        0x35 => imm_acc(Xor, 16, 16, ToReg, rest),
        0x37 => Decoded::no_operand(Aaa),
        0x38 => by_modrm(Cmp, 8, FromReg, rest, seg),
        0x39 => by_modrm(Cmp, 16, FromReg, rest, seg),
        0x3A => by_modrm(Cmp, 8, ToReg, rest, seg),
        0x3B => by_modrm(Cmp, 16, ToReg, rest, seg),
        0x3C => imm_acc(Cmp, 8, 8, ToReg, rest),
        0x3D => imm_acc(Cmp, 16, 16, ToReg, rest),
        0x3F => Decoded::no_operand(Aas),

        0x40..=0x47 => reg(Inc, byte - 0x40),
        0x48..=0x4F => reg(Dec, byte - 0x48),
        0x50..=0x57 => reg(Push, byte - 0x50),
        0x58..=0x5F => reg(Pop, byte - 0x58),

        0x70 => imm(Jo, 8, true, rest),
        0x71 => imm(Jno, 8, true, rest),
        0x72 => imm(Jc, 8, true, rest),
        0x73 => imm(Jnc, 8, true, rest),
        0x74 => imm(Jz, 8, true, rest),
        0x75 => imm(Jnz, 8, true, rest),
        0x76 => imm(Jna, 8, true, rest),
        0x77 => imm(Ja, 8, true, rest),
        0x78 => imm(Js, 8, true, rest),
        0x79 => imm(Jns, 8, true, rest),
        0x7A => imm(Jpe, 8, true, rest),
        0x7B => imm(Jpo, 8, true, rest),
        0x7C => imm(Jl, 8, true, rest),
        0x7D => imm(Jnl, 8, true, rest),
        0x7E => imm(Jng, 8, true, rest),
        0x7F => imm(Jg, 8, true, rest),

        0x80 => multi_mnemonics(8, false, GROUP_ARITH, rest, seg),
        0x81 => multi_mnemonics(16, false, GROUP_ARITH, rest, seg),
        0x83 => multi_mnemonics(16, true, GROUP_ARITH, rest, seg),
        0x84 => by_modrm(Test, 8, FromReg, rest, seg),
        0x85 => by_modrm(Test, 16, FromReg, rest, seg),
        0x86 => by_modrm(Xchg, 8, ToReg, rest, seg),
        0x87 => by_modrm(Xchg, 16, ToReg, rest, seg),
        0x88 => by_modrm(Mov, 8, FromReg, rest, seg),
        0x89 => by_modrm(Mov, 16, FromReg, rest, seg),
        0x8A => by_modrm(Mov, 8, ToReg, rest, seg),
        0x8B => by_modrm(Mov, 16, ToReg, rest, seg),
        0x8C => by_modrm_sreg(Mov, FromReg, rest, seg),
        0x8D => by_modrm_load(Lea, rest, seg),
        0x8E => by_modrm_sreg(Mov, ToReg, rest, seg),
        0x8F => one_operand_multi_mnemonics(16, GROUP_POP, rest, seg),

        0x90 => Decoded::no_operand(Nop),
        0x91 => reg_reg(Xchg, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Cx)),
        0x92 => reg_reg(Xchg, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Dx)),
        0x93 => reg_reg(Xchg, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Bx)),
        0x94 => reg_reg(Xchg, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Sp)),
        0x95 => reg_reg(Xchg, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Bp)),
        0x96 => reg_reg(Xchg, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Si)),
        0x97 => reg_reg(Xchg, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Di)),
        0x98 => Decoded::no_operand(Cbw),
        0x99 => Decoded::no_operand(Cwd),
        0x9A => direct_far_address(Call, rest),
        // 0x9B (WAIT) is handled by the caller, not this table.
        0x9C => Decoded::no_operand(Pushf),
        0x9D => Decoded::no_operand(Popf),
        0x9E => Decoded::no_operand(Sahf),
        0x9F => Decoded::no_operand(Lahf),

        0xA0 => mem_acc(Mov, 8, ToReg, rest, seg),
        0xA1 => mem_acc(Mov, 16, ToReg, rest, seg),
        0xA2 => mem_acc(Mov, 8, FromReg, rest, seg),
        0xA3 => mem_acc(Mov, 16, FromReg, rest, seg),
        0xA4 => Decoded::no_operand(Movsb),
        0xA5 => Decoded::no_operand(Movsw),
        0xA6 => Decoded::no_operand(Cmpsb),
        0xA7 => Decoded::no_operand(Cmpsw),
        0xA8 => imm_acc(Test, 8, 8, ToReg, rest),
        0xA9 => imm_acc(Test, 16, 16, ToReg, rest),
        0xAA => Decoded::no_operand(Stosb),
        0xAB => Decoded::no_operand(Stosw),
        0xAC => Decoded::no_operand(Lodsb),
        0xAD => Decoded::no_operand(Lodsw),
        0xAE => Decoded::no_operand(Scasb),
        0xAF => Decoded::no_operand(Scasw),

        0xB0..=0xB7 => reg_imm(Mov, 8, byte - 0xB0, rest),
        0xB8..=0xBF => reg_imm(Mov, 16, byte - 0xB8, rest),

        0xC2 => imm(Ret, 16, false, rest),
        0xC3 => Decoded::no_operand(Ret),
        0xC4 => by_modrm_load(Les, rest, seg),
        0xC5 => by_modrm_load(Lds, rest, seg),
        0xC6 => multi_mnemonics(8, false, [Some(Mov), None, None, None, None, None, None, None], rest, seg),
        0xC7 => multi_mnemonics(16, false, [Some(Mov), None, None, None, None, None, None, None], rest, seg),
        0xCA => imm(Retf, 16, false, rest),
        0xCB => Decoded::no_operand(Retf),
        0xCC => Decoded::no_operand(Int3),
        0xCD => imm(Int, 8, false, rest),
        0xCE => Decoded::no_operand(Into),
        0xCF => Decoded::no_operand(Iret),

        0xD0 => count_multi_mnemonics(CounterKind::One, 8, GROUP_SHIFT, rest, seg),
        0xD1 => count_multi_mnemonics(CounterKind::One, 16, GROUP_SHIFT, rest, seg),
        0xD2 => count_multi_mnemonics(CounterKind::Cl, 8, GROUP_SHIFT, rest, seg),
        0xD3 => count_multi_mnemonics(CounterKind::Cl, 16, GROUP_SHIFT, rest, seg),
        0xD4 => no_operand_checked(Aam, 0x0A, rest),
        0xD5 => no_operand_checked(Aad, 0x0A, rest),
        0xD7 => Decoded::no_operand(Xlat),

        0xE0 => imm(Loopne, 8, true, rest),
        0xE1 => imm(Loope, 8, true, rest),
        0xE2 => imm(Loop, 8, true, rest),
        0xE3 => imm(Jcxz, 8, true, rest),
        0xE4 => imm_acc(In, 8, 8, ToReg, rest),
        0xE5 => imm_acc(In, 16, 8, ToReg, rest),
        0xE6 => imm_acc(Out, 8, 8, FromReg, rest),
        0xE7 => imm_acc(Out, 16, 8, FromReg, rest),
        0xE8 => imm(Call, 16, true, rest),
        0xE9 => imm(Jmp, 16, true, rest),
        0xEA => direct_far_address(Jmp, rest),
        0xEB => imm(Jmp, 8, true, rest),
        0xEC => reg_reg(In, Operand::Reg8(Reg8::Al), Operand::Reg16(Reg16::Dx)),
        0xED => reg_reg(In, Operand::Reg16(Reg16::Ax), Operand::Reg16(Reg16::Dx)),
        0xEE => reg_reg(Out, Operand::Reg16(Reg16::Dx), Operand::Reg8(Reg8::Al)),
        0xEF => reg_reg(Out, Operand::Reg16(Reg16::Dx), Operand::Reg16(Reg16::Ax)),

        // 0xF0 (LOCK), 0xF2 (REPNE), 0xF3 (REP) are handled by the caller.
        0xF4 => Decoded::no_operand(Hlt),
        0xF5 => Decoded::no_operand(Cmc),
        0xF6 => one_operand_multi_mnemonics(8, GROUP_UNARY, rest, seg),
        0xF7 => one_operand_multi_mnemonics(16, GROUP_UNARY, rest, seg),
        0xF8 => Decoded::no_operand(Clc),
        0xF9 => Decoded::no_operand(Stc),
        0xFA => Decoded::no_operand(Cli),
        0xFB => Decoded::no_operand(Sti),
        0xFC => Decoded::no_operand(Cld),
        0xFD => Decoded::no_operand(Std),
        0xFE => one_operand_multi_mnemonics(8, [Some(Inc), Some(Dec), None, None, None, None, None, None], rest, seg),
        0xFF => one_operand_multi_mnemonics(
            16,
            [Some(Inc), Some(Dec), Some(Call), Some(Call), Some(Jmp), Some(Jmp), Some(Push), None],
            rest,
            seg,
        ),

        _ => Decoded::db(),
    }
}

const GROUP_ARITH: [Option<Mnemonic>; 8] = [
    Some(Mnemonic::Add),
    Some(Mnemonic::Or),
    Some(Mnemonic::Adc),
    Some(Mnemonic::Sbb),
    Some(Mnemonic::And),
    Some(Mnemonic::Sub),
    Some(Mnemonic::Xor),
    Some(Mnemonic::Cmp),
];

const GROUP_SHIFT: [Option<Mnemonic>; 8] = [
    Some(Mnemonic::Rol),
    Some(Mnemonic::Ror),
    Some(Mnemonic::Rcl),
    Some(Mnemonic::Rcr),
    Some(Mnemonic::Shl),
    Some(Mnemonic::Shr),
    None,
    Some(Mnemonic::Sar),
];

const GROUP_UNARY: [Option<Mnemonic>; 8] = [
    Some(Mnemonic::Test),
    None,
    Some(Mnemonic::Not),
    Some(Mnemonic::Neg),
    Some(Mnemonic::Mul),
    Some(Mnemonic::Imul),
    Some(Mnemonic::Div),
    Some(Mnemonic::Idiv),
];

const GROUP_POP: [Option<Mnemonic>; 8] = [Some(Mnemonic::Pop), None, None, None, None, None, None, None];

/// Decodes one instruction starting at `bytes[0]`, recursively unwrapping
/// segment-override and meta-prefix bytes. `seg_override` carries the
/// decode-time context a segment-override prefix establishes for everything
/// nested inside it.
pub(crate) fn decode_at(bytes: &[u8], address: u16, seg_override: Option<SegReg>) -> Opcode {
    let byte = bytes[0];
    let rest = &bytes[1..];

    let new_override = match byte {
        0x26 => Some(SegReg::Es),
        0x2E => Some(SegReg::Cs),
        0x36 => Some(SegReg::Ss),
        0x3E => Some(SegReg::Ds),
        _ => None,
    };
    if let Some(ov) = new_override {
        let nested = decode_at(rest, address.wrapping_add(1), Some(ov));
        let mut raw_bytes = Vec::with_capacity(nested.raw_bytes.len() + 1);
        raw_bytes.push(byte);
        raw_bytes.extend_from_slice(&nested.raw_bytes);
        return Opcode { raw_bytes, guest_address: address, ..nested };
    }

    let prefix_mnemonic = match byte {
        0xF0 => Some(Mnemonic::Lock),
        0xF2 => Some(Mnemonic::Repne),
        0xF3 => Some(Mnemonic::Rep),
        0x9B => Some(Mnemonic::Wait),
        _ => None,
    };
    if let Some(mnemonic) = prefix_mnemonic {
        let nested = decode_at(rest, address.wrapping_add(1), seg_override);
        let mut raw_bytes = Vec::with_capacity(nested.raw_bytes.len() + 1);
        raw_bytes.push(byte);
        raw_bytes.extend_from_slice(&nested.raw_bytes);
        return Opcode {
            mnemonic,
            opr1: None,
            opr2: None,
            raw_bytes,
            guest_address: address,
            seg_override,
            following: Some(Box::new(nested)),
        };
    }

    let decoded = decode_primary(byte, rest, seg_override);
    let mut raw_bytes = Vec::with_capacity(1 + decoded.extra);
    raw_bytes.push(byte);
    raw_bytes.extend_from_slice(&rest[..decoded.extra]);
    Opcode {
        mnemonic: decoded.mnemonic,
        opr1: decoded.opr1,
        opr2: decoded.opr2,
        raw_bytes,
        guest_address: address,
        seg_override,
        following: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_modrm_add() {
        let op = Opcode::decode(&[0x01, 0xd8], 0x100);
        assert_eq!(op.mnemonic, Mnemonic::Add);
        assert_eq!(op.raw_bytes, vec![0x01, 0xd8]);
        assert_eq!(op.guest_address, 0x100);
    }

    #[test]
    fn reserved_group_slot_is_db() {
        // D0 /6 is reserved.
        let op = Opcode::decode(&[0xD0, 0b11_110_000], 0);
        assert_eq!(op.mnemonic, Mnemonic::Db);
        assert_eq!(op.raw_bytes, vec![0xD0]);
    }

    #[test]
    fn aam_requires_trailing_0a() {
        let ok = Opcode::decode(&[0xD4, 0x0A], 0);
        assert_eq!(ok.mnemonic, Mnemonic::Aam);
        assert_eq!(ok.raw_bytes, vec![0xD4, 0x0A]);

        let bad = Opcode::decode(&[0xD4, 0x0B], 0);
        assert_eq!(bad.mnemonic, Mnemonic::Db);
        assert_eq!(bad.raw_bytes, vec![0xD4]);
    }

    #[test]
    fn far_call_through_register_is_db() {
        // FF /3 with mod=11 (register r/m) is not a valid far call.
        let op = Opcode::decode(&[0xFF, 0b11_011_000], 0);
        assert_eq!(op.mnemonic, Mnemonic::Db);
    }

    #[test]
    fn far_call_through_memory_is_indirect_far() {
        let op = Opcode::decode(&[0xFF, 0b00_011_111], 0);
        assert_eq!(op.mnemonic, Mnemonic::Call);
        assert!(matches!(op.opr1, Some(Operand::IndirectFar(_))));
    }

    #[test]
    fn segment_override_prefix_is_merged_into_following_instruction() {
        // 26 (ES override) 00 (ADD r/m8,r8) 06 (modrm: mod00 reg=al rm=110 direct) ff 12 (disp16)
        let op = Opcode::decode(&[0x26, 0x00, 0x06, 0xff, 0x12], 0x200);
        assert_eq!(op.mnemonic, Mnemonic::Add);
        assert_eq!(op.seg_override, Some(SegReg::Es));
        assert_eq!(op.guest_address, 0x200);
        assert_eq!(op.raw_bytes, vec![0x26, 0x00, 0x06, 0xff, 0x12]);
    }

    #[test]
    fn rep_prefix_wraps_a_following_instruction() {
        let op = Opcode::decode(&[0xF3, 0xA4], 0x10);
        assert_eq!(op.mnemonic, Mnemonic::Rep);
        assert_eq!(op.raw_bytes, vec![0xF3, 0xA4]);
        let following = op.following.expect("rep wraps the string op it repeats");
        assert_eq!(following.mnemonic, Mnemonic::Movsb);
        assert_eq!(following.guest_address, 0x11);
    }

    #[test]
    fn unmapped_byte_is_db() {
        let op = Opcode::decode(&[0x0F, 0x00], 0);
        assert_eq!(op.mnemonic, Mnemonic::Db);
        assert_eq!(op.raw_bytes, vec![0x0F]);
    }
}
