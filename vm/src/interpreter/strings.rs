//! The string-move primitives and the `REP`/`REPE`/`REPNE` loop that drives
//! them. Source operands (`MOVS`/`CMPS`/`LODS`) honor a segment-override
//! prefix on DS; the destination (`ES:DI`, used by `MOVS`/`CMPS`/`SCAS`/
//! `STOS`) never does — that segment is fixed by the 8086 regardless of any
//! prefix byte.

use i8086_asm::{Flag, Machine, Mnemonic, Opcode, Reg16, Reg8, SegReg};

use crate::error::VmError;
use crate::interpreter::alu;
use crate::vm::Vm;

fn delta(vm: &Vm, width: u8) -> u16 {
    let step: u16 = if width == 8 { 1 } else { 2 };
    if vm.flag(Flag::Df) {
        0u16.wrapping_sub(step)
    } else {
        step
    }
}

fn apply_compare_flags(vm: &mut Vm, a: u16, b: u16, width: u8) {
    let r = alu::sub(a, b, width);
    vm.set_flag(Flag::Cf, r.cf);
    vm.set_flag(Flag::Of, r.of);
    vm.set_flag(Flag::Af, r.af);
    vm.set_flag(Flag::Zf, alu::zero(r.value, width));
    vm.set_flag(Flag::Sf, alu::sign(r.value, width));
    vm.set_flag(Flag::Pf, alu::parity_even(r.value));
}

fn movs(vm: &mut Vm, width: u8, seg_override: Option<SegReg>) {
    let src_seg = seg_override.unwrap_or(SegReg::Ds);
    let si = vm.reg16(Reg16::Si);
    let di = vm.reg16(Reg16::Di);
    if width == 8 {
        let value = vm.mem_read8(src_seg, si);
        vm.mem_write8(SegReg::Es, di, value);
    } else {
        let value = vm.mem_read16(src_seg, si);
        vm.mem_write16(SegReg::Es, di, value);
    }
    let d = delta(vm, width);
    vm.set_reg16(Reg16::Si, si.wrapping_add(d));
    vm.set_reg16(Reg16::Di, di.wrapping_add(d));
}

fn cmps(vm: &mut Vm, width: u8, seg_override: Option<SegReg>) {
    let src_seg = seg_override.unwrap_or(SegReg::Ds);
    let si = vm.reg16(Reg16::Si);
    let di = vm.reg16(Reg16::Di);
    let a = if width == 8 { vm.mem_read8(src_seg, si) as u16 } else { vm.mem_read16(src_seg, si) };
    let b = if width == 8 { vm.mem_read8(SegReg::Es, di) as u16 } else { vm.mem_read16(SegReg::Es, di) };
    apply_compare_flags(vm, a, b, width);
    let d = delta(vm, width);
    vm.set_reg16(Reg16::Si, si.wrapping_add(d));
    vm.set_reg16(Reg16::Di, di.wrapping_add(d));
}

fn scas(vm: &mut Vm, width: u8) {
    let di = vm.reg16(Reg16::Di);
    let acc = if width == 8 { vm.reg8(Reg8::Al) as u16 } else { vm.reg16(Reg16::Ax) };
    let b = if width == 8 { vm.mem_read8(SegReg::Es, di) as u16 } else { vm.mem_read16(SegReg::Es, di) };
    apply_compare_flags(vm, acc, b, width);
    let d = delta(vm, width);
    vm.set_reg16(Reg16::Di, di.wrapping_add(d));
}

fn lods(vm: &mut Vm, width: u8, seg_override: Option<SegReg>) {
    let src_seg = seg_override.unwrap_or(SegReg::Ds);
    let si = vm.reg16(Reg16::Si);
    if width == 8 {
        let value = vm.mem_read8(src_seg, si);
        vm.set_reg8(Reg8::Al, value);
    } else {
        let value = vm.mem_read16(src_seg, si);
        vm.set_reg16(Reg16::Ax, value);
    }
    let d = delta(vm, width);
    vm.set_reg16(Reg16::Si, si.wrapping_add(d));
}

fn stos(vm: &mut Vm, width: u8) {
    let di = vm.reg16(Reg16::Di);
    if width == 8 {
        let value = vm.reg8(Reg8::Al);
        vm.mem_write8(SegReg::Es, di, value);
    } else {
        let value = vm.reg16(Reg16::Ax);
        vm.mem_write16(SegReg::Es, di, value);
    }
    let d = delta(vm, width);
    vm.set_reg16(Reg16::Di, di.wrapping_add(d));
}

pub fn is_string_primitive(mnemonic: Mnemonic) -> bool {
    use Mnemonic::*;
    matches!(mnemonic, Movsb | Movsw | Cmpsb | Cmpsw | Scasb | Scasw | Lodsb | Lodsw | Stosb | Stosw)
}

pub fn execute_primitive(vm: &mut Vm, mnemonic: Mnemonic, seg_override: Option<SegReg>) -> Result<(), VmError> {
    use Mnemonic::*;
    match mnemonic {
        Movsb => movs(vm, 8, seg_override),
        Movsw => movs(vm, 16, seg_override),
        Cmpsb => cmps(vm, 8, seg_override),
        Cmpsw => cmps(vm, 16, seg_override),
        Scasb => scas(vm, 8),
        Scasw => scas(vm, 16),
        Lodsb => lods(vm, 8, seg_override),
        Lodsw => lods(vm, 16, seg_override),
        Stosb => stos(vm, 8),
        Stosw => stos(vm, 16),
        other => return Err(VmError::RepOnNonString(other)),
    }
    Ok(())
}

/// Drives a `REP`/`REPNE`-wrapped string primitive to completion in one
/// executor call. `Mnemonic::Rep` doubles as `REPE` for the compare
/// primitives (`CMPS`/`SCAS`); the decoder never produces a distinct `REPE`
/// mnemonic since the encoding (`0xF3`) is shared.
pub fn execute_rep(vm: &mut Vm, rep_mnemonic: Mnemonic, inner: &Opcode) -> Result<(), VmError> {
    if !is_string_primitive(inner.mnemonic) {
        return Err(VmError::RepOnNonString(inner.mnemonic));
    }
    let is_compare = matches!(inner.mnemonic, Mnemonic::Cmpsb | Mnemonic::Cmpsw | Mnemonic::Scasb | Mnemonic::Scasw);
    loop {
        if vm.reg16(Reg16::Cx) == 0 {
            break;
        }
        execute_primitive(vm, inner.mnemonic, inner.seg_override)?;
        let cx = vm.reg16(Reg16::Cx).wrapping_sub(1);
        vm.set_reg16(Reg16::Cx, cx);
        if cx == 0 {
            break;
        }
        if is_compare {
            let zf = vm.flag(Flag::Zf);
            match rep_mnemonic {
                Mnemonic::Rep if !zf => break,
                Mnemonic::Repne if zf => break,
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8086_asm::Reg16;

    #[test]
    fn movsb_copies_one_byte_and_advances_both_pointers() {
        let mut vm = Vm::new();
        vm.set_seg(SegReg::Ds, 0);
        vm.set_seg(SegReg::Es, 0);
        vm.set_reg16(Reg16::Si, 0x10);
        vm.set_reg16(Reg16::Di, 0x20);
        vm.mem_write8(SegReg::Ds, 0x10, 0xAB);
        movs(&mut vm, 8, None);
        assert_eq!(vm.mem_read8(SegReg::Es, 0x20), 0xAB);
        assert_eq!(vm.reg16(Reg16::Si), 0x11);
        assert_eq!(vm.reg16(Reg16::Di), 0x21);
    }

    #[test]
    fn direction_flag_reverses_the_step() {
        let mut vm = Vm::new();
        vm.set_flag(Flag::Df, true);
        vm.set_reg16(Reg16::Di, 0x20);
        stos(&mut vm, 16);
        assert_eq!(vm.reg16(Reg16::Di), 0x1e);
    }

    #[test]
    fn rep_stosb_fills_count_bytes_and_exhausts_cx() {
        let mut vm = Vm::new();
        vm.set_seg(SegReg::Es, 0);
        vm.set_reg16(Reg16::Di, 0x300);
        vm.set_reg16(Reg16::Cx, 4);
        vm.set_reg8(Reg8::Al, 0x7a);
        let inner = Opcode::decode(&[0xAA], 0);
        execute_rep(&mut vm, Mnemonic::Rep, &inner).unwrap();
        assert_eq!(vm.reg16(Reg16::Cx), 0);
        for i in 0..4u16 {
            assert_eq!(vm.mem_read8(SegReg::Es, 0x300 + i), 0x7a);
        }
    }

    #[test]
    fn rep_on_non_string_instruction_is_an_error() {
        let mut vm = Vm::new();
        let inner = Opcode::decode(&[0x90], 0); // NOP
        assert!(matches!(execute_rep(&mut vm, Mnemonic::Rep, &inner), Err(VmError::RepOnNonString(_))));
    }
}
