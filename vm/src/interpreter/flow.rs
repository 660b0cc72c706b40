//! Control transfer: conditional jumps, `CALL`/`JMP`/`RET`/`RETF`, and the
//! `LOOP` family. All relative targets are computed against `vm.ip` *after*
//! [`crate::vm::Vm::step`] has already advanced it past the instruction —
//! exactly the address NASM-style disassembly resolves a short/near jump
//! against.

use i8086_asm::{Flag, Machine, Mnemonic, Operand, Reg16, SegReg};

use crate::vm::Vm;

/// True for every `Jxx` mnemonic that branches on FLAGS rather than
/// unconditionally (`JMP`) or on CX (`JCXZ`, handled alongside them here).
pub fn condition_met(mnemonic: Mnemonic, vm: &Vm) -> bool {
    use Mnemonic::*;
    match mnemonic {
        Jo => vm.flag(Flag::Of),
        Jno => !vm.flag(Flag::Of),
        Jc => vm.flag(Flag::Cf),
        Jnc => !vm.flag(Flag::Cf),
        Jz => vm.flag(Flag::Zf),
        Jnz => !vm.flag(Flag::Zf),
        Jna => vm.flag(Flag::Cf) || vm.flag(Flag::Zf),
        Ja => !vm.flag(Flag::Cf) && !vm.flag(Flag::Zf),
        Js => vm.flag(Flag::Sf),
        Jns => !vm.flag(Flag::Sf),
        Jpe => vm.flag(Flag::Pf),
        Jpo => !vm.flag(Flag::Pf),
        Jl => vm.flag(Flag::Sf) != vm.flag(Flag::Of),
        Jnl => vm.flag(Flag::Sf) == vm.flag(Flag::Of),
        Jng => vm.flag(Flag::Zf) || (vm.flag(Flag::Sf) != vm.flag(Flag::Of)),
        Jg => !vm.flag(Flag::Zf) && (vm.flag(Flag::Sf) == vm.flag(Flag::Of)),
        Jcxz => vm.reg16(Reg16::Cx) == 0,
        _ => unreachable!("condition_met called on a non-branching mnemonic"),
    }
}

fn displacement(opr1: &Option<Operand>) -> u16 {
    match opr1 {
        Some(Operand::Imm(imm)) => imm.value,
        _ => unreachable!("conditional/short jumps always carry an immediate displacement"),
    }
}

/// Applies a relative branch: `vm.ip += disp`, wrapping within the 16-bit
/// offset space.
pub fn take_relative(vm: &mut Vm, opr1: &Option<Operand>) {
    vm.ip = vm.ip.wrapping_add(displacement(opr1));
}

pub fn jmp(vm: &mut Vm, opr1: &Option<Operand>) {
    match opr1 {
        Some(Operand::Imm(_)) => take_relative(vm, opr1),
        Some(Operand::DirectFar(far)) => {
            vm.set_seg(SegReg::Cs, far.segment);
            vm.ip = far.offset;
        }
        Some(Operand::IndirectFar(indirect)) => {
            let seg = indirect.memory.segment();
            let ea = indirect.memory.effective_address(vm);
            let offset = vm.mem_read16(seg, ea);
            let segment = vm.mem_read16(seg, ea.wrapping_add(2));
            vm.set_seg(SegReg::Cs, segment);
            vm.ip = offset;
        }
        Some(other) => vm.ip = other.read(vm),
        None => unreachable!("jmp always carries a target operand"),
    }
}

pub fn call(vm: &mut Vm, opr1: &Option<Operand>) {
    match opr1 {
        Some(Operand::Imm(_)) => {
            vm.push(vm.ip);
            take_relative(vm, opr1);
        }
        Some(Operand::DirectFar(far)) => {
            vm.push(vm.seg(SegReg::Cs));
            vm.push(vm.ip);
            vm.set_seg(SegReg::Cs, far.segment);
            vm.ip = far.offset;
        }
        Some(Operand::IndirectFar(indirect)) => {
            let seg = indirect.memory.segment();
            let ea = indirect.memory.effective_address(vm);
            let offset = vm.mem_read16(seg, ea);
            let segment = vm.mem_read16(seg, ea.wrapping_add(2));
            vm.push(vm.seg(SegReg::Cs));
            vm.push(vm.ip);
            vm.set_seg(SegReg::Cs, segment);
            vm.ip = offset;
        }
        Some(other) => {
            let target = other.read(vm);
            vm.push(vm.ip);
            vm.ip = target;
        }
        None => unreachable!("call always carries a target operand"),
    }
}

fn adjust_sp(vm: &mut Vm, opr1: &Option<Operand>) {
    if let Some(Operand::Imm(imm)) = opr1 {
        let sp = vm.reg16(Reg16::Sp).wrapping_add(imm.value);
        vm.set_reg16(Reg16::Sp, sp);
    }
}

pub fn ret(vm: &mut Vm, opr1: &Option<Operand>) {
    vm.ip = vm.pop();
    adjust_sp(vm, opr1);
}

pub fn retf(vm: &mut Vm, opr1: &Option<Operand>) {
    vm.ip = vm.pop();
    let cs = vm.pop();
    vm.set_seg(SegReg::Cs, cs);
    adjust_sp(vm, opr1);
}

/// `LOOP`/`LOOPE`/`LOOPNE`: decrement CX, then branch per the mnemonic's own
/// termination condition. `JCXZ` does not belong here — it never touches CX.
pub fn loop_op(vm: &mut Vm, mnemonic: Mnemonic, opr1: &Option<Operand>) {
    let cx = vm.reg16(Reg16::Cx).wrapping_sub(1);
    vm.set_reg16(Reg16::Cx, cx);
    let taken = match mnemonic {
        Mnemonic::Loop => cx != 0,
        Mnemonic::Loope => cx != 0 && vm.flag(Flag::Zf),
        Mnemonic::Loopne => cx != 0 && !vm.flag(Flag::Zf),
        _ => unreachable!("loop_op called on a non-loop mnemonic"),
    };
    if taken {
        take_relative(vm, opr1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8086_asm::{Immediate, Operand};

    fn imm(value: u16) -> Option<Operand> {
        Some(Operand::Imm(Immediate::new(value, true, 8)))
    }

    #[test]
    fn relative_jump_wraps_around_the_offset_space() {
        let mut vm = Vm::new();
        vm.ip = 0x10;
        take_relative(&mut vm, &imm(0xfffe)); // -2
        assert_eq!(vm.ip, 0x0e);
    }

    #[test]
    fn call_pushes_return_address_and_branches() {
        let mut vm = Vm::new();
        vm.set_reg16(Reg16::Sp, 0x100);
        vm.ip = 0x50;
        call(&mut vm, &imm(0x0010));
        assert_eq!(vm.ip, 0x60);
        assert_eq!(vm.pop(), 0x50);
    }

    #[test]
    fn loop_stops_when_cx_reaches_zero() {
        let mut vm = Vm::new();
        vm.set_reg16(Reg16::Cx, 1);
        vm.ip = 0x10;
        loop_op(&mut vm, Mnemonic::Loop, &imm(0xfffe));
        assert_eq!(vm.reg16(Reg16::Cx), 0);
        assert_eq!(vm.ip, 0x10); // not taken, CX hit zero
    }
}
