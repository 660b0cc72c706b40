//! The per-mnemonic semantic functions: the big dispatch [`execute`] fetches
//! operands through the `asm` crate's [`Operand`] model and updates
//! registers, memory and FLAGS through [`Machine`].

use i8086_asm::{Flag, Machine, Mnemonic, Opcode, Operand, Reg16, Reg8, SegReg};

use crate::error::VmError;
use crate::flags::Flags;
use crate::interpreter::alu::{self, AluResult};
use crate::interpreter::shifts::{self, RotateOutcome, ShiftResult};
use crate::interpreter::{mul_div, strings};
use crate::state::ExecuteState;
use crate::vm::Vm;

fn apply_arith_flags(vm: &mut Vm, r: AluResult, width: u8) {
    vm.set_flag(Flag::Cf, r.cf);
    vm.set_flag(Flag::Of, r.of);
    vm.set_flag(Flag::Af, r.af);
    vm.set_flag(Flag::Zf, alu::zero(r.value, width));
    vm.set_flag(Flag::Sf, alu::sign(r.value, width));
    vm.set_flag(Flag::Pf, alu::parity_even(r.value));
}

/// `AND`/`OR`/`XOR`/`TEST`/`AAM`/`AAD`: clears `CF`/`OF`, sets `ZF`/`SF`/`PF`
/// from the result, and leaves `AF` untouched — the 8086 does not define it
/// for these.
fn apply_logic_flags(vm: &mut Vm, value: u16, width: u8) {
    vm.set_flag(Flag::Cf, false);
    vm.set_flag(Flag::Of, false);
    vm.set_flag(Flag::Zf, alu::zero(value, width));
    vm.set_flag(Flag::Sf, alu::sign(value, width));
    vm.set_flag(Flag::Pf, alu::parity_even(value));
}

fn apply_shift_flags(vm: &mut Vm, r: ShiftResult, width: u8) {
    vm.set_flag(Flag::Cf, r.cf);
    if let Some(of) = r.of {
        vm.set_flag(Flag::Of, of);
    }
    vm.set_flag(Flag::Zf, alu::zero(r.value, width));
    vm.set_flag(Flag::Sf, alu::sign(r.value, width));
    vm.set_flag(Flag::Pf, alu::parity_even(r.value));
}

fn apply_rotate_flags(vm: &mut Vm, r: ShiftResult) {
    vm.set_flag(Flag::Cf, r.cf);
    if let Some(of) = r.of {
        vm.set_flag(Flag::Of, of);
    }
}

fn load_far_pointer(vm: &mut Vm, dest: &Operand, src: &Operand, target_seg: SegReg) {
    let Operand::Mem(mem) = src else { unreachable!("LDS/LES always decode a memory r/m operand") };
    let seg = mem.segment();
    let ea = mem.effective_address(vm);
    let offset = vm.mem_read16(seg, ea);
    let segment = vm.mem_read16(seg, ea.wrapping_add(2));
    dest.write(vm, offset);
    vm.set_seg(target_seg, segment);
}

fn dispatch_syscall(vm: &mut Vm) -> Result<(), VmError> {
    let mut handler = vm.syscall_handler.take().ok_or(VmError::UnsupportedInterrupt(0x20))?;
    handler.handle(vm);
    vm.syscall_handler = Some(handler);
    Ok(())
}

fn operands(opcode: &Opcode) -> (&Operand, &Operand) {
    (
        opcode.opr1.as_ref().expect("this mnemonic always decodes two operands"),
        opcode.opr2.as_ref().expect("this mnemonic always decodes two operands"),
    )
}

fn operand1(opcode: &Opcode) -> &Operand {
    opcode.opr1.as_ref().expect("this mnemonic always decodes one operand")
}

/// Executes a single decoded instruction against `vm`. `REP`/`REPNE`/`LOCK`/
/// `WAIT` are unwrapped before reaching the main dispatch: the first two
/// drive [`strings::execute_rep`] to completion, the latter two have no
/// observable effect in a single-core, FPU-less emulator and simply execute
/// the instruction they wrap.
pub fn execute(vm: &mut Vm, opcode: &Opcode) -> Result<ExecuteState, VmError> {
    if let Some(inner) = &opcode.following {
        return match opcode.mnemonic {
            Mnemonic::Rep | Mnemonic::Repne => {
                strings::execute_rep(vm, opcode.mnemonic, inner)?;
                Ok(ExecuteState::Proceed)
            }
            Mnemonic::Lock | Mnemonic::Wait => execute(vm, inner),
            _ => unreachable!("only prefix mnemonics carry a following opcode"),
        };
    }

    use Mnemonic::*;
    match opcode.mnemonic {
        Mov => {
            let (dest, src) = operands(opcode);
            let value = src.read(vm);
            dest.write(vm, value);
        }
        Xchg => {
            let (a, b) = operands(opcode);
            let va = a.read(vm);
            let vb = b.read(vm);
            a.write(vm, vb);
            b.write(vm, va);
        }
        Lea => {
            let (dest, src) = operands(opcode);
            let Operand::Mem(mem) = src else { unreachable!("LEA always decodes a memory r/m operand") };
            let ea = mem.effective_address(vm);
            dest.write(vm, ea);
        }
        Lds => {
            let (dest, src) = operands(opcode);
            load_far_pointer(vm, dest, src, SegReg::Ds);
        }
        Les => {
            let (dest, src) = operands(opcode);
            load_far_pointer(vm, dest, src, SegReg::Es);
        }
        // No I/O ports are modeled; IN always reads 0, OUT is a no-op.
        In => {
            let (dest, _port) = operands(opcode);
            dest.write(vm, 0);
        }
        Out => {
            let _ = operands(opcode);
        }
        Push => {
            let value = operand1(opcode).read(vm);
            vm.push(value);
        }
        Pop => {
            let value = vm.pop();
            operand1(opcode).write(vm, value);
        }
        Pushf => vm.push(vm.flags.0),
        Popf => {
            let value = vm.pop();
            vm.flags = Flags(value);
        }
        Lahf => {
            let ah = (vm.flags.0 & 0x00ff) as u8;
            vm.set_reg8(Reg8::Ah, ah);
        }
        Sahf => {
            let ah = vm.reg8(Reg8::Ah);
            vm.flags = Flags((vm.flags.0 & 0xff00) | ah as u16);
        }
        Xlat => {
            let seg = opcode.seg_override.unwrap_or(SegReg::Ds);
            let bx = vm.reg16(Reg16::Bx);
            let al = vm.reg8(Reg8::Al);
            let value = vm.mem_read8(seg, bx.wrapping_add(al as u16));
            vm.set_reg8(Reg8::Al, value);
        }

        Add => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let r = alu::add(dest.read(vm), src.read(vm), width);
            dest.write(vm, r.value);
            apply_arith_flags(vm, r, width);
        }
        Adc => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let cin = vm.flag(Flag::Cf);
            let r = alu::adc(dest.read(vm), src.read(vm), cin, width);
            dest.write(vm, r.value);
            apply_arith_flags(vm, r, width);
        }
        Sub => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let r = alu::sub(dest.read(vm), src.read(vm), width);
            dest.write(vm, r.value);
            apply_arith_flags(vm, r, width);
        }
        Sbb => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let cin = vm.flag(Flag::Cf);
            let r = alu::sbb(dest.read(vm), src.read(vm), cin, width);
            dest.write(vm, r.value);
            apply_arith_flags(vm, r, width);
        }
        Cmp => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let r = alu::sub(dest.read(vm), src.read(vm), width);
            apply_arith_flags(vm, r, width);
        }
        And => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let value = dest.read(vm) & src.read(vm);
            dest.write(vm, value);
            apply_logic_flags(vm, value, width);
        }
        Or => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let value = dest.read(vm) | src.read(vm);
            dest.write(vm, value);
            apply_logic_flags(vm, value, width);
        }
        Xor => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let value = dest.read(vm) ^ src.read(vm);
            dest.write(vm, value);
            apply_logic_flags(vm, value, width);
        }
        Test => {
            let (dest, src) = operands(opcode);
            let width = dest.width();
            let value = dest.read(vm) & src.read(vm);
            apply_logic_flags(vm, value, width);
        }
        Not => {
            let dest = operand1(opcode);
            let width = dest.width();
            let mask = if width == 8 { 0x00ff } else { 0xffff };
            let value = !dest.read(vm) & mask;
            dest.write(vm, value);
        }
        Neg => {
            let dest = operand1(opcode);
            let width = dest.width();
            let r = alu::neg(dest.read(vm), width);
            dest.write(vm, r.value);
            apply_arith_flags(vm, r, width);
        }
        Inc => {
            let dest = operand1(opcode);
            let width = dest.width();
            let prior_cf = vm.flag(Flag::Cf);
            let r = alu::inc(dest.read(vm), width);
            dest.write(vm, r.value);
            apply_arith_flags(vm, r, width);
            vm.set_flag(Flag::Cf, prior_cf);
        }
        Dec => {
            let dest = operand1(opcode);
            let width = dest.width();
            let prior_cf = vm.flag(Flag::Cf);
            let r = alu::dec(dest.read(vm), width);
            dest.write(vm, r.value);
            apply_arith_flags(vm, r, width);
            vm.set_flag(Flag::Cf, prior_cf);
        }
        Mul => {
            let src = operand1(opcode);
            let width = src.width();
            let cf = if width == 8 {
                let al = vm.reg8(Reg8::Al);
                let (ax, cf) = mul_div::mul_u8(al, src.read(vm) as u8);
                vm.set_reg16(Reg16::Ax, ax);
                cf
            } else {
                let ax = vm.reg16(Reg16::Ax);
                let (dx, ax2, cf) = mul_div::mul_u16(ax, src.read(vm));
                vm.set_reg16(Reg16::Ax, ax2);
                vm.set_reg16(Reg16::Dx, dx);
                cf
            };
            vm.set_flag(Flag::Cf, cf);
            vm.set_flag(Flag::Of, cf);
        }
        Imul => {
            let src = operand1(opcode);
            let width = src.width();
            let cf = if width == 8 {
                let al = vm.reg8(Reg8::Al) as i8;
                let (ax, cf) = mul_div::imul_u8(al, src.read(vm) as u8 as i8);
                vm.set_reg16(Reg16::Ax, ax);
                cf
            } else {
                let ax = vm.reg16(Reg16::Ax) as i16;
                let (dx, ax2, cf) = mul_div::imul_u16(ax, src.read(vm) as i16);
                vm.set_reg16(Reg16::Ax, ax2);
                vm.set_reg16(Reg16::Dx, dx);
                cf
            };
            vm.set_flag(Flag::Cf, cf);
            vm.set_flag(Flag::Of, cf);
        }
        Div => {
            let src = operand1(opcode);
            let width = src.width();
            if width == 8 {
                let ax = vm.reg16(Reg16::Ax);
                let (q, r) = mul_div::div_u8(ax, src.read(vm) as u8)?;
                vm.set_reg8(Reg8::Al, q);
                vm.set_reg8(Reg8::Ah, r);
            } else {
                let dividend = ((vm.reg16(Reg16::Dx) as u32) << 16) | vm.reg16(Reg16::Ax) as u32;
                let (q, r) = mul_div::div_u16(dividend, src.read(vm))?;
                vm.set_reg16(Reg16::Ax, q);
                vm.set_reg16(Reg16::Dx, r);
            }
        }
        Idiv => {
            let src = operand1(opcode);
            let width = src.width();
            if width == 8 {
                let ax = vm.reg16(Reg16::Ax) as i16;
                let (q, r) = mul_div::idiv_u8(ax, src.read(vm) as u8 as i8)?;
                vm.set_reg8(Reg8::Al, q as u8);
                vm.set_reg8(Reg8::Ah, r as u8);
            } else {
                let dividend = (((vm.reg16(Reg16::Dx) as u32) << 16) | vm.reg16(Reg16::Ax) as u32) as i32;
                let (q, r) = mul_div::idiv_u16(dividend, src.read(vm) as i16)?;
                vm.set_reg16(Reg16::Ax, q as u16);
                vm.set_reg16(Reg16::Dx, r as u16);
            }
        }

        Shl | Shr | Sar | Rol | Ror => {
            let (dest, counter) = operands(opcode);
            let width = dest.width();
            let count = counter.read(vm);
            let value = dest.read(vm);
            let result = match opcode.mnemonic {
                Shl => shifts::shl(value, width, count),
                Shr => shifts::shr(value, width, count),
                Sar => shifts::sar(value, width, count),
                Rol => shifts::rol(value, width, count),
                Ror => shifts::ror(value, width, count),
                _ => unreachable!(),
            };
            if let Some(r) = result {
                dest.write(vm, r.value);
                match opcode.mnemonic {
                    Shl | Shr | Sar => apply_shift_flags(vm, r, width),
                    _ => apply_rotate_flags(vm, r),
                }
            }
        }
        Rcl | Rcr => {
            let (dest, counter) = operands(opcode);
            let width = dest.width();
            let count = counter.read(vm);
            let value = dest.read(vm);
            let carry_in = vm.flag(Flag::Cf);
            let outcome = if opcode.mnemonic == Rcl {
                shifts::rcl(value, width, count, carry_in)
            } else {
                shifts::rcr(value, width, count, carry_in)
            };
            match outcome {
                RotateOutcome::NoChange => {}
                RotateOutcome::Applied(r) => {
                    dest.write(vm, r.value);
                    apply_rotate_flags(vm, r);
                }
                RotateOutcome::UnsupportedCount => return Err(VmError::UnsupportedRotateCount(opcode.mnemonic)),
            }
        }

        Jo | Jno | Jc | Jnc | Jz | Jnz | Jna | Ja | Js | Jns | Jpe | Jpo | Jl | Jnl | Jng | Jg | Jcxz => {
            if super::flow::condition_met(opcode.mnemonic, vm) {
                super::flow::take_relative(vm, &opcode.opr1);
            }
        }
        Jmp => super::flow::jmp(vm, &opcode.opr1),
        Call => super::flow::call(vm, &opcode.opr1),
        Ret => super::flow::ret(vm, &opcode.opr1),
        Retf => super::flow::retf(vm, &opcode.opr1),
        Loop | Loope | Loopne => super::flow::loop_op(vm, opcode.mnemonic, &opcode.opr1),

        Int => {
            let Some(Operand::Imm(imm)) = &opcode.opr1 else { unreachable!("INT always decodes an imm8 vector") };
            let vector = imm.value as u8;
            if vector == 0x20 {
                dispatch_syscall(vm)?;
                if let Some(code) = vm.halt_code.take() {
                    return Ok(ExecuteState::Halt(code));
                }
            } else {
                return Err(VmError::UnsupportedInterrupt(vector));
            }
        }
        // No debugger or overflow-trap handler is wired up; these decode but
        // have no observable effect on a MINIX a.out guest.
        Int3 | Into => {}
        Iret => {
            vm.ip = vm.pop();
            let cs = vm.pop();
            vm.set_seg(SegReg::Cs, cs);
            let flags = vm.pop();
            vm.flags = Flags(flags);
        }

        Clc => vm.set_flag(Flag::Cf, false),
        Cmc => {
            let cf = vm.flag(Flag::Cf);
            vm.set_flag(Flag::Cf, !cf);
        }
        Stc => vm.set_flag(Flag::Cf, true),
        Cld => vm.set_flag(Flag::Df, false),
        Std => vm.set_flag(Flag::Df, true),
        Cli => vm.set_flag(Flag::If, false),
        Sti => vm.set_flag(Flag::If, true),

        Hlt => return Ok(ExecuteState::Halt(0)),
        Nop => {}

        Aam => {
            let al = vm.reg8(Reg8::Al);
            let (ah, al2) = mul_div::aam(al);
            vm.set_reg8(Reg8::Ah, ah);
            vm.set_reg8(Reg8::Al, al2);
            apply_logic_flags(vm, al2 as u16, 8);
        }
        Aad => {
            let ah = vm.reg8(Reg8::Ah);
            let al = vm.reg8(Reg8::Al);
            let result = mul_div::aad(ah, al);
            vm.set_reg8(Reg8::Al, result);
            vm.set_reg8(Reg8::Ah, 0);
            apply_logic_flags(vm, result as u16, 8);
        }
        Aaa => {
            let ax = vm.reg16(Reg16::Ax);
            let af_in = vm.flag(Flag::Af);
            let (new_ax, flag) = mul_div::aaa(ax, af_in);
            vm.set_reg16(Reg16::Ax, new_ax);
            vm.set_flag(Flag::Af, flag);
            vm.set_flag(Flag::Cf, flag);
        }
        Aas => {
            let ax = vm.reg16(Reg16::Ax);
            let af_in = vm.flag(Flag::Af);
            let (new_ax, flag) = mul_div::aas(ax, af_in);
            vm.set_reg16(Reg16::Ax, new_ax);
            vm.set_flag(Flag::Af, flag);
            vm.set_flag(Flag::Cf, flag);
        }
        Daa => {
            let al = vm.reg8(Reg8::Al);
            let (new_al, af, cf) = mul_div::daa(al, vm.flag(Flag::Af), vm.flag(Flag::Cf));
            vm.set_reg8(Reg8::Al, new_al);
            vm.set_flag(Flag::Af, af);
            vm.set_flag(Flag::Cf, cf);
            vm.set_flag(Flag::Zf, alu::zero(new_al as u16, 8));
            vm.set_flag(Flag::Sf, alu::sign(new_al as u16, 8));
            vm.set_flag(Flag::Pf, alu::parity_even(new_al as u16));
        }
        Das => {
            let al = vm.reg8(Reg8::Al);
            let (new_al, af, cf) = mul_div::das(al, vm.flag(Flag::Af), vm.flag(Flag::Cf));
            vm.set_reg8(Reg8::Al, new_al);
            vm.set_flag(Flag::Af, af);
            vm.set_flag(Flag::Cf, cf);
            vm.set_flag(Flag::Zf, alu::zero(new_al as u16, 8));
            vm.set_flag(Flag::Sf, alu::sign(new_al as u16, 8));
            vm.set_flag(Flag::Pf, alu::parity_even(new_al as u16));
        }
        Cbw => {
            let al = vm.reg8(Reg8::Al);
            vm.set_reg16(Reg16::Ax, mul_div::cbw(al));
        }
        Cwd => {
            let ax = vm.reg16(Reg16::Ax);
            vm.set_reg16(Reg16::Dx, mul_div::cwd(ax));
        }

        Movsb | Movsw | Cmpsb | Cmpsw | Scasb | Scasw | Lodsb | Lodsw | Stosb | Stosw => {
            strings::execute_primitive(vm, opcode.mnemonic, opcode.seg_override)?;
        }

        Rep | Repne | Lock | Wait => unreachable!("prefix mnemonics are handled via `opcode.following` above"),

        Db => return Err(VmError::UnsupportedOpcode(Db)),
    }

    Ok(ExecuteState::Proceed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_updates_destination_and_flags() {
        let mut vm = Vm::new();
        vm.set_reg16(Reg16::Ax, 1);
        let op = Opcode::decode(&[0x83, 0xc0, 0xff], 0); // add ax, -1
        execute(&mut vm, &op).unwrap();
        assert_eq!(vm.reg16(Reg16::Ax), 0);
        assert!(vm.flag(Flag::Zf));
        assert!(vm.flag(Flag::Cf));
    }

    #[test]
    fn hlt_halts_with_code_zero() {
        let mut vm = Vm::new();
        let op = Opcode::decode(&[0xf4], 0);
        assert_eq!(execute(&mut vm, &op).unwrap(), ExecuteState::Halt(0));
    }

    #[test]
    fn div_by_zero_propagates_as_a_vm_error() {
        let mut vm = Vm::new();
        vm.set_reg16(Reg16::Ax, 10);
        vm.set_reg16(Reg16::Bx, 0);
        let op = Opcode::decode(&[0xf7, 0xf3], 0); // div bx
        assert!(matches!(execute(&mut vm, &op), Err(VmError::GuestDivideByZero)));
    }

    #[test]
    fn unmapped_byte_is_an_unsupported_opcode_error() {
        let mut vm = Vm::new();
        let op = Opcode::decode(&[0x0f, 0x00], 0);
        assert!(matches!(execute(&mut vm, &op), Err(VmError::UnsupportedOpcode(Mnemonic::Db))));
    }

    #[test]
    fn int_other_than_0x20_is_unsupported() {
        let mut vm = Vm::new();
        let op = Opcode::decode(&[0xcd, 0x21], 0);
        assert!(matches!(execute(&mut vm, &op), Err(VmError::UnsupportedInterrupt(0x21))));
    }
}
