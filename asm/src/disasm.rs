//! Renders a decoded [`Opcode`] as NASM-flavored assembly text.
//!
//! Three operand-formatting shapes cover the whole mnemonic set: most
//! instructions show a `byte`/`word` size prefix when the destination is
//! memory and the source is ambiguous (an immediate, a shift count, or
//! nothing); branches resolve an immediate displacement to an absolute
//! guest address; everything else falls back to a plain `mnemonic op1,op2`.

use crate::mnemonic::Mnemonic;
use crate::opcode::Opcode;
use crate::operand::Operand;

fn is_memory(op: &Option<Operand>) -> bool {
    matches!(op, Some(Operand::Mem(_)))
}

fn is_immediate(op: &Option<Operand>) -> bool {
    matches!(op, Some(Operand::Imm(_)))
}

fn is_counter(op: &Option<Operand>) -> bool {
    matches!(op, Some(Operand::Counter(_)))
}

/// Whether this CALL/JMP target needs a `short`/`word` size hint. Relative
/// immediates and near memory targets are ambiguous without one; far
/// pointers (`seg:off`) and indirect-far memory (`far [...]`) already say
/// their own size via the `far`/`seg:off` text, so they are excluded.
fn is_sized_address(op: &Option<Operand>) -> bool {
    matches!(op, Some(Operand::Mem(_)) | Some(Operand::Imm(_)))
}

/// `add`/`mov`/`inc`/shift family/etc: a `byte `/`word ` prefix appears on a
/// memory destination whenever the other operand doesn't already say which
/// width is meant (an immediate, a shift count, or a one-operand form).
fn disasm_mem_reg_imm_with_prefix(op: &Opcode) -> String {
    let mut asm = op.mnemonic.to_string();
    let mut pfx1 = "";
    let mut pfx2 = "";
    if is_memory(&op.opr1) && (is_immediate(&op.opr2) || is_counter(&op.opr2) || op.opr2.is_none()) {
        match op.opr1.as_ref().unwrap().width() {
            8 => pfx1 = "byte ",
            16 => {
                pfx1 = "word ";
                if op.opr2.as_ref().is_some_and(|o| o.width() == 8) {
                    pfx2 = "byte ";
                }
            }
            _ => unreachable!(),
        }
    }
    if let Some(opr1) = &op.opr1 {
        asm.push(' ');
        asm.push_str(pfx1);
        asm.push_str(&opr1.disasm());
    }
    if let Some(opr2) = &op.opr2 {
        asm.push(',');
        asm.push_str(pfx2);
        asm.push_str(&opr2.disasm());
    }
    if let Some(seg) = op.seg_override {
        if !is_memory(&op.opr1) && !is_memory(&op.opr2) {
            asm = format!("{seg} {asm}");
        }
    }
    asm
}

/// `call`/`jmp`: a relative immediate resolves to an absolute address; a
/// register/memory/far-pointer target is shown with a `short `/`word ` size
/// hint and rendered as-is.
fn disasm_address_with_prefix(op: &Opcode) -> String {
    let mut asm = op.mnemonic.to_string();
    let opr1 = op.opr1.as_ref().expect("call/jmp always carry a target operand");
    let pfx = if is_sized_address(&op.opr1) {
        match opr1.width() {
            8 => "short ",
            16 => "word ",
            _ => unreachable!(),
        }
    } else {
        ""
    };
    if let Operand::Imm(imm) = opr1 {
        let real_address = op.guest_address.wrapping_add(op.raw_bytes.len() as u16).wrapping_add(imm.value);
        asm.push(' ');
        asm.push_str(pfx);
        asm.push_str(&format!("{real_address:#x}"));
    } else {
        asm.push(' ');
        asm.push_str(pfx);
        asm.push_str(&opr1.disasm());
    }
    asm
}

/// The conditional jumps, `loop`/`loope`/`loopne`, and `jcxz`: always a
/// relative 8-bit displacement, resolved to an absolute address.
fn disasm_address(op: &Opcode) -> String {
    let Some(Operand::Imm(imm)) = &op.opr1 else {
        unreachable!("short-branch mnemonics always decode an immediate displacement")
    };
    let real_address = op.guest_address.wrapping_add(op.raw_bytes.len() as u16).wrapping_add(imm.value);
    format!("{} {:#x}", op.mnemonic, real_address)
}

fn disasm_db(op: &Opcode) -> String {
    format!("db {:#04x}", op.raw_bytes[0])
}

/// Everything else: `mnemonic [seg ]op1[,op2]`, no size inference.
fn disasm_default(op: &Opcode) -> String {
    let mut asm = op.mnemonic.to_string();
    if let Some(seg) = op.seg_override {
        asm = format!("{seg} {asm}");
    }
    if let Some(opr1) = &op.opr1 {
        asm.push(' ');
        asm.push_str(&opr1.disasm());
    }
    if let Some(opr2) = &op.opr2 {
        asm.push(',');
        asm.push_str(&opr2.disasm());
    }
    asm
}

pub(crate) fn disasm(op: &Opcode) -> String {
    if let Some(following) = &op.following {
        return format!("{} {}", op.mnemonic, following.disasm());
    }
    use Mnemonic::*;
    match op.mnemonic {
        Add | Adc | Sub | Sbb | Cmp | And | Or | Xor | Inc | Dec | Push | Pop | Mov | Xchg | Test | Not | Neg | Mul | Imul | Div
        | Idiv | Shl | Shr | Sar | Rol | Ror | Rcl | Rcr => disasm_mem_reg_imm_with_prefix(op),
        Call | Jmp => disasm_address_with_prefix(op),
        Jz | Jl | Jng | Jc | Jna | Jpe | Jo | Js | Jnz | Jnl | Jg | Jnc | Ja | Jpo | Jno | Jns | Loop | Loope | Loopne | Jcxz => {
            disasm_address(op)
        }
        Db => disasm_db(op),
        _ => disasm_default(op),
    }
}

#[cfg(test)]
mod tests {
    use crate::opcode::Opcode;

    #[test]
    fn mov_reg_reg() {
        let op = Opcode::decode(&[0x89, 0xd8], 0);
        assert_eq!(op.disasm(), "mov ax,bx");
    }

    #[test]
    fn mov_mem_imm_gets_word_prefix() {
        // C7 /0, mod=00 rm=110 (direct address), imm16
        let op = Opcode::decode(&[0xC7, 0x06, 0x00, 0x01, 0x05, 0x00], 0);
        assert_eq!(op.disasm(), "mov word [0x100],0x5");
    }

    #[test]
    fn mov_mem8_imm_gets_byte_prefix() {
        let op = Opcode::decode(&[0xC6, 0x06, 0x00, 0x01, 0x05], 0);
        assert_eq!(op.disasm(), "mov byte [0x100],0x5");
    }

    #[test]
    fn short_jump_resolves_to_absolute_address() {
        // EB 0x02 at address 0x100: target = 0x100 + 2 + 2 = 0x104
        let op = Opcode::decode(&[0xEB, 0x02], 0x100);
        assert_eq!(op.disasm(), "jmp short 0x104");
    }

    #[test]
    fn conditional_branch_resolves_to_absolute_address() {
        // 75 FE is a 2-byte self-loop: 0x100 + 2 + (-2) wraps back to 0x100.
        let op = Opcode::decode(&[0x75, 0xFE], 0x100);
        assert_eq!(op.disasm(), "jnz 0x100");
    }

    #[test]
    fn db_renders_as_hex_byte() {
        let op = Opcode::decode(&[0x0F, 0x00], 0);
        assert_eq!(op.disasm(), "db 0x0f");
    }

    #[test]
    fn segment_override_prefixes_non_memory_instruction() {
        let op = Opcode::decode(&[0x26, 0x90], 0);
        assert_eq!(op.disasm(), "es nop");
    }

    #[test]
    fn rep_movsb_disasm() {
        let op = Opcode::decode(&[0xF3, 0xA4], 0);
        assert_eq!(op.disasm(), "rep movsb");
    }

    #[test]
    fn indirect_far_jump_is_not_double_sized() {
        // FF /5, mod=00 rm=111 (bx): far jmp through [bx]. The "far" in the
        // operand's own text already conveys size; no "word " prefix too.
        let op = Opcode::decode(&[0xFF, 0x2F], 0);
        assert_eq!(op.disasm(), "jmp far [bx]");
    }

    #[test]
    fn near_indirect_call_through_memory_gets_word_prefix() {
        // FF /2, mod=00 rm=111 (bx): near call through [bx].
        let op = Opcode::decode(&[0xFF, 0x17], 0);
        assert_eq!(op.disasm(), "call word [bx]");
    }
}
