//! The full mnemonic set the decoder can produce.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[allow(missing_docs)]
pub enum Mnemonic {
    Add,
    Adc,
    Sub,
    Sbb,
    Cmp,
    And,
    Or,
    Xor,
    Inc,
    Dec,
    Push,
    Pop,
    Mov,
    Xchg,
    In,
    Out,
    Lea,
    Lds,
    Les,
    Test,
    Not,
    Neg,
    Mul,
    Imul,
    Div,
    Idiv,
    Shl,
    Shr,
    Sar,
    Rol,
    Ror,
    Rcl,
    Rcr,
    Call,
    Jmp,
    Ret,
    Retf,
    Jz,
    Jl,
    Jng,
    Jc,
    Jna,
    Jpe,
    Jo,
    Js,
    Jnz,
    Jnl,
    Jg,
    Jnc,
    Ja,
    Jpo,
    Jno,
    Jns,
    Loop,
    Loope,
    Loopne,
    Jcxz,
    Int,
    Rep,
    Repne,
    Lock,
    Wait,
    Xlat,
    Lahf,
    Sahf,
    Pushf,
    Popf,
    Aam,
    Aad,
    Aaa,
    Daa,
    Aas,
    Das,
    Cbw,
    Cwd,
    Movsb,
    Movsw,
    Cmpsb,
    Cmpsw,
    Scasb,
    Scasw,
    Lodsb,
    Lodsw,
    Stosb,
    Stosw,
    Int3,
    Into,
    Iret,
    Clc,
    Cmc,
    Stc,
    Cld,
    Std,
    Cli,
    Sti,
    Hlt,
    Nop,
    /// Undecodable byte; disassembles as `db 0xXX`.
    Db,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mnemonic::Add => "add",
            Mnemonic::Adc => "adc",
            Mnemonic::Sub => "sub",
            Mnemonic::Sbb => "sbb",
            Mnemonic::Cmp => "cmp",
            Mnemonic::And => "and",
            Mnemonic::Or => "or",
            Mnemonic::Xor => "xor",
            Mnemonic::Inc => "inc",
            Mnemonic::Dec => "dec",
            Mnemonic::Push => "push",
            Mnemonic::Pop => "pop",
            Mnemonic::Mov => "mov",
            Mnemonic::Xchg => "xchg",
            Mnemonic::In => "in",
            Mnemonic::Out => "out",
            Mnemonic::Lea => "lea",
            Mnemonic::Lds => "lds",
            Mnemonic::Les => "les",
            Mnemonic::Test => "test",
            Mnemonic::Not => "not",
            Mnemonic::Neg => "neg",
            Mnemonic::Mul => "mul",
            Mnemonic::Imul => "imul",
            Mnemonic::Div => "div",
            Mnemonic::Idiv => "idiv",
            Mnemonic::Shl => "shl",
            Mnemonic::Shr => "shr",
            Mnemonic::Sar => "sar",
            Mnemonic::Rol => "rol",
            Mnemonic::Ror => "ror",
            Mnemonic::Rcl => "rcl",
            Mnemonic::Rcr => "rcr",
            Mnemonic::Call => "call",
            Mnemonic::Jmp => "jmp",
            Mnemonic::Ret => "ret",
            Mnemonic::Retf => "retf",
            Mnemonic::Jz => "jz",
            Mnemonic::Jl => "jl",
            Mnemonic::Jng => "jng",
            Mnemonic::Jc => "jc",
            Mnemonic::Jna => "jna",
            Mnemonic::Jpe => "jpe",
            Mnemonic::Jo => "jo",
            Mnemonic::Js => "js",
            Mnemonic::Jnz => "jnz",
            Mnemonic::Jnl => "jnl",
            Mnemonic::Jg => "jg",
            Mnemonic::Jnc => "jnc",
            Mnemonic::Ja => "ja",
            Mnemonic::Jpo => "jpo",
            Mnemonic::Jno => "jno",
            Mnemonic::Jns => "jns",
            Mnemonic::Loop => "loop",
            Mnemonic::Loope => "loope",
            Mnemonic::Loopne => "loopne",
            Mnemonic::Jcxz => "jcxz",
            Mnemonic::Int => "int",
            Mnemonic::Rep => "rep",
            Mnemonic::Repne => "repne",
            Mnemonic::Lock => "lock",
            Mnemonic::Wait => "wait",
            Mnemonic::Xlat => "xlatb",
            Mnemonic::Lahf => "lahf",
            Mnemonic::Sahf => "sahf",
            Mnemonic::Pushf => "pushfw",
            Mnemonic::Popf => "popfw",
            Mnemonic::Aam => "aam",
            Mnemonic::Aad => "aad",
            Mnemonic::Aaa => "aaa",
            Mnemonic::Daa => "daa",
            Mnemonic::Aas => "aas",
            Mnemonic::Das => "das",
            Mnemonic::Cbw => "cbw",
            Mnemonic::Cwd => "cwd",
            Mnemonic::Movsb => "movsb",
            Mnemonic::Movsw => "movsw",
            Mnemonic::Cmpsb => "cmpsb",
            Mnemonic::Cmpsw => "cmpsw",
            Mnemonic::Scasb => "scasb",
            Mnemonic::Scasw => "scasw",
            Mnemonic::Lodsb => "lodsb",
            Mnemonic::Lodsw => "lodsw",
            Mnemonic::Stosb => "stosb",
            Mnemonic::Stosw => "stosw",
            Mnemonic::Int3 => "int3",
            Mnemonic::Into => "into",
            Mnemonic::Iret => "iretw",
            Mnemonic::Clc => "clc",
            Mnemonic::Cmc => "cmc",
            Mnemonic::Stc => "stc",
            Mnemonic::Cld => "cld",
            Mnemonic::Std => "std",
            Mnemonic::Cli => "cli",
            Mnemonic::Sti => "sti",
            Mnemonic::Hlt => "hlt",
            Mnemonic::Nop => "nop",
            Mnemonic::Db => "db",
        };
        f.write_str(s)
    }
}

impl Mnemonic {
    /// Prefix mnemonics wrap a following instruction rather than standing on
    /// their own.
    pub const fn is_prefix(self) -> bool {
        matches!(self, Mnemonic::Rep | Mnemonic::Repne | Mnemonic::Lock | Mnemonic::Wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_mnemonic_displays_as_lowercase_ascii() {
        for mn in Mnemonic::iter() {
            let s = mn.to_string();
            assert!(!s.is_empty());
            assert_eq!(s, s.to_ascii_lowercase());
        }
    }
}
