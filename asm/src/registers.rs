//! The named register set. Variants carry no state; they are keys into a
//! [`Machine`](crate::machine::Machine) implementation.

use std::fmt;

/// One of the eight 8-bit register halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg8 {
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
}

impl Reg8 {
    /// Decodes the 3-bit `reg`/`rm` field of a ModR/M byte for an 8-bit operand.
    pub const fn from_field(field: u8) -> Self {
        match field & 0x7 {
            0 => Reg8::Al,
            1 => Reg8::Cl,
            2 => Reg8::Dl,
            3 => Reg8::Bl,
            4 => Reg8::Ah,
            5 => Reg8::Ch,
            6 => Reg8::Dh,
            7 => Reg8::Bh,
            _ => unreachable!(),
        }
    }

    /// The parent 16-bit register this half is carved out of.
    pub const fn parent(self) -> Reg16 {
        match self {
            Reg8::Al | Reg8::Ah => Reg16::Ax,
            Reg8::Cl | Reg8::Ch => Reg16::Cx,
            Reg8::Dl | Reg8::Dh => Reg16::Dx,
            Reg8::Bl | Reg8::Bh => Reg16::Bx,
        }
    }

    /// Whether this half occupies the high byte of its parent.
    pub const fn is_high(self) -> bool {
        matches!(self, Reg8::Ah | Reg8::Ch | Reg8::Dh | Reg8::Bh)
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reg8::Al => "al",
            Reg8::Cl => "cl",
            Reg8::Dl => "dl",
            Reg8::Bl => "bl",
            Reg8::Ah => "ah",
            Reg8::Ch => "ch",
            Reg8::Dh => "dh",
            Reg8::Bh => "bh",
        };
        f.write_str(s)
    }
}

/// One of the eight 16-bit general registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg16 {
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
}

impl Reg16 {
    /// Decodes the 3-bit `reg`/`rm` field of a ModR/M byte for a 16-bit operand.
    pub const fn from_field(field: u8) -> Self {
        match field & 0x7 {
            0 => Reg16::Ax,
            1 => Reg16::Cx,
            2 => Reg16::Dx,
            3 => Reg16::Bx,
            4 => Reg16::Sp,
            5 => Reg16::Bp,
            6 => Reg16::Si,
            7 => Reg16::Di,
            _ => unreachable!(),
        }
    }
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reg16::Ax => "ax",
            Reg16::Cx => "cx",
            Reg16::Dx => "dx",
            Reg16::Bx => "bx",
            Reg16::Sp => "sp",
            Reg16::Bp => "bp",
            Reg16::Si => "si",
            Reg16::Di => "di",
        };
        f.write_str(s)
    }
}

/// One of the four segment registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegReg {
    Es,
    Cs,
    Ss,
    Ds,
}

impl SegReg {
    /// Decodes the 2-bit segment-register field used by `MOV sreg, r/m` and
    /// the push/pop-segment opcodes (`SReg00..SReg11` in the field order
    /// ES, CS, SS, DS).
    pub const fn from_field(field: u8) -> Self {
        match field & 0x3 {
            0 => SegReg::Es,
            1 => SegReg::Cs,
            2 => SegReg::Ss,
            3 => SegReg::Ds,
            _ => unreachable!(),
        }
    }
}

impl fmt::Display for SegReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegReg::Es => "es",
            SegReg::Cs => "cs",
            SegReg::Ss => "ss",
            SegReg::Ds => "ds",
        };
        f.write_str(s)
    }
}

/// The nine addressing-mode bases a Memory operand's `r/m` field can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemBase {
    Direct,
    BxSi,
    BxDi,
    BpSi,
    BpDi,
    Si,
    Di,
    Bp,
    Bx,
}

impl MemBase {
    /// Maps a ModR/M `r/m` field (0..=7) to its addressing base, per the
    /// standard 8086 table. `mod=00, rm=110` is handled by the caller as
    /// [`MemBase::Direct`] rather than through this mapping.
    pub const fn from_rm(rm: u8) -> Self {
        match rm & 0x7 {
            0 => MemBase::BxSi,
            1 => MemBase::BxDi,
            2 => MemBase::BpSi,
            3 => MemBase::BpDi,
            4 => MemBase::Si,
            5 => MemBase::Di,
            6 => MemBase::Bp,
            7 => MemBase::Bx,
            _ => unreachable!(),
        }
    }

    /// The component registers summed to compute the effective address.
    /// Empty for [`MemBase::Direct`], which is disp-only.
    pub const fn components(self) -> &'static [Reg16] {
        match self {
            MemBase::Direct => &[],
            MemBase::BxSi => &[Reg16::Bx, Reg16::Si],
            MemBase::BxDi => &[Reg16::Bx, Reg16::Di],
            MemBase::BpSi => &[Reg16::Bp, Reg16::Si],
            MemBase::BpDi => &[Reg16::Bp, Reg16::Di],
            MemBase::Si => &[Reg16::Si],
            MemBase::Di => &[Reg16::Di],
            MemBase::Bp => &[Reg16::Bp],
            MemBase::Bx => &[Reg16::Bx],
        }
    }

    /// The default segment for this base: SS when BP participates, else DS.
    pub const fn default_segment(self) -> SegReg {
        match self {
            MemBase::BpSi | MemBase::BpDi | MemBase::Bp => SegReg::Ss,
            _ => SegReg::Ds,
        }
    }
}
