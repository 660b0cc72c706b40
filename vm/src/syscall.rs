//! The INT 32 syscall bridge: the core only knows how to marshal/unmarshal
//! the 32-byte MINIX message block and hand control to a collaborator. What
//! the collaborator does with a `read`/`write`/`open`/... call — actually
//! touching a host file descriptor — is outside this crate's concern; see
//! [`SyscallHandler`].

use crate::consts::MESSAGE_SIZE;

/// MINIX syscall numbers, as carried in the message's `m_type` field. Not
/// exhaustive — only the calls a typical a.out binary exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
#[repr(i16)]
pub enum MinixSyscall {
    Exit = 1,
    Fork = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    Wait = 7,
    Creat = 8,
    Unlink = 10,
    Time = 13,
    Chmod = 15,
    Brk = 17,
    Stat = 18,
    Lseek = 19,
    Getpid = 20,
    Getuid = 24,
    Fstat = 28,
    Access = 33,
    Pipe = 42,
    Getgid = 47,
    Signal = 48,
    Ioctl = 54,
    Fcntl = 55,
    Exec = 59,
    Sigaction = 71,
}

impl MinixSyscall {
    /// Maps a raw `m_type` value to a known syscall number, if recognized.
    pub fn from_raw(n: i16) -> Option<Self> {
        use MinixSyscall::*;
        Some(match n {
            1 => Exit,
            2 => Fork,
            3 => Read,
            4 => Write,
            5 => Open,
            6 => Close,
            7 => Wait,
            8 => Creat,
            10 => Unlink,
            13 => Time,
            15 => Chmod,
            17 => Brk,
            18 => Stat,
            19 => Lseek,
            20 => Getpid,
            24 => Getuid,
            28 => Fstat,
            33 => Access,
            42 => Pipe,
            47 => Getgid,
            48 => Signal,
            54 => Ioctl,
            55 => Fcntl,
            59 => Exec,
            71 => Sigaction,
            _ => return None,
        })
    }
}

/// A read/write view over the 32-byte MINIX message, addressed by the fixed
/// field offsets the protocol defines. Backed by a borrowed slice rather than
/// owned storage: the message lives inside guest memory at `SS:BX`.
pub struct Message<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Message<'a> {
    /// `bytes` must be at least [`MESSAGE_SIZE`] long.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert!(bytes.len() >= MESSAGE_SIZE);
        Message { bytes }
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap())
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn m_source(&self) -> u16 {
        self.read_u16(0)
    }

    pub fn set_m_source(&mut self, v: u16) {
        self.write_u16(0, v)
    }

    pub fn m_type(&self) -> i16 {
        self.read_u16(2) as i16
    }

    pub fn set_m_type(&mut self, v: i16) {
        self.write_u16(2, v as u16)
    }

    pub fn m1_i1(&self) -> i16 {
        self.read_u16(4) as i16
    }
    pub fn m1_i2(&self) -> i16 {
        self.read_u16(6) as i16
    }
    pub fn m1_i3(&self) -> i16 {
        self.read_u16(8) as i16
    }
    pub fn m1_p1(&self) -> u16 {
        self.read_u16(10)
    }
    pub fn m1_p2(&self) -> u16 {
        self.read_u16(12)
    }
    pub fn m1_p3(&self) -> u16 {
        self.read_u16(14)
    }

    pub fn m2_l1(&self) -> u32 {
        self.read_u32(10)
    }
    pub fn m2_l2(&self) -> u32 {
        self.read_u32(14)
    }

    pub fn m3_i1(&self) -> i16 {
        self.read_u16(4) as i16
    }
    pub fn m3_i2(&self) -> i16 {
        self.read_u16(6) as i16
    }
    pub fn m3_p1(&self) -> u16 {
        self.read_u16(8)
    }

    /// The 14 inline bytes used for a NUL-terminated pathname (`open`, `stat`,
    /// `unlink`, ...). Trims at the first NUL.
    pub fn m3_ca1(&self) -> &[u8] {
        let field = &self.bytes[10..24];
        let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        &field[..len]
    }

    pub fn m4_l1(&self) -> u32 {
        self.read_u32(4)
    }
    pub fn m4_l2(&self) -> u32 {
        self.read_u32(8)
    }
    pub fn m4_l3(&self) -> u32 {
        self.read_u32(12)
    }
    pub fn m4_l4(&self) -> u32 {
        self.read_u32(16)
    }
    pub fn m4_l5(&self) -> u32 {
        self.read_u32(20)
    }

    /// Writes the syscall result the way MINIX expects: into the message's
    /// `m_type` field. The caller is also responsible for mirroring this
    /// into AX.
    pub fn set_result(&mut self, result: i16) {
        self.set_m_type(result);
    }
}

/// What the core hands control to on `INT 32`. Implementors read the message
/// at `SS:BX`, perform whatever host-side effect `m_type` names, write a
/// result back into the message and into AX, and return.
///
/// This is the only point of contact between guest code and the host
/// operating system; the core itself never touches a file descriptor.
pub trait SyscallHandler {
    fn handle(&mut self, vm: &mut crate::vm::Vm);
}
