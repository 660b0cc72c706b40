//! End-to-end scenarios driving [`Vm::step`]/[`Vm::run`] over hand-assembled
//! machine code, exercising the interpreter against whole guest programs
//! rather than one opcode at a time.

use std::cell::RefCell;
use std::rc::Rc;

use i8086_asm::{Reg16, SegReg};
use i8086_vm::error::VmError;
use i8086_vm::state::ExecuteState;
use i8086_vm::syscall::{Message, MinixSyscall, SyscallHandler};
use i8086_vm::vm::Vm;

const MSG_ADDR: u16 = 0x1000;

/// A minimal `write`/`exit` syscall collaborator, standing in for the libc
/// that would otherwise sit between guest code and the host OS.
struct TestHandler {
    stdout: Rc<RefCell<Vec<u8>>>,
}

impl SyscallHandler for TestHandler {
    fn handle(&mut self, vm: &mut Vm) {
        let bx = vm.reg16(Reg16::Bx);
        let addr = vm.physical_address(SegReg::Ss, bx);
        let mut block = vm.memory[addr..addr + 32].to_vec();
        let result;
        {
            let mut msg = Message::new(&mut block);
            result = match MinixSyscall::from_raw(msg.m_type()) {
                Some(MinixSyscall::Write) => {
                    let fd = msg.m1_i1();
                    let nbytes = msg.m1_i2() as u16;
                    let ptr = msg.m1_p1();
                    if fd == 1 {
                        let mut out = self.stdout.borrow_mut();
                        for i in 0..nbytes {
                            out.push(vm.mem_read8(SegReg::Ds, ptr.wrapping_add(i)));
                        }
                    }
                    nbytes as i16
                }
                Some(MinixSyscall::Exit) => {
                    vm.halt_code = Some(msg.m1_i1() as i32);
                    0
                }
                _ => -1,
            };
            msg.set_result(result);
        }
        vm.memory[addr..addr + 32].copy_from_slice(&block);
        vm.set_reg16(Reg16::Ax, result as u16);
    }
}

fn load_code(vm: &mut Vm, code: &[u8]) {
    vm.memory[0..code.len()].copy_from_slice(code);
}

#[test]
fn mov_then_hlt_leaves_register_state_and_halts_with_code_zero() {
    let mut vm = Vm::new();
    // mov ax, 0x1234 ; hlt
    load_code(&mut vm, &[0xB8, 0x34, 0x12, 0xF4]);
    let code = vm.run().unwrap();
    assert_eq!(code, 0);
    assert_eq!(vm.reg16(Reg16::Ax), 0x1234);
}

#[test]
fn dec_jnz_loop_counts_down_to_zero() {
    let mut vm = Vm::new();
    // mov cx, 3
    // loop_top: dec cx ; jnz loop_top
    // hlt
    load_code(&mut vm, &[0xB9, 0x03, 0x00, 0x49, 0x75, 0xFE, 0xF4]);
    let code = vm.run().unwrap();
    assert_eq!(code, 0);
    assert_eq!(vm.reg16(Reg16::Cx), 0);
}

#[test]
fn write_syscall_emits_a_single_byte_to_stdout() {
    let mut vm = Vm::new();
    let stdout = Rc::new(RefCell::new(Vec::new()));
    vm.set_syscall_handler(Box::new(TestHandler { stdout: stdout.clone() }));

    vm.mem_write8(SegReg::Ds, 0x2000, b'A');
    vm.mem_write16(SegReg::Ss, MSG_ADDR + 2, MinixSyscall::Write as i16 as u16);
    vm.mem_write16(SegReg::Ss, MSG_ADDR + 4, 1); // fd
    vm.mem_write16(SegReg::Ss, MSG_ADDR + 6, 1); // nbytes
    vm.mem_write16(SegReg::Ss, MSG_ADDR + 10, 0x2000); // buffer pointer
    vm.set_reg16(Reg16::Bx, MSG_ADDR);

    // int 0x20 ; hlt
    load_code(&mut vm, &[0xCD, 0x20, 0xF4]);
    let code = vm.run().unwrap();

    assert_eq!(code, 0);
    assert_eq!(&*stdout.borrow(), b"A");
    assert_eq!(vm.reg16(Reg16::Ax), 1);
}

#[test]
fn rep_movsb_copies_a_three_byte_string() {
    let mut vm = Vm::new();
    vm.mem_write8(SegReg::Ds, 0x3000, b'a');
    vm.mem_write8(SegReg::Ds, 0x3001, b'b');
    vm.mem_write8(SegReg::Ds, 0x3002, b'c');
    vm.set_reg16(Reg16::Si, 0x3000);
    vm.set_reg16(Reg16::Di, 0x4000);
    vm.set_reg16(Reg16::Cx, 3);

    // rep movsb ; hlt
    load_code(&mut vm, &[0xF3, 0xA4, 0xF4]);
    let code = vm.run().unwrap();

    assert_eq!(code, 0);
    assert_eq!(vm.reg16(Reg16::Cx), 0);
    assert_eq!(vm.reg16(Reg16::Si), 0x3003);
    assert_eq!(vm.reg16(Reg16::Di), 0x4003);
    assert_eq!(vm.mem_read8(SegReg::Es, 0x4000), b'a');
    assert_eq!(vm.mem_read8(SegReg::Es, 0x4001), b'b');
    assert_eq!(vm.mem_read8(SegReg::Es, 0x4002), b'c');
}

#[test]
fn minix_exit_syscall_halts_with_the_requested_status() {
    let mut vm = Vm::new();
    let stdout = Rc::new(RefCell::new(Vec::new()));
    vm.set_syscall_handler(Box::new(TestHandler { stdout }));

    vm.mem_write16(SegReg::Ss, MSG_ADDR + 2, MinixSyscall::Exit as i16 as u16);
    vm.mem_write16(SegReg::Ss, MSG_ADDR + 4, 7); // status
    vm.set_reg16(Reg16::Bx, MSG_ADDR);

    // int 0x20 (no trailing hlt: MINIX_exit halts on its own)
    load_code(&mut vm, &[0xCD, 0x20]);
    let code = vm.run().unwrap();

    assert_eq!(code, 7);
}

#[test]
fn hello_world_writes_each_byte_then_exits_cleanly() {
    let mut vm = Vm::new();
    let stdout = Rc::new(RefCell::new(Vec::new()));
    vm.set_syscall_handler(Box::new(TestHandler { stdout: stdout.clone() }));

    vm.mem_write8(SegReg::Ds, 0x3000, b'H');
    vm.mem_write8(SegReg::Ds, 0x3001, b'i');
    vm.mem_write8(SegReg::Ds, 0x3002, b'!');

    #[rustfmt::skip]
    let code_bytes: &[u8] = &[
        0xBE, 0x00, 0x30,             // mov si, 0x3000
        0xB9, 0x03, 0x00,             // mov cx, 3
        0xBB, 0x00, 0x10,             // mov bx, 0x1000
        0xC7, 0x47, 0x02, 0x04, 0x00, // mov word [bx+2], 4   (m_type = write)
        0xC7, 0x47, 0x04, 0x01, 0x00, // mov word [bx+4], 1   (fd = stdout)
        0xC7, 0x47, 0x06, 0x01, 0x00, // mov word [bx+6], 1   (nbytes = 1)
        // loop_top (address 24):
        0x89, 0x77, 0x0A,             // mov [bx+10], si      (buffer = si)
        0xCD, 0x20,                   // int 0x20
        0x46,                         // inc si
        0x49,                         // dec cx
        0x75, 0xF7,                   // jnz loop_top
        0xC7, 0x47, 0x02, 0x01, 0x00, // mov word [bx+2], 1   (m_type = exit)
        0xC7, 0x47, 0x04, 0x00, 0x00, // mov word [bx+4], 0   (status = 0)
        0xCD, 0x20,                   // int 0x20
    ];
    load_code(&mut vm, code_bytes);

    let exit_code = vm.run().unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(&*stdout.borrow(), b"Hi!");
}

#[test]
fn int_other_than_0x20_surfaces_as_a_vm_error() {
    let mut vm = Vm::new();
    load_code(&mut vm, &[0xCD, 0x21]);
    assert!(matches!(vm.run(), Err(VmError::UnsupportedInterrupt(0x21))));
}
