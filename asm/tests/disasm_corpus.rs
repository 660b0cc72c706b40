//! A small corpus of hand-encoded instructions checked against the reference
//! disassembly text, cross-checking the opcode tables against known
//! encodings the way a top-level `tests/` directory does for a crate's
//! public decoding surface.

use i8086_asm::Opcode;
use rstest::rstest;

#[rstest]
#[case::add_reg8_reg8(&[0x00, 0xc8], 0, "add al,cl")]
#[case::mov_reg16_reg16(&[0x89, 0xd8], 0, "mov ax,bx")]
#[case::mov_mem_reg16_with_disp(&[0x89, 0x4b, 0x10], 0, "mov [bp+di+0x10],cx")]
#[case::cmp_word_mem_imm(&[0x81, 0x3e, 0x34, 0x12, 0x05, 0x00], 0, "cmp word [0x1234],0x5")]
#[case::jz_backward_short(&[0x74, 0xfe], 0x50, "jz 0x50")]
#[case::call_near_relative(&[0xe8, 0xf0, 0xff], 0x1000, "call word 0xff3")]
#[case::jmp_far_indirect_through_memory(&[0xff, 0x2f], 0, "jmp far [bx]")]
#[case::push_reg16(&[0x53], 0, "push bx")]
#[case::int_0x20(&[0xcd, 0x20], 0, "int 0x20")]
#[case::rep_stosb(&[0xf3, 0xaa], 0, "rep stosb")]
#[case::lea_direct_address(&[0x8d, 0x1e, 0x00, 0x01], 0, "lea bx,[0x100]")]
#[case::xor_reg_self(&[0x31, 0xc0], 0, "xor ax,ax")]
#[case::unknown_two_byte_opcode_degrades_to_db(&[0x0f, 0x00], 0, "db 0x0f")]
fn matches_reference_disassembly(#[case] bytes: &[u8], #[case] address: u16, #[case] expected: &str) {
    let op = Opcode::decode(bytes, address);
    assert_eq!(op.disasm(), expected);
}
