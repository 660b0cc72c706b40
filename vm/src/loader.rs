//! A reference MINIX a.out loader.
//!
//! The core proper never parses a binary image — per the interface split,
//! populating CS/DS and arranging the argv/envp frame is an external
//! collaborator's job, and the core only requires that *something* leaves
//! the VM in the state described by the data model's Lifecycle section
//! before the first [`crate::vm::Vm::step`]. This module is that
//! collaborator: a small, single-segment ("tiny model") loader good enough
//! to run the kind of standalone a.out binary the test corpus exercises.

use i8086_asm::{Machine, SegReg};
use thiserror::Error;

use crate::consts::aout_header;
use crate::vm::Vm;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("a.out image is shorter than its own fixed header")]
    TooShort,
    #[error("text/data sizes declared in the header exceed the image length")]
    TruncatedImage,
    #[error("argv/envp frame does not fit below the text+data image in the 64 KiB segment")]
    StackFrameTooLarge,
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

/// Top of the single 64 KiB segment this loader places CS/DS/ES/SS at. Left
/// just below the segment's last address so the argv/envp frame never wraps.
const STACK_TOP: u16 = 0xfffe;

/// Loads `image` (a MINIX a.out binary) into `vm`, builds the argv/envp
/// frame below `STACK_TOP`, and leaves CS:IP at the entry point with all
/// flags clear. CS, DS, ES and SS are all set to segment 0 — this loader
/// targets the combined instruction/data ("tiny model") layout; binaries
/// requiring separate I&D space are out of scope for a reference loader.
pub fn load(vm: &mut Vm, image: &[u8], argv: &[&str], envp: &[&str]) -> Result<(), LoaderError> {
    if image.len() < aout_header::ENTRY_OFFSET + 4 {
        return Err(LoaderError::TooShort);
    }
    let hdrlen = image[aout_header::HEADER_LEN_OFFSET] as usize;
    let text_size = read_u32_le(image, aout_header::TEXT_SIZE_OFFSET) as usize;
    let data_size = read_u32_le(image, aout_header::DATA_SIZE_OFFSET) as usize;
    let entry = read_u32_le(image, aout_header::ENTRY_OFFSET) as u16;

    let text_end = hdrlen.checked_add(text_size).ok_or(LoaderError::TruncatedImage)?;
    let data_end = text_end.checked_add(data_size).ok_or(LoaderError::TruncatedImage)?;
    if data_end > image.len() {
        return Err(LoaderError::TruncatedImage);
    }

    vm.memory[0..text_size].copy_from_slice(&image[hdrlen..text_end]);
    vm.memory[text_size..text_size + data_size].copy_from_slice(&image[text_end..data_end]);

    vm.set_seg(SegReg::Cs, 0);
    vm.set_seg(SegReg::Ds, 0);
    vm.set_seg(SegReg::Es, 0);
    vm.set_seg(SegReg::Ss, 0);

    let sp = build_argv_frame(vm, argv, envp)?;
    vm.set_reg16(i8086_asm::Reg16::Sp, sp);

    vm.ip = entry;
    vm.flags = crate::flags::Flags::default();
    Ok(())
}

/// Writes `argc, argv[0..], NULL, envp[0..], NULL, <strings>` starting at the
/// returned (and newly set) SP, ascending toward `STACK_TOP`. Pointers are
/// segment offsets relative to SS:0, matching the loader contract.
fn build_argv_frame(vm: &mut Vm, argv: &[&str], envp: &[&str]) -> Result<u16, LoaderError> {
    let mut blob = Vec::new();
    let mut offsets = Vec::with_capacity(argv.len() + envp.len());
    for s in argv.iter().chain(envp.iter()) {
        offsets.push(blob.len());
        blob.extend_from_slice(s.as_bytes());
        blob.push(0);
    }
    if blob.len() % 2 != 0 {
        blob.push(0);
    }

    let argc = argv.len() as u16;
    let envc = envp.len() as u16;
    let pointer_area_len = 2 + 2 * argc as usize + 2 + 2 * envc as usize + 2;
    let frame_len = pointer_area_len + blob.len();

    let sp = STACK_TOP
        .checked_sub(frame_len as u16)
        .filter(|&sp| (sp as usize) >= frame_len)
        .ok_or(LoaderError::StackFrameTooLarge)?;

    let blob_addr = sp.wrapping_add(pointer_area_len as u16);
    let mut cursor = sp;
    vm.mem_write16(SegReg::Ss, cursor, argc);
    cursor = cursor.wrapping_add(2);
    for &offset in &offsets[..argv.len()] {
        vm.mem_write16(SegReg::Ss, cursor, blob_addr.wrapping_add(offset as u16));
        cursor = cursor.wrapping_add(2);
    }
    vm.mem_write16(SegReg::Ss, cursor, 0);
    cursor = cursor.wrapping_add(2);
    for &offset in &offsets[argv.len()..] {
        vm.mem_write16(SegReg::Ss, cursor, blob_addr.wrapping_add(offset as u16));
        cursor = cursor.wrapping_add(2);
    }
    vm.mem_write16(SegReg::Ss, cursor, 0);

    for (i, &byte) in blob.iter().enumerate() {
        vm.mem_write8(SegReg::Ss, blob_addr.wrapping_add(i as u16), byte);
    }

    Ok(sp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8086_asm::Reg16;

    fn minimal_image(text: &[u8], data: &[u8], entry: u16) -> Vec<u8> {
        let hdrlen = 32usize;
        let mut image = vec![0u8; hdrlen];
        image[aout_header::HEADER_LEN_OFFSET] = hdrlen as u8;
        image[aout_header::TEXT_SIZE_OFFSET..aout_header::TEXT_SIZE_OFFSET + 4]
            .copy_from_slice(&(text.len() as u32).to_le_bytes());
        image[aout_header::DATA_SIZE_OFFSET..aout_header::DATA_SIZE_OFFSET + 4]
            .copy_from_slice(&(data.len() as u32).to_le_bytes());
        image[aout_header::ENTRY_OFFSET..aout_header::ENTRY_OFFSET + 4].copy_from_slice(&(entry as u32).to_le_bytes());
        image.extend_from_slice(text);
        image.extend_from_slice(data);
        image
    }

    #[test]
    fn loads_text_and_data_and_sets_entry() {
        let image = minimal_image(&[0xf4], &[0xaa, 0xbb], 0x0000);
        let mut vm = Vm::new();
        load(&mut vm, &image, &[], &[]).unwrap();
        assert_eq!(vm.ip, 0);
        assert_eq!(vm.memory[0], 0xf4);
        assert_eq!(vm.memory[1], 0xaa);
        assert_eq!(vm.memory[2], 0xbb);
    }

    #[test]
    fn argv_pointers_resolve_to_nul_terminated_strings() {
        let image = minimal_image(&[0xf4], &[], 0);
        let mut vm = Vm::new();
        load(&mut vm, &image, &["prog", "arg1"], &["PATH=/bin"]).unwrap();

        let sp = vm.reg16(Reg16::Sp);
        assert_eq!(vm.mem_read16(SegReg::Ss, sp), 2); // argc
        let argv0_ptr = vm.mem_read16(SegReg::Ss, sp + 2);
        let bytes: Vec<u8> = (0..4).map(|i| vm.mem_read8(SegReg::Ss, argv0_ptr + i)).collect();
        assert_eq!(bytes, b"prog");
    }

    #[test]
    fn rejects_a_truncated_image() {
        let mut image = minimal_image(&[0xf4, 0x90], &[], 0);
        image.truncate(image.len() - 1);
        let mut vm = Vm::new();
        assert!(matches!(load(&mut vm, &image, &[], &[]), Err(LoaderError::TruncatedImage)));
    }
}
