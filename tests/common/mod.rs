//! Fixture ELF images.
//!
//! Builds small little-endian ELF32 files with one `PT_LOAD` segment per
//! section, a symbol table and section headers, using the `object` crate's
//! header structs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use object::elf;
use object::endian::{U16, U32};
use object::pod::bytes_of;
use object::Endianness;

const LE: Endianness = Endianness::Little;
const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;
const SHDR_SIZE: usize = 40;
const SYM_SIZE: usize = 16;

fn u16(v: u16) -> U16<Endianness> {
    U16::new(LE, v)
}
fn u32(v: u32) -> U32<Endianness> {
    U32::new(LE, v)
}

pub struct FixtureSection {
    pub name: &'static str,
    /// Runtime address.
    pub address: u32,
    /// Physical address of the segment holding the section.
    pub load_address: u32,
    pub flags: u32,
    pub data: Vec<u8>,
}

pub struct FixtureSymbol {
    pub name: &'static str,
    pub value: u32,
    /// Section header index, or `SHN_ABS`.
    pub shndx: u16,
}

pub struct FixtureElf {
    pub sections: Vec<FixtureSection>,
    pub symbols: Vec<FixtureSymbol>,
    pub with_symtab: bool,
}

/// Where the pieces of a built fixture ended up.
pub struct Built {
    pub bytes: Vec<u8>,
    /// File offset of each fixture section, in declaration order.
    pub section_offsets: Vec<usize>,
}

fn align4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

impl FixtureElf {
    pub fn build(&self) -> Built {
        let phnum = self.sections.len();
        let mut buf = vec![0u8; 0x100usize.max(EHDR_SIZE + phnum * PHDR_SIZE)];

        let mut section_offsets = Vec::new();
        for section in &self.sections {
            align4(&mut buf);
            section_offsets.push(buf.len());
            buf.extend_from_slice(&section.data);
        }

        // Symbol and string tables
        let mut strtab = vec![0u8];
        let mut symtab = vec![0u8; SYM_SIZE];
        for sym in &self.symbols {
            let name = strtab.len() as u32;
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
            let entry = elf::Sym32::<Endianness> {
                st_name: u32(name),
                st_value: u32(sym.value),
                st_size: u32(0),
                st_info: (elf::STB_GLOBAL << 4) | elf::STT_NOTYPE,
                st_other: elf::STV_DEFAULT,
                st_shndx: u16(sym.shndx),
            };
            symtab.extend_from_slice(bytes_of(&entry));
        }
        align4(&mut buf);
        let symtab_offset = buf.len();
        if self.with_symtab {
            buf.extend_from_slice(&symtab);
        }
        let strtab_offset = buf.len();
        if self.with_symtab {
            buf.extend_from_slice(&strtab);
        }

        // Section header string table
        let mut shstrtab = vec![0u8];
        let mut name_of = |name: &str| {
            let off = shstrtab.len() as u32;
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
            off
        };
        let section_names: Vec<u32> = self.sections.iter().map(|s| name_of(s.name)).collect();
        let symtab_name = name_of(".symtab");
        let strtab_name = name_of(".strtab");
        let shstrtab_name = name_of(".shstrtab");
        let shstrtab_offset = buf.len();
        buf.extend_from_slice(&shstrtab);

        align4(&mut buf);
        let shoff = buf.len();

        let mut headers = vec![section_header(0, elf::SHT_NULL, 0, 0, 0, 0)];
        for ((section, offset), name) in self
            .sections
            .iter()
            .zip(&section_offsets)
            .zip(&section_names)
        {
            headers.push(section_header(
                *name,
                elf::SHT_PROGBITS,
                section.flags,
                section.address,
                *offset as u32,
                section.data.len() as u32,
            ));
        }
        if self.with_symtab {
            let strtab_index = (headers.len() + 1) as u32;
            let mut symtab_header = section_header(
                symtab_name,
                elf::SHT_SYMTAB,
                0,
                0,
                symtab_offset as u32,
                symtab.len() as u32,
            );
            symtab_header.sh_link = u32(strtab_index);
            symtab_header.sh_info = u32(1);
            symtab_header.sh_entsize = u32(SYM_SIZE as u32);
            headers.push(symtab_header);
            headers.push(section_header(
                strtab_name,
                elf::SHT_STRTAB,
                0,
                0,
                strtab_offset as u32,
                strtab.len() as u32,
            ));
        }
        let shstrndx = headers.len() as u16;
        headers.push(section_header(
            shstrtab_name,
            elf::SHT_STRTAB,
            0,
            0,
            shstrtab_offset as u32,
            shstrtab.len() as u32,
        ));
        for header in &headers {
            buf.extend_from_slice(bytes_of(header));
        }

        let file_header = elf::FileHeader32::<Endianness> {
            e_ident: elf::Ident {
                magic: elf::ELFMAG,
                class: elf::ELFCLASS32,
                data: elf::ELFDATA2LSB,
                version: elf::EV_CURRENT,
                os_abi: elf::ELFOSABI_SYSV,
                abi_version: 0,
                padding: [0; 7],
            },
            e_type: u16(elf::ET_EXEC),
            e_machine: u16(elf::EM_ARM),
            e_version: u32(elf::EV_CURRENT as u32),
            e_entry: u32(0),
            e_phoff: u32(EHDR_SIZE as u32),
            e_shoff: u32(shoff as u32),
            e_flags: u32(0),
            e_ehsize: u16(EHDR_SIZE as u16),
            e_phentsize: u16(PHDR_SIZE as u16),
            e_phnum: u16(phnum as u16),
            e_shentsize: u16(SHDR_SIZE as u16),
            e_shnum: u16(headers.len() as u16),
            e_shstrndx: u16(shstrndx),
        };
        buf[..EHDR_SIZE].copy_from_slice(bytes_of(&file_header));

        for (i, (section, offset)) in self.sections.iter().zip(&section_offsets).enumerate() {
            let size = section.data.len() as u32;
            let program_header = elf::ProgramHeader32::<Endianness> {
                p_type: u32(elf::PT_LOAD),
                p_offset: u32(*offset as u32),
                p_vaddr: u32(section.address),
                p_paddr: u32(section.load_address),
                p_filesz: u32(size),
                p_memsz: u32(size),
                p_flags: u32(elf::PF_R),
                p_align: u32(4),
            };
            let at = EHDR_SIZE + i * PHDR_SIZE;
            buf[at..at + PHDR_SIZE].copy_from_slice(bytes_of(&program_header));
        }

        Built {
            bytes: buf,
            section_offsets,
        }
    }
}

fn section_header(
    name: u32,
    sh_type: u32,
    flags: u32,
    addr: u32,
    offset: u32,
    size: u32,
) -> elf::SectionHeader32<Endianness> {
    elf::SectionHeader32 {
        sh_name: u32(name),
        sh_type: u32(sh_type),
        sh_flags: u32(flags),
        sh_addr: u32(addr),
        sh_offset: u32(offset),
        sh_size: u32(size),
        sh_link: u32(0),
        sh_info: u32(0),
        sh_addralign: u32(if sh_type == elf::SHT_PROGBITS { 4 } else { 1 }),
        sh_entsize: u32(0),
    }
}

/// Address of the checksum slot in the fixture firmware.
pub const CHECKSUM_ADDRESS: u32 = 0x10;
/// Initial contents of the checksum slot.
pub const CHECKSUM_PLACEHOLDER: [u8; 4] = [0xFF; 4];

pub fn text_bytes() -> Vec<u8> {
    let mut text: Vec<u8> = (0..0x40u32).map(|i| (i * 3 + 1) as u8).collect();
    let slot = CHECKSUM_ADDRESS as usize;
    text[slot..slot + 4].copy_from_slice(&CHECKSUM_PLACEHOLDER);
    text
}

pub fn data_bytes() -> Vec<u8> {
    (0..0x10u32).map(|i| 0xA0 ^ (i as u8)).collect()
}

/// A firmware image laid out like a Cortex-M flash:
///
/// - `.text` at 0x0..0x40: vector table 0x0..0x10, checksum slot at 0x10,
///   application code 0x20..0x40.
/// - `.data` runs at 0x2000_0000 and is loaded from 0x40..0x50.
pub fn firmware() -> FixtureElf {
    firmware_with(&[])
}

/// [`firmware`] with some absolute symbols replaced by other values.
pub fn firmware_with(overrides: &[(&'static str, u32)]) -> FixtureElf {
    let value = |name: &str, default: u32| {
        overrides
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .unwrap_or(default)
    };
    let abs = |name: &'static str, default: u32| FixtureSymbol {
        name,
        value: value(name, default),
        shndx: elf::SHN_ABS,
    };

    FixtureElf {
        sections: vec![
            FixtureSection {
                name: ".text",
                address: 0,
                load_address: 0,
                flags: elf::SHF_ALLOC | elf::SHF_EXECINSTR,
                data: text_bytes(),
            },
            FixtureSection {
                name: ".data",
                address: 0x2000_0000,
                load_address: 0x40,
                flags: elf::SHF_ALLOC | elf::SHF_WRITE,
                data: data_bytes(),
            },
        ],
        symbols: vec![
            abs("FLASH_START", 0x0),
            abs("__CRC_IVT_END", 0x10),
            abs("__CRC_APP_START", 0x20),
            abs("__ROM_CRC_END", 0x40),
            abs("__DATA_RAM", 0x2000_0000),
            abs("__data_end__", 0x2000_0010),
            abs("__DATA_ROM_START", 0x40),
            abs("__USED_FLASH_END", 0x50),
            FixtureSymbol {
                name: "__checksum_result",
                value: value("__checksum_result", CHECKSUM_ADDRESS),
                shndx: 1,
            },
        ],
        with_symtab: true,
    }
}

/// Bytes the firmware checks at boot, before word normalization.
pub fn checksummed_bytes() -> Vec<u8> {
    let text = text_bytes();
    let mut bytes = text[0x00..0x10].to_vec();
    bytes.extend_from_slice(&text[0x20..0x40]);
    bytes.extend_from_slice(&data_bytes());
    bytes
}

/// The CRC the fixture firmware expects, computed independently of the
/// pipeline.
pub fn expected_crc() -> u32 {
    let swapped: Vec<u8> = checksummed_bytes()
        .chunks(4)
        .flat_map(|w| w.iter().rev().copied().collect::<Vec<_>>())
        .collect();
    crc::crc32::checksum_ieee(&swapped)
}

/// Writes `fixture` into `dir` and returns its path and layout.
pub fn write_fixture(dir: &Path, fixture: &FixtureElf) -> (PathBuf, Built) {
    let built = fixture.build();
    let path = dir.join("app.elf");
    std::fs::write(&path, &built.bytes).unwrap();
    (path, built)
}

/// File offset of the checksum slot in a built [`firmware`].
pub fn checksum_offset(built: &Built) -> usize {
    built.section_offsets[0] + CHECKSUM_ADDRESS as usize
}
