//! The authoritative opcode table: name, number, operand kind, and the
//! disassembly used by the verbose execution trace.
//!
//! Commands are either 8 or 16 bits.  During execution the high byte of a
//! 16-bit command sits in CR with the low byte in the high bits of I, so a
//! 16-bit command number is `(CR << 8) | top_byte_of_I`.

use crate::word::DrumLoc;
use lazy_static::lazy_static;

// 8-bit opcodes.
pub const OP_HH: u16 = 0x00; // Halt, operand X
pub const OP_AK: u16 = 0x08; // Add K
pub const OP_CL: u16 = 0x09; // Clear A
pub const OP_NN: u16 = 0x0A; // No operation
pub const OP_CM: u16 = 0x0B; // Complement
pub const OP_JA: u16 = 0x0D; // Jump to A
pub const OP_BI: u16 = 0x0F; // Block interchange
pub const OP_SK: u16 = 0x10; // Set K to 1
pub const OP_TZ: u16 = 0x11; // Test for zero
pub const OP_TH: u16 = 0x12; // Test high order A bit / test negative
pub const OP_RK: u16 = 0x13; // Reset K to 0
pub const OP_TP: u16 = 0x14; // Test parity failure
pub const OP_LA: u16 = 0x18; // Logical AND, operand S
pub const OP_XC: u16 = 0x20; // Exchange, operand S
pub const OP_XT: u16 = 0x28; // Extract, operand S
pub const OP_TE: u16 = 0x30; // Test equal, operand S
pub const OP_TG: u16 = 0x38; // Test equal or greater, operand S

// 16-bit opcodes.
pub const OP_BLS: u16 = 0x4000; // Binary left single shift, operand N
pub const OP_BLSK: u16 = 0x4080; // Binary left single shift incl. K
pub const OP_BLSS: u16 = 0x4100; // Binary left single shift on scratchpad
pub const OP_BLSSK: u16 = 0x4180; // ditto, incl. K
pub const OP_BLD: u16 = 0x4200; // Binary left double shift, operand N
pub const OP_BLDK: u16 = 0x4280; // Binary left double shift incl. K
pub const OP_BLDS: u16 = 0x4300; // Binary left double shift on scratchpad
pub const OP_BLDSK: u16 = 0x4380; // ditto, incl. K
pub const OP_BRS: u16 = 0x4800; // Binary right single shift, operand N
pub const OP_BRSK: u16 = 0x4880; // Binary right single shift incl. K
pub const OP_BRSS: u16 = 0x4900; // Binary right single shift on scratchpad
pub const OP_BRSSK: u16 = 0x4980; // ditto, incl. K
pub const OP_BRD: u16 = 0x4A00; // Binary right double shift, operand N
pub const OP_BRDK: u16 = 0x4A80; // Binary right double shift incl. K
pub const OP_BRDS: u16 = 0x4B00; // Binary right double shift on scratchpad
pub const OP_BRDSK: u16 = 0x4B80; // ditto, incl. K
pub const OP_SI: u16 = 0x5000; // Shift input
pub const OP_RS: u16 = 0x5080; // Read status
pub const OP_CIO: u16 = 0x5800; // Clear, input, check odd parity
pub const OP_CIE: u16 = 0x5840; // Clear, input, check even parity
pub const OP_CIOP: u16 = 0x5C00; // Clear, input, check odd parity into A
pub const OP_CIEP: u16 = 0x5C40; // Clear, input, check even parity into A
pub const OP_DLS: u16 = 0x6000; // Decimal left single shift, operand N
pub const OP_DLSC: u16 = 0x6080; // Decimal left single shift plus constant
pub const OP_DLSS: u16 = 0x6100; // Decimal left single shift on scratchpad
pub const OP_DLSSC: u16 = 0x6180; // ditto, plus constant
pub const OP_DLD: u16 = 0x6200; // Decimal left double shift, operand N
pub const OP_DLDC: u16 = 0x6280; // Decimal left double shift plus constant
pub const OP_DLDS: u16 = 0x6300; // Decimal left double shift on scratchpad
pub const OP_DLDSC: u16 = 0x6380; // ditto, plus constant
pub const OP_DRS: u16 = 0x6800; // Decimal right single shift, operand N
pub const OP_DRD: u16 = 0x6A00; // Decimal right double shift, operand N
pub const OP_OAO: u16 = 0x7000; // Output accumulator with odd parity
pub const OP_OAE: u16 = 0x7040; // Output accumulator with even parity
pub const OP_OA: u16 = 0x70C0; // Output accumulator
pub const OP_AST: u16 = 0x74C0; // Accumulator select on test
pub const OP_AS: u16 = 0x76C0; // Accumulator select
pub const OP_OI: u16 = 0x7800; // Output immediate, operand C
pub const OP_IST: u16 = 0x7C00; // Immediate select on test, operand D
pub const OP_IS: u16 = 0x7E00; // Immediate select, operand D
pub const OP_CA: u16 = 0x8000; // Clear and add / load, operand M
pub const OP_AD: u16 = 0x9000; // Add, operand M
pub const OP_ST: u16 = 0xB000; // Store, operand M
pub const OP_JM: u16 = 0xC000; // Jump mark, operand M
pub const OP_AC: u16 = 0xD000; // Add conditional, operand M
pub const OP_JU: u16 = 0xE000; // Jump unconditional, operand M
pub const OP_JC: u16 = 0xF000; // Jump conditional, operand M

/// Types of instruction operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandType {
    /// No operand.
    None,
    /// 12-bit memory address.
    Memory,
    /// 3-bit scratchpad address.
    Scratchpad,
    /// 7-bit shift count minus one.
    Shift,
    /// 8-bit device select code.
    Device,
    /// 8-bit character code.
    Char,
    /// 3-bit halt code.
    Halt,
}

/// Information about an opcode for the disassembler and embedding tools.
#[derive(Clone, Copy, Debug)]
pub struct OpcodeInfo {
    /// Name of the opcode, in upper case.
    pub name: &'static str,
    /// Opcode number.  High byte is zero for 8-bit opcodes.
    pub opcode: u16,
    /// Operand mask; bits other than these are the opcode.
    pub operand_mask: u16,
    /// Type of operand for the opcode.
    pub operand: OperandType,
}

const fn op(name: &'static str, opcode: u16, operand_mask: u16, operand: OperandType) -> OpcodeInfo {
    OpcodeInfo { name, opcode, operand_mask, operand }
}

lazy_static! {
    /// Every known opcode.  `TN` is an alias for `TH` and comes after it so
    /// that number lookups report the canonical name.
    pub static ref OPCODES: Vec<OpcodeInfo> = vec![
        op("HH", OP_HH, 0x0007, OperandType::Halt),
        op("AK", OP_AK, 0x0000, OperandType::None),
        op("CL", OP_CL, 0x0000, OperandType::None),
        op("NN", OP_NN, 0x0000, OperandType::None),
        op("CM", OP_CM, 0x0000, OperandType::None),
        op("JA", OP_JA, 0x0000, OperandType::None),
        op("BI", OP_BI, 0x0000, OperandType::None),
        op("SK", OP_SK, 0x0000, OperandType::None),
        op("TZ", OP_TZ, 0x0000, OperandType::None),
        op("TH", OP_TH, 0x0000, OperandType::None),
        op("TN", OP_TH, 0x0000, OperandType::None), // Alias for TH
        op("RK", OP_RK, 0x0000, OperandType::None),
        op("TP", OP_TP, 0x0000, OperandType::None),
        op("LA", OP_LA, 0x0007, OperandType::Scratchpad),
        op("XC", OP_XC, 0x0007, OperandType::Scratchpad),
        op("XT", OP_XT, 0x0007, OperandType::Scratchpad),
        op("TE", OP_TE, 0x0007, OperandType::Scratchpad),
        op("TG", OP_TG, 0x0007, OperandType::Scratchpad),
        op("BLS", OP_BLS, 0x007F, OperandType::Shift),
        op("BLSK", OP_BLSK, 0x007F, OperandType::Shift),
        op("BLSS", OP_BLSS, 0x0000, OperandType::None),
        op("BLSSK", OP_BLSSK, 0x0000, OperandType::None),
        op("BLD", OP_BLD, 0x007F, OperandType::Shift),
        op("BLDK", OP_BLDK, 0x007F, OperandType::Shift),
        op("BLDS", OP_BLDS, 0x0000, OperandType::None),
        op("BLDSK", OP_BLDSK, 0x0000, OperandType::None),
        op("BRS", OP_BRS, 0x007F, OperandType::Shift),
        op("BRSK", OP_BRSK, 0x007F, OperandType::Shift),
        op("BRSS", OP_BRSS, 0x0000, OperandType::None),
        op("BRSSK", OP_BRSSK, 0x0000, OperandType::None),
        op("BRD", OP_BRD, 0x007F, OperandType::Shift),
        op("BRDK", OP_BRDK, 0x007F, OperandType::Shift),
        op("BRDS", OP_BRDS, 0x0000, OperandType::None),
        op("BRDSK", OP_BRDSK, 0x0000, OperandType::None),
        op("SI", OP_SI, 0x0000, OperandType::None),
        op("RS", OP_RS, 0x0000, OperandType::None),
        op("CIO", OP_CIO, 0x0000, OperandType::None),
        op("CIE", OP_CIE, 0x0000, OperandType::None),
        op("CIOP", OP_CIOP, 0x0000, OperandType::None),
        op("CIEP", OP_CIEP, 0x0000, OperandType::None),
        op("DLS", OP_DLS, 0x007F, OperandType::Shift),
        op("DLSC", OP_DLSC, 0x007F, OperandType::Shift),
        op("DLSS", OP_DLSS, 0x0000, OperandType::None),
        op("DLSSC", OP_DLSSC, 0x0000, OperandType::None),
        op("DLD", OP_DLD, 0x007F, OperandType::Shift),
        op("DLDC", OP_DLDC, 0x007F, OperandType::Shift),
        op("DLDS", OP_DLDS, 0x0000, OperandType::None),
        op("DLDSC", OP_DLDSC, 0x0000, OperandType::None),
        op("DRS", OP_DRS, 0x007F, OperandType::Shift),
        op("DRD", OP_DRD, 0x007F, OperandType::Shift),
        op("OAO", OP_OAO, 0x0000, OperandType::None),
        op("OAE", OP_OAE, 0x0000, OperandType::None),
        op("OA", OP_OA, 0x0000, OperandType::None),
        op("AST", OP_AST, 0x0000, OperandType::None),
        op("AS", OP_AS, 0x0000, OperandType::None),
        op("OI", OP_OI, 0x00FF, OperandType::Char),
        op("IST", OP_IST, 0x00FF, OperandType::Device),
        op("IS", OP_IS, 0x00FF, OperandType::Device),
        op("CA", OP_CA, 0x0FFF, OperandType::Memory),
        op("AD", OP_AD, 0x0FFF, OperandType::Memory),
        op("ST", OP_ST, 0x0FFF, OperandType::Memory),
        op("JM", OP_JM, 0x0FFF, OperandType::Memory),
        op("AC", OP_AC, 0x0FFF, OperandType::Memory),
        op("JU", OP_JU, 0x0FFF, OperandType::Memory),
        op("JC", OP_JC, 0x0FFF, OperandType::Memory),
    ];
}

/// Finds the opcode information for an instruction number, or `None` if it
/// does not correspond to a known opcode.
pub fn opcode_by_number(insn: u16) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|info| insn & !info.operand_mask == info.opcode)
}

/// Finds the opcode information for a name, ignoring case.
pub fn opcode_by_name(name: &str) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|info| info.name.eq_ignore_ascii_case(name))
}

/// Renders one instruction the way the verbose trace prints it: address,
/// raw opcode, mnemonic, operand.
pub fn disassemble_instruction(addr: DrumLoc, insn: u16) -> String {
    let mut out = format!("{:03X}: ", addr);
    if insn < 0x0100 {
        out.push_str(&format!("{:02X}  ", insn));
    } else {
        out.push_str(&format!("{:04X}", insn));
    }
    if let Some(info) = opcode_by_number(insn) {
        out.push_str(&format!("   {:<6}", info.name));
        let operand = insn & info.operand_mask;
        match info.operand {
            OperandType::None => {}
            OperandType::Memory => out.push_str(&format!("${:03X}", operand)),
            OperandType::Scratchpad | OperandType::Halt => out.push_str(&format!("{}", operand)),
            OperandType::Shift => out.push_str(&format!("{}", operand + 1)),
            OperandType::Device | OperandType::Char => out.push_str(&format!("${:02X}", operand)),
        }
    }
    out.trim_end().to_string()
}
