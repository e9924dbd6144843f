use crate::bus::Bus;

use super::{AddressingMode, OPCODES};

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the address of the following instruction. Memory is
/// read with [`Bus::peek`] so this is safe to call between steps.
pub fn disassemble<B: Bus>(bus: &mut B, addr: u16) -> (String, u16) {
    let opcode = bus.peek(addr);
    let Some(instr) = OPCODES[opcode as usize] else {
        return (format!(".DB ${opcode:02X}"), addr.wrapping_add(1));
    };
    let next = addr.wrapping_add(instr.size());
    let lo = bus.peek(addr.wrapping_add(1));
    let hi = bus.peek(addr.wrapping_add(2));
    let word = u16::from_le_bytes([lo, hi]);
    let name = instr.op.mnemonic();

    let text = match instr.mode {
        AddressingMode::Implied => name.to_string(),
        AddressingMode::Accumulator => format!("{name} A"),
        AddressingMode::Immediate => format!("{name} #${lo:02X}"),
        AddressingMode::ZeroPage => format!("{name} ${lo:02X}"),
        AddressingMode::ZeroPageX => format!("{name} ${lo:02X},X"),
        AddressingMode::ZeroPageY => format!("{name} ${lo:02X},Y"),
        AddressingMode::Absolute => format!("{name} ${word:04X}"),
        AddressingMode::AbsoluteX => format!("{name} ${word:04X},X"),
        AddressingMode::AbsoluteY => format!("{name} ${word:04X},Y"),
        AddressingMode::AbsoluteIndirect => format!("{name} (${word:04X})"),
        AddressingMode::IndirectX => format!("{name} (${lo:02X},X)"),
        AddressingMode::IndirectY => format!("{name} (${lo:02X}),Y"),
        AddressingMode::Relative => {
            let target = next.wrapping_add_signed(lo as i8 as i16);
            format!("{name} ${target:04X}")
        }
    };
    (text, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::Mem;

    fn dis(bytes: &[u8]) -> (String, u16) {
        let mut mem = Mem::new();
        mem.load(0x1000, bytes);
        disassemble(&mut mem, 0x1000)
    }

    #[test]
    fn formats_each_mode() {
        assert_eq!(dis(&[0xEA]), ("NOP".to_string(), 0x1001));
        assert_eq!(dis(&[0x0A]).0, "ASL A");
        assert_eq!(dis(&[0xA9, 0x10]), ("LDA #$10".to_string(), 0x1002));
        assert_eq!(dis(&[0xA5, 0x10]).0, "LDA $10");
        assert_eq!(dis(&[0xB5, 0x10]).0, "LDA $10,X");
        assert_eq!(dis(&[0xB6, 0x10]).0, "LDX $10,Y");
        assert_eq!(dis(&[0xAD, 0x34, 0x12]), ("LDA $1234".to_string(), 0x1003));
        assert_eq!(dis(&[0xBD, 0x34, 0x12]).0, "LDA $1234,X");
        assert_eq!(dis(&[0xB9, 0x34, 0x12]).0, "LDA $1234,Y");
        assert_eq!(dis(&[0x6C, 0x34, 0x12]).0, "JMP ($1234)");
        assert_eq!(dis(&[0xA1, 0x10]).0, "LDA ($10,X)");
        assert_eq!(dis(&[0xB1, 0x10]).0, "LDA ($10),Y");
    }

    #[test]
    fn branches_show_their_target() {
        assert_eq!(dis(&[0x10, 0x3E]).0, "BPL $1040");
        assert_eq!(dis(&[0xD0, 0xFE]).0, "BNE $1000");
    }

    #[test]
    fn unknown_opcode_is_a_data_byte() {
        assert_eq!(dis(&[0x02]), (".DB $02".to_string(), 0x1001));
    }
}
