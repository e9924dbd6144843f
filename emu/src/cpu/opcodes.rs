use super::{AddressingMode, Flags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
}

impl Op {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Adc => "ADC",
            Op::And => "AND",
            Op::Asl => "ASL",
            Op::Bcc => "BCC",
            Op::Bcs => "BCS",
            Op::Beq => "BEQ",
            Op::Bit => "BIT",
            Op::Bmi => "BMI",
            Op::Bne => "BNE",
            Op::Bpl => "BPL",
            Op::Brk => "BRK",
            Op::Bvc => "BVC",
            Op::Bvs => "BVS",
            Op::Clc => "CLC",
            Op::Cld => "CLD",
            Op::Cli => "CLI",
            Op::Clv => "CLV",
            Op::Cmp => "CMP",
            Op::Cpx => "CPX",
            Op::Cpy => "CPY",
            Op::Dec => "DEC",
            Op::Dex => "DEX",
            Op::Dey => "DEY",
            Op::Eor => "EOR",
            Op::Inc => "INC",
            Op::Inx => "INX",
            Op::Iny => "INY",
            Op::Jmp => "JMP",
            Op::Jsr => "JSR",
            Op::Lda => "LDA",
            Op::Ldx => "LDX",
            Op::Ldy => "LDY",
            Op::Lsr => "LSR",
            Op::Nop => "NOP",
            Op::Ora => "ORA",
            Op::Pha => "PHA",
            Op::Php => "PHP",
            Op::Pla => "PLA",
            Op::Plp => "PLP",
            Op::Rol => "ROL",
            Op::Ror => "ROR",
            Op::Rti => "RTI",
            Op::Rts => "RTS",
            Op::Sbc => "SBC",
            Op::Sec => "SEC",
            Op::Sed => "SED",
            Op::Sei => "SEI",
            Op::Sta => "STA",
            Op::Stx => "STX",
            Op::Sty => "STY",
            Op::Tax => "TAX",
            Op::Tay => "TAY",
            Op::Tsx => "TSX",
            Op::Txa => "TXA",
            Op::Txs => "TXS",
            Op::Tya => "TYA",
        }
    }

    /// Whether the instruction reads the value at its effective address.
    /// Read-modify-write instructions count.
    pub const fn loads_operand(self) -> bool {
        matches!(
            self,
            Op::Adc
                | Op::And
                | Op::Bit
                | Op::Cmp
                | Op::Cpx
                | Op::Cpy
                | Op::Eor
                | Op::Lda
                | Op::Ldx
                | Op::Ldy
                | Op::Ora
                | Op::Sbc
                | Op::Asl
                | Op::Lsr
                | Op::Rol
                | Op::Ror
                | Op::Inc
                | Op::Dec
        )
    }

    /// Read instructions pay one cycle when indexing crosses a page.
    /// Stores and read-modify-write instructions have the worst case baked in.
    pub const fn page_penalty(self) -> bool {
        matches!(
            self,
            Op::Adc
                | Op::And
                | Op::Bit
                | Op::Cmp
                | Op::Cpx
                | Op::Cpy
                | Op::Eor
                | Op::Lda
                | Op::Ldx
                | Op::Ldy
                | Op::Ora
                | Op::Sbc
        )
    }

    /// `None` for anything that is not a conditional branch.
    pub const fn branch_taken(self, p: u8) -> Option<bool> {
        let (mask, when_set) = match self {
            Op::Bpl => (Flags::NEGATIVE, false),
            Op::Bmi => (Flags::NEGATIVE, true),
            Op::Bvc => (Flags::OVERFLOW, false),
            Op::Bvs => (Flags::OVERFLOW, true),
            Op::Bcc => (Flags::CARRY, false),
            Op::Bcs => (Flags::CARRY, true),
            Op::Bne => (Flags::ZERO, false),
            Op::Beq => (Flags::ZERO, true),
            _ => return None,
        };
        Some(((p & mask) != 0) == when_set)
    }
}

/// One decoded table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub op: Op,
    pub mode: AddressingMode,
    /// Base cycles before page-cross and branch adjustments.
    pub cycles: u8,
}

impl Instr {
    /// Opcode plus operand bytes.
    pub const fn size(&self) -> u16 {
        1 + self.mode.operand_len()
    }
}

/// Dispatch table indexed by opcode byte. Undocumented opcodes are `None`.
pub static OPCODES: [Option<Instr>; 256] = {
    let mut table = [None; 256];
    let mut opcode = 0;
    while opcode < 256 {
        table[opcode] = decode(opcode as u8);
        opcode += 1;
    }
    table
};

const fn decode(opcode: u8) -> Option<Instr> {
    use AddressingMode::*;
    use Op::*;

    let (op, mode, cycles) = match opcode {
        0x00 => (Brk, Implied, 7),
        0x01 => (Ora, IndirectX, 6),
        0x05 => (Ora, ZeroPage, 3),
        0x06 => (Asl, ZeroPage, 5),
        0x08 => (Php, Implied, 3),
        0x09 => (Ora, Immediate, 2),
        0x0A => (Asl, Accumulator, 2),
        0x0D => (Ora, Absolute, 4),
        0x0E => (Asl, Absolute, 6),

        0x10 => (Bpl, Relative, 2),
        0x11 => (Ora, IndirectY, 5),
        0x15 => (Ora, ZeroPageX, 4),
        0x16 => (Asl, ZeroPageX, 6),
        0x18 => (Clc, Implied, 2),
        0x19 => (Ora, AbsoluteY, 4),
        0x1D => (Ora, AbsoluteX, 4),
        0x1E => (Asl, AbsoluteX, 7),

        0x20 => (Jsr, Absolute, 6),
        0x21 => (And, IndirectX, 6),
        0x24 => (Bit, ZeroPage, 3),
        0x25 => (And, ZeroPage, 3),
        0x26 => (Rol, ZeroPage, 5),
        0x28 => (Plp, Implied, 4),
        0x29 => (And, Immediate, 2),
        0x2A => (Rol, Accumulator, 2),
        0x2C => (Bit, Absolute, 4),
        0x2D => (And, Absolute, 4),
        0x2E => (Rol, Absolute, 6),

        0x30 => (Bmi, Relative, 2),
        0x31 => (And, IndirectY, 5),
        0x35 => (And, ZeroPageX, 4),
        0x36 => (Rol, ZeroPageX, 6),
        0x38 => (Sec, Implied, 2),
        0x39 => (And, AbsoluteY, 4),
        0x3D => (And, AbsoluteX, 4),
        0x3E => (Rol, AbsoluteX, 7),

        0x40 => (Rti, Implied, 6),
        0x41 => (Eor, IndirectX, 6),
        0x45 => (Eor, ZeroPage, 3),
        0x46 => (Lsr, ZeroPage, 5),
        0x48 => (Pha, Implied, 3),
        0x49 => (Eor, Immediate, 2),
        0x4A => (Lsr, Accumulator, 2),
        0x4C => (Jmp, Absolute, 3),
        0x4D => (Eor, Absolute, 4),
        0x4E => (Lsr, Absolute, 6),

        0x50 => (Bvc, Relative, 2),
        0x51 => (Eor, IndirectY, 5),
        0x55 => (Eor, ZeroPageX, 4),
        0x56 => (Lsr, ZeroPageX, 6),
        0x58 => (Cli, Implied, 2),
        0x59 => (Eor, AbsoluteY, 4),
        0x5D => (Eor, AbsoluteX, 4),
        0x5E => (Lsr, AbsoluteX, 7),

        0x60 => (Rts, Implied, 6),
        0x61 => (Adc, IndirectX, 6),
        0x65 => (Adc, ZeroPage, 3),
        0x66 => (Ror, ZeroPage, 5),
        0x68 => (Pla, Implied, 4),
        0x69 => (Adc, Immediate, 2),
        0x6A => (Ror, Accumulator, 2),
        0x6C => (Jmp, AbsoluteIndirect, 5),
        0x6D => (Adc, Absolute, 4),
        0x6E => (Ror, Absolute, 6),

        0x70 => (Bvs, Relative, 2),
        0x71 => (Adc, IndirectY, 5),
        0x75 => (Adc, ZeroPageX, 4),
        0x76 => (Ror, ZeroPageX, 6),
        0x78 => (Sei, Implied, 2),
        0x79 => (Adc, AbsoluteY, 4),
        0x7D => (Adc, AbsoluteX, 4),
        0x7E => (Ror, AbsoluteX, 7),

        0x81 => (Sta, IndirectX, 6),
        0x84 => (Sty, ZeroPage, 3),
        0x85 => (Sta, ZeroPage, 3),
        0x86 => (Stx, ZeroPage, 3),
        0x88 => (Dey, Implied, 2),
        0x8A => (Txa, Implied, 2),
        0x8C => (Sty, Absolute, 4),
        0x8D => (Sta, Absolute, 4),
        0x8E => (Stx, Absolute, 4),

        0x90 => (Bcc, Relative, 2),
        0x91 => (Sta, IndirectY, 6),
        0x94 => (Sty, ZeroPageX, 4),
        0x95 => (Sta, ZeroPageX, 4),
        0x96 => (Stx, ZeroPageY, 4),
        0x98 => (Tya, Implied, 2),
        0x99 => (Sta, AbsoluteY, 5),
        0x9A => (Txs, Implied, 2),
        0x9D => (Sta, AbsoluteX, 5),

        0xA0 => (Ldy, Immediate, 2),
        0xA1 => (Lda, IndirectX, 6),
        0xA2 => (Ldx, Immediate, 2),
        0xA4 => (Ldy, ZeroPage, 3),
        0xA5 => (Lda, ZeroPage, 3),
        0xA6 => (Ldx, ZeroPage, 3),
        0xA8 => (Tay, Implied, 2),
        0xA9 => (Lda, Immediate, 2),
        0xAA => (Tax, Implied, 2),
        0xAC => (Ldy, Absolute, 4),
        0xAD => (Lda, Absolute, 4),
        0xAE => (Ldx, Absolute, 4),

        0xB0 => (Bcs, Relative, 2),
        0xB1 => (Lda, IndirectY, 5),
        0xB4 => (Ldy, ZeroPageX, 4),
        0xB5 => (Lda, ZeroPageX, 4),
        0xB6 => (Ldx, ZeroPageY, 4),
        0xB8 => (Clv, Implied, 2),
        0xB9 => (Lda, AbsoluteY, 4),
        0xBA => (Tsx, Implied, 2),
        0xBC => (Ldy, AbsoluteX, 4),
        0xBD => (Lda, AbsoluteX, 4),
        0xBE => (Ldx, AbsoluteY, 4),

        0xC0 => (Cpy, Immediate, 2),
        0xC1 => (Cmp, IndirectX, 6),
        0xC4 => (Cpy, ZeroPage, 3),
        0xC5 => (Cmp, ZeroPage, 3),
        0xC6 => (Dec, ZeroPage, 5),
        0xC8 => (Iny, Implied, 2),
        0xC9 => (Cmp, Immediate, 2),
        0xCA => (Dex, Implied, 2),
        0xCC => (Cpy, Absolute, 4),
        0xCD => (Cmp, Absolute, 4),
        0xCE => (Dec, Absolute, 6),

        0xD0 => (Bne, Relative, 2),
        0xD1 => (Cmp, IndirectY, 5),
        0xD5 => (Cmp, ZeroPageX, 4),
        0xD6 => (Dec, ZeroPageX, 6),
        0xD8 => (Cld, Implied, 2),
        0xD9 => (Cmp, AbsoluteY, 4),
        0xDD => (Cmp, AbsoluteX, 4),
        0xDE => (Dec, AbsoluteX, 7),

        0xE0 => (Cpx, Immediate, 2),
        0xE1 => (Sbc, IndirectX, 6),
        0xE4 => (Cpx, ZeroPage, 3),
        0xE5 => (Sbc, ZeroPage, 3),
        0xE6 => (Inc, ZeroPage, 5),
        0xE8 => (Inx, Implied, 2),
        0xE9 => (Sbc, Immediate, 2),
        0xEA => (Nop, Implied, 2),
        0xEC => (Cpx, Absolute, 4),
        0xED => (Sbc, Absolute, 4),
        0xEE => (Inc, Absolute, 6),

        0xF0 => (Beq, Relative, 2),
        0xF1 => (Sbc, IndirectY, 5),
        0xF5 => (Sbc, ZeroPageX, 4),
        0xF6 => (Inc, ZeroPageX, 6),
        0xF8 => (Sed, Implied, 2),
        0xF9 => (Sbc, AbsoluteY, 4),
        0xFD => (Sbc, AbsoluteX, 4),
        0xFE => (Inc, AbsoluteX, 7),

        _ => return None,
    };
    Some(Instr { op, mode, cycles })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_opcode_count() {
        assert_eq!(OPCODES.iter().flatten().count(), 151);
    }

    #[test]
    fn known_entries() {
        let lda = OPCODES[0xA9].unwrap();
        assert_eq!(lda.op, Op::Lda);
        assert_eq!(lda.mode, AddressingMode::Immediate);
        assert_eq!(lda.cycles, 2);
        assert_eq!(lda.size(), 2);

        let jmp = OPCODES[0x6C].unwrap();
        assert_eq!(jmp.op, Op::Jmp);
        assert_eq!(jmp.mode, AddressingMode::AbsoluteIndirect);
        assert_eq!(jmp.cycles, 5);

        let sta = OPCODES[0x9D].unwrap();
        assert_eq!((sta.op, sta.cycles), (Op::Sta, 5));

        assert_eq!(OPCODES[0x00].unwrap().cycles, 7);
        assert_eq!(OPCODES[0x20].unwrap().size(), 3);
    }

    #[test]
    fn undocumented_entries_are_empty() {
        for opcode in [0x02, 0x03, 0x1A, 0x80, 0x9C, 0xFF] {
            assert!(OPCODES[opcode].is_none(), "{opcode:02X}");
        }
    }

    #[test]
    fn every_mnemonic_is_three_letters() {
        for instr in OPCODES.iter().flatten() {
            assert_eq!(instr.op.mnemonic().len(), 3);
        }
    }

    #[test]
    fn branch_conditions() {
        assert_eq!(Op::Bpl.branch_taken(0), Some(true));
        assert_eq!(Op::Bpl.branch_taken(Flags::NEGATIVE), Some(false));
        assert_eq!(Op::Beq.branch_taken(Flags::ZERO), Some(true));
        assert_eq!(Op::Bcc.branch_taken(Flags::CARRY), Some(false));
        assert_eq!(Op::Bvs.branch_taken(Flags::OVERFLOW), Some(true));
        assert_eq!(Op::Jmp.branch_taken(0xFF), None);
    }

    #[test]
    fn stores_do_not_load_or_pay_page_penalty() {
        for op in [Op::Sta, Op::Stx, Op::Sty, Op::Jmp, Op::Jsr] {
            assert!(!op.loads_operand());
            assert!(!op.page_penalty());
        }
        assert!(Op::Inc.loads_operand());
        assert!(!Op::Inc.page_penalty());
    }
}
