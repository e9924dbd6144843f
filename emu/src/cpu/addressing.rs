use crate::bus::Bus;

use super::Cpu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteIndirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_len(self) -> u16 {
        match self {
            Self::Implied | Self::Accumulator => 0,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::IndirectX
            | Self::IndirectY
            | Self::Relative => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::AbsoluteIndirect => 2,
        }
    }
}

/// Resolved operand of one instruction. Discarded once the instruction completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Operand {
    /// Only meaningful for `Accumulator`, `Immediate`, or when the value was loaded.
    pub value: u8,
    /// Effective address, or the branch target for a taken `Relative`.
    pub addr: u16,
    /// Page-cross penalty for indexed modes; taken (+1) and page-cross (+1) for branches.
    pub extra_cycles: u8,
}

fn page_crossed(from: u16, to: u16) -> bool {
    (from & 0xFF00) != (to & 0xFF00)
}

impl Cpu {
    /// Consume the operand bytes for `mode` and compute the effective operand.
    ///
    /// `load` controls whether the value at the effective address is read;
    /// stores pass false so write-only I/O registers are not touched.
    /// `branch` is the condition for `Relative`; a taken branch moves PC.
    pub(crate) fn resolve<B: Bus>(
        &mut self,
        bus: &mut B,
        mode: AddressingMode,
        load: bool,
        branch: bool,
    ) -> Operand {
        match mode {
            AddressingMode::Implied => Operand::default(),

            AddressingMode::Accumulator => Operand {
                value: self.a,
                ..Operand::default()
            },

            AddressingMode::Immediate => {
                let addr = self.pc;
                let value = self.fetch(bus);
                Operand {
                    value,
                    addr,
                    extra_cycles: 0,
                }
            }

            AddressingMode::ZeroPage => {
                let addr = self.fetch(bus) as u16;
                Self::operand_at(bus, addr, load, 0)
            }

            // indexing wraps inside page zero
            AddressingMode::ZeroPageX => {
                let addr = self.fetch(bus).wrapping_add(self.x) as u16;
                Self::operand_at(bus, addr, load, 0)
            }

            AddressingMode::ZeroPageY => {
                let addr = self.fetch(bus).wrapping_add(self.y) as u16;
                Self::operand_at(bus, addr, load, 0)
            }

            AddressingMode::Absolute => {
                let addr = self.fetch_word(bus);
                Self::operand_at(bus, addr, load, 0)
            }

            AddressingMode::AbsoluteX => {
                let base = self.fetch_word(bus);
                let addr = base.wrapping_add(self.x as u16);
                Self::operand_at(bus, addr, load, page_crossed(base, addr) as u8)
            }

            AddressingMode::AbsoluteY => {
                let base = self.fetch_word(bus);
                let addr = base.wrapping_add(self.y as u16);
                Self::operand_at(bus, addr, load, page_crossed(base, addr) as u8)
            }

            // NMOS quirk: a pointer at $xxFF takes its high byte from $xx00
            AddressingMode::AbsoluteIndirect => {
                let [lo, page] = self.fetch_word(bus).to_le_bytes();
                let target_lo = bus.read_paged(page, lo);
                let target_hi = bus.read_paged(page, lo.wrapping_add(1));
                Operand {
                    value: 0,
                    addr: u16::from_le_bytes([target_lo, target_hi]),
                    extra_cycles: 0,
                }
            }

            AddressingMode::IndirectX => {
                let ptr = self.fetch(bus).wrapping_add(self.x);
                let lo = bus.read_paged(0, ptr);
                let hi = bus.read_paged(0, ptr.wrapping_add(1));
                Self::operand_at(bus, u16::from_le_bytes([lo, hi]), load, 0)
            }

            AddressingMode::IndirectY => {
                let ptr = self.fetch(bus);
                let base_lo = bus.read_paged(0, ptr);
                let base_hi = bus.read_paged(0, ptr.wrapping_add(1));
                let (lo, carry) = base_lo.overflowing_add(self.y);
                let hi = base_hi.wrapping_add(carry as u8);
                Self::operand_at(bus, u16::from_le_bytes([lo, hi]), load, carry as u8)
            }

            AddressingMode::Relative => {
                let offset = self.fetch(bus) as i8;
                if !branch {
                    return Operand {
                        value: 0,
                        addr: self.pc,
                        extra_cycles: 0,
                    };
                }
                let target = self.pc.wrapping_add_signed(offset as i16);
                let extra_cycles = 1 + page_crossed(self.pc, target) as u8;
                self.pc = target;
                Operand {
                    value: 0,
                    addr: target,
                    extra_cycles,
                }
            }
        }
    }

    fn operand_at<B: Bus>(bus: &mut B, addr: u16, load: bool, extra_cycles: u8) -> Operand {
        let value = if load { bus.read(addr) } else { 0 };
        Operand {
            value,
            addr,
            extra_cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::Mem;

    fn setup(operand: &[u8]) -> (Cpu, Mem) {
        let mut cpu = Cpu::new();
        let mut mem = Mem::new();
        cpu.set_pc(0x0200);
        mem.load(0x0200, operand);
        (cpu, mem)
    }

    #[test]
    fn zero_page_x_wraps_within_page_zero() {
        let (mut cpu, mut mem) = setup(&[0xFF]);
        cpu.set_x(0xFF);
        mem.write(0x00FE, 0x42);
        let operand = cpu.resolve(&mut mem, AddressingMode::ZeroPageX, true, false);
        assert_eq!(operand.addr, 0x00FE);
        assert_eq!(operand.value, 0x42);
        assert_eq!(cpu.pc(), 0x0201);
    }

    #[test]
    fn zero_page_y_wraps_within_page_zero() {
        let (mut cpu, mut mem) = setup(&[0x80]);
        cpu.set_y(0x90);
        let operand = cpu.resolve(&mut mem, AddressingMode::ZeroPageY, false, false);
        assert_eq!(operand.addr, 0x0010);
    }

    #[test]
    fn absolute_x_reports_page_cross() {
        let (mut cpu, mut mem) = setup(&[0xF0, 0x12, 0xF0, 0x12]);
        cpu.set_x(0x0F);
        let same = cpu.resolve(&mut mem, AddressingMode::AbsoluteX, false, false);
        assert_eq!(same.addr, 0x12FF);
        assert_eq!(same.extra_cycles, 0);
        cpu.set_x(0x10);
        let crossed = cpu.resolve(&mut mem, AddressingMode::AbsoluteX, false, false);
        assert_eq!(crossed.addr, 0x1300);
        assert_eq!(crossed.extra_cycles, 1);
        assert_eq!(cpu.pc(), 0x0204);
    }

    #[test]
    fn absolute_y_wraps_address_space() {
        let (mut cpu, mut mem) = setup(&[0xFF, 0xFF]);
        cpu.set_y(0x02);
        let operand = cpu.resolve(&mut mem, AddressingMode::AbsoluteY, false, false);
        assert_eq!(operand.addr, 0x0001);
        assert_eq!(operand.extra_cycles, 1);
    }

    #[test]
    fn indirect_x_pointer_wraps_in_page_zero() {
        let (mut cpu, mut mem) = setup(&[0xFE]);
        cpu.set_x(0x01);
        mem.write(0x00FF, 0x34);
        mem.write(0x0000, 0x12);
        mem.write(0x1234, 0x99);
        let operand = cpu.resolve(&mut mem, AddressingMode::IndirectX, true, false);
        assert_eq!(operand.addr, 0x1234);
        assert_eq!(operand.value, 0x99);
    }

    #[test]
    fn indirect_y_carries_into_high_byte() {
        let (mut cpu, mut mem) = setup(&[0x10]);
        cpu.set_y(0x20);
        mem.write(0x0010, 0xF0);
        mem.write(0x0011, 0x12);
        mem.write(0x1310, 0x55);
        let operand = cpu.resolve(&mut mem, AddressingMode::IndirectY, true, false);
        assert_eq!(operand.addr, 0x1310);
        assert_eq!(operand.value, 0x55);
        assert_eq!(operand.extra_cycles, 1);
    }

    #[test]
    fn indirect_y_pointer_high_byte_wraps_in_page_zero() {
        let (mut cpu, mut mem) = setup(&[0xFF]);
        mem.write(0x00FF, 0x00);
        mem.write(0x0000, 0x30);
        let operand = cpu.resolve(&mut mem, AddressingMode::IndirectY, false, false);
        assert_eq!(operand.addr, 0x3000);
        assert_eq!(operand.extra_cycles, 0);
    }

    #[test]
    fn absolute_indirect_reproduces_page_wrap() {
        let (mut cpu, mut mem) = setup(&[0xFF, 0x30]);
        mem.write(0x30FF, 0x80);
        mem.write(0x3000, 0x50);
        mem.write(0x3100, 0x40);
        let operand = cpu.resolve(&mut mem, AddressingMode::AbsoluteIndirect, false, false);
        assert_eq!(operand.addr, 0x5080);
    }

    #[test]
    fn relative_not_taken_only_consumes_operand() {
        let (mut cpu, mut mem) = setup(&[0x10]);
        let operand = cpu.resolve(&mut mem, AddressingMode::Relative, false, false);
        assert_eq!(cpu.pc(), 0x0201);
        assert_eq!(operand.extra_cycles, 0);
    }

    #[test]
    fn relative_backwards_across_page() {
        let (mut cpu, mut mem) = setup(&[0xFB]); // -5
        let operand = cpu.resolve(&mut mem, AddressingMode::Relative, false, true);
        assert_eq!(cpu.pc(), 0x01FC);
        assert_eq!(operand.extra_cycles, 2);
    }

    #[test]
    fn accumulator_and_implied_consume_nothing() {
        let (mut cpu, mut mem) = setup(&[]);
        cpu.set_a(0x7E);
        let operand = cpu.resolve(&mut mem, AddressingMode::Accumulator, true, false);
        assert_eq!(operand.value, 0x7E);
        cpu.resolve(&mut mem, AddressingMode::Implied, true, false);
        assert_eq!(cpu.pc(), 0x0200);
    }

    #[test]
    fn operand_lengths() {
        assert_eq!(AddressingMode::Implied.operand_len(), 0);
        assert_eq!(AddressingMode::IndirectY.operand_len(), 1);
        assert_eq!(AddressingMode::AbsoluteIndirect.operand_len(), 2);
    }
}
