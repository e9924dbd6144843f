//! ADC, SBC and compare.
//!
//! In decimal mode Zero and Negative describe the binary result. Overflow is
//! taken from the BCD sum after the low nibble is adjusted but before the
//! high nibble is, as NMOS parts do. Carry comes from the final BCD result.

use super::{bit, Cpu, Flags};

impl Cpu {
    /// `a + b + C`, setting N, V, Z and C.
    pub fn adc(&mut self, a: u8, b: u8) -> u8 {
        let carry = self.flag(Flags::CARRY) as u16;
        let sum = a as u16 + b as u16 + carry;
        let result = sum as u8;
        self.set_flag(Flags::OVERFLOW, ((a ^ result) & (b ^ result) & 0x80) != 0);
        self.set_nz(result);

        if !self.flag(Flags::DECIMAL_MODE) {
            self.set_flag(Flags::CARRY, sum > 0xFF);
            return result;
        }

        let mut lo = (a & 0x0F) as u16 + (b & 0x0F) as u16 + carry;
        if lo > 0x09 {
            lo += 0x06;
        }
        let mut bcd = (lo & 0x0F) + (a & 0xF0) as u16 + (b & 0xF0) as u16;
        if lo > 0x0F {
            bcd += 0x10;
        }
        self.set_flag(
            Flags::OVERFLOW,
            ((a as u16 ^ bcd) & 0x80) != 0 && ((a ^ b) & 0x80) == 0,
        );
        if (bcd & 0x1F0) > 0x90 {
            bcd += 0x60;
        }
        self.set_flag(Flags::CARRY, (bcd & 0xFF0) > 0xF0);
        bcd as u8
    }

    /// `a - b - !C`, setting N, V, Z and C (set when no borrow occurred).
    pub fn sbc(&mut self, a: u8, b: u8) -> u8 {
        let borrow = !self.flag(Flags::CARRY) as i16;
        let diff = a as i16 - b as i16 - borrow;
        let result = diff as u8;
        self.set_flag(Flags::CARRY, diff >= 0);
        self.set_flag(Flags::OVERFLOW, ((a ^ b) & (a ^ result) & 0x80) != 0);
        self.set_nz(result);

        if !self.flag(Flags::DECIMAL_MODE) {
            return result;
        }

        let mut lo = (a & 0x0F) as i16 - (b & 0x0F) as i16 - borrow;
        if lo < 0 {
            lo = ((lo - 0x06) & 0x0F) - 0x10;
        }
        let mut bcd = (a & 0xF0) as i16 - (b & 0xF0) as i16 + lo;
        if bcd < 0 {
            bcd -= 0x60;
        }
        bcd as u8
    }

    /// Compare without storing: C = a >= b, Z = a == b, N = bit 7 of a - b.
    pub fn cmp(&mut self, a: u8, b: u8) {
        let result = a.wrapping_sub(b);
        self.set_flag(Flags::CARRY, a >= b);
        self.set_flag(Flags::ZERO, a == b);
        self.set_flag(Flags::NEGATIVE, bit(result, 7));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(p: u8) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.set_p(p);
        cpu
    }

    #[test]
    fn adc_binary_simple() {
        let mut cpu = cpu(0);
        assert_eq!(cpu.adc(0x0F, 0x01), 0x10);
        assert!(!cpu.carry());
        assert!(!cpu.overflow());
        assert!(!cpu.zero());
        assert!(!cpu.negative());
    }

    #[test]
    fn adc_binary_carry_in_and_out() {
        let mut cpu = cpu(Flags::CARRY);
        assert_eq!(cpu.adc(0xFF, 0x00), 0x00);
        assert!(cpu.carry());
        assert!(cpu.zero());
        assert!(!cpu.overflow());
    }

    #[test]
    fn adc_binary_signed_overflow() {
        let mut cpu = cpu(0);
        assert_eq!(cpu.adc(0x50, 0x50), 0xA0);
        assert!(cpu.overflow());
        assert!(cpu.negative());
        assert!(!cpu.carry());

        assert_eq!(cpu.adc(0x90, 0x90), 0x20);
        assert!(cpu.overflow());
        assert!(cpu.carry());
    }

    #[test]
    fn adc_decimal() {
        let mut cpu = cpu(Flags::DECIMAL_MODE);
        assert_eq!(cpu.adc(0x09, 0x01), 0x10);
        assert!(!cpu.carry());

        assert_eq!(cpu.adc(0x58, 0x46), 0x04);
        assert!(cpu.carry());

        // carry from the previous add feeds in
        assert_eq!(cpu.adc(0x12, 0x34), 0x47);
        assert!(!cpu.carry());

        assert_eq!(cpu.adc(0x99, 0x01), 0x00);
        assert!(cpu.carry());
        // zero reflects the binary sum 0x9A, not the BCD result
        assert!(!cpu.zero());
    }

    #[test]
    fn adc_decimal_overflow_from_intermediate() {
        let mut cpu = cpu(Flags::DECIMAL_MODE);
        assert_eq!(cpu.adc(0x79, 0x01), 0x80);
        assert!(cpu.overflow());
        assert!(!cpu.carry());
        assert!(!cpu.negative());

        assert_eq!(cpu.adc(0x24, 0x56), 0x80);
        assert!(cpu.overflow());

        assert_eq!(cpu.adc(0x12, 0x34), 0x46);
        assert!(!cpu.overflow());

        // operands of opposite sign never overflow
        assert_eq!(cpu.adc(0x90, 0x01), 0x91);
        assert!(!cpu.overflow());
    }

    #[test]
    fn sbc_binary() {
        let mut cpu = cpu(Flags::CARRY);
        assert_eq!(cpu.sbc(0x05, 0x03), 0x02);
        assert!(cpu.carry());
        assert!(!cpu.negative());

        assert_eq!(cpu.sbc(0x03, 0x05), 0xFE);
        assert!(!cpu.carry());
        assert!(cpu.negative());

        // borrow in
        assert_eq!(cpu.sbc(0x05, 0x03), 0x01);
        assert!(cpu.carry());
    }

    #[test]
    fn sbc_binary_overflow() {
        let mut cpu = cpu(Flags::CARRY);
        assert_eq!(cpu.sbc(0x80, 0x01), 0x7F);
        assert!(cpu.overflow());
        assert_eq!(cpu.sbc(0x7F, 0xFF), 0x80);
        assert!(cpu.overflow());
        cpu.set_carry(true);
        assert_eq!(cpu.sbc(0x40, 0x10), 0x30);
        assert!(!cpu.overflow());
    }

    #[test]
    fn sbc_decimal() {
        let mut cpu = cpu(Flags::DECIMAL_MODE | Flags::CARRY);
        assert_eq!(cpu.sbc(0x10, 0x01), 0x09);
        assert!(cpu.carry());

        assert_eq!(cpu.sbc(0x46, 0x12), 0x34);
        assert!(cpu.carry());

        assert_eq!(cpu.sbc(0x00, 0x01), 0x99);
        assert!(!cpu.carry());

        // borrow in
        assert_eq!(cpu.sbc(0x40, 0x13), 0x26);
        assert!(cpu.carry());
    }

    #[test]
    fn cmp_flags() {
        let mut cpu = cpu(0);
        cpu.cmp(0x05, 0x05);
        assert!(cpu.carry());
        assert!(cpu.zero());
        assert!(!cpu.negative());

        cpu.cmp(0x03, 0x05);
        assert!(!cpu.carry());
        assert!(!cpu.zero());
        assert!(cpu.negative());

        cpu.cmp(0x80, 0x01);
        assert!(cpu.carry());
        assert!(!cpu.negative());
    }
}
