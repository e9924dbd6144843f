//! Flat 64KB RAM

use crate::bus::{Bus, Host};

pub struct Mem {
    inner: Vec<u8>,
}

impl Mem {
    pub fn new() -> Self {
        Self {
            inner: vec![0; 0x10000],
        }
    }

    /// Copy `data` in starting at `addr`. Wraps past `0xFFFF` back to `0x0000`.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.inner[addr.wrapping_add(i as u16) as usize] = *byte;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}

impl Default for Mem {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for Mem {
    fn read(&mut self, addr: u16) -> u8 {
        self.inner[addr as usize]
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.inner[addr as usize] = data;
    }

    fn clear(&mut self) {
        self.inner.fill(0);
    }
}

impl Host for Mem {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_little_endian() {
        let mut mem = Mem::new();
        mem.write_word(0x1234, 0xBEEF);
        assert_eq!(mem.read(0x1234), 0xEF);
        assert_eq!(mem.read(0x1235), 0xBE);
        assert_eq!(mem.read_word(0x1234), 0xBEEF);
    }

    #[test]
    fn word_read_wraps_at_top_of_memory() {
        let mut mem = Mem::new();
        mem.write(0xFFFF, 0x34);
        mem.write(0x0000, 0x12);
        assert_eq!(mem.read_word(0xFFFF), 0x1234);
    }

    #[test]
    fn paged_access_composes_address() {
        let mut mem = Mem::new();
        mem.write_paged(0x01, 0xFF, 0xAA);
        assert_eq!(mem.read(0x01FF), 0xAA);
        assert_eq!(mem.read_paged(0x01, 0xFF), 0xAA);
        // offset arithmetic stays inside the page
        assert_eq!(mem.read_paged(0x01, 0xFFu8.wrapping_add(1)), mem.read(0x0100));
    }

    #[test]
    fn load_wraps_and_clear_zeroes() {
        let mut mem = Mem::new();
        mem.load(0xFFFE, &[1, 2, 3]);
        assert_eq!(mem.read(0xFFFE), 1);
        assert_eq!(mem.read(0xFFFF), 2);
        assert_eq!(mem.read(0x0000), 3);
        mem.clear();
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }
}
