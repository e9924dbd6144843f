use crate::cpu::Cpu;

/// Byte-addressable 64KB surface seen by the CPU.
///
/// Every 16-bit address is valid. Hosts implement this to add bank switching
/// or memory-mapped I/O by intercepting address ranges in `read`/`write`.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;

    fn write(&mut self, addr: u16, data: u8);

    /// Side-effect free read used by the tracer and the monitor.
    ///
    /// Hosts whose reads have side effects (status registers that clear on
    /// read, FIFOs) must override this.
    fn peek(&mut self, addr: u16) -> u8 {
        self.read(addr)
    }

    /// Little-endian word read. The high byte comes from `addr + 1`, wrapping at `0xFFFF`.
    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr);
        let hi = self.read(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word(&mut self, addr: u16, data: u16) {
        let [lo, hi] = data.to_le_bytes();
        self.write(addr, lo);
        self.write(addr.wrapping_add(1), hi);
    }

    // the offset never carries into the next page
    fn read_paged(&mut self, page: u8, offset: u8) -> u8 {
        self.read(u16::from_le_bytes([offset, page]))
    }

    fn write_paged(&mut self, page: u8, offset: u8, data: u8) {
        self.write(u16::from_le_bytes([offset, page]), data)
    }

    /// Zero the whole address space.
    fn clear(&mut self) {
        for addr in 0..=u16::MAX {
            self.write(addr, 0);
        }
    }
}

/// Extension points a host machine hangs off the execution loop.
///
/// All hooks run between instructions, never in the middle of one.
pub trait Host: Bus {
    /// Called once per frame budget. `frame` counts from 1.
    #[allow(unused_variables)]
    fn render(&mut self, frame: u64) {}

    /// Called after `render` on every frame boundary. The core never raises
    /// interrupts itself; hosts decide here whether to enter one, typically
    /// through [`Cpu::irq`] or [`Cpu::nmi`].
    #[allow(unused_variables)]
    fn interrupt(&mut self, cpu: &mut Cpu) {}

    /// Per-instruction trace, only called while tracing is enabled.
    fn trace(&mut self, pc: u16, text: &str) {
        tracing::trace!(target: "m6502::trace", "{pc:04X}  {text}");
    }

    fn unknown_opcode(&mut self, pc: u16, opcode: u8) {
        tracing::warn!("unknown opcode {opcode:02X} at {pc:04X}, treated as NOP");
    }
}
