//! MOS 6502 Emulation
//!
//! Instruction-level NMOS 6502 core. Each call to [`Cpu::step`] fetches,
//! decodes and executes exactly one instruction and reports its whole
//! cycle cost; there is no sub-instruction timing.

use crate::bus::Bus;

mod addressing;
mod alu;
mod disasm;
mod opcodes;


pub use addressing::{AddressingMode, Operand};
pub use disasm::disassemble;
pub use opcodes::{Instr, Op, OPCODES};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles per frame for a 1MHz part paced at 50 frames per second.
pub const BASE_CYCLES_PER_FRAME: f64 = 20_000.0;

/// PAL VIC-20 clock.
pub const DEFAULT_CLOCK_MHZ: f64 = 1.108;

const STACK_PAGE: u8 = 0x01;

const UNKNOWN_OPCODE_CYCLES: u8 = 2;

const INTERRUPT_CYCLES: u8 = 7;

pub enum Flags {}

impl Flags {
    pub const CARRY: u8 = 1 << 0;
    pub const ZERO: u8 = 1 << 1;
    pub const INTERRUPT_DISABLE: u8 = 1 << 2;
    pub const DECIMAL_MODE: u8 = 1 << 3;
    pub const BREAK: u8 = 1 << 4;
    pub const UNUSED: u8 = 1 << 5;
    pub const OVERFLOW: u8 = 1 << 6;
    pub const NEGATIVE: u8 = 1 << 7;
}

/// Test bit `index` (0 = least significant) of any byte.
#[inline]
pub const fn bit(value: u8, index: u8) -> bool {
    (value >> index) & 1 != 0
}

/// Return `value` with bit `index` forced to `set`.
#[inline]
pub const fn with_bit(value: u8, index: u8, set: bool) -> u8 {
    if set {
        value | (1 << index)
    } else {
        value & !(1 << index)
    }
}

/// Frame budget for a clock of `mhz` megahertz.
pub fn cycles_for_clock(mhz: f64) -> u32 {
    (mhz * BASE_CYCLES_PER_FRAME) as u32
}

/// Outcome of a single fetch-decode-execute step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// PC before the opcode was fetched.
    pub pc: u16,
    pub opcode: u8,
    pub cycles: u8,
    /// False when the opcode is not a documented instruction.
    pub known: bool,
}

macro_rules! flag_accessors {
    ($($get:ident, $set:ident => $mask:expr;)*) => {
        $(
            pub fn $get(&self) -> bool {
                self.flag($mask)
            }

            pub fn $set(&mut self, value: bool) {
                self.set_flag($mask, value)
            }
        )*
    };
}

#[derive(Debug, Clone)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    p: u8,
    s: u8,
    pc: u16,

    cycle_count: u32,
    cycles_per_frame: u32,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            p: 0,
            s: 0xFF,
            pc: 0,
            cycle_count: 0,
            cycles_per_frame: cycles_for_clock(DEFAULT_CLOCK_MHZ),
        }
    }

    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn p(&self) -> u8 {
        self.p
    }

    pub fn s(&self) -> u8 {
        self.s
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    pub fn set_x(&mut self, value: u8) {
        self.x = value;
    }

    pub fn set_y(&mut self, value: u8) {
        self.y = value;
    }

    pub fn set_p(&mut self, value: u8) {
        self.p = value;
    }

    pub fn set_s(&mut self, value: u8) {
        self.s = value;
    }

    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub fn flag(&self, mask: u8) -> bool {
        (self.p & mask) != 0
    }

    pub fn set_flag(&mut self, mask: u8, value: bool) {
        if value {
            self.p |= mask;
        } else {
            self.p &= !mask;
        }
    }

    flag_accessors! {
        carry, set_carry => Flags::CARRY;
        zero, set_zero => Flags::ZERO;
        interrupt_disable, set_interrupt_disable => Flags::INTERRUPT_DISABLE;
        decimal, set_decimal => Flags::DECIMAL_MODE;
        brk, set_brk => Flags::BREAK;
        overflow, set_overflow => Flags::OVERFLOW;
        negative, set_negative => Flags::NEGATIVE;
    }

    /// Cycles elapsed since the last frame boundary.
    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn reset_cycle_count(&mut self) {
        self.cycle_count = 0;
    }

    pub fn cycles_per_frame(&self) -> u32 {
        self.cycles_per_frame
    }

    /// Takes effect at the next frame boundary check.
    pub fn set_cycles_per_frame(&mut self, cycles: u32) {
        self.cycles_per_frame = cycles;
    }

    pub fn set_processor_speed(&mut self, mhz: f64) {
        self.set_cycles_per_frame(cycles_for_clock(mhz));
    }

    /// Zero A, X, Y and P, set S to `0xFF` and clear all of memory.
    ///
    /// PC is left alone; hosts load it explicitly, e.g. with
    /// [`Cpu::jump_to_reset_vector`] after loading a ROM.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.p = 0;
        self.s = 0xFF;
        self.cycle_count = 0;
        bus.clear();
        tracing::debug!("cpu reset, pc left at {:04X}", self.pc);
    }

    pub fn jump_to_reset_vector<B: Bus>(&mut self, bus: &mut B) {
        self.jump_to_address_at(bus, RESET_VECTOR);
    }

    /// Load PC from the little-endian word stored at `vector`.
    pub fn jump_to_address_at<B: Bus>(&mut self, bus: &mut B, vector: u16) {
        self.pc = bus.read_word(vector);
    }

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let data = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        data
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    pub fn push<B: Bus>(&mut self, bus: &mut B, data: u8) {
        bus.write_paged(STACK_PAGE, self.s, data);
        self.s = self.s.wrapping_sub(1);
    }

    /// Push high byte first so the word reads back little-endian.
    pub fn push_word<B: Bus>(&mut self, bus: &mut B, data: u16) {
        let [lo, hi] = data.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    pub fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.s = self.s.wrapping_add(1);
        bus.read_paged(STACK_PAGE, self.s)
    }

    pub fn pull_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Hardware interrupt entry through `vector`.
    ///
    /// Pushes PC and P (Break clear, Unused set), sets InterruptDisable and
    /// loads PC from the vector. The 7 cycles are charged to the current frame.
    pub fn interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16) {
        tracing::debug!("interrupt via {vector:04X} from {:04X}", self.pc);
        self.push_word(bus, self.pc);
        self.push(bus, (self.p | Flags::UNUSED) & !Flags::BREAK);
        self.p |= Flags::INTERRUPT_DISABLE;
        self.jump_to_address_at(bus, vector);
        self.cycle_count = self.cycle_count.wrapping_add(INTERRUPT_CYCLES as u32);
    }

    /// Maskable interrupt. Returns false when InterruptDisable is set.
    pub fn irq<B: Bus>(&mut self, bus: &mut B) -> bool {
        if self.flag(Flags::INTERRUPT_DISABLE) {
            return false;
        }
        self.interrupt(bus, IRQ_VECTOR);
        true
    }

    pub fn nmi<B: Bus>(&mut self, bus: &mut B) {
        self.interrupt(bus, NMI_VECTOR);
    }

    fn set_nz(&mut self, value: u8) {
        self.set_flag(Flags::NEGATIVE, bit(value, 7));
        self.set_flag(Flags::ZERO, value == 0);
    }

    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Step {
        let pc = self.pc;
        let opcode = self.fetch(bus);
        let (cycles, known) = match OPCODES[opcode as usize] {
            Some(instr) => (self.execute(bus, instr), true),
            None => (UNKNOWN_OPCODE_CYCLES, false),
        };
        self.cycle_count = self.cycle_count.wrapping_add(cycles as u32);
        Step {
            pc,
            opcode,
            cycles,
            known,
        }
    }

    fn execute<B: Bus>(&mut self, bus: &mut B, instr: Instr) -> u8 {
        let Instr { op, mode, cycles } = instr;
        let branch = op.branch_taken(self.p);
        let operand = self.resolve(bus, mode, op.loads_operand(), branch.unwrap_or(false));
        let Operand { value, addr, .. } = operand;

        match op {
            Op::Lda => {
                self.a = value;
                self.set_nz(self.a);
            }
            Op::Ldx => {
                self.x = value;
                self.set_nz(self.x);
            }
            Op::Ldy => {
                self.y = value;
                self.set_nz(self.y);
            }

            Op::Sta => bus.write(addr, self.a),
            Op::Stx => bus.write(addr, self.x),
            Op::Sty => bus.write(addr, self.y),

            Op::Tax => {
                self.x = self.a;
                self.set_nz(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.set_nz(self.y);
            }
            Op::Txa => {
                self.a = self.x;
                self.set_nz(self.a);
            }
            Op::Tya => {
                self.a = self.y;
                self.set_nz(self.a);
            }
            Op::Tsx => {
                self.x = self.s;
                self.set_nz(self.x);
            }
            Op::Txs => {
                self.s = self.x;
            }

            Op::Inc => {
                let result = value.wrapping_add(1);
                bus.write(addr, result);
                self.set_nz(result);
            }
            Op::Dec => {
                let result = value.wrapping_sub(1);
                bus.write(addr, result);
                self.set_nz(result);
            }
            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_nz(self.y);
            }

            Op::Asl => {
                let result = value << 1;
                self.set_flag(Flags::CARRY, bit(value, 7));
                self.write_back(bus, mode, addr, result);
            }
            Op::Lsr => {
                let result = value >> 1;
                self.set_flag(Flags::CARRY, bit(value, 0));
                self.write_back(bus, mode, addr, result);
            }
            Op::Rol => {
                let result = with_bit(value << 1, 0, self.flag(Flags::CARRY));
                self.set_flag(Flags::CARRY, bit(value, 7));
                self.write_back(bus, mode, addr, result);
            }
            Op::Ror => {
                let result = with_bit(value >> 1, 7, self.flag(Flags::CARRY));
                self.set_flag(Flags::CARRY, bit(value, 0));
                self.write_back(bus, mode, addr, result);
            }

            Op::And => self.apply_accumulator(value, |a, data| a & data),
            Op::Ora => self.apply_accumulator(value, |a, data| a | data),
            Op::Eor => self.apply_accumulator(value, |a, data| a ^ data),

            Op::Cmp => self.cmp(self.a, value),
            Op::Cpx => self.cmp(self.x, value),
            Op::Cpy => self.cmp(self.y, value),

            Op::Adc => self.a = self.adc(self.a, value),
            Op::Sbc => self.a = self.sbc(self.a, value),

            // the resolver has already moved PC when the branch is taken
            Op::Bpl | Op::Bmi | Op::Bvc | Op::Bvs | Op::Bcc | Op::Bcs | Op::Bne | Op::Beq => {}

            Op::Jmp => self.pc = addr,
            Op::Jsr => {
                // return address is the last byte of the JSR itself
                self.push_word(bus, self.pc.wrapping_sub(1));
                self.pc = addr;
            }
            Op::Rts => {
                self.pc = self.pull_word(bus).wrapping_add(1);
            }

            Op::Pha => self.push(bus, self.a),
            Op::Pla => {
                self.a = self.pull(bus);
                self.set_nz(self.a);
            }
            Op::Php => self.push(bus, self.p | Flags::BREAK | Flags::UNUSED),
            Op::Plp => {
                let data = self.pull(bus);
                self.p = (data | Flags::UNUSED) & !Flags::BREAK;
            }

            Op::Clc => self.p &= !Flags::CARRY,
            Op::Sec => self.p |= Flags::CARRY,
            Op::Cli => self.p &= !Flags::INTERRUPT_DISABLE,
            Op::Sei => self.p |= Flags::INTERRUPT_DISABLE,
            Op::Cld => self.p &= !Flags::DECIMAL_MODE,
            Op::Sed => self.p |= Flags::DECIMAL_MODE,
            Op::Clv => self.p &= !Flags::OVERFLOW,

            Op::Brk => {
                // the byte after BRK is a padding/signature byte and is skipped on return
                self.push_word(bus, self.pc.wrapping_add(1));
                self.push(bus, self.p | Flags::BREAK | Flags::UNUSED);
                self.p |= Flags::INTERRUPT_DISABLE;
                self.jump_to_address_at(bus, IRQ_VECTOR);
            }
            Op::Rti => {
                let data = self.pull(bus);
                self.p = (data | Flags::UNUSED) & !Flags::BREAK;
                self.pc = self.pull_word(bus);
            }

            Op::Bit => {
                self.set_flag(Flags::ZERO, (self.a & value) == 0);
                self.set_flag(Flags::NEGATIVE, bit(value, 7));
                self.set_flag(Flags::OVERFLOW, bit(value, 6));
            }

            Op::Nop => {}
        }

        let extra = if op.page_penalty() || branch.is_some() {
            operand.extra_cycles
        } else {
            0
        };
        cycles + extra
    }

    fn apply_accumulator(&mut self, value: u8, f: impl FnOnce(u8, u8) -> u8) {
        self.a = f(self.a, value);
        self.set_nz(self.a);
    }

    // shifts and rotates target either A or memory depending on the mode
    fn write_back<B: Bus>(&mut self, bus: &mut B, mode: AddressingMode, addr: u16, value: u8) {
        if mode == AddressingMode::Accumulator {
            self.a = value;
        } else {
            bus.write(addr, value);
        }
        self.set_nz(value);
    }
}
