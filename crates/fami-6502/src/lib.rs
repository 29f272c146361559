//! MOS 6502 / Ricoh 2A03 CPU emulator.
//!
//! Instruction-stepped interpreter: `step()` executes one complete
//! instruction (or consumes one cycle of a DMA stall) and returns the
//! cycle count. Decoding goes through a 256-entry table; execution
//! performs the hardware's exact bus access sequence, so one bus access
//! is one cycle and dummy reads land where real chips put them.
//!
//! The commonly-used undocumented opcodes are implemented: SLO, RLA,
//! SRE, RRA, DCP, ISC, LAX, SAX, ANC, ALR, ARR, AXS, plus the multi-byte
//! NOPs. Opcodes with no defined behaviour decode as one-byte NOPs.
//!
//! Decimal mode is wired but disabled by default: the Ricoh 2A03 in the
//! NES ties the D flag off. Enable it with [`Cpu6502::with_decimal_mode`]
//! for 6502/6510 work.

use fami_core::Bus;
use serde::{Deserialize, Serialize};

mod addressing;
mod opcodes;

pub use opcodes::{OpEntry, OPCODES};

/// Addressing modes of the 6502.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Imp,
    Acc,
    Imm,
    Zp,
    ZpX,
    ZpY,
    Abs,
    AbX,
    AbY,
    Ind,
    IzX,
    IzY,
    Rel,
}

/// Instructions, official and undocumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx,
    Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp,
    Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay,
    Tsx, Txa, Txs, Tya,
    // Undocumented
    Slo, Rla, Sre, Rra, Dcp, Isc, Lax, Sax, Anc, Alr, Arr, Axs,
}

/// Interrupt kinds, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Highest priority; always serviced.
    Reset,
    /// Edge-triggered; cleared on acknowledgement.
    Nmi,
    /// Level-triggered; stays asserted until the device deasserts.
    Irq,
}

/// Serializable CPU register and interrupt state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub pc: u16,
    pub p: u8,
    pub nmi_pending: bool,
    pub irq_line: bool,
    pub reset_pending: bool,
    pub halt_cycles: u32,
    pub cycles: u64,
}

/// The CPU. Status flags are held as individual booleans; the packed
/// byte only materialises on stack pushes and state capture.
#[derive(Debug)]
pub struct Cpu6502 {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub pc: u16,

    pub flag_c: bool,
    pub flag_z: bool,
    pub flag_i: bool,
    pub flag_d: bool,
    pub flag_v: bool,
    pub flag_n: bool,

    decimal_enabled: bool,

    nmi_pending: bool,
    irq_line: bool,
    reset_pending: bool,

    /// DMA stall cycles still owed.
    halt_cycles: u32,
    /// Total cycles executed since power-on.
    cycles: u64,
    /// Scratch counter for the cycle count of the current step.
    pub(crate) step_cycles: u32,
}

impl Default for Cpu6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu6502 {
    /// Create a CPU in its power-on state (2A03 flavour: no decimal).
    /// The reset sequence drops S by three, landing at the canonical
    /// $FD.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0x00,
            pc: 0,
            flag_c: false,
            flag_z: false,
            flag_i: true,
            flag_d: false,
            flag_v: false,
            flag_n: false,
            decimal_enabled: false,
            nmi_pending: false,
            irq_line: false,
            reset_pending: false,
            halt_cycles: 0,
            cycles: 0,
            step_cycles: 0,
        }
    }

    /// Enable or disable decimal arithmetic (NMOS 6502 honours D; the
    /// NES 2A03 does not).
    #[must_use]
    pub fn with_decimal_mode(mut self, enabled: bool) -> Self {
        self.decimal_enabled = enabled;
        self
    }

    /// Assert an interrupt line.
    pub fn request_irq(&mut self, kind: Interrupt) {
        match kind {
            Interrupt::Reset => self.reset_pending = true,
            Interrupt::Nmi => self.nmi_pending = true,
            Interrupt::Irq => self.irq_line = true,
        }
    }

    /// Deassert an interrupt line.
    pub fn clear_irq(&mut self, kind: Interrupt) {
        match kind {
            Interrupt::Reset => self.reset_pending = false,
            Interrupt::Nmi => self.nmi_pending = false,
            Interrupt::Irq => self.irq_line = false,
        }
    }

    /// Stall the CPU for `cycles` (OAM DMA, DMC DMA).
    pub fn halt(&mut self, cycles: u32) {
        self.halt_cycles += cycles;
    }

    /// Stall cycles still owed.
    #[must_use]
    pub fn halt_cycles(&self) -> u32 {
        self.halt_cycles
    }

    /// Total cycles executed since power-on.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.cycles
    }

    /// Pack the status flags into the NV-BDIZC byte. Bit 5 reads 1;
    /// bit 4 (B) is set only on BRK/PHP pushes.
    #[must_use]
    pub fn status_byte(&self, brk: bool) -> u8 {
        u8::from(self.flag_c)
            | u8::from(self.flag_z) << 1
            | u8::from(self.flag_i) << 2
            | u8::from(self.flag_d) << 3
            | u8::from(brk) << 4
            | 1 << 5
            | u8::from(self.flag_v) << 6
            | u8::from(self.flag_n) << 7
    }

    /// Unpack a status byte (B and bit 5 are ignored).
    pub fn set_status_byte(&mut self, p: u8) {
        self.flag_c = p & 0x01 != 0;
        self.flag_z = p & 0x02 != 0;
        self.flag_i = p & 0x04 != 0;
        self.flag_d = p & 0x08 != 0;
        self.flag_v = p & 0x40 != 0;
        self.flag_n = p & 0x80 != 0;
    }

    /// Capture register and interrupt state.
    #[must_use]
    pub fn save_state(&self) -> CpuState {
        CpuState {
            a: self.a,
            x: self.x,
            y: self.y,
            s: self.s,
            pc: self.pc,
            p: self.status_byte(false),
            nmi_pending: self.nmi_pending,
            irq_line: self.irq_line,
            reset_pending: self.reset_pending,
            halt_cycles: self.halt_cycles,
            cycles: self.cycles,
        }
    }

    /// Restore register and interrupt state.
    pub fn load_state(&mut self, state: &CpuState) {
        self.a = state.a;
        self.x = state.x;
        self.y = state.y;
        self.s = state.s;
        self.pc = state.pc;
        self.set_status_byte(state.p);
        self.nmi_pending = state.nmi_pending;
        self.irq_line = state.irq_line;
        self.reset_pending = state.reset_pending;
        self.halt_cycles = state.halt_cycles;
        self.cycles = state.cycles;
    }

    fn set_nz(&mut self, value: u8) {
        self.flag_z = value == 0;
        self.flag_n = value & 0x80 != 0;
    }

    // === ALU ===

    fn alu_adc(&mut self, value: u8) {
        if self.decimal_enabled && self.flag_d {
            self.alu_adc_decimal(value);
        } else {
            self.alu_adc_binary(value);
        }
    }

    fn alu_adc_binary(&mut self, value: u8) {
        let a = self.a;
        let carry = u16::from(self.flag_c);
        let sum = u16::from(a) + u16::from(value) + carry;
        let result = sum as u8;
        self.flag_c = sum > 0xFF;
        self.flag_v = (a ^ result) & (value ^ result) & 0x80 != 0;
        self.a = result;
        self.set_nz(result);
    }

    fn alu_adc_decimal(&mut self, value: u8) {
        let a = self.a;
        let carry = u8::from(self.flag_c);

        let mut lo = (a & 0x0F) + (value & 0x0F) + carry;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = (a >> 4) + (value >> 4) + u8::from(lo > 0x0F);

        // Z, N and V come from the intermediate binary result (NMOS).
        let bin = (u16::from(a) + u16::from(value) + u16::from(carry)) as u8;
        self.flag_z = bin == 0;
        self.flag_n = hi & 0x08 != 0;
        self.flag_v = (a ^ bin) & (value ^ bin) & 0x80 != 0;

        if hi > 9 {
            hi += 6;
        }
        self.flag_c = hi > 0x0F;
        self.a = (hi << 4) | (lo & 0x0F);
    }

    fn alu_sbc(&mut self, value: u8) {
        if self.decimal_enabled && self.flag_d {
            self.alu_sbc_decimal(value);
        } else {
            // SBC is ADC with the operand inverted.
            self.alu_adc_binary(!value);
        }
    }

    fn alu_sbc_decimal(&mut self, value: u8) {
        let a = i16::from(self.a);
        let v = i16::from(value);
        let borrow = i16::from(!self.flag_c);

        let bin = a - v - borrow;
        self.flag_c = bin >= 0;
        self.flag_z = (bin as u8) == 0;
        self.flag_n = bin & 0x80 != 0;
        self.flag_v = (a ^ bin) & (a ^ v) & 0x80 != 0;

        let mut lo = (a & 0x0F) - (v & 0x0F) - borrow;
        let mut hi = (a >> 4) - (v >> 4);
        if lo < 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 6;
        }
        self.a = (((hi << 4) as u8) & 0xF0) | ((lo as u8) & 0x0F);
    }

    fn compare(&mut self, reg: u8, value: u8) {
        let result = reg.wrapping_sub(value);
        self.flag_c = reg >= value;
        self.set_nz(result);
    }

    fn alu_bit(&mut self, value: u8) {
        self.flag_z = self.a & value == 0;
        self.flag_n = value & 0x80 != 0;
        self.flag_v = value & 0x40 != 0;
    }

    fn alu_asl(&mut self, value: u8) -> u8 {
        self.flag_c = value & 0x80 != 0;
        let result = value << 1;
        self.set_nz(result);
        result
    }

    fn alu_lsr(&mut self, value: u8) -> u8 {
        self.flag_c = value & 0x01 != 0;
        let result = value >> 1;
        self.set_nz(result);
        result
    }

    fn alu_rol(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.flag_c);
        self.flag_c = value & 0x80 != 0;
        let result = (value << 1) | carry_in;
        self.set_nz(result);
        result
    }

    fn alu_ror(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.flag_c) << 7;
        self.flag_c = value & 0x01 != 0;
        let result = (value >> 1) | carry_in;
        self.set_nz(result);
        result
    }

    fn alu_inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_nz(result);
        result
    }

    fn alu_dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_nz(result);
        result
    }

    /// Read-modify-write: read, write the original back, write the
    /// modified value. Two writes are observable on the bus.
    fn rmw(&mut self, bus: &mut impl Bus, mode: AddrMode, f: fn(&mut Self, u8) -> u8) -> u8 {
        if mode == AddrMode::Acc {
            self.idle(bus);
            let result = f(self, self.a);
            self.a = result;
            return result;
        }
        let addr = self.store_addr(bus, mode);
        let value = self.read(bus, addr);
        self.write(bus, addr, value);
        let result = f(self, value);
        self.write(bus, addr, result);
        result
    }

    // === Interrupt sequences ===

    fn service(&mut self, bus: &mut impl Bus, vector: u16) {
        self.idle(bus);
        self.idle(bus);
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, self.pc as u8);
        self.push(bus, self.status_byte(false));
        self.flag_i = true;
        let lo = self.read(bus, vector);
        let hi = self.read(bus, vector.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    fn do_reset(&mut self, bus: &mut impl Bus) {
        self.idle(bus);
        self.idle(bus);
        // Reset suppresses the stack writes but still decrements S.
        for _ in 0..3 {
            self.stack_idle(bus);
            self.s = self.s.wrapping_sub(1);
        }
        self.flag_i = true;
        let lo = self.read(bus, 0xFFFC);
        let hi = self.read(bus, 0xFFFD);
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    // === Dispatch ===

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, bus: &mut impl Bus, entry: &OpEntry) {
        use Mnemonic::*;
        let mode = entry.mode;
        match entry.mnemonic {
            // Loads
            Lda => {
                let v = self.load_operand(bus, mode);
                self.a = v;
                self.set_nz(v);
            }
            Ldx => {
                let v = self.load_operand(bus, mode);
                self.x = v;
                self.set_nz(v);
            }
            Ldy => {
                let v = self.load_operand(bus, mode);
                self.y = v;
                self.set_nz(v);
            }
            Lax => {
                let v = self.load_operand(bus, mode);
                self.a = v;
                self.x = v;
                self.set_nz(v);
            }

            // Stores
            Sta => {
                let addr = self.store_addr(bus, mode);
                self.write(bus, addr, self.a);
            }
            Stx => {
                let addr = self.store_addr(bus, mode);
                self.write(bus, addr, self.x);
            }
            Sty => {
                let addr = self.store_addr(bus, mode);
                self.write(bus, addr, self.y);
            }
            Sax => {
                let addr = self.store_addr(bus, mode);
                self.write(bus, addr, self.a & self.x);
            }

            // Arithmetic and logic
            Adc => {
                let v = self.load_operand(bus, mode);
                self.alu_adc(v);
            }
            Sbc => {
                let v = self.load_operand(bus, mode);
                self.alu_sbc(v);
            }
            And => {
                let v = self.load_operand(bus, mode);
                self.a &= v;
                self.set_nz(self.a);
            }
            Ora => {
                let v = self.load_operand(bus, mode);
                self.a |= v;
                self.set_nz(self.a);
            }
            Eor => {
                let v = self.load_operand(bus, mode);
                self.a ^= v;
                self.set_nz(self.a);
            }
            Cmp => {
                let v = self.load_operand(bus, mode);
                self.compare(self.a, v);
            }
            Cpx => {
                let v = self.load_operand(bus, mode);
                self.compare(self.x, v);
            }
            Cpy => {
                let v = self.load_operand(bus, mode);
                self.compare(self.y, v);
            }
            Bit => {
                let v = self.load_operand(bus, mode);
                self.alu_bit(v);
            }

            // Shifts and memory increments
            Asl => {
                self.rmw(bus, mode, Self::alu_asl);
            }
            Lsr => {
                self.rmw(bus, mode, Self::alu_lsr);
            }
            Rol => {
                self.rmw(bus, mode, Self::alu_rol);
            }
            Ror => {
                self.rmw(bus, mode, Self::alu_ror);
            }
            Inc => {
                self.rmw(bus, mode, Self::alu_inc);
            }
            Dec => {
                self.rmw(bus, mode, Self::alu_dec);
            }

            // RMW + ALU combinations
            Slo => {
                let r = self.rmw(bus, mode, Self::alu_asl);
                self.a |= r;
                self.set_nz(self.a);
            }
            Rla => {
                let r = self.rmw(bus, mode, Self::alu_rol);
                self.a &= r;
                self.set_nz(self.a);
            }
            Sre => {
                let r = self.rmw(bus, mode, Self::alu_lsr);
                self.a ^= r;
                self.set_nz(self.a);
            }
            Rra => {
                let r = self.rmw(bus, mode, Self::alu_ror);
                self.alu_adc(r);
            }
            Dcp => {
                let r = self.rmw(bus, mode, Self::alu_dec);
                self.compare(self.a, r);
            }
            Isc => {
                let r = self.rmw(bus, mode, Self::alu_inc);
                self.alu_sbc(r);
            }

            // Immediate-only undocumented ops
            Anc => {
                let v = self.load_operand(bus, mode);
                self.a &= v;
                self.set_nz(self.a);
                self.flag_c = self.flag_n;
            }
            Alr => {
                let v = self.load_operand(bus, mode);
                self.a &= v;
                let r = self.alu_lsr(self.a);
                self.a = r;
            }
            Arr => {
                let v = self.load_operand(bus, mode);
                let and = self.a & v;
                let result = (and >> 1) | (u8::from(self.flag_c) << 7);
                self.a = result;
                self.set_nz(result);
                self.flag_c = result & 0x40 != 0;
                self.flag_v = ((result >> 6) ^ (result >> 5)) & 0x01 != 0;
            }
            Axs => {
                let v = self.load_operand(bus, mode);
                let t = self.a & self.x;
                self.flag_c = t >= v;
                self.x = t.wrapping_sub(v);
                self.set_nz(self.x);
            }

            // Register transfers and index steps
            Tax => {
                self.idle(bus);
                self.x = self.a;
                self.set_nz(self.x);
            }
            Tay => {
                self.idle(bus);
                self.y = self.a;
                self.set_nz(self.y);
            }
            Txa => {
                self.idle(bus);
                self.a = self.x;
                self.set_nz(self.a);
            }
            Tya => {
                self.idle(bus);
                self.a = self.y;
                self.set_nz(self.a);
            }
            Tsx => {
                self.idle(bus);
                self.x = self.s;
                self.set_nz(self.x);
            }
            Txs => {
                self.idle(bus);
                self.s = self.x;
            }
            Inx => {
                self.idle(bus);
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
            }
            Iny => {
                self.idle(bus);
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
            }
            Dex => {
                self.idle(bus);
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
            }
            Dey => {
                self.idle(bus);
                self.y = self.y.wrapping_sub(1);
                self.set_nz(self.y);
            }

            // Flag operations
            Clc => {
                self.idle(bus);
                self.flag_c = false;
            }
            Sec => {
                self.idle(bus);
                self.flag_c = true;
            }
            Cli => {
                self.idle(bus);
                self.flag_i = false;
            }
            Sei => {
                self.idle(bus);
                self.flag_i = true;
            }
            Cld => {
                self.idle(bus);
                self.flag_d = false;
            }
            Sed => {
                self.idle(bus);
                self.flag_d = true;
            }
            Clv => {
                self.idle(bus);
                self.flag_v = false;
            }

            // Stack
            Pha => {
                self.idle(bus);
                self.push(bus, self.a);
            }
            Php => {
                self.idle(bus);
                let p = self.status_byte(true);
                self.push(bus, p);
            }
            Pla => {
                self.idle(bus);
                self.stack_idle(bus);
                let v = self.pull(bus);
                self.a = v;
                self.set_nz(v);
            }
            Plp => {
                self.idle(bus);
                self.stack_idle(bus);
                let p = self.pull(bus);
                self.set_status_byte(p);
            }

            // Flow control
            Jmp => {
                if mode == AddrMode::Ind {
                    let ptr = self.fetch_word(bus);
                    let lo = self.read(bus, ptr);
                    // 6502 bug: the high byte wraps within the page.
                    let hi_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                    let hi = self.read(bus, hi_addr);
                    self.pc = u16::from_le_bytes([lo, hi]);
                } else {
                    self.pc = self.fetch_word(bus);
                }
            }
            Jsr => {
                let lo = self.fetch(bus);
                self.stack_idle(bus);
                // PC points at the last instruction byte when pushed.
                self.push(bus, (self.pc >> 8) as u8);
                self.push(bus, self.pc as u8);
                let hi = self.fetch(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            Rts => {
                self.idle(bus);
                self.stack_idle(bus);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                let addr = u16::from_le_bytes([lo, hi]);
                let _ = self.read(bus, addr);
                self.pc = addr.wrapping_add(1);
            }
            Rti => {
                self.idle(bus);
                self.stack_idle(bus);
                let p = self.pull(bus);
                self.set_status_byte(p);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            Brk => {
                // Padding byte: PC ends up two past the BRK.
                let _ = self.fetch(bus);
                self.push(bus, (self.pc >> 8) as u8);
                self.push(bus, self.pc as u8);
                let p = self.status_byte(true);
                self.push(bus, p);
                self.flag_i = true;
                let lo = self.read(bus, 0xFFFE);
                let hi = self.read(bus, 0xFFFF);
                self.pc = u16::from_le_bytes([lo, hi]);
            }

            // Branches
            Bpl => self.branch(bus, !self.flag_n),
            Bmi => self.branch(bus, self.flag_n),
            Bvc => self.branch(bus, !self.flag_v),
            Bvs => self.branch(bus, self.flag_v),
            Bcc => self.branch(bus, !self.flag_c),
            Bcs => self.branch(bus, self.flag_c),
            Bne => self.branch(bus, !self.flag_z),
            Beq => self.branch(bus, self.flag_z),

            // NOPs, official and multi-byte
            Nop => match mode {
                AddrMode::Imp => self.idle(bus),
                _ => {
                    let _ = self.load_operand(bus, mode);
                }
            },
        }
    }
}

impl<B: Bus> fami_core::Cpu<B> for Cpu6502 {
    fn step(&mut self, bus: &mut B) -> u32 {
        self.step_cycles = 0;

        if self.halt_cycles > 0 {
            self.halt_cycles -= 1;
            bus.tick(1);
            self.cycles += 1;
            return 1;
        }

        if self.reset_pending {
            self.reset_pending = false;
            self.do_reset(bus);
        } else if self.nmi_pending {
            self.nmi_pending = false;
            self.service(bus, 0xFFFA);
        } else if self.irq_line && !self.flag_i {
            self.service(bus, 0xFFFE);
        } else {
            let opcode = self.fetch(bus);
            let entry = OPCODES[opcode as usize];
            self.execute(bus, &entry);
        }

        self.cycles += u64::from(self.step_cycles);
        self.step_cycles
    }

    fn reset(&mut self, bus: &mut B) {
        self.step_cycles = 0;
        self.halt_cycles = 0;
        self.nmi_pending = false;
        self.reset_pending = false;
        self.do_reset(bus);
        self.cycles += u64::from(self.step_cycles);
    }

    fn pc(&self) -> u16 {
        self.pc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fami_core::{Cpu, SimpleBus};

    /// Bus that records every write for RMW double-write checks.
    struct LogBus {
        inner: SimpleBus,
        writes: Vec<(u16, u8)>,
    }

    impl LogBus {
        fn new() -> Self {
            Self {
                inner: SimpleBus::new(),
                writes: Vec::new(),
            }
        }
    }

    impl Bus for LogBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.inner.read(addr)
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.writes.push((addr, value));
            self.inner.write(addr, value);
        }
    }

    fn cpu_at(pc: u16) -> Cpu6502 {
        let mut cpu = Cpu6502::new();
        cpu.pc = pc;
        cpu
    }

    #[test]
    fn lda_immediate_sets_flags() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0xA9, 0x00, 0xA9, 0x80]);
        let mut cpu = cpu_at(0x8000);

        assert_eq!(cpu.step(&mut bus), 2);
        assert!(cpu.flag_z);
        assert!(!cpu.flag_n);

        assert_eq!(cpu.step(&mut bus), 2);
        assert_eq!(cpu.a, 0x80);
        assert!(!cpu.flag_z);
        assert!(cpu.flag_n);
    }

    #[test]
    fn page_cross_read_penalty() {
        let mut bus = SimpleBus::new();
        // LDA $80FF,X with X=1 crosses into $8100.
        bus.load(0x8000, &[0xBD, 0xFF, 0x80, 0xBD, 0x00, 0x80]);
        let mut cpu = cpu_at(0x8000);
        cpu.x = 1;

        assert_eq!(cpu.step(&mut bus), 5, "crossing read takes 5");
        assert_eq!(cpu.step(&mut bus), 4, "non-crossing read takes 4");
    }

    #[test]
    fn store_absolute_x_never_discounted() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x9D, 0x00, 0x02]); // STA $0200,X
        let mut cpu = cpu_at(0x8000);
        cpu.x = 0;
        assert_eq!(cpu.step(&mut bus), 5);
    }

    #[test]
    fn rmw_writes_original_then_modified() {
        let mut bus = LogBus::new();
        bus.inner.load(0x8000, &[0xE6, 0x10]); // INC $10
        bus.inner.write(0x0010, 0x41);
        let mut cpu = cpu_at(0x8000);

        assert_eq!(cpu.step(&mut bus), 5);
        assert_eq!(bus.writes, vec![(0x0010, 0x41), (0x0010, 0x42)]);
    }

    #[test]
    fn jmp_indirect_page_wrap_bug() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x6C, 0xFF, 0x02]); // JMP ($02FF)
        bus.write(0x02FF, 0x34);
        bus.write(0x0300, 0xFF); // would be the high byte without the bug
        bus.write(0x0200, 0x12); // high byte actually comes from $0200
        let mut cpu = cpu_at(0x8000);

        assert_eq!(cpu.step(&mut bus), 5);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn branch_cycle_accounting() {
        let mut bus = SimpleBus::new();
        // BNE not taken (Z set), BEQ taken same page, BEQ taken page cross.
        bus.load(0x8000, &[0xD0, 0x02, 0xF0, 0x02]);
        let mut cpu = cpu_at(0x8000);
        cpu.flag_z = true;
        assert_eq!(cpu.step(&mut bus), 2, "not taken");
        assert_eq!(cpu.step(&mut bus), 3, "taken, same page");
        assert_eq!(cpu.pc, 0x8006);

        // Place a taken branch that crosses a page: BEQ from $80FD.
        bus.load(0x80FD, &[0xF0, 0x10]);
        cpu.pc = 0x80FD;
        assert_eq!(cpu.step(&mut bus), 4, "taken, page crossed");
        assert_eq!(cpu.pc, 0x810F);
    }

    #[test]
    fn pc_advance_matches_table_size() {
        // Straight-line opcodes only: one of each addressing shape.
        let program: &[u8] = &[
            0xA9, 0x01, // LDA #
            0xA5, 0x10, // LDA zp
            0xB5, 0x10, // LDA zp,X
            0xAD, 0x00, 0x02, // LDA abs
            0xBD, 0x00, 0x02, // LDA abs,X
            0xA1, 0x10, // LDA (zp,X)
            0xB1, 0x10, // LDA (zp),Y
            0xEA, // NOP
            0x0A, // ASL A
            0x02, // JAM -> 1-byte NOP
        ];
        let mut bus = SimpleBus::new();
        bus.load(0x8000, program);
        let mut cpu = cpu_at(0x8000);

        let mut pc = cpu.pc;
        while cpu.pc < 0x8000 + program.len() as u16 {
            let opcode = bus.mem[cpu.pc as usize];
            let size = OPCODES[opcode as usize].size;
            cpu.step(&mut bus);
            assert_eq!(cpu.pc, pc.wrapping_add(u16::from(size)), "opcode {opcode:02X}");
            pc = cpu.pc;
        }
    }

    #[test]
    fn adc_carry_and_overflow() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x69, 0x50, 0x69, 0x50]);
        let mut cpu = cpu_at(0x8000);
        cpu.a = 0x50;

        cpu.step(&mut bus); // $50 + $50 = $A0: V set, C clear
        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.flag_v);
        assert!(!cpu.flag_c);
        assert!(cpu.flag_n);

        cpu.step(&mut bus); // $A0 + $50 = $F0: no V, no C
        assert_eq!(cpu.a, 0xF0);
        assert!(!cpu.flag_v);
        assert!(!cpu.flag_c);
    }

    #[test]
    fn sbc_borrows() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0xE9, 0x01]);
        let mut cpu = cpu_at(0x8000);
        cpu.a = 0x00;
        cpu.flag_c = true; // no borrow pending
        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0xFF);
        assert!(!cpu.flag_c, "borrow happened");
        assert!(cpu.flag_n);
    }

    #[test]
    fn decimal_mode_respected_only_when_enabled() {
        // 2A03 flavour ignores D.
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x69, 0x05]);
        let mut cpu = cpu_at(0x8000);
        cpu.flag_d = true;
        cpu.a = 0x09;
        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x0E, "binary result on 2A03");

        // NMOS flavour honours D: $09 + $05 = $14 BCD.
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x69, 0x05]);
        let mut cpu = cpu_at(0x8000).with_decimal_mode(true);
        cpu.flag_d = true;
        cpu.a = 0x09;
        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x14);
    }

    #[test]
    fn undocumented_lax_sax() {
        let mut bus = SimpleBus::new();
        bus.write(0x0010, 0x5A);
        bus.load(0x8000, &[0xA7, 0x10, 0x87, 0x11]); // LAX $10; SAX $11
        let mut cpu = cpu_at(0x8000);

        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x5A);
        assert_eq!(cpu.x, 0x5A);

        cpu.a = 0xF0;
        cpu.x = 0x3C;
        cpu.step(&mut bus);
        assert_eq!(bus.read(0x0011), 0x30); // A & X
    }

    #[test]
    fn undocumented_dcp_isc() {
        let mut bus = SimpleBus::new();
        bus.write(0x0010, 0x41);
        bus.load(0x8000, &[0xC7, 0x10, 0xE7, 0x10]); // DCP $10; ISC $10
        let mut cpu = cpu_at(0x8000);
        cpu.a = 0x40;

        cpu.step(&mut bus); // DEC to $40, CMP A=$40: equal
        assert_eq!(bus.read(0x0010), 0x40);
        assert!(cpu.flag_z);
        assert!(cpu.flag_c);

        cpu.flag_c = true;
        cpu.step(&mut bus); // INC to $41, SBC: $40 - $41 = $FF, borrow
        assert_eq!(bus.read(0x0010), 0x41);
        assert_eq!(cpu.a, 0xFF);
        assert!(!cpu.flag_c);
    }

    #[test]
    fn undocumented_anc_alr_arr_axs() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x0B, 0xFF, 0x4B, 0x03, 0x6B, 0xFF, 0xCB, 0x02]);
        let mut cpu = cpu_at(0x8000);

        cpu.a = 0x80;
        cpu.step(&mut bus); // ANC #$FF: A=$80, C=N=1
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.flag_c);
        assert!(cpu.flag_n);

        cpu.a = 0x03;
        cpu.step(&mut bus); // ALR #$03: AND then LSR
        assert_eq!(cpu.a, 0x01);
        assert!(cpu.flag_c);

        cpu.a = 0xC0;
        cpu.flag_c = true;
        cpu.step(&mut bus); // ARR #$FF: ROR of $C0 with carry in
        assert_eq!(cpu.a, 0xE0);
        assert!(cpu.flag_c, "carry from bit 6");

        cpu.a = 0x0F;
        cpu.x = 0x07;
        cpu.step(&mut bus); // AXS #$02: X = (A & X) - 2
        assert_eq!(cpu.x, 0x05);
        assert!(cpu.flag_c);
    }

    #[test]
    fn brk_rti_round_trip() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x00, 0xFF]); // BRK + padding
        bus.write(0xFFFE, 0x00);
        bus.write(0xFFFF, 0x90);
        bus.load(0x9000, &[0x40]); // RTI
        let mut cpu = cpu_at(0x8000);
        cpu.flag_i = false;
        cpu.flag_c = true;

        assert_eq!(cpu.step(&mut bus), 7);
        assert_eq!(cpu.pc, 0x9000);
        assert!(cpu.flag_i);
        // Pushed status has B set.
        let pushed_p = bus.read(0x0100 | u16::from(cpu.s.wrapping_add(1)));
        assert_eq!(pushed_p & 0x10, 0x10);

        assert_eq!(cpu.step(&mut bus), 6); // RTI
        assert_eq!(cpu.pc, 0x8002, "BRK pushes PC+2");
        assert!(!cpu.flag_i, "status pulled verbatim");
        assert!(cpu.flag_c);
    }

    #[test]
    fn jsr_rts_address_discipline() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0x20, 0x00, 0x90]); // JSR $9000
        bus.load(0x9000, &[0x60]); // RTS
        let mut cpu = cpu_at(0x8000);

        assert_eq!(cpu.step(&mut bus), 6);
        assert_eq!(cpu.pc, 0x9000);
        // JSR pushes the address of its last byte ($8002).
        let lo = bus.read(0x0100 | u16::from(cpu.s.wrapping_add(1)));
        let hi = bus.read(0x0100 | u16::from(cpu.s.wrapping_add(2)));
        assert_eq!(u16::from_le_bytes([lo, hi]), 0x8002);

        assert_eq!(cpu.step(&mut bus), 6);
        assert_eq!(cpu.pc, 0x8003, "RTS pulls and increments");
    }

    #[test]
    fn irq_masked_by_i_flag_nmi_is_not() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0xEA, 0xEA, 0xEA]);
        bus.write(0xFFFA, 0x00);
        bus.write(0xFFFB, 0xA0);
        bus.write(0xFFFE, 0x00);
        bus.write(0xFFFF, 0xB0);
        let mut cpu = cpu_at(0x8000);
        cpu.flag_i = true;

        cpu.request_irq(Interrupt::Irq);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x8001, "IRQ masked while I set");

        cpu.request_irq(Interrupt::Nmi);
        assert_eq!(cpu.step(&mut bus), 7);
        assert_eq!(cpu.pc, 0xA000, "NMI ignores I");

        // IRQ is level-triggered: still pending once I clears.
        cpu.flag_i = false;
        bus.load(0xA000, &[0xEA]);
        assert_eq!(cpu.step(&mut bus), 7);
        assert_eq!(cpu.pc, 0xB000);
    }

    #[test]
    fn nmi_edge_clears_on_acknowledge() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0xEA; 8]);
        bus.write(0xFFFA, 0x04);
        bus.write(0xFFFB, 0x80);
        let mut cpu = cpu_at(0x8000);

        cpu.request_irq(Interrupt::Nmi);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x8004);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x8005, "NMI serviced once, not retriggered");
    }

    #[test]
    fn halt_consumes_one_cycle_per_step() {
        let mut bus = SimpleBus::new();
        bus.load(0x8000, &[0xA9, 0x42]);
        let mut cpu = cpu_at(0x8000);
        cpu.halt(3);

        assert_eq!(cpu.step(&mut bus), 1);
        assert_eq!(cpu.step(&mut bus), 1);
        assert_eq!(cpu.step(&mut bus), 1);
        assert_eq!(cpu.halt_cycles(), 0);
        assert_eq!(cpu.step(&mut bus), 2, "then the next instruction runs");
        assert_eq!(cpu.a, 0x42);
    }

    #[test]
    fn reset_reads_vector_and_drops_sp() {
        let mut bus = SimpleBus::new();
        bus.write(0xFFFC, 0xAD);
        bus.write(0xFFFD, 0xDE);
        let mut cpu = Cpu6502::new();
        cpu.s = 0xFD;
        cpu.reset(&mut bus);
        assert_eq!(cpu.pc, 0xDEAD);
        assert_eq!(cpu.s, 0xFA);
        assert!(cpu.flag_i);
    }

    #[test]
    fn reset_request_outranks_nmi_and_irq() {
        let mut bus = SimpleBus::new();
        bus.write(0xFFFA, 0x00);
        bus.write(0xFFFB, 0xA0);
        bus.write(0xFFFC, 0x00);
        bus.write(0xFFFD, 0xC0);
        let mut cpu = cpu_at(0x8000);
        cpu.flag_i = false;

        cpu.request_irq(Interrupt::Irq);
        cpu.request_irq(Interrupt::Nmi);
        cpu.request_irq(Interrupt::Reset);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0xC000, "RESET serviced first");

        // NMI is still pending and goes next.
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0xA000);
    }

    #[test]
    fn state_round_trip() {
        let mut cpu = Cpu6502::new();
        cpu.a = 0x12;
        cpu.x = 0x34;
        cpu.pc = 0xC123;
        cpu.flag_n = true;
        cpu.request_irq(Interrupt::Irq);
        let state = cpu.save_state();

        let mut other = Cpu6502::new();
        other.load_state(&state);
        assert_eq!(other.a, 0x12);
        assert_eq!(other.x, 0x34);
        assert_eq!(other.pc, 0xC123);
        assert!(other.flag_n);
        assert_eq!(other.save_state().p, state.p);
    }
}
