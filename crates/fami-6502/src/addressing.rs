//! Addressing mode resolution.
//!
//! Every helper performs the exact bus access sequence of the hardware,
//! including the dummy reads games can observe (zero-page index adds,
//! pre-fixup reads on page crossings, the `JMP ($xxFF)` wrap). One bus
//! access is one cycle; `step_cycles` counts them.

use fami_core::Bus;

use crate::{AddrMode, Cpu6502};

impl Cpu6502 {
    /// Clocked bus read.
    pub(crate) fn read(&mut self, bus: &mut impl Bus, addr: u16) -> u8 {
        self.step_cycles += 1;
        bus.read(addr)
    }

    /// Clocked bus write.
    pub(crate) fn write(&mut self, bus: &mut impl Bus, addr: u16, value: u8) {
        self.step_cycles += 1;
        bus.write(addr, value);
    }

    /// Internal cycle: the CPU re-reads the byte after the opcode.
    pub(crate) fn idle(&mut self, bus: &mut impl Bus) {
        let _ = self.read(bus, self.pc);
    }

    /// Fetch the byte at PC and advance PC.
    pub(crate) fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Fetch a little-endian word at PC.
    pub(crate) fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    // === Stack ===

    pub(crate) fn push(&mut self, bus: &mut impl Bus, value: u8) {
        self.write(bus, 0x0100 | u16::from(self.s), value);
        self.s = self.s.wrapping_sub(1);
    }

    pub(crate) fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.s = self.s.wrapping_add(1);
        self.read(bus, 0x0100 | u16::from(self.s))
    }

    /// Dummy read of the current stack slot (pre-increment cycle).
    pub(crate) fn stack_idle(&mut self, bus: &mut impl Bus) {
        let _ = self.read(bus, 0x0100 | u16::from(self.s));
    }

    // === Operand reads ===

    /// Resolve a read-mode operand, with page-cross penalties where the
    /// hardware takes them.
    pub(crate) fn load_operand(&mut self, bus: &mut impl Bus, mode: AddrMode) -> u8 {
        match mode {
            AddrMode::Imm => self.fetch(bus),
            AddrMode::Zp => {
                let addr = u16::from(self.fetch(bus));
                self.read(bus, addr)
            }
            AddrMode::ZpX => {
                let base = self.fetch(bus);
                let _ = self.read(bus, u16::from(base));
                self.read(bus, u16::from(base.wrapping_add(self.x)))
            }
            AddrMode::ZpY => {
                let base = self.fetch(bus);
                let _ = self.read(bus, u16::from(base));
                self.read(bus, u16::from(base.wrapping_add(self.y)))
            }
            AddrMode::Abs => {
                let addr = self.fetch_word(bus);
                self.read(bus, addr)
            }
            AddrMode::AbX => self.load_indexed(bus, self.x),
            AddrMode::AbY => self.load_indexed(bus, self.y),
            AddrMode::IzX => {
                let addr = self.addr_indexed_indirect(bus);
                self.read(bus, addr)
            }
            AddrMode::IzY => {
                let ptr = self.fetch(bus);
                let base = self.read_zp_pointer(bus, ptr);
                let addr = base.wrapping_add(u16::from(self.y));
                if (base ^ addr) & 0xFF00 != 0 {
                    let _ = self.read(bus, (base & 0xFF00) | (addr & 0x00FF));
                }
                self.read(bus, addr)
            }
            // Acc/Imp/Rel/Ind operands never come through here.
            _ => unreachable!("not a read operand mode"),
        }
    }

    fn load_indexed(&mut self, bus: &mut impl Bus, index: u8) -> u8 {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(u16::from(index));
        if (base ^ addr) & 0xFF00 != 0 {
            // Dummy read from the pre-fixup address.
            let _ = self.read(bus, (base & 0xFF00) | (addr & 0x00FF));
        }
        self.read(bus, addr)
    }

    /// Read the 16-bit pointer at a zero-page address (wraps in page zero).
    fn read_zp_pointer(&mut self, bus: &mut impl Bus, ptr: u8) -> u16 {
        let lo = self.read(bus, u16::from(ptr));
        let hi = self.read(bus, u16::from(ptr.wrapping_add(1)));
        u16::from_le_bytes([lo, hi])
    }

    fn addr_indexed_indirect(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch(bus);
        let _ = self.read(bus, u16::from(base));
        self.read_zp_pointer(bus, base.wrapping_add(self.x))
    }

    // === Effective addresses for stores and read-modify-writes ===

    /// Resolve the effective address for a store or RMW. Indexed modes
    /// always perform the pre-fixup dummy read; there is no page-cross
    /// discount on the write path.
    pub(crate) fn store_addr(&mut self, bus: &mut impl Bus, mode: AddrMode) -> u16 {
        match mode {
            AddrMode::Zp => u16::from(self.fetch(bus)),
            AddrMode::ZpX => {
                let base = self.fetch(bus);
                let _ = self.read(bus, u16::from(base));
                u16::from(base.wrapping_add(self.x))
            }
            AddrMode::ZpY => {
                let base = self.fetch(bus);
                let _ = self.read(bus, u16::from(base));
                u16::from(base.wrapping_add(self.y))
            }
            AddrMode::Abs => self.fetch_word(bus),
            AddrMode::AbX => self.store_indexed(bus, self.x),
            AddrMode::AbY => self.store_indexed(bus, self.y),
            AddrMode::IzX => self.addr_indexed_indirect(bus),
            AddrMode::IzY => {
                let ptr = self.fetch(bus);
                let base = self.read_zp_pointer(bus, ptr);
                let addr = base.wrapping_add(u16::from(self.y));
                let _ = self.read(bus, (base & 0xFF00) | (addr & 0x00FF));
                addr
            }
            _ => unreachable!("not a store operand mode"),
        }
    }

    fn store_indexed(&mut self, bus: &mut impl Bus, index: u8) -> u16 {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(u16::from(index));
        let _ = self.read(bus, (base & 0xFF00) | (addr & 0x00FF));
        addr
    }

    /// Branch on `condition`. Taken branches cost a cycle, crossing a
    /// page costs one more; untaken branches cost nothing extra.
    pub(crate) fn branch(&mut self, bus: &mut impl Bus, condition: bool) {
        let offset = self.fetch(bus) as i8;
        if !condition {
            return;
        }
        self.idle(bus);
        let target = self.pc.wrapping_add(offset as u16);
        if (target ^ self.pc) & 0xFF00 != 0 {
            let _ = self.read(bus, (self.pc & 0xFF00) | (target & 0x00FF));
        }
        self.pc = target;
    }
}
