//! The 256-entry opcode decode table.
//!
//! Each entry carries the instruction, addressing mode, encoded byte size
//! and base cycle count. Page-cross and branch penalties are added during
//! execution. Opcodes with no defined behaviour (JAM and the unstable
//! store/load combinations) decode as a one-byte two-cycle NOP so the
//! program counter never desynchronises.

use crate::{AddrMode, Mnemonic};

/// One decoded opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpEntry {
    pub mnemonic: Mnemonic,
    pub mode: AddrMode,
    pub size: u8,
    pub cycles: u8,
}

const fn op(mnemonic: Mnemonic, mode: AddrMode, size: u8, cycles: u8) -> OpEntry {
    OpEntry {
        mnemonic,
        mode,
        size,
        cycles,
    }
}

use AddrMode::*;
use Mnemonic::*;

/// Undefined opcode: one-byte NOP.
const UND: OpEntry = op(Nop, Imp, 1, 2);

#[rustfmt::skip]
pub static OPCODES: [OpEntry; 256] = [
    // $00-$0F
    op(Brk, Imp, 2, 7), op(Ora, IzX, 2, 6), UND,                op(Slo, IzX, 2, 8),
    op(Nop, Zp,  2, 3), op(Ora, Zp,  2, 3), op(Asl, Zp,  2, 5), op(Slo, Zp,  2, 5),
    op(Php, Imp, 1, 3), op(Ora, Imm, 2, 2), op(Asl, Acc, 1, 2), op(Anc, Imm, 2, 2),
    op(Nop, Abs, 3, 4), op(Ora, Abs, 3, 4), op(Asl, Abs, 3, 6), op(Slo, Abs, 3, 6),
    // $10-$1F
    op(Bpl, Rel, 2, 2), op(Ora, IzY, 2, 5), UND,                op(Slo, IzY, 2, 8),
    op(Nop, ZpX, 2, 4), op(Ora, ZpX, 2, 4), op(Asl, ZpX, 2, 6), op(Slo, ZpX, 2, 6),
    op(Clc, Imp, 1, 2), op(Ora, AbY, 3, 4), op(Nop, Imp, 1, 2), op(Slo, AbY, 3, 7),
    op(Nop, AbX, 3, 4), op(Ora, AbX, 3, 4), op(Asl, AbX, 3, 7), op(Slo, AbX, 3, 7),
    // $20-$2F
    op(Jsr, Abs, 3, 6), op(And, IzX, 2, 6), UND,                op(Rla, IzX, 2, 8),
    op(Bit, Zp,  2, 3), op(And, Zp,  2, 3), op(Rol, Zp,  2, 5), op(Rla, Zp,  2, 5),
    op(Plp, Imp, 1, 4), op(And, Imm, 2, 2), op(Rol, Acc, 1, 2), op(Anc, Imm, 2, 2),
    op(Bit, Abs, 3, 4), op(And, Abs, 3, 4), op(Rol, Abs, 3, 6), op(Rla, Abs, 3, 6),
    // $30-$3F
    op(Bmi, Rel, 2, 2), op(And, IzY, 2, 5), UND,                op(Rla, IzY, 2, 8),
    op(Nop, ZpX, 2, 4), op(And, ZpX, 2, 4), op(Rol, ZpX, 2, 6), op(Rla, ZpX, 2, 6),
    op(Sec, Imp, 1, 2), op(And, AbY, 3, 4), op(Nop, Imp, 1, 2), op(Rla, AbY, 3, 7),
    op(Nop, AbX, 3, 4), op(And, AbX, 3, 4), op(Rol, AbX, 3, 7), op(Rla, AbX, 3, 7),
    // $40-$4F
    op(Rti, Imp, 1, 6), op(Eor, IzX, 2, 6), UND,                op(Sre, IzX, 2, 8),
    op(Nop, Zp,  2, 3), op(Eor, Zp,  2, 3), op(Lsr, Zp,  2, 5), op(Sre, Zp,  2, 5),
    op(Pha, Imp, 1, 3), op(Eor, Imm, 2, 2), op(Lsr, Acc, 1, 2), op(Alr, Imm, 2, 2),
    op(Jmp, Abs, 3, 3), op(Eor, Abs, 3, 4), op(Lsr, Abs, 3, 6), op(Sre, Abs, 3, 6),
    // $50-$5F
    op(Bvc, Rel, 2, 2), op(Eor, IzY, 2, 5), UND,                op(Sre, IzY, 2, 8),
    op(Nop, ZpX, 2, 4), op(Eor, ZpX, 2, 4), op(Lsr, ZpX, 2, 6), op(Sre, ZpX, 2, 6),
    op(Cli, Imp, 1, 2), op(Eor, AbY, 3, 4), op(Nop, Imp, 1, 2), op(Sre, AbY, 3, 7),
    op(Nop, AbX, 3, 4), op(Eor, AbX, 3, 4), op(Lsr, AbX, 3, 7), op(Sre, AbX, 3, 7),
    // $60-$6F
    op(Rts, Imp, 1, 6), op(Adc, IzX, 2, 6), UND,                op(Rra, IzX, 2, 8),
    op(Nop, Zp,  2, 3), op(Adc, Zp,  2, 3), op(Ror, Zp,  2, 5), op(Rra, Zp,  2, 5),
    op(Pla, Imp, 1, 4), op(Adc, Imm, 2, 2), op(Ror, Acc, 1, 2), op(Arr, Imm, 2, 2),
    op(Jmp, Ind, 3, 5), op(Adc, Abs, 3, 4), op(Ror, Abs, 3, 6), op(Rra, Abs, 3, 6),
    // $70-$7F
    op(Bvs, Rel, 2, 2), op(Adc, IzY, 2, 5), UND,                op(Rra, IzY, 2, 8),
    op(Nop, ZpX, 2, 4), op(Adc, ZpX, 2, 4), op(Ror, ZpX, 2, 6), op(Rra, ZpX, 2, 6),
    op(Sei, Imp, 1, 2), op(Adc, AbY, 3, 4), op(Nop, Imp, 1, 2), op(Rra, AbY, 3, 7),
    op(Nop, AbX, 3, 4), op(Adc, AbX, 3, 4), op(Ror, AbX, 3, 7), op(Rra, AbX, 3, 7),
    // $80-$8F
    op(Nop, Imm, 2, 2), op(Sta, IzX, 2, 6), op(Nop, Imm, 2, 2), op(Sax, IzX, 2, 6),
    op(Sty, Zp,  2, 3), op(Sta, Zp,  2, 3), op(Stx, Zp,  2, 3), op(Sax, Zp,  2, 3),
    op(Dey, Imp, 1, 2), op(Nop, Imm, 2, 2), op(Txa, Imp, 1, 2), UND,
    op(Sty, Abs, 3, 4), op(Sta, Abs, 3, 4), op(Stx, Abs, 3, 4), op(Sax, Abs, 3, 4),
    // $90-$9F
    op(Bcc, Rel, 2, 2), op(Sta, IzY, 2, 6), UND,                UND,
    op(Sty, ZpX, 2, 4), op(Sta, ZpX, 2, 4), op(Stx, ZpY, 2, 4), op(Sax, ZpY, 2, 4),
    op(Tya, Imp, 1, 2), op(Sta, AbY, 3, 5), op(Txs, Imp, 1, 2), UND,
    UND,                op(Sta, AbX, 3, 5), UND,                UND,
    // $A0-$AF
    op(Ldy, Imm, 2, 2), op(Lda, IzX, 2, 6), op(Ldx, Imm, 2, 2), op(Lax, IzX, 2, 6),
    op(Ldy, Zp,  2, 3), op(Lda, Zp,  2, 3), op(Ldx, Zp,  2, 3), op(Lax, Zp,  2, 3),
    op(Tay, Imp, 1, 2), op(Lda, Imm, 2, 2), op(Tax, Imp, 1, 2), op(Lax, Imm, 2, 2),
    op(Ldy, Abs, 3, 4), op(Lda, Abs, 3, 4), op(Ldx, Abs, 3, 4), op(Lax, Abs, 3, 4),
    // $B0-$BF
    op(Bcs, Rel, 2, 2), op(Lda, IzY, 2, 5), UND,                op(Lax, IzY, 2, 5),
    op(Ldy, ZpX, 2, 4), op(Lda, ZpX, 2, 4), op(Ldx, ZpY, 2, 4), op(Lax, ZpY, 2, 4),
    op(Clv, Imp, 1, 2), op(Lda, AbY, 3, 4), op(Tsx, Imp, 1, 2), UND,
    op(Ldy, AbX, 3, 4), op(Lda, AbX, 3, 4), op(Ldx, AbY, 3, 4), op(Lax, AbY, 3, 4),
    // $C0-$CF
    op(Cpy, Imm, 2, 2), op(Cmp, IzX, 2, 6), op(Nop, Imm, 2, 2), op(Dcp, IzX, 2, 8),
    op(Cpy, Zp,  2, 3), op(Cmp, Zp,  2, 3), op(Dec, Zp,  2, 5), op(Dcp, Zp,  2, 5),
    op(Iny, Imp, 1, 2), op(Cmp, Imm, 2, 2), op(Dex, Imp, 1, 2), op(Axs, Imm, 2, 2),
    op(Cpy, Abs, 3, 4), op(Cmp, Abs, 3, 4), op(Dec, Abs, 3, 6), op(Dcp, Abs, 3, 6),
    // $D0-$DF
    op(Bne, Rel, 2, 2), op(Cmp, IzY, 2, 5), UND,                op(Dcp, IzY, 2, 8),
    op(Nop, ZpX, 2, 4), op(Cmp, ZpX, 2, 4), op(Dec, ZpX, 2, 6), op(Dcp, ZpX, 2, 6),
    op(Cld, Imp, 1, 2), op(Cmp, AbY, 3, 4), op(Nop, Imp, 1, 2), op(Dcp, AbY, 3, 7),
    op(Nop, AbX, 3, 4), op(Cmp, AbX, 3, 4), op(Dec, AbX, 3, 7), op(Dcp, AbX, 3, 7),
    // $E0-$EF
    op(Cpx, Imm, 2, 2), op(Sbc, IzX, 2, 6), op(Nop, Imm, 2, 2), op(Isc, IzX, 2, 8),
    op(Cpx, Zp,  2, 3), op(Sbc, Zp,  2, 3), op(Inc, Zp,  2, 5), op(Isc, Zp,  2, 5),
    op(Inx, Imp, 1, 2), op(Sbc, Imm, 2, 2), op(Nop, Imp, 1, 2), op(Sbc, Imm, 2, 2),
    op(Cpx, Abs, 3, 4), op(Sbc, Abs, 3, 4), op(Inc, Abs, 3, 6), op(Isc, Abs, 3, 6),
    // $F0-$FF
    op(Beq, Rel, 2, 2), op(Sbc, IzY, 2, 5), UND,                op(Isc, IzY, 2, 8),
    op(Nop, ZpX, 2, 4), op(Sbc, ZpX, 2, 4), op(Inc, ZpX, 2, 6), op(Isc, ZpX, 2, 6),
    op(Sed, Imp, 1, 2), op(Sbc, AbY, 3, 4), op(Nop, Imp, 1, 2), op(Isc, AbY, 3, 7),
    op(Nop, AbX, 3, 4), op(Sbc, AbX, 3, 4), op(Inc, AbX, 3, 7), op(Isc, AbX, 3, 7),
];
