//! End-to-end machine tests over hand-assembled iNES images.

use fami_core::Bus as _;
use fami_nes::{Button, Nes, NesConfig};

/// Build an iNES image: `code` lands at $8000, the three vectors go at
/// the top of PRG.
fn build_rom(
    mapper_id: u8,
    prg_banks: u8,
    chr_banks: u8,
    code: &[u8],
    nmi: u16,
    reset: u16,
    irq: u16,
) -> Vec<u8> {
    let prg_size = usize::from(prg_banks) * 16384;
    let chr_size = usize::from(chr_banks) * 8192;
    let mut rom = vec![0u8; 16 + prg_size + chr_size];
    rom[0..4].copy_from_slice(b"NES\x1a");
    rom[4] = prg_banks;
    rom[5] = chr_banks;
    rom[6] = (mapper_id & 0x0F) << 4;
    rom[7] = mapper_id & 0xF0;
    rom[16..16 + code.len()].copy_from_slice(code);

    let vectors = prg_size - 6;
    rom[16 + vectors..16 + vectors + 6].copy_from_slice(&[
        (nmi & 0xFF) as u8,
        (nmi >> 8) as u8,
        (reset & 0xFF) as u8,
        (reset >> 8) as u8,
        (irq & 0xFF) as u8,
        (irq >> 8) as u8,
    ]);
    rom
}

fn nes_with(rom: Vec<u8>) -> Nes {
    Nes::new(NesConfig::new(rom)).expect("ROM should load")
}

#[test]
fn power_on_reads_reset_vector() {
    // Reset vector $FFFC/$FFFD = $AD $DE -> PC = $DEAD.
    let rom = build_rom(0, 2, 1, &[0xEA; 16], 0x8000, 0xDEAD, 0x8000);
    let nes = nes_with(rom);
    assert_eq!(nes.cpu().pc, 0xDEAD);
}

#[test]
fn invalid_roms_are_rejected_at_load() {
    assert!(Nes::new(NesConfig::new(vec![0; 4])).is_err());
    assert!(Nes::new(NesConfig::new(vec![0x4E; 64])).is_err());

    // Unsupported mapper number.
    let mut rom = build_rom(0, 1, 1, &[0xEA; 4], 0x8000, 0x8000, 0x8000);
    rom[7] = 0xF0;
    assert!(Nes::new(NesConfig::new(rom)).is_err());
}

#[test]
fn run_frame_advances_about_one_frame_of_cpu_cycles() {
    // NOP sled: reset vector into the sled, which wraps harmlessly.
    let rom = build_rom(0, 2, 1, &[0xEA; 64], 0x9000, 0x8000, 0x9000);
    let mut nes = nes_with(rom);
    let _ = nes.run_frame(); // partial first frame
    let cycles = nes.run_frame();
    // NTSC: 341*262/3 ≈ 29780.7 CPU cycles, modulo instruction overlap.
    assert!(
        (29_770..=29_800).contains(&cycles),
        "frame took {cycles} cycles"
    );
}

#[test]
fn nmi_taken_on_vblank_when_enabled() {
    // SEI; LDA #$80; STA $2000; spin. NMI handler: INC $10; RTI.
    #[rustfmt::skip]
    let code: &[u8] = &[
        0x78,             // $8000 SEI
        0xA9, 0x80,       // $8001 LDA #$80
        0x8D, 0x00, 0x20, // $8003 STA $2000
        0x4C, 0x06, 0x80, // $8006 JMP $8006
        0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0xE6, 0x10,       // $8010 INC $10
        0x40,             // $8012 RTI
    ];
    let rom = build_rom(0, 2, 1, code, 0x8010, 0x8000, 0x8010);
    let mut nes = nes_with(rom);

    nes.run_frame();
    nes.run_frame();
    nes.run_frame();
    let count = nes.bus().ram[0x10];
    assert!(count >= 2, "NMI handler ran {count} times");
}

#[test]
fn oam_dma_stalls_cpu_and_fills_oam() {
    // LDX #$02; STX $4014; spin.
    #[rustfmt::skip]
    let code: &[u8] = &[
        0xA2, 0x02,       // $8000 LDX #$02
        0x8E, 0x14, 0x40, // $8002 STX $4014
        0x4C, 0x05, 0x80, // $8005 JMP $8005
    ];
    let rom = build_rom(0, 2, 1, code, 0x8005, 0x8000, 0x8005);
    let mut nes = nes_with(rom);

    // Seed the source page.
    for i in 0..=255u8 {
        let addr = 0x0200 + u16::from(i);
        nes.bus_mut().ram[usize::from(addr) & 0x7FF] = i.wrapping_add(3);
    }

    assert_eq!(nes.step(), 2, "LDX");
    let cycles_before_write = nes.bus().cycles();
    assert_eq!(nes.step(), 4, "STX triggers the DMA");
    // The write lands on the 4th cycle of STX.
    let expected_stall = 513 + ((cycles_before_write + 4) & 1) as u32;

    let mut stall = 0u32;
    while nes.step() == 1 {
        stall += 1;
    }
    assert_eq!(stall, expected_stall);

    for i in 0..=255u8 {
        assert_eq!(nes.bus().ppu.read_oam(i), i.wrapping_add(3));
    }
}

#[test]
fn mmc3_scanline_irq_reaches_the_cpu() {
    // Enable rendering with sprites in $1000 and background in $0000 so
    // the per-scanline sprite fetches produce A12 rising edges, then arm
    // the MMC3 counter. The IRQ handler acknowledges, counts, re-arms.
    #[rustfmt::skip]
    let code: &[u8] = &[
        0x78,             // $8000 SEI
        0xA9, 0x08,       // $8001 LDA #$08 (sprites at $1000)
        0x8D, 0x00, 0x20, // $8003 STA $2000
        0xA9, 0x18,       // $8006 LDA #$18 (bg + sprites on)
        0x8D, 0x01, 0x20, // $8008 STA $2001
        0xA9, 0x10,       // $800B LDA #$10
        0x8D, 0x00, 0xC0, // $800D STA $C000 (latch = 16)
        0x8D, 0x01, 0xC0, // $8010 STA $C001 (reload)
        0x8D, 0x01, 0xE0, // $8013 STA $E001 (enable)
        0x58,             // $8016 CLI
        0x4C, 0x17, 0x80, // $8017 JMP $8017
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        // IRQ handler at $8020
        0x8D, 0x00, 0xE0, // STA $E000 (acknowledge + disable)
        0xE6, 0x10,       // INC $10
        0x8D, 0x01, 0xE0, // STA $E001 (re-enable)
        0x40,             // RTI
    ];
    let rom = build_rom(4, 2, 1, code, 0x8030, 0x8000, 0x8020);
    // NMI vector points at a lone RTI.
    let mut rom = rom;
    rom[16 + 0x30] = 0x40;

    let mut nes = nes_with(rom);
    nes.run_frame();
    nes.run_frame();
    nes.run_frame();
    let count = nes.bus().ram[0x10];
    assert!(count >= 5, "MMC3 IRQ handler ran {count} times");
}

#[test]
fn controller_strobe_serial_read() {
    // Strobe, then shift nine reads into $0300+.
    #[rustfmt::skip]
    let code: &[u8] = &[
        0xA9, 0x01,       // $8000 LDA #$01
        0x8D, 0x16, 0x40, // $8002 STA $4016
        0xA9, 0x00,       // $8005 LDA #$00
        0x8D, 0x16, 0x40, // $8007 STA $4016
        0xA2, 0x00,       // $800A LDX #$00
        0xAD, 0x16, 0x40, // $800C LDA $4016
        0x9D, 0x00, 0x03, // $800F STA $0300,X
        0xE8,             // $8012 INX
        0xE0, 0x09,       // $8013 CPX #$09
        0xD0, 0xF5,       // $8015 BNE $800C
        0x4C, 0x17, 0x80, // $8017 JMP $8017
    ];
    let rom = build_rom(0, 2, 1, code, 0x8017, 0x8000, 0x8017);
    let mut nes = nes_with(rom);
    nes.button_down(0, Button::A);
    nes.run_frame();

    let ram = &nes.bus().ram;
    // First read: A pressed, with $40 from the bus's open high bits.
    assert_eq!(ram[0x300], 0x41);
    for i in 1..8 {
        assert_eq!(ram[0x300 + i], 0x40, "read {i}");
    }
    // After eight bits the data line sticks at 1.
    assert_eq!(ram[0x308], 0x41);
}

#[test]
fn snapshot_restore_is_deterministic() {
    let rom = build_rom(0, 2, 1, &[0xEA; 1024], 0x8000, 0x8000, 0x8000);
    let mut nes = nes_with(rom);
    nes.run_frame();

    let snap = nes.snapshot();
    for _ in 0..1000 {
        nes.step();
    }
    let after_k = nes.snapshot();

    nes.restore(&snap).expect("restore");
    for _ in 0..1000 {
        nes.step();
    }
    assert_eq!(
        nes.snapshot(),
        after_k,
        "same steps from the same state produce the same state"
    );
}

#[test]
fn restore_rejects_snapshot_from_other_rom() {
    let rom_a = build_rom(0, 2, 1, &[0xEA; 16], 0x8000, 0x8000, 0x8000);
    let mut rom_b = rom_a.clone();
    let len = rom_b.len();
    rom_b[len - 1] ^= 0xFF;

    let nes_a = nes_with(rom_a);
    let mut nes_b = nes_with(rom_b);
    let snap = nes_a.snapshot();
    assert!(nes_b.restore(&snap).is_err());
}

#[test]
fn battery_ram_round_trip() {
    // Mapper 1 with the battery flag: $6000-$7FFF persists.
    let mut rom = build_rom(1, 2, 1, &[0xEA; 16], 0x8000, 0x8000, 0x8000);
    rom[6] |= 0x02;
    let mut nes = nes_with(rom.clone());

    nes.bus_mut().write(0x6123, 0x5A);
    let saved = nes.battery_ram().expect("battery present").to_vec();

    let mut fresh = nes_with(rom);
    fresh.load_battery_ram(&saved);
    assert_eq!(
        fresh.battery_ram().expect("battery present")[0x123],
        0x5A
    );
}

#[test]
fn soft_reset_revectors_and_keeps_ram() {
    let rom = build_rom(0, 2, 1, &[0xEA; 16], 0x8000, 0x8000, 0x8000);
    let mut nes = nes_with(rom);
    nes.run_frame();
    nes.bus_mut().ram[0x55] = 0x99;
    nes.reset();
    assert_eq!(nes.cpu().pc, 0x8000);
    assert_eq!(nes.bus().ram[0x55], 0x99, "work RAM survives soft reset");
}
