//! Chip state snapshot: register pairs, buses, pins, and cycle indicators.

use core::fmt;

use rustyz80_netlist::PinState;

/// Everything an observer wants to know about the chip at a half-cycle
/// boundary. Register pairs are assembled from the `reg_*` net groups; pins
/// are single-net samples.
#[derive(Debug, Clone, Copy)]
pub struct Z80State {
    /// Main register pairs.
    pub af: u16,
    /// BC pair.
    pub bc: u16,
    /// DE pair.
    pub de: u16,
    /// HL pair.
    pub hl: u16,
    /// Alternate AF'.
    pub af2: u16,
    /// Alternate BC'.
    pub bc2: u16,
    /// Alternate DE'.
    pub de2: u16,
    /// Alternate HL'.
    pub hl2: u16,
    /// Index register IX.
    pub ix: u16,
    /// Index register IY.
    pub iy: u16,
    /// Stack pointer.
    pub sp: u16,
    /// Interrupt/refresh pair.
    pub ir: u16,
    /// Internal WZ scratch pair.
    pub wz: u16,
    /// Program counter.
    pub pc: u16,
    /// Address bus.
    pub ab: u16,
    /// Data bus value.
    pub db: u8,
    /// Data bus with per-pin sample detail.
    pub db_pins: [PinState; 8],
    /// Clock pin.
    pub clk: PinState,
    /// Interrupt request pin.
    pub int: PinState,
    /// Non-maskable interrupt pin.
    pub nmi: PinState,
    /// Halt acknowledge pin.
    pub halt: PinState,
    /// Memory request pin.
    pub mreq: PinState,
    /// I/O request pin.
    pub iorq: PinState,
    /// Read strobe pin.
    pub rd: PinState,
    /// Write strobe pin.
    pub wr: PinState,
    /// Bus acknowledge pin.
    pub busak: PinState,
    /// Wait pin.
    pub wait: PinState,
    /// Bus request pin.
    pub busrq: PinState,
    /// Reset pin.
    pub reset: PinState,
    /// Machine-cycle-one pin.
    pub m1: PinState,
    /// Refresh pin.
    pub rfsh: PinState,
    /// M-cycle indicator nets `m1..m6`.
    pub m: [PinState; 6],
    /// T-state indicator nets `t1..t6`.
    pub t: [PinState; 6],
    /// Instruction register contents.
    pub instr: u8,
}

fn pin(p: PinState) -> char {
    match p {
        PinState::Low => '0',
        PinState::High => '1',
        PinState::Floating => '-',
        _ => '?',
    }
}

fn cycle(states: &[PinState; 6], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, &s) in states.iter().enumerate() {
        let c = match s {
            PinState::Low => '_',
            PinState::High => char::from(b'1' + i as u8),
            _ => '?',
        };
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Z80State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X}",
            self.af, self.bc, self.de, self.hl
        )?;
        writeln!(
            f,
            "AF':{:04X} BC':{:04X} DE':{:04X} HL':{:04X}",
            self.af2, self.bc2, self.de2, self.hl2
        )?;
        writeln!(
            f,
            "IX:{:04X} IY:{:04X} SP:{:04X} IR:{:04X} WZ:{:04X} PC:{:04X}",
            self.ix, self.iy, self.sp, self.ir, self.wz, self.pc
        )?;
        writeln!(f, "AB:{:04X} DB:{:02X}", self.ab, self.db)?;
        writeln!(
            f,
            "clk:{} int:{} nmi:{} halt:{} mreq:{} iorq:{} rd:{} wr:{}",
            pin(self.clk),
            pin(self.int),
            pin(self.nmi),
            pin(self.halt),
            pin(self.mreq),
            pin(self.iorq),
            pin(self.rd),
            pin(self.wr)
        )?;
        writeln!(
            f,
            "busak:{} wait:{} busrq:{} reset:{} m1:{} rfsh:{}",
            pin(self.busak),
            pin(self.wait),
            pin(self.busrq),
            pin(self.reset),
            pin(self.m1),
            pin(self.rfsh)
        )?;
        write!(f, "M:")?;
        cycle(&self.m, f)?;
        write!(f, " T:")?;
        cycle(&self.t, f)?;
        writeln!(f)?;
        write!(f, "Instr:{:02X}", self.instr)
    }
}
