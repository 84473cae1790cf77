//! The pluggable I/O device fabric.
//!
//! Devices are selected with an 8-bit code consisting of a 4-bit group mask
//! and a 4-bit device number mask; selection is by bitmask inclusion, so one
//! select code can address several devices at once.  Output is broadcast to
//! every ready selected output device, input is first-selected-wins.
//!
//! The machine knows a closed set of device kinds: a printer and a tape
//! punch (both writing to standard output), a keyboard fed by the embedding
//! UI, a tape reader backed by an ASCII text, and a sink that captures raw
//! bytes for tests and embedders.

use crate::charset::{self, Charset, Decoded};
use std::collections::VecDeque;
use std::io::{self, Write};

/// Standard device number for the printer.
pub const DEVICE_PRINTER: u8 = 0x41;

/// Standard device number for the tape punch.
pub const DEVICE_PUNCH: u8 = 0x42;

/// Standard device number for the keyboard.
pub const DEVICE_KEYBOARD: u8 = 0x48;

/// Standard device number for the tape reader.
pub const DEVICE_READER: u8 = 0x50;

/// Type of parity that is present on an input or output byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

fn count_low_bits(value: u8) -> u32 {
    (value & 0x7F).count_ones()
}

/// Adds parity to a byte value.
///
/// The reference manual implies that the least significant bit carries the
/// parity, but RS232 practice puts it in the most significant bit and that
/// is what this emulation uses.
pub fn add_parity(value: u8, parity: Parity) -> u8 {
    match parity {
        Parity::None => value,
        Parity::Odd => {
            if count_low_bits(value) & 1 == 0 {
                value | 0x80
            } else {
                value & 0x7F
            }
        }
        Parity::Even => {
            if count_low_bits(value) & 1 != 0 {
                value | 0x80
            } else {
                value & 0x7F
            }
        }
    }
}

/// Removes parity from a byte, leaving the underlying 7-bit value.
pub fn remove_parity(value: u8, parity: Parity) -> u8 {
    match parity {
        Parity::None => value,
        _ => value & 0x7F,
    }
}

/// Determine if a device identifier is valid.  A valid identifier has at
/// least one group bit and at least one device bit set.
pub fn is_valid_device_id(id: u8) -> bool {
    (id & 0xF0) != 0 && (id & 0x0F) != 0
}

enum DeviceKind {
    /// Prints to standard output, tracking the print head column so that
    /// EBS/1231 print wheel positioning can be emulated.
    Printer { column: usize },
    /// Byte queue fed by the embedding UI.
    Keyboard { pending: VecDeque<u8> },
    /// Punches bytes to standard output as their ASCII expansion.
    Punch,
    /// Reads an ASCII text and serves it one converted code at a time.
    Reader { text: String, posn: usize },
    /// Captures raw output bytes.
    Sink { captured: Vec<u8> },
}

/// An I/O device attached to the machine.
pub struct Device {
    id: u8,
    selected: bool,
    charset: Charset,
    kind: DeviceKind,
}

impl Device {
    /// Creates a printer that writes to standard output.
    pub fn printer(id: u8, charset: Charset) -> Device {
        Device { id, selected: false, charset, kind: DeviceKind::Printer { column: 0 } }
    }

    /// Creates a keyboard with an empty input queue.
    pub fn keyboard(id: u8, charset: Charset) -> Device {
        Device { id, selected: false, charset, kind: DeviceKind::Keyboard { pending: VecDeque::new() } }
    }

    /// Creates a tape punch that writes to standard output.
    pub fn tape_punch(id: u8, charset: Charset) -> Device {
        Device { id, selected: false, charset, kind: DeviceKind::Punch }
    }

    /// Creates a tape reader serving the given ASCII text.
    pub fn tape_reader(id: u8, charset: Charset, text: String) -> Device {
        Device { id, selected: false, charset, kind: DeviceKind::Reader { text, posn: 0 } }
    }

    /// Creates a sink that captures every byte written to it.
    pub fn sink(id: u8) -> Device {
        Device { id, selected: false, charset: Charset::Ascii, kind: DeviceKind::Sink { captured: Vec::new() } }
    }

    /// The 8-bit selection identifier of this device.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Whether this device is currently selected.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    fn supports_output(&self) -> bool {
        matches!(
            self.kind,
            DeviceKind::Printer { .. } | DeviceKind::Punch | DeviceKind::Sink { .. }
        )
    }

    fn supports_input(&self) -> bool {
        matches!(self.kind, DeviceKind::Keyboard { .. } | DeviceKind::Reader { .. })
    }

    fn is_busy(&self) -> bool {
        // Emulated devices accept bytes as fast as the serial line model
        // delivers them; the line pacing lives in the machine timing.
        false
    }

    fn output(&mut self, value: u8, parity: Parity) {
        match &mut self.kind {
            DeviceKind::Printer { column } => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                print_byte(&mut out, self.charset, column, value, parity);
            }
            DeviceKind::Punch => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                punch_byte(&mut out, self.charset, value, parity);
            }
            DeviceKind::Sink { captured } => captured.push(value),
            _ => {}
        }
    }

    fn input(&mut self, parity: Parity) -> Option<u8> {
        match &mut self.kind {
            DeviceKind::Keyboard { pending } => pending.pop_front().map(|v| add_parity(v, parity)),
            DeviceKind::Reader { text, posn } => {
                while *posn < text.len() {
                    match charset::char_to_charset(text, posn, self.charset) {
                        Some(code) => return Some(add_parity(code, parity)),
                        None => {
                            // Skip a character that has no mapping.
                            log::warn!("tape reader: unmappable character at offset {}", *posn);
                            *posn += 1;
                        }
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn status(&mut self) -> Option<u8> {
        // None of the standard devices produce a status byte.
        None
    }

    fn select(&mut self) {
        if !self.selected {
            log::debug!("device {:02X} selected", self.id);
            self.selected = true;
        }
    }

    fn deselect(&mut self) {
        if self.selected {
            log::debug!("device {:02X} deselected", self.id);
            self.selected = false;
        }
    }
}

fn device_match(device: &Device, code: u8) -> bool {
    device.id != 0 && (code & device.id) == device.id
}

/// Writes one byte to the emulated printer.
fn print_byte(out: &mut impl Write, cs: Charset, column: &mut usize, value: u8, parity: Parity) {
    let value = if cs == Charset::Hex { value } else { remove_parity(value, parity) };
    match cs {
        Charset::Ebs1231 => {
            let position = charset::print_wheel_position(value);
            if position != 0 {
                // Space forward or backspace back to put the print head in
                // the requested column.
                let position = (position - 1) as usize;
                while *column < position {
                    let _ = out.write_all(b" ");
                    *column += 1;
                }
                while *column > position {
                    let _ = out.write_all(b"\x08");
                    *column -= 1;
                }
            } else if value == 0o75 || value == 0o55 || value == 0o54 {
                // Line Feed Left / Line Feed Right / Line Feed Both
                let _ = out.write_all(b"\n");
            } else {
                match charset::char_from_charset(value, cs) {
                    Some(Decoded::Char(ch)) => match ch {
                        b'\n' | b'\x0C' => {
                            let _ = out.write_all(b"\r\n");
                            *column = 0;
                        }
                        b'\r' => {
                            let _ = out.write_all(b"\r");
                            *column = 0;
                        }
                        b'\x08' => {
                            let _ = out.write_all(b"\x08");
                            *column = column.saturating_sub(1);
                        }
                        _ => {
                            // Ordinary characters do not move the tracked
                            // position; only the positioning codes do.
                            let _ = out.write_all(&[ch]);
                        }
                    },
                    Some(Decoded::Text(s)) => {
                        let _ = out.write_all(s.as_bytes());
                        *column += s.len();
                    }
                    None => {}
                }
            }
        }
        Charset::Hex => {
            // Dump the raw bytes in hexadecimal, sixteen to a line.
            if *column > 0 {
                let _ = out.write_all(b" ");
            }
            let _ = write!(out, "{:02X}", value);
            *column += 1;
            if *column >= 16 {
                let _ = out.write_all(b"\n");
                *column = 0;
            }
        }
        _ => {
            let _ = out.write_all(&[value]);
        }
    }
    let _ = out.flush();
}

/// Writes one punched byte as its ASCII expansion.
fn punch_byte(out: &mut impl Write, cs: Charset, value: u8, parity: Parity) {
    let value = if cs == Charset::Hex { value } else { remove_parity(value, parity) };
    match charset::char_from_charset(value, cs) {
        Some(Decoded::Char(ch)) => {
            let _ = out.write_all(&[ch]);
        }
        Some(Decoded::Text(s)) => {
            let _ = out.write_all(s.as_bytes());
        }
        None => {}
    }
    let _ = out.flush();
}

/// The ordered collection of devices attached to the machine.
///
/// Insertion appends; iteration order is stable, which fixes which device
/// wins when several selected devices can provide input.
#[derive(Default)]
pub struct DeviceSet {
    devices: Vec<Device>,
}

impl DeviceSet {
    pub fn new() -> DeviceSet {
        DeviceSet { devices: Vec::new() }
    }

    /// Attaches a device to the machine.
    pub fn add(&mut self, device: Device) {
        self.devices.push(device);
    }

    /// Selects every device whose identifier is included in `code` and
    /// deselects the rest, invoking select/deselect hooks on transitions.
    pub fn select(&mut self, code: u8) {
        for device in &mut self.devices {
            if device_match(device, code) {
                device.select();
            } else {
                device.deselect();
            }
        }
    }

    /// True iff any selected output device reports busy.
    pub fn is_output_busy(&self) -> bool {
        self.devices
            .iter()
            .any(|d| d.selected && d.supports_output() && d.is_busy())
    }

    /// Outputs a byte to every selected output device that is ready.
    ///
    /// Parity is assumed to have been added already; `parity` tells the
    /// device what to strip if it needs the underlying 7-bit value.
    pub fn output(&mut self, value: u8, parity: Parity) {
        for device in &mut self.devices {
            if device.selected && device.supports_output() && !device.is_busy() {
                device.output(value, parity);
            }
        }
    }

    /// Inputs a byte from the first selected input device that has one.
    ///
    /// Parity is not checked here; `parity` hints to the device what the
    /// program expects in case it has to be synthesised.
    pub fn input(&mut self, parity: Parity) -> Option<u8> {
        for device in &mut self.devices {
            if device.selected && device.supports_input() {
                if let Some(value) = device.input(parity) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Reads the status byte of the first selected input device that can
    /// produce one.
    pub fn input_status(&mut self) -> Option<u8> {
        for device in &mut self.devices {
            if device.selected && device.supports_input() {
                if let Some(value) = device.status() {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Queues a byte on the first keyboard device.  Returns false if there
    /// is no keyboard attached.
    pub fn queue_key(&mut self, value: u8) -> bool {
        for device in &mut self.devices {
            if let DeviceKind::Keyboard { pending } = &mut device.kind {
                pending.push_back(value);
                return true;
            }
        }
        false
    }

    /// Discards any queued keyboard input.  Called whenever the machine
    /// halts so stale keystrokes do not leak into the next run.
    pub fn discard_pending_input(&mut self) {
        for device in &mut self.devices {
            if let DeviceKind::Keyboard { pending } = &mut device.kind {
                pending.clear();
            }
        }
    }

    /// The bytes captured by the sink with the given identifier.
    pub fn sink_bytes(&self, id: u8) -> Option<&[u8]> {
        self.devices.iter().find_map(|d| match &d.kind {
            DeviceKind::Sink { captured } if d.id == id => Some(captured.as_slice()),
            _ => None,
        })
    }
}
