//! Drum image loading and saving.
//!
//! Two text formats are understood.  The canonical drum image is
//! line-oriented, with `#`-prefixed metadata lines followed by
//! `AAA:WWWWWWWWWW` data lines (12-bit address and 40-bit word in hex).
//! The tape image is a stream of hex words with one-character terminators:
//! `/` stores and advances, a line break does the same across a gap, `#`
//! reloads the address from the word just read, and `,` stores the final
//! word.  Tape images are detected by their first line starting with three
//! hex digits and a `#`.
//!
//! Loader diagnostics are per line; parsing continues to the end of the
//! file and the load fails overall iff any line failed.

use crate::EmuResult;
use crate::charset::Charset;
use crate::cpu::Machine;
use crate::devices::is_valid_device_id;
use crate::drum::UseMask;
use crate::word::{DRUM_MAX_SIZE, DrumLoc, WORD_MASK, Word};
use std::fs;
use std::path::Path;

/// Loads a drum or tape image from a file.
pub fn load_drum(machine: &mut Machine, path: &Path, use_mask: Option<&mut UseMask>) -> EmuResult<()> {
    let name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", name, e))?;
    load_drum_text(machine, &text, &name, use_mask)
}

/// Loads a drum or tape image from text already in memory.  `name` is
/// used in diagnostics.
pub fn load_drum_text(
    machine: &mut Machine,
    text: &str,
    name: &str,
    use_mask: Option<&mut UseMask>,
) -> EmuResult<()> {
    let mut use_mask = use_mask;
    if let Some(mask) = use_mask.as_deref_mut() {
        mask.clear();
    }

    // A first line of three hex digits and a '#' marks a tape image.
    let first = text.as_bytes();
    if first.len() >= 4
        && first[..3].iter().all(u8::is_ascii_hexdigit)
        && first[3] == b'#'
    {
        return load_tape_text(machine, text, name, use_mask);
    }

    let mut errors = 0usize;
    for (index, line) in text.lines().enumerate() {
        let line = line.trim_end();
        let lineno = index + 1;
        if let Some(rest) = line.strip_prefix('#') {
            if let Some(value) = rest.strip_prefix("Drum-Size:") {
                match value.trim().parse::<DrumLoc>() {
                    Ok(size) => machine.set_drum_size(size),
                    Err(_) => {
                        log::error!("{}:{}: invalid drum size", name, lineno);
                        errors += 1;
                    }
                }
            } else if let Some(value) = rest.strip_prefix("Entry-Point:") {
                match DrumLoc::from_str_radix(value.trim(), 16) {
                    Ok(entry) => machine.set_entry_point(entry),
                    Err(_) => {
                        log::error!("{}:{}: invalid entry point", name, lineno);
                        errors += 1;
                    }
                }
            } else if let Some(value) = rest.strip_prefix("Title:") {
                machine.set_title(value.trim());
            } else if let Some(value) = rest.strip_prefix("Printer-Character-Set:") {
                match Charset::from_name(value.trim()) {
                    Some(charset) => machine.printer_charset = charset,
                    None => {
                        log::error!("{}:{}: invalid printer character set", name, lineno);
                        errors += 1;
                    }
                }
            } else if let Some(value) = rest.strip_prefix("Printer-Device:") {
                match u8::from_str_radix(value.trim(), 16) {
                    Ok(id) if is_valid_device_id(id) => machine.printer_id = id,
                    _ => {
                        log::error!("{}:{}: invalid printer device identifier", name, lineno);
                        errors += 1;
                    }
                }
            } else if let Some(value) = rest.strip_prefix("Keyboard-Character-Set:") {
                match Charset::from_name(value.trim()) {
                    Some(charset) => machine.keyboard_charset = charset,
                    None => {
                        log::error!("{}:{}: invalid keyboard character set", name, lineno);
                        errors += 1;
                    }
                }
            } else if let Some(value) = rest.strip_prefix("Keyboard-Device:") {
                match u8::from_str_radix(value.trim(), 16) {
                    Ok(id) if is_valid_device_id(id) => machine.keyboard_id = id,
                    _ => {
                        log::error!("{}:{}: invalid keyboard identifier", name, lineno);
                        errors += 1;
                    }
                }
            }
            // Other metadata lines, including the format marker, are
            // ignored.
        } else if !line.is_empty() {
            match parse_data_line(line) {
                Some((addr, word)) => {
                    let addr = addr & (DRUM_MAX_SIZE - 1);
                    machine.set_memory(addr, word & WORD_MASK);
                    if let Some(mask) = use_mask.as_deref_mut() {
                        mask.mark(addr);
                    }
                }
                None => {
                    log::error!("{}:{}: invalid drum data '{}'", name, lineno, line);
                    errors += 1;
                }
            }
        }
    }

    if errors != 0 {
        Err(format!("{}: {} error(s) in drum image", name, errors))
    } else {
        Ok(())
    }
}

fn parse_data_line(line: &str) -> Option<(DrumLoc, Word)> {
    let (addr, word) = line.split_once(':')?;
    let addr = DrumLoc::from_str_radix(addr.trim(), 16).ok()?;
    let word = Word::from_str_radix(word.trim(), 16).ok()?;
    Some((addr, word))
}

fn load_tape_text(
    machine: &mut Machine,
    text: &str,
    name: &str,
    mut use_mask: Option<&mut UseMask>,
) -> EmuResult<()> {
    let bytes = text.as_bytes();
    let mut pos = 0usize;
    let mut addr: DrumLoc = 0;
    let invalid = || format!("{}: invalid tape image", name);

    loop {
        // Skip whitespace before the next word.
        while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\r' | b'\n') {
            pos += 1;
        }
        if pos >= bytes.len() || !bytes[pos].is_ascii_hexdigit() {
            return Err(invalid());
        }

        // Accumulate hexadecimal digits.
        let mut word: Word = 0;
        while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
            word = (word << 4).wrapping_add((bytes[pos] as char).to_digit(16).unwrap() as Word);
            pos += 1;
        }

        let terminator = if pos < bytes.len() {
            let t = bytes[pos];
            pos += 1;
            Some(t)
        } else {
            None
        };
        match terminator {
            None | Some(b',') => {
                // Record the final word and stop.
                if addr >= DRUM_MAX_SIZE {
                    return Err(invalid());
                }
                store_tape_word(machine, &mut use_mask, addr, word);
                return Ok(());
            }
            Some(b'/') | Some(b'\r') | Some(b'\n') => {
                // Record the current word and advance.
                if addr >= DRUM_MAX_SIZE {
                    return Err(invalid());
                }
                store_tape_word(machine, &mut use_mask, addr, word);
                addr += 1;
            }
            Some(b'#') => {
                // The word just read is the address of a new range.
                if word >= DRUM_MAX_SIZE as Word {
                    return Err(invalid());
                }
                addr = word as DrumLoc;
            }
            Some(_) => return Err(invalid()),
        }
    }
}

fn store_tape_word(
    machine: &mut Machine,
    use_mask: &mut Option<&mut UseMask>,
    addr: DrumLoc,
    word: Word,
) {
    machine.set_memory(addr, word & WORD_MASK);
    if let Some(mask) = use_mask.as_deref_mut() {
        mask.mark(addr);
    }
}

/// Saves the drum to a file in the canonical address-indexed form.
pub fn save_drum(machine: &Machine, path: &Path) -> EmuResult<()> {
    fs::write(path, save_drum_string(machine))
        .map_err(|e| format!("{}: {}", path.display(), e))
}

/// Renders the drum image as text.
pub fn save_drum_string(machine: &Machine) -> String {
    let mut out = String::new();
    out.push_str("#Litton-Drum-Image\n");
    if !machine.title().is_empty() {
        out.push_str(&format!("#Title: {}\n", machine.title()));
    }
    out.push_str(&format!("#Drum-Size: {}\n", machine.drum_size()));
    out.push_str(&format!("#Entry-Point: {:03X}\n", machine.entry_point()));
    out.push_str(&format!(
        "#Printer-Character-Set: {}\n",
        machine.printer_charset.name()
    ));
    if machine.printer_id != 0 {
        out.push_str(&format!("#Printer-Device: {:02X}\n", machine.printer_id));
    }
    out.push_str(&format!(
        "#Keyboard-Character-Set: {}\n",
        machine.keyboard_charset.name()
    ));
    if machine.keyboard_id != 0 {
        out.push_str(&format!("#Keyboard-Device: {:02X}\n", machine.keyboard_id));
    }
    for addr in 0..machine.drum_size() {
        out.push_str(&format!("{:03X}:{:010X}\n", addr, machine.get_memory(addr)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drum_image_with_metadata() {
        let mut machine = Machine::new();
        let mut mask = UseMask::new();
        let text = "#Litton-Drum-Image\n\
                    #Title: Payroll\n\
                    #Drum-Size: 2048\n\
                    #Entry-Point: 7FF\n\
                    #Printer-Character-Set: ASCII\n\
                    #Printer-Device: 41\n\
                    #Keyboard-Character-Set: UASCII\n\
                    #Keyboard-Device: 48\n\
                    100:1234567890\n\
                    7FF:FF81000000\n";
        load_drum_text(&mut machine, text, "test.drum", Some(&mut mask)).unwrap();
        assert_eq!(machine.title(), "Payroll");
        assert_eq!(machine.drum_size(), 2048);
        assert_eq!(machine.entry_point(), 0x7FF);
        assert_eq!(machine.printer_charset, Charset::Ascii);
        assert_eq!(machine.keyboard_charset, Charset::UAscii);
        assert_eq!(machine.get_memory(0x100), 0x12_3456_7890);
        assert_eq!(machine.get_memory(0x7FF), 0xFF_8100_0000);
        assert!(mask.is_used(0x100));
        assert!(mask.is_used(0x7FF));
        assert!(!mask.is_used(0x101));
    }

    #[test]
    fn bad_lines_are_counted_but_parsing_continues() {
        let mut machine = Machine::new();
        let text = "100:1234567890\n\
                    not a data line\n\
                    #Printer-Character-Set: KLINGON\n\
                    #Printer-Device: 40\n\
                    200:0000000005\n";
        let err = load_drum_text(&mut machine, text, "bad.drum", None).unwrap_err();
        assert!(err.contains("3 error(s)"));
        // Good lines were still applied.
        assert_eq!(machine.get_memory(0x100), 0x12_3456_7890);
        assert_eq!(machine.get_memory(0x200), 5);
        // The invalid device id did not overwrite the default.
        assert_eq!(machine.printer_id, crate::devices::DEVICE_PRINTER);
    }

    #[test]
    fn tape_image_with_ranges() {
        let mut machine = Machine::new();
        let mut mask = UseMask::new();
        // Words at 0x010 and 0x011, a gap to 0x123 via an address reload,
        // then a final word.
        let text = "010#1111111111/2222222222\r\n123#3333333333,";
        load_drum_text(&mut machine, text, "test.tape", Some(&mut mask)).unwrap();
        assert_eq!(machine.get_memory(0x010), 0x11_1111_1111);
        assert_eq!(machine.get_memory(0x011), 0x22_2222_2222);
        assert_eq!(machine.get_memory(0x123), 0x33_3333_3333);
        assert!(mask.is_used(0x010));
        assert!(mask.is_used(0x011));
        assert!(!mask.is_used(0x012));
        assert!(mask.is_used(0x123));
    }

    #[test]
    fn tape_image_words_are_masked_to_40_bits() {
        let mut machine = Machine::new();
        let text = "000#FFFFFFFFFFFF,";
        load_drum_text(&mut machine, text, "test.tape", None).unwrap();
        assert_eq!(machine.get_memory(0), WORD_MASK);
    }

    #[test]
    fn truncated_tape_image_is_rejected() {
        let mut machine = Machine::new();
        assert!(load_drum_text(&mut machine, "010#12345/xyz", "t.tape", None).is_err());
        // An address reload beyond the drum is invalid.
        assert!(load_drum_text(&mut machine, "FFF#1000#0,", "t.tape", None).is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut machine = Machine::new();
        machine.set_title("Round Trip");
        machine.set_drum_size(2048);
        machine.set_entry_point(0x700);
        machine.printer_charset = Charset::Hex;
        machine.set_memory(0x000, 0x00_0000_0001);
        machine.set_memory(0x1AB, 0xAB_CDEF_0123);
        machine.set_memory(0x7FF, 0x55_5555_5555);
        let saved = save_drum_string(&machine);

        let mut reloaded = Machine::new();
        load_drum_text(&mut reloaded, &saved, "saved.drum", None).unwrap();
        assert_eq!(reloaded.title(), "Round Trip");
        assert_eq!(reloaded.drum_size(), 2048);
        assert_eq!(reloaded.entry_point(), 0x700);
        assert_eq!(reloaded.printer_charset, Charset::Hex);
        for addr in 0..machine.drum_size() {
            assert_eq!(reloaded.get_memory(addr), machine.get_memory(addr));
        }
    }
}
