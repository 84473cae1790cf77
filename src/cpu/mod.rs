//! The Litton 1600 instruction engine and its drum-timing model.
//!
//! Program words are loaded into the 40-bit instruction register I and
//! rotated eight bits at a time into the 8-bit command register CR for
//! execution.  Every word therefore carries an implicit jump to the next
//! word in the same 256-word page in its high byte: when the real
//! instructions in a word are used up, the residue that has rotated back
//! into CR forms a jump opcode whose operand is the next word's address.
//!
//! Timing is accounted in word times (40 bit times of one microsecond
//! each) against the rotational position of the drum, which the engine
//! tracks in `rotation_predictor` as the sector currently under the head.

use crate::charset::Charset;
use crate::devices::{self, Device, DeviceSet};
use crate::drum::Drum;
use crate::instruction::disassemble_instruction;
use crate::panel::{Selector, StatusLights};
use crate::word::{DRUM_MAX_SIZE, DRUM_RESERVED_SECTORS, DrumLoc, WORD_BITS, WORD_MASK, Word, loc_sector};

mod ops_io;
mod ops_shift;
mod ops_single;

/// Number of cycles (bit times) in one word time.
pub const CYCLES_PER_WORD: u64 = 40;

/// Word times consumed by an I/O instruction that finds its device not
/// ready; the program is expected to retry.
pub(crate) const IO_BUSY_WORDS: u64 = 3;

/// Word times it takes the 300 baud serial line to move one byte.
pub(crate) const SERIAL_BYTE_WORDS: u64 = 833;

/// Result of stepping a single instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step was OK, execution continues.
    Ok,
    /// Processor has halted.
    Halt,
    /// Illegal instruction.
    Illegal,
    /// Spinning out of control: no jump taken for more than a drum's
    /// worth of instructions.
    Spinning,
}

/// Full state of the Litton machine.
pub struct Machine {
    // Registers.
    pub(crate) cr: u8,
    pub(crate) b: u8,
    pub(crate) k: u8,
    pub(crate) p: u8,
    pub(crate) i: Word,
    pub(crate) a: Word,

    // Drum memory and the block interchange loop.
    pub(crate) drum: Drum,
    pub(crate) bil: [Word; DRUM_RESERVED_SECTORS as usize],

    // The Litton has no real program counter; PC tracks the last jump
    // target for trace and diagnostics only.
    pub(crate) pc: DrumLoc,
    pub(crate) entry_point: DrumLoc,
    pub(crate) last_address: DrumLoc,
    pub(crate) halt_code: u8,

    // Devices and their image-configurable defaults.
    pub(crate) devices: DeviceSet,
    pub(crate) printer_id: u8,
    pub(crate) printer_charset: Charset,
    pub(crate) keyboard_id: u8,
    pub(crate) keyboard_charset: Charset,

    // Timing state.
    pub(crate) cycle_counter: u64,
    pub(crate) last_io_counter: u64,
    pub(crate) rotation_predictor: u32,
    pub(crate) spin_counter: u32,
    pub(crate) acceleration_counter: u32,
    step_cost: u64,

    // Front panel.
    pub(crate) status_lights: StatusLights,
    pub(crate) selected_register: Selector,

    /// Disassemble instructions to stderr as they are executed.
    pub disassemble: bool,

    pub(crate) title: String,
}

impl Machine {
    /// Creates a powered-on, halted machine with a cleared drum.
    pub fn new() -> Machine {
        let mut machine = Machine {
            cr: 0,
            b: 0,
            k: 0,
            p: 0,
            i: 0,
            a: 0,
            drum: Drum::new(),
            bil: [0; DRUM_RESERVED_SECTORS as usize],
            pc: 0,
            entry_point: 0,
            last_address: 0,
            halt_code: 0,
            devices: DeviceSet::new(),
            printer_id: 0,
            printer_charset: Charset::default(),
            keyboard_id: 0,
            keyboard_charset: Charset::default(),
            cycle_counter: 0,
            last_io_counter: 0,
            rotation_predictor: 0,
            spin_counter: 0,
            acceleration_counter: 0,
            step_cost: 0,
            status_lights: StatusLights::empty(),
            selected_register: Selector::ControlUp,
            disassemble: false,
            title: String::new(),
        };
        machine.clear_memory();
        machine
    }

    /// Clears the drum and restores the power-on defaults, ready for a new
    /// drum image.
    pub fn clear_memory(&mut self) {
        self.drum.clear();

        // Default entry point at reset time is the last word in memory.
        self.entry_point = DRUM_MAX_SIZE - 1;
        self.set_drum_size(DRUM_MAX_SIZE);

        // Default device information for the printer and keyboard.
        self.printer_id = devices::DEVICE_PRINTER;
        self.printer_charset = Charset::Ebs1231;
        self.keyboard_id = devices::DEVICE_KEYBOARD;
        self.keyboard_charset = Charset::Ebs1231;

        self.selected_register = Selector::ControlUp;
        self.status_lights = StatusLights::POWER | StatusLights::HALT;

        self.reset();
    }

    /// Resets the machine: a conditional jump to the entry point is forced
    /// into CR and I, and K is set so the jump will be taken on the first
    /// step.
    pub fn reset(&mut self) {
        let entry = self.entry_point;
        self.cr = 0xF0 | (entry >> 8) as u8;
        self.i = ((entry as Word & 0xFF) << 32) | 0xFFFF_FFFF;
        self.last_address = entry;

        // Fake the jump as starting from the last word of the drum.
        self.pc = DRUM_MAX_SIZE - 1;

        // A is all-ones and K is set upon reset.
        self.a = WORD_MASK;
        self.k = 1;
    }

    /// Sets the drum size (2048 or 4096 words), clamping the entry point
    /// back into range if necessary.
    pub fn set_drum_size(&mut self, size: DrumLoc) {
        self.drum.set_size(size);
        if self.entry_point >= self.drum.size() {
            self.entry_point = self.drum.size() - 1;
        }
    }

    /// The configured drum size in words.
    pub fn drum_size(&self) -> DrumLoc {
        self.drum.size()
    }

    /// Sets the entry point used at reset time, clamped to the drum size.
    pub fn set_entry_point(&mut self, entry: DrumLoc) {
        self.entry_point = if entry >= self.drum.size() {
            self.drum.size() - 1
        } else {
            entry
        };
    }

    pub fn entry_point(&self) -> DrumLoc {
        self.entry_point
    }

    // --- Register access for the panel, tools and tests ---

    pub fn a(&self) -> Word {
        self.a
    }

    pub fn set_a(&mut self, value: Word) {
        self.a = value & WORD_MASK;
    }

    pub fn i(&self) -> Word {
        self.i
    }

    pub fn set_i(&mut self, value: Word) {
        self.i = value & WORD_MASK;
    }

    pub fn b(&self) -> u8 {
        self.b
    }

    pub fn cr(&self) -> u8 {
        self.cr
    }

    pub fn set_cr(&mut self, value: u8) {
        self.cr = value;
    }

    pub fn k(&self) -> u8 {
        self.k
    }

    pub fn set_k(&mut self, value: u8) {
        self.k = (value != 0) as u8;
    }

    pub fn p(&self) -> u8 {
        self.p
    }

    /// Last jump target, for trace and diagnostics.
    pub fn pc(&self) -> DrumLoc {
        self.pc
    }

    /// Halt code from the last `HH` instruction.
    pub fn halt_code(&self) -> u8 {
        self.halt_code
    }

    /// Number of elapsed cycles; each cycle is one bit time of roughly one
    /// microsecond.
    pub fn cycle_counter(&self) -> u64 {
        self.cycle_counter
    }

    /// The sector currently under the drum head, 0..128.
    pub fn rotation_predictor(&self) -> u32 {
        self.rotation_predictor
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    // --- Drum access ---

    /// Reads a drum word without touching the machine timing state.
    pub fn get_memory(&self, addr: DrumLoc) -> Word {
        self.drum.get(addr)
    }

    /// Writes a drum word without touching the machine timing state.
    pub fn set_memory(&mut self, addr: DrumLoc, value: Word) {
        self.drum.set(addr, value);
    }

    /// Reads scratchpad register `s` (0..8).
    pub fn get_scratchpad(&self, s: u8) -> Word {
        self.drum.scratchpad(s)
    }

    /// Writes scratchpad register `s` (0..8).
    pub fn set_scratchpad(&mut self, s: u8, value: Word) {
        self.drum.set_scratchpad(s, value);
    }

    fn read_drum(&mut self, addr: DrumLoc) -> Word {
        self.last_address = addr & (DRUM_MAX_SIZE - 1);
        self.drum.get(addr)
    }

    fn write_drum(&mut self, addr: DrumLoc, value: Word) {
        self.last_address = addr & (DRUM_MAX_SIZE - 1);
        self.drum.set(addr, value);
    }

    // --- Devices ---

    /// Attaches a device to the machine.
    pub fn add_device(&mut self, device: Device) {
        self.devices.add(device);
    }

    /// Creates the printer and keyboard devices named by the loaded image
    /// metadata (or the power-on defaults).
    pub fn create_default_devices(&mut self) {
        if self.printer_id != 0 {
            self.devices.add(Device::printer(self.printer_id, self.printer_charset));
        }
        if self.keyboard_id != 0 {
            self.devices.add(Device::keyboard(self.keyboard_id, self.keyboard_charset));
        }
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut DeviceSet {
        &mut self.devices
    }

    /// Queues a keystroke for the keyboard device and nudges the pacing
    /// loop to burst through it, so pasted text keeps up with the program.
    pub fn queue_key(&mut self, value: u8) -> bool {
        if self.devices.queue_key(value) {
            self.acceleration_counter = self.acceleration_counter.saturating_add(1);
            true
        } else {
            false
        }
    }

    // --- Timing ---

    pub(crate) fn charge(&mut self, word_times: u64) {
        self.step_cost += word_times;
    }

    fn projected_cycles(&self) -> u64 {
        self.cycle_counter + self.step_cost * CYCLES_PER_WORD
    }

    /// Word times until the word at `addr` passes under the head, plus one
    /// word time for the transfer itself.
    pub(crate) fn drum_access_words(&self, addr: DrumLoc) -> u64 {
        let target = loc_sector(addr) as u64;
        let head = self.rotation_predictor as u64 % 128;
        ((target + 128 - head) % 128) + 1
    }

    /// Word times until scratchpad word `s` next recirculates past the
    /// head, plus one word time for the transfer.  The loop is aligned so
    /// that word `s` is available whenever any sector with low three bits
    /// `s` is.
    pub(crate) fn scratchpad_access_words(&self, s: u8) -> u64 {
        let s = (s & 0x07) as u64;
        let offset = self.rotation_predictor as u64 % 8;
        if offset <= s {
            s - offset + 1
        } else {
            s + 8 - offset + 1
        }
    }

    /// Accounts for the serial line moving one byte: if the line is still
    /// busy with the previous byte, the shortfall is rounded up to whole
    /// word times and charged as wait.
    pub(crate) fn charge_serial_byte(&mut self) {
        let ready = self.last_io_counter + SERIAL_BYTE_WORDS * CYCLES_PER_WORD;
        let now = self.projected_cycles();
        if now < ready {
            self.charge((ready - now).div_ceil(CYCLES_PER_WORD));
        }
        self.last_io_counter = self.projected_cycles();
    }

    // --- Execution ---

    /// Steps a single instruction and accounts its time.
    pub fn step(&mut self) -> StepOutcome {
        // A word of no-ops (or other non-jump data) would cycle forever;
        // break out if we have not seen a jump in a drum's worth of steps.
        if self.spin_counter > self.drum.size() as u32 {
            return StepOutcome::Spinning;
        }
        self.spin_counter += 1;
        self.step_cost = 0;

        let outcome = if self.cr < 0x40 {
            // Single-byte instruction.
            if self.disassemble {
                eprintln!("{}", disassemble_instruction(self.pc, self.cr as u16));
            }
            let outcome = self.exec_single();
            self.rotate_byte();
            outcome
        } else {
            // Double-byte instruction: CR plus the top byte of I.
            let insn = ((self.cr as u16) << 8) | ((self.i >> 32) as u16 & 0x00FF);
            if self.disassemble {
                eprintln!("{}", disassemble_instruction(self.pc, insn));
            }
            let outcome = self.exec_double(insn);
            self.rotate_byte();
            self.rotate_byte();
            outcome
        };

        let elapsed = self.step_cost;
        self.rotation_predictor = ((self.rotation_predictor as u64 + elapsed) % 128) as u32;
        self.cycle_counter += elapsed * CYCLES_PER_WORD;

        if outcome == StepOutcome::Illegal {
            log::warn!("illegal instruction near {:03X}", self.pc);
        }
        outcome
    }

    /// Rotates the 48-bit CR:I concatenation left one byte.
    fn rotate_byte(&mut self) {
        self.i = (self.i << 8) | self.cr as Word;
        self.cr = (self.i >> WORD_BITS) as u8;
        self.i &= WORD_MASK;
    }

    fn exec_double(&mut self, insn: u16) -> StepOutcome {
        let addr = insn & 0x0FFF;
        match self.cr & 0xF0 {
            0x40 => self.binary_shift(insn),
            0x50 | 0x70 => self.perform_io(insn),
            0x60 => self.decimal_shift(insn),
            0x80 => {
                // CA: load from memory into A.
                self.charge(1 + self.drum_access_words(addr));
                self.a = self.read_drum(addr);
                StepOutcome::Ok
            }
            0x90 => {
                // AD: add memory to A, carry out in K.
                self.charge(1 + self.drum_access_words(addr));
                let sum = self.a + self.read_drum(addr);
                self.k = (sum >> WORD_BITS) as u8;
                self.a = sum & WORD_MASK;
                StepOutcome::Ok
            }
            0xB0 => {
                // ST: store A to memory.
                self.charge(1 + self.drum_access_words(addr));
                self.write_drum(addr, self.a);
                StepOutcome::Ok
            }
            0xC0 => {
                // JM: jump mark, a "jump to subroutine" that saves the
                // return point in A.  A later JA comes back to just after
                // the JM, because the saved word re-enters execution with
                // this opcode slot rewritten as an unconditional jump.
                self.cr = 0xE0 | (self.cr & 0x0F);
                self.a = self.i & WORD_MASK;
                self.charge(1 + self.drum_access_words(addr));
                self.i = self.read_drum(addr);
                self.pc = addr;
                self.spin_counter = 0;
                StepOutcome::Ok
            }
            0xD0 => {
                // AC: conditional add; no memory access when K is clear.
                if self.k != 0 {
                    self.charge(1 + self.drum_access_words(addr));
                    let sum = self.a + self.read_drum(addr);
                    self.k = (sum >> WORD_BITS) as u8;
                    self.a = sum & WORD_MASK;
                } else {
                    self.charge(1);
                }
                StepOutcome::Ok
            }
            0xE0 => {
                // JU: unconditional jump.
                self.charge(1 + self.drum_access_words(addr));
                self.i = self.read_drum(addr);
                self.pc = addr;
                self.spin_counter = 0;
                StepOutcome::Ok
            }
            0xF0 => {
                // JC: conditional jump, taken iff K is set.  The opcode
                // slot is rewritten as unconditional for its next pass.
                if self.k != 0 {
                    self.charge(1 + self.drum_access_words(addr));
                    self.i = self.read_drum(addr);
                    self.pc = addr;
                    self.spin_counter = 0;
                    self.cr = 0xE0 | (self.cr & 0x0F);
                } else {
                    self.charge(1);
                }
                StepOutcome::Ok
            }
            _ => {
                self.charge(1);
                StepOutcome::Illegal
            }
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::Button;

    fn running_machine() -> Machine {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.press_button(Button::Run);
        machine
    }

    #[test]
    fn reset_preloads_a_conditional_jump_to_the_entry_point() {
        let mut machine = Machine::new();
        machine.set_entry_point(0xABC);
        machine.reset();
        assert_eq!(machine.cr(), 0xFA);
        assert_eq!(machine.i(), 0x00BC_FFFF_FFFF);
        assert_eq!(machine.a(), WORD_MASK);
        assert_eq!(machine.k(), 1);
        assert_eq!(machine.pc(), DRUM_MAX_SIZE - 1);
    }

    #[test]
    fn first_step_takes_the_reset_jump() {
        let mut machine = running_machine();
        machine.set_memory(0xFFF, 0x0A0A_0A0A_0A); // all no-ops
        // The reset jump goes through drum[0xFFF]; after the step I holds
        // the loaded word rotated once with the rewritten JU residue.
        assert_eq!(machine.step(), StepOutcome::Ok);
        assert_eq!(machine.pc(), 0xFFF);
        assert_eq!(machine.cr(), 0x0A);
        // The conditional jump was rewritten to 0xEF before rotation.
        assert_eq!(machine.i(), 0x0A0A_0AEF_0A);
    }

    #[test]
    fn empty_drum_halts_with_code_zero() {
        // Reset-to-halt: an all-zero drum jumps to 0xFFF and runs into HH 0.
        let mut machine = running_machine();
        assert_eq!(machine.step(), StepOutcome::Ok);
        assert_eq!(machine.step(), StepOutcome::Halt);
        assert_eq!(machine.halt_code(), 0);
        assert!(machine.is_halted());
    }

    #[test]
    fn ca_st_round_trip() {
        let mut machine = running_machine();
        machine.set_memory(0x100, 0x12_3456_7890);
        // CA $100; ST $101; then the residue jumps harmlessly.
        machine.set_memory(0xFFF, 0xFF81_00B1_01);
        machine.step(); // reset jump
        machine.step(); // CA
        assert_eq!(machine.a(), 0x12_3456_7890);
        machine.step(); // ST
        assert_eq!(machine.get_memory(0x101), 0x12_3456_7890);
    }

    #[test]
    fn ad_sets_carry_on_overflow() {
        let mut machine = running_machine();
        machine.set_memory(0x200, 0x0000_0000_03);
        machine.set_memory(0xFFF, 0xFF92_0000_00); // AD $200
        machine.step(); // reset jump
        machine.set_a(0xFF_FFFF_FFFE);
        machine.set_k(0);
        machine.step(); // AD $200
        // A = 0xFFFFFFFFFE + 3 = 1 carry 1.
        assert_eq!(machine.a(), 0x0000_0000_01);
        assert_eq!(machine.k(), 1);
    }

    #[test]
    fn jc_is_skipped_when_k_clear() {
        let mut machine = running_machine();
        // RK; JC $123; HH 0
        machine.set_memory(0xFFF, 0xFF13_F123_00);
        machine.step(); // reset jump
        machine.step(); // RK
        assert_eq!(machine.k(), 0);
        let pc_before = machine.pc();
        machine.step(); // JC, not taken
        assert_eq!(machine.pc(), pc_before);
        assert_eq!(machine.step(), StepOutcome::Halt);
    }

    #[test]
    fn jm_and_ja_form_a_subroutine_linkage() {
        let mut machine = running_machine();
        // Caller at 0xFFF: JM $10A, then after return a HH 2 halts.  The
        // callee address ends in 0x0A so the operand byte that rotates
        // back in first on return executes as a no-op.
        machine.set_memory(0xFFF, 0xFFC1_0A02_0A);
        // Callee at 0x10A: JA as the first instruction byte.
        machine.set_memory(0x10A, 0x000D_0A0A_0A);
        machine.step(); // reset jump
        machine.step(); // JM $10A
        assert_eq!(machine.pc(), 0x10A);
        // A holds the saved continuation of the caller word.
        assert_eq!(machine.a(), 0x0A02_0AEF_FF);
        machine.step(); // JA restores the continuation into I
        machine.step(); // the $0A operand byte runs as NN
        assert_eq!(machine.step(), StepOutcome::Halt);
        assert_eq!(machine.halt_code(), 2);
    }

    #[test]
    fn spinning_is_detected() {
        let mut machine = running_machine();
        // JA with A full of no-ops: the word recirculates through NN and
        // JA forever without a real jump ever being taken.
        machine.set_memory(0xFFF, 0xFF0D_0A0A_0A);
        machine.step(); // reset jump
        machine.set_a(0x0A0A_0A0A_0A);
        let mut outcome = StepOutcome::Ok;
        for _ in 0..(machine.drum_size() as usize + 8) {
            outcome = machine.step();
            if outcome != StepOutcome::Ok {
                break;
            }
        }
        assert_eq!(outcome, StepOutcome::Spinning);
    }

    #[test]
    fn illegal_single_byte_opcode_reports() {
        let mut machine = running_machine();
        machine.set_memory(0xFFF, 0xFF0C_0A0A_0A); // 0x0C is unassigned
        machine.step(); // reset jump
        assert_eq!(machine.step(), StepOutcome::Illegal);
    }

    #[test]
    fn cycle_counter_is_monotonic_and_predictor_in_range() {
        let mut machine = running_machine();
        machine.set_memory(0xFFF, 0x0A0A_0A0A_0A);
        let mut last = machine.cycle_counter();
        for _ in 0..64 {
            machine.step();
            assert!(machine.cycle_counter() >= last);
            last = machine.cycle_counter();
            assert!(machine.rotation_predictor() < 128);
        }
    }

    #[test]
    fn no_op_costs_one_word_time() {
        let mut machine = running_machine();
        machine.set_memory(0xFFF, 0x0A0A_0A0A_0A);
        machine.step(); // reset jump
        let before = machine.cycle_counter();
        machine.step(); // NN
        assert_eq!(machine.cycle_counter() - before, CYCLES_PER_WORD);
    }

    #[test]
    fn drum_access_time_models_the_rotation() {
        let machine = Machine::new();
        // Head starts at sector 0: reading sector 5 waits 5 word times
        // then spends one more on the transfer.
        assert_eq!(machine.drum_access_words(0x105), 6);
        // Reading the sector under the head costs just the transfer.
        assert_eq!(machine.drum_access_words(0x100), 1);
        // Scratchpad: index 3 with the loop at offset 0 waits 3, plus the
        // transfer; index 1 behind the loop offset waits into the next
        // 8-sector window.
        assert_eq!(machine.scratchpad_access_words(3), 4);
        let mut machine = machine;
        machine.rotation_predictor = 3;
        assert_eq!(machine.scratchpad_access_words(1), 7);
    }

    #[test]
    fn ca_charges_seek_plus_transfer() {
        let mut machine = running_machine();
        // CA $105 as the first instruction of the entry word.
        machine.set_memory(0xFFF, 0xFF81_050A_0A);
        machine.step(); // reset jump, costs 1 + access to 0xFFF
        let predictor = machine.rotation_predictor() as u64;
        let before = machine.cycle_counter();
        machine.step(); // CA $105
        let wait = (5 + 128 - predictor) % 128;
        assert_eq!(machine.cycle_counter() - before, (1 + wait + 1) * CYCLES_PER_WORD);
    }
}
