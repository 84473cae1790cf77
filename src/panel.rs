//! The operator front panel: status lamps, buttons, and the register
//! selector knob.
//!
//! The panel arbitrates which operations are legal in each machine state.
//! With the power off every button but POWER is dead.  Register and K
//! modifications need the machine halted and ready; HALT doubles as the
//! single-step button while halted.

use crate::cpu::Machine;
use crate::instruction::OP_NN;
use crate::word::Word;
use bitflags::bitflags;

bitflags! {
    /// The status lights on the front panel, from right to left.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StatusLights: u32 {
        /// Power light.
        const POWER = 0x0000_0001;
        /// Ready light.
        const READY = 0x0000_0002;
        /// Run light.
        const RUN = 0x0000_0004;
        /// Halt light.
        const HALT = 0x0000_0008;
        /// State of the K flag (carry bit).
        const K = 0x0000_0020;
        /// State of the track flag.
        const TRACK = 0x0000_0040;
        /// Register display, bits 0 (LSB) to 7 (MSB).
        const BIT_0 = 0x0000_0100;
        const BIT_1 = 0x0000_0200;
        const BIT_2 = 0x0000_0400;
        const BIT_3 = 0x0000_0800;
        const BIT_4 = 0x0000_1000;
        const BIT_5 = 0x0000_2000;
        const BIT_6 = 0x0000_4000;
        const BIT_7 = 0x0000_8000;
        /// Instruction register light.
        const INST = 0x0001_0000;
        /// Accumulator register light.
        const ACCUM = 0x0002_0000;
        /// Displaying the halt status code just after halting.
        const HALT_CODE = 0x0004_0000;
    }
}

const DISPLAY_BITS: StatusLights = StatusLights::BIT_0
    .union(StatusLights::BIT_1)
    .union(StatusLights::BIT_2)
    .union(StatusLights::BIT_3)
    .union(StatusLights::BIT_4)
    .union(StatusLights::BIT_5)
    .union(StatusLights::BIT_6)
    .union(StatusLights::BIT_7);

/// Positions of the register selector knob.
///
/// The byte-slice positions carry the bit offset of the displayed byte
/// within the 40-bit register: 0, 8, 16, 24 or 32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    ControlUp,
    ControlDown,
    Inst(u8),
    Accum(u8),
}

/// The buttons on the front panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Power,
    Ready,
    Run,
    Halt,
    KReset,
    KSet,
    /// Resets the selected register byte to zero.
    Reset,
    /// Sets bit 0..8 of the selected register byte.
    Bit(u8),
    /// Moves the register selector knob.
    Select(Selector),
}

impl Machine {
    /// Presses a button on the front panel.  Returns false if the button
    /// is blocked by the current machine state.
    pub fn press_button(&mut self, button: Button) -> bool {
        // With the power off the only live button is POWER.
        if button != Button::Power && !self.status_lights.contains(StatusLights::POWER) {
            self.selected_register = Selector::ControlUp;
            return false;
        }

        // Pressing any accepted button clears the halt code display.
        self.status_lights.remove(StatusLights::HALT_CODE);

        let mut ok = true;
        match button {
            Button::Power => {
                if !self.status_lights.contains(StatusLights::POWER) {
                    // Power on, into halt, with a full reset.
                    self.status_lights = StatusLights::POWER | StatusLights::HALT;
                    self.reset();
                } else {
                    self.status_lights = StatusLights::empty();
                    self.selected_register = Selector::ControlUp;
                    return true;
                }
            }
            Button::Ready => {
                if !self.status_lights.contains(StatusLights::READY) {
                    self.status_lights.insert(StatusLights::READY);
                    self.reset();
                } else if !self.status_lights.contains(StatusLights::RUN) {
                    // READY resets a halted machine.
                    self.reset();
                } else {
                    // Nothing to do while running.
                    ok = false;
                }
            }
            Button::Run => {
                if !self.status_lights.contains(StatusLights::READY) {
                    ok = false;
                } else if !self.status_lights.contains(StatusLights::RUN) {
                    self.status_lights.insert(StatusLights::RUN);
                    self.status_lights.remove(StatusLights::HALT);
                    if self.cr <= 0x07 {
                        // The current instruction is a halt; replace it
                        // with a no-op so the machine does not stop again
                        // immediately.
                        self.cr = OP_NN as u8;
                    }
                    // The knob can only sit at a control position while
                    // running.
                    if self.selected_register != Selector::ControlDown {
                        self.selected_register = Selector::ControlUp;
                    }
                }
            }
            Button::Halt => {
                // Halt needs the knob on a control position and the
                // machine ready.
                if !matches!(
                    self.selected_register,
                    Selector::ControlUp | Selector::ControlDown
                ) || !self.status_lights.contains(StatusLights::READY)
                {
                    ok = false;
                } else if self.status_lights.contains(StatusLights::RUN) {
                    self.status_lights.remove(StatusLights::RUN);
                    self.status_lights.insert(StatusLights::HALT);
                } else {
                    // Already halted: single-step one instruction.
                    self.step();
                }
            }
            Button::KReset | Button::KSet => {
                if self.halted_and_ready() {
                    self.k = (button == Button::KSet) as u8;
                } else {
                    ok = false;
                }
            }
            Button::Reset => {
                if self.halted_and_ready() {
                    self.modify_register(0xFF, 0x00);
                } else {
                    ok = false;
                }
            }
            Button::Bit(bit) => {
                if self.halted_and_ready() {
                    self.modify_register(1 << (bit & 0x07), 0xFF);
                } else {
                    ok = false;
                }
            }
            Button::Select(selector) => {
                // Knob positions are only adopted while halted and ready.
                if self.halted_and_ready() {
                    self.selected_register = selector;
                }
            }
        }

        self.update_status_lights();
        ok
    }

    /// True when the machine is not running.
    pub fn is_halted(&self) -> bool {
        !self.status_lights.contains(StatusLights::RUN)
    }

    /// The current state of the panel lamps.
    pub fn status_lights(&self) -> StatusLights {
        self.status_lights
    }

    /// The current position of the register selector knob.
    pub fn selected_register(&self) -> Selector {
        self.selected_register
    }

    fn halted_and_ready(&self) -> bool {
        !self.status_lights.contains(StatusLights::RUN)
            && self.status_lights.contains(StatusLights::READY)
    }

    /// Writes `value` under `mask` into the 8-bit register slice the knob
    /// selects.
    fn modify_register(&mut self, mask: u8, value: u8) {
        let value = value & mask;
        match self.selected_register {
            Selector::ControlUp | Selector::ControlDown => {
                self.cr = (self.cr & !mask) | value;
            }
            Selector::Inst(shift) => {
                self.i = modify_word_byte(self.i, shift, mask, value);
            }
            Selector::Accum(shift) => {
                self.a = modify_word_byte(self.a, shift, mask, value);
            }
        }
    }

    /// Recomputes the panel lamps from the machine state.
    pub fn update_status_lights(&mut self) {
        if !self.status_lights.contains(StatusLights::POWER) {
            // No lamp may be lit with the power off.
            self.status_lights = StatusLights::empty();
            return;
        }

        self.status_lights.set(StatusLights::K, self.k != 0);

        // The TRACK lamp mirrors the low bit of the current track number.
        self.status_lights
            .set(StatusLights::TRACK, self.last_address & 0x0080 != 0);

        // The register display shows CR while running, the halt code just
        // after a halt, or the knob-selected register byte.
        if self.status_lights.contains(StatusLights::RUN) {
            self.set_register_display(self.cr, None);
        } else if self.status_lights.contains(StatusLights::HALT_CODE) {
            self.set_register_display(self.halt_code, None);
        } else {
            match self.selected_register {
                Selector::ControlUp | Selector::ControlDown => {
                    self.set_register_display(self.cr, None);
                }
                Selector::Inst(shift) => {
                    self.set_register_display((self.i >> shift) as u8, Some(StatusLights::INST));
                }
                Selector::Accum(shift) => {
                    self.set_register_display((self.a >> shift) as u8, Some(StatusLights::ACCUM));
                }
            }
        }
    }

    fn set_register_display(&mut self, value: u8, source: Option<StatusLights>) {
        self.status_lights.remove(DISPLAY_BITS);
        self.status_lights |= StatusLights::from_bits_truncate((value as u32) << 8);
        self.status_lights.remove(StatusLights::INST | StatusLights::ACCUM);
        if let Some(source) = source {
            self.status_lights.insert(source);
        }
    }
}

fn modify_word_byte(word: Word, shift: u8, mask: u8, value: u8) -> Word {
    let word = word & !((mask as Word) << shift);
    word | ((value as Word) << shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::StepOutcome;
    use crate::word::WORD_MASK;

    #[test]
    fn power_off_swallows_every_other_button() {
        let mut machine = Machine::new();
        machine.press_button(Button::Power); // power was on: turn it off
        assert_eq!(machine.status_lights(), StatusLights::empty());
        for button in [
            Button::Ready,
            Button::Run,
            Button::Halt,
            Button::KSet,
            Button::Bit(3),
        ] {
            assert!(!machine.press_button(button));
            assert_eq!(machine.status_lights(), StatusLights::empty());
        }
        // POWER brings it back, halted.
        assert!(machine.press_button(Button::Power));
        assert!(machine.status_lights().contains(StatusLights::POWER | StatusLights::HALT));
    }

    #[test]
    fn run_requires_ready() {
        let mut machine = Machine::new();
        assert!(!machine.press_button(Button::Run));
        assert!(machine.press_button(Button::Ready));
        assert!(machine.press_button(Button::Run));
        assert!(machine.status_lights().contains(StatusLights::RUN));
        assert!(!machine.status_lights().contains(StatusLights::HALT));
    }

    #[test]
    fn run_rewrites_a_pending_halt_to_a_no_op() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.set_cr(0x03); // HH 3
        machine.press_button(Button::Run);
        assert_eq!(machine.cr(), OP_NN as u8);
    }

    #[test]
    fn halt_single_steps_while_halted() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        let cycles = machine.cycle_counter();
        // Halted: HALT executes exactly one instruction (the reset jump).
        machine.press_button(Button::Halt);
        assert!(machine.cycle_counter() > cycles);
        assert_eq!(machine.pc(), machine.entry_point());
    }

    #[test]
    fn halt_stops_a_running_machine() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.press_button(Button::Run);
        assert!(machine.press_button(Button::Halt));
        assert!(machine.is_halted());
        assert!(machine.status_lights().contains(StatusLights::HALT));
    }

    #[test]
    fn halt_is_gated_on_the_knob_position() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.press_button(Button::Select(Selector::Accum(8)));
        assert!(!machine.press_button(Button::Halt));
        machine.press_button(Button::Select(Selector::ControlUp));
        assert!(machine.press_button(Button::Halt));
    }

    #[test]
    fn register_modification_requires_halted_and_ready() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.press_button(Button::Run);
        assert!(!machine.press_button(Button::KSet));
        assert!(!machine.press_button(Button::Bit(0)));
        machine.press_button(Button::Halt);
        assert!(machine.press_button(Button::KSet));
        assert_eq!(machine.k(), 1);
        assert!(machine.press_button(Button::KReset));
        assert_eq!(machine.k(), 0);
    }

    #[test]
    fn bit_buttons_modify_the_selected_slice() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.set_a(0);
        machine.press_button(Button::Select(Selector::Accum(16)));
        machine.press_button(Button::Bit(0));
        machine.press_button(Button::Bit(7));
        assert_eq!(machine.a(), 0x81 << 16);
        // RESET zeroes the whole slice.
        machine.press_button(Button::Reset);
        assert_eq!(machine.a(), 0);

        // CR modifications hit all eight bits directly.
        machine.press_button(Button::Select(Selector::ControlUp));
        machine.set_cr(0);
        machine.press_button(Button::Bit(4));
        assert_eq!(machine.cr(), 0x10);
    }

    #[test]
    fn knob_is_forced_to_control_up_when_running() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.press_button(Button::Select(Selector::Inst(24)));
        machine.press_button(Button::Run);
        assert_eq!(machine.selected_register(), Selector::ControlUp);

        // Control Down survives the transition.
        machine.press_button(Button::Halt);
        machine.press_button(Button::Select(Selector::ControlDown));
        machine.press_button(Button::Run);
        assert_eq!(machine.selected_register(), Selector::ControlDown);
    }

    #[test]
    fn display_shows_the_selected_register_byte() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.set_i(0x11_2233_4455);
        machine.press_button(Button::Select(Selector::Inst(32)));
        let lights = machine.status_lights();
        assert!(lights.contains(StatusLights::INST));
        assert!(!lights.contains(StatusLights::ACCUM));
        assert_eq!((lights.bits() >> 8) & 0xFF, 0x11);

        machine.set_a(0xAA_BBCC_DDEE);
        machine.press_button(Button::Select(Selector::Accum(0)));
        let lights = machine.status_lights();
        assert!(lights.contains(StatusLights::ACCUM));
        assert_eq!((lights.bits() >> 8) & 0xFF, 0xEE);
    }

    #[test]
    fn halt_code_is_displayed_until_the_next_press() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.press_button(Button::Run);
        machine.set_memory(0xFFF, 0xFF05_0A0A_0A); // HH 5
        machine.step(); // reset jump
        assert_eq!(machine.step(), StepOutcome::Halt);
        machine.update_status_lights();
        let lights = machine.status_lights();
        assert!(lights.contains(StatusLights::HALT_CODE));
        assert_eq!((lights.bits() >> 8) & 0xFF, 5);
        assert_eq!(machine.halt_code(), 5);

        // The next button press clears the halt code display.
        machine.press_button(Button::Select(Selector::ControlUp));
        assert!(!machine.status_lights().contains(StatusLights::HALT_CODE));
    }

    #[test]
    fn k_and_track_lamps_mirror_machine_state() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.press_button(Button::KSet);
        assert!(machine.status_lights().contains(StatusLights::K));
        machine.press_button(Button::KReset);
        assert!(!machine.status_lights().contains(StatusLights::K));
        // The reset left last_address at the entry point 0xFFF, whose
        // track number is odd.
        assert!(machine.status_lights().contains(StatusLights::TRACK));
    }

    #[test]
    fn ready_resets_a_halted_machine() {
        let mut machine = Machine::new();
        machine.press_button(Button::Ready);
        machine.set_a(0);
        machine.press_button(Button::Ready);
        assert_eq!(machine.a(), WORD_MASK);
        assert_eq!(machine.k(), 1);
    }
}
