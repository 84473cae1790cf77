//! Single-byte instructions: halts, accumulator arithmetic and tests, and
//! the scratchpad operations.

use super::{Machine, StepOutcome};
use crate::panel::StatusLights;
use crate::word::{WORD_BITS, WORD_MASK, WORD_MSB, Word};

impl Machine {
    pub(crate) fn exec_single(&mut self) -> StepOutcome {
        self.charge(1);
        match self.cr {
            0x00..=0x07 => {
                // HH: halt, with the 3-bit code shown on the register
                // display.  While the operator is single-stepping (HALT
                // lamp lit) it acts as a no-op so stepping can continue
                // past it.
                if self.status_lights.contains(StatusLights::HALT) {
                    return StepOutcome::Ok;
                }
                self.halt_code = self.cr & 0x07;
                self.status_lights.remove(StatusLights::RUN);
                self.status_lights
                    .insert(StatusLights::HALT | StatusLights::HALT_CODE);
                StepOutcome::Halt
            }
            0x08 => {
                // AK: add K to the accumulator, carry out in K.
                let sum = self.a + self.k as Word;
                self.k = (sum >> WORD_BITS) as u8;
                self.a = sum & WORD_MASK;
                StepOutcome::Ok
            }
            0x09 => {
                // CL: clear the accumulator.
                self.a = 0;
                StepOutcome::Ok
            }
            0x0A => {
                // NN: no operation.
                StepOutcome::Ok
            }
            0x0B => {
                // CM: complement the accumulator, K set if non-zero.
                self.a = 0u64.wrapping_sub(self.a) & WORD_MASK;
                self.k = (self.a != 0) as u8;
                StepOutcome::Ok
            }
            0x0D => {
                // JA: jump to the contents of the accumulator.
                self.i = self.a & WORD_MASK;
                StepOutcome::Ok
            }
            0x0F => {
                // BI: interchange the Block Interchange Loop with the
                // scratchpad, one loop revolution.
                self.charge(8);
                for s in 0..8u8 {
                    let temp = self.drum.scratchpad(s);
                    self.drum.set_scratchpad(s, self.bil[s as usize]);
                    self.bil[s as usize] = temp;
                }
                // K reports the external interchange device as ready; no
                // such device is emulated, so it always is.
                self.k = 1;
                StepOutcome::Ok
            }
            0x10 => {
                // SK: set K to 1.
                self.k = 1;
                StepOutcome::Ok
            }
            0x11 => {
                // TZ: test A for zero.
                self.k = (self.a == 0) as u8;
                StepOutcome::Ok
            }
            0x12 => {
                // TH / TN: test the high bit of A.
                self.k = ((self.a & WORD_MSB) != 0) as u8;
                StepOutcome::Ok
            }
            0x13 => {
                // RK: reset K to 0.
                self.k = 0;
                StepOutcome::Ok
            }
            0x14 => {
                // TP: test the parity failure latch and clear it.
                self.k = self.p;
                self.p = 0;
                StepOutcome::Ok
            }
            0x18..=0x1F => {
                // LA: logical AND of scratchpad register S with A.
                let s = self.cr & 0x07;
                self.charge(self.scratchpad_access_words(s));
                self.a &= self.drum.scratchpad(s);
                self.k = (self.a == 0) as u8;
                StepOutcome::Ok
            }
            0x20..=0x27 => {
                // XC: exchange A with scratchpad register S.
                let s = self.cr & 0x07;
                self.charge(self.scratchpad_access_words(s));
                let temp = self.drum.scratchpad(s);
                self.drum.set_scratchpad(s, self.a);
                self.a = temp;
                StepOutcome::Ok
            }
            0x28..=0x2F => {
                // XT: extract.  A = (S & A) and S = (S & ~A) as if in
                // parallel, so S is read into a temporary first.
                let s = self.cr & 0x07;
                self.charge(self.scratchpad_access_words(s));
                let temp = self.drum.scratchpad(s);
                self.drum.set_scratchpad(s, temp & !self.a & WORD_MASK);
                self.a &= temp;
                StepOutcome::Ok
            }
            0x30..=0x37 => {
                // TE: test if A equals scratchpad register S.
                let s = self.cr & 0x07;
                self.charge(self.scratchpad_access_words(s));
                self.k = (self.a == self.drum.scratchpad(s)) as u8;
                StepOutcome::Ok
            }
            0x38..=0x3F => {
                // TG: test if A is greater than or equal to scratchpad
                // register S, unsigned.
                let s = self.cr & 0x07;
                self.charge(self.scratchpad_access_words(s));
                self.k = (self.a >= self.drum.scratchpad(s)) as u8;
                StepOutcome::Ok
            }
            _ => StepOutcome::Illegal,
        }
    }
}
