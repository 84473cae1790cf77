//! Character set conversions for text based input and output.
//!
//! Devices nominate one of four character sets: plain ASCII, uppercase-only
//! ASCII, the EBS/1231 typewriter code, or a hexadecimal dump mode.  The
//! EBS/1231 code needs more than a plain table lookup: some codes expand to
//! multi-character ASCII escapes such as `[P1]` or `{49}` which are emitted
//! verbatim on output and matched greedily on input.

use lazy_static::lazy_static;

/// Character sets for text based input and output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Charset {
    /// Plain ASCII.
    Ascii,
    /// Uppercase-only ASCII.
    UAscii,
    /// Charset from Appendix V of the EBS/1231 System Programming Manual.
    Ebs1231,
    /// Dump as hexadecimal bytes.
    Hex,
}

impl Charset {
    /// Looks up a character set by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Charset> {
        if name.eq_ignore_ascii_case("ASCII") {
            Some(Charset::Ascii)
        } else if name.eq_ignore_ascii_case("UASCII") {
            Some(Charset::UAscii)
        } else if name.eq_ignore_ascii_case("EBS1231") {
            Some(Charset::Ebs1231)
        } else if name.eq_ignore_ascii_case("HEX") {
            Some(Charset::Hex)
        } else {
            None
        }
    }

    /// The canonical name of this character set.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Ascii => "ASCII",
            Charset::UAscii => "UASCII",
            Charset::Ebs1231 => "EBS1231",
            Charset::Hex => "HEX",
        }
    }
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Ebs1231
    }
}

/// The ASCII rendering of a character code in some character set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// The code maps to a single ASCII character.
    Char(u8),
    /// The code needs a multi-character ASCII escape.
    Text(&'static str),
}

/// Mapping table from Appendix V of the EBS/1231 System Programming Manual,
/// indexed by the octal character code.
static EBS1231_TO_ASCII: [&str; 128] = [
    /* 000 */ " ",
    /* 001 */ "1",
    /* 002 */ "2",
    /* 003 */ "3",
    /* 004 */ "4",
    /* 005 */ "5",
    /* 006 */ "6",
    /* 007 */ "7",
    /* 010 */ "8",
    /* 011 */ "9",
    /* 012 */ "@", // Also the CLEAR key
    /* 013 */ "#", // Also the P0 key
    /* 014 */ "[P1]",
    /* 015 */ "[P2]",
    /* 016 */ "[P3]",
    /* 017 */ "[P4]",
    /* 020 */ "0",
    /* 021 */ "/",
    /* 022 */ "S",
    /* 023 */ "T",
    /* 024 */ "U",
    /* 025 */ "V",
    /* 026 */ "W",
    /* 027 */ "X",
    /* 030 */ "Y",
    /* 031 */ "Z",
    /* 032 */ "*",
    /* 033 */ ",",
    /* 034 */ "[I]",
    /* 035 */ "[II]",
    /* 036 */ "[III]",
    /* 037 */ "[IIII]",
    /* 040 */ "-", // Also the diamond key
    /* 041 */ "J",
    /* 042 */ "K",
    /* 043 */ "L",
    /* 044 */ "M",
    /* 045 */ "N",
    /* 046 */ "O",
    /* 047 */ "P",
    /* 050 */ "Q",
    /* 051 */ "R",
    /* 052 */ "%",
    /* 053 */ "$",
    /* 054 */ "[LFB]", // Line feed both
    /* 055 */ "[LFR]", // Line feed right
    /* 056 */ "[BR]",  // Black ribbon print
    /* 057 */ "\x0C",  // Form up
    /* 060 */ "&",
    /* 061 */ "A",
    /* 062 */ "B",
    /* 063 */ "C",
    /* 064 */ "D",
    /* 065 */ "E",
    /* 066 */ "F",
    /* 067 */ "G",
    /* 070 */ "H",
    /* 071 */ "I",
    /* 072 */ "[072]", // Not used
    /* 073 */ ".",
    /* 074 */ "[RR]", // Red ribbon print
    /* 075 */ "\n",   // Line feed left
    /* 076 */ "\x08", // Backspace
    /* 077 */ "[TL]", // Carriage Open or Close / Tape Leader
    /* 100 */ "\r",   // Return printer to position 1
    /* 101 */ "{4}",  // Print wheel positions from here on
    /* 102 */ "{7}",
    /* 103 */ "{10}",
    /* 104 */ "{13}",
    /* 105 */ "{16}",
    /* 106 */ "{19}",
    /* 107 */ "{22}",
    /* 110 */ "{25}",
    /* 111 */ "{28}",
    /* 112 */ "{31}",
    /* 113 */ "{34}",
    /* 114 */ "{37}",
    /* 115 */ "{40}",
    /* 116 */ "{43}",
    /* 117 */ "{46}",
    /* 120 */ "{49}",
    /* 121 */ "{52}",
    /* 122 */ "{55}",
    /* 123 */ "{58}",
    /* 124 */ "{61}",
    /* 125 */ "{64}",
    /* 126 */ "{67}",
    /* 127 */ "{70}",
    /* 130 */ "{73}",
    /* 131 */ "{76}",
    /* 132 */ "{79}",
    /* 133 */ "{82}",
    /* 134 */ "{85}",
    /* 135 */ "{88}",
    /* 136 */ "{91}",
    /* 137 */ "{94}",
    /* 140 */ "{97}",
    /* 141 */ "{100}",
    /* 142 */ "{103}",
    /* 143 */ "{106}",
    /* 144 */ "{109}",
    /* 145 */ "{112}",
    /* 146 */ "{115}",
    /* 147 */ "{118}",
    /* 150 */ "{121}",
    /* 151 */ "{124}",
    /* 152 */ "{127}",
    /* 153 */ "{130}",
    /* 154 */ "{133}",
    /* 155 */ "{136}",
    /* 156 */ "{139}",
    /* 157 */ "{142}",
    /* 160 */ "{145}",
    /* 161 */ "{148}",
    /* 162 */ "{151}",
    /* 163 */ "{154}",
    /* 164 */ "{157}",
    /* 165 */ "{160}",
    /* 166 */ "{163}",
    /* 167 */ "{166}",
    /* 170 */ "{169}",
    /* 171 */ "{172}",
    /* 172 */ "{175}",
    /* 173 */ "{178}",
    /* 174 */ "{181}",
    /* 175 */ "{184}",
    /* 176 */ "{187}",
    /* 177 */ "{190}",
];

lazy_static! {
    // Pre-rendered hex pairs so that Decoded::Text can borrow statically.
    static ref HEX_BYTES: Vec<String> = (0..256).map(|b| format!("{:02X}", b)).collect();
}

fn ebs1231_match(s: &str, posn: &mut usize, sequence: &str) -> bool {
    let rest = &s.as_bytes()[*posn..];
    let seq = sequence.as_bytes();
    if rest.len() >= seq.len() && rest[..seq.len()].eq_ignore_ascii_case(seq) {
        *posn += seq.len();
        true
    } else {
        false
    }
}

/// Converts the next ASCII character (or escape sequence) of `s` into a code
/// in the destination character set, advancing `posn` past it.
///
/// Returns `None` if there are no more characters or the next character has
/// no valid mapping (in which case `posn` is left unchanged).
pub fn char_to_charset(s: &str, posn: &mut usize, charset: Charset) -> Option<u8> {
    let bytes = s.as_bytes();
    if *posn >= bytes.len() {
        return None;
    }
    match charset {
        Charset::Ascii => {
            let ch = bytes[*posn];
            *posn += 1;
            Some(ch)
        }
        Charset::UAscii => {
            let ch = bytes[*posn].to_ascii_uppercase();
            *posn += 1;
            Some(ch)
        }
        // HEX is not supported for input at the moment; fall back to the
        // EBS1231 table like the typewriter does.
        Charset::Ebs1231 | Charset::Hex => {
            for (code, sequence) in EBS1231_TO_ASCII.iter().enumerate() {
                if ebs1231_match(s, posn, sequence) {
                    return Some(code as u8);
                }
            }
            None
        }
    }
}

/// Converts a character code in a specific character set into its ASCII
/// rendering, or `None` when the code has no mapping.
pub fn char_from_charset(code: u8, charset: Charset) -> Option<Decoded> {
    match charset {
        Charset::Ascii | Charset::UAscii => Some(Decoded::Char(code)),
        Charset::Ebs1231 => {
            let s = EBS1231_TO_ASCII[(code & 0x7F) as usize];
            if s.len() == 1 {
                Some(Decoded::Char(s.as_bytes()[0]))
            } else {
                Some(Decoded::Text(s))
            }
        }
        Charset::Hex => {
            let s: &'static str = HEX_BYTES[code as usize].as_str();
            Some(Decoded::Text(s))
        }
    }
}

/// Converts an EBS/1231 character code into a print wheel position between
/// 1 and 190, or 0 if the code is not a print wheel position.
pub fn print_wheel_position(code: u8) -> u8 {
    if (0o101..=0o177).contains(&code) {
        (code - 0o101) * 3 + 4
    } else {
        0
    }
}
