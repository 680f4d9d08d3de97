//! Turning raw pipe reads into text.

/// Text encodings tried when decoding child output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Strict UTF-8.
    Utf8,
    /// ISO-8859-1, where every byte maps to the code point of the same value.
    Latin1,
}

impl Encoding {
    /// Decode `bytes`, or `None` if they are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes).ok().map(String::from),
            Encoding::Latin1 => Some(bytes.iter().copied().map(char::from).collect()),
        }
    }
}

/// Encodings tried by default, in order.
pub const DEFAULT_ENCODINGS: [Encoding; 2] = [Encoding::Utf8, Encoding::Latin1];

/// How a pipe is cut into items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// One item per newline-terminated line, terminator stripped.
    #[default]
    Lines,
    /// One item per byte, delivered as soon as it is read.
    Raw,
}

/// Decoding policy shared by the pumps of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoder {
    mode: OutputMode,
    encodings: Vec<Encoding>,
}

impl Decoder {
    /// Create a decoder trying `encodings` in order.
    pub fn new(mode: OutputMode, encodings: Vec<Encoding>) -> Self {
        Self { mode, encodings }
    }

    /// How output is cut into items.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Encodings tried, in order.
    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings
    }

    /// Decode one unit read from a pipe.
    ///
    /// In line mode trailing CR/LF bytes are removed first. Returns `None` when
    /// no encoding of the chain accepts the bytes.
    pub fn decode_unit(&self, unit: &[u8]) -> Option<String> {
        let unit = match self.mode {
            OutputMode::Lines => trim_line_ending(unit),
            OutputMode::Raw => unit,
        };
        self.encodings
            .iter()
            .find_map(|encoding| encoding.decode(unit))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(OutputMode::default(), DEFAULT_ENCODINGS.to_vec())
    }
}

fn trim_line_ending(mut unit: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = unit {
        unit = rest;
    }
    unit
}
