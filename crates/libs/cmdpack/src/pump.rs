//! Background threads draining child pipes into the handle's channel.

use std::{
    fmt,
    io::{BufRead, BufReader, ErrorKind, Read},
    sync::mpsc::Sender,
    thread::{self, JoinHandle},
};

use tracing::{debug, trace, warn};

use crate::{
    decode::{Decoder, OutputMode},
    prelude::*,
};

/// A child output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl Stream {
    /// Convert the stream to its string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events sent by a pump.
///
/// Every pump sends exactly one `Ended` as its last event, so a stream's end
/// marker can never overtake its output.
#[derive(Debug)]
pub enum PumpEvent {
    /// A decoded line, or a single byte in raw mode.
    Output(Stream, String),
    /// The pump stopped on an error.
    Failed(Stream, Error),
    /// The pipe reached end of file.
    Ended(Stream),
}

/// Start a named thread pumping `reader` into `tx`.
pub fn launch_stream_reader<R>(
    stream: Stream,
    reader: R,
    decoder: Decoder,
    tx: Sender<PumpEvent>,
) -> Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("cmdpack-{stream}"))
        .spawn(move || {
            if let Err(err) = read_stream(stream, reader, &decoder, &tx) {
                warn!(%stream, error = %err, "Output pump stopped");
                let _ = tx.send(PumpEvent::Failed(stream, err));
            }
            debug!(%stream, "Stream ended");
            let _ = tx.send(PumpEvent::Ended(stream));
        })?;
    Ok(handle)
}

fn read_stream<R: Read>(
    stream: Stream,
    reader: R,
    decoder: &Decoder,
    tx: &Sender<PumpEvent>,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let read_error = |source: std::io::Error| Error::Read { stream, source };

    match decoder.mode() {
        OutputMode::Lines => {
            let mut unit = Vec::new();
            loop {
                unit.clear();
                if reader.read_until(b'\n', &mut unit).map_err(read_error)? == 0 {
                    return Ok(()); // EOF
                }
                if !forward(stream, &unit, decoder, tx)? {
                    return Ok(());
                }
            }
        }
        OutputMode::Raw => {
            let mut byte = [0; 1];
            loop {
                match reader.read(&mut byte) {
                    Ok(0) => return Ok(()), // EOF
                    Ok(_) => {
                        if !forward(stream, &byte, decoder, tx)? {
                            return Ok(());
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(read_error(err)),
                }
            }
        }
    }
}

/// Decode and send one unit. Returns `false` once nobody is listening anymore.
fn forward(stream: Stream, unit: &[u8], decoder: &Decoder, tx: &Sender<PumpEvent>) -> Result<bool> {
    let text = decoder.decode_unit(unit).ok_or_else(|| Error::Decode {
        stream,
        bytes: unit.to_vec(),
    })?;
    trace!(%stream, text = %text, "Output");
    Ok(tx.send(PumpEvent::Output(stream, text)).is_ok())
}
