use std::collections::HashSet;
use std::io::{self, Chain, Cursor, Read};

use crate::format::{self, Format, HEADER_SIZE};

/// What the stack found once it stopped unwrapping layers: either it ran out of known formats,
/// or it hit a disk-image format and halted per spec.md §4.6 ("record a convert flag and stop").
#[derive(Debug, Clone, Copy, Default)]
pub struct Outcome {
    /// Set once a disk-image format is detected; downstream code must invoke the out-of-band
    /// conversion tool after the stream has been fully written.
    pub convert: bool,
    /// The disk-image format detected, if any. Always `Some` when `convert` is true.
    pub format: Option<Format>,
}

/// A stack of decorating readers built by peeling off one compression layer at a time until the
/// remaining bytes are either unrecognized or a disk-image format (spec.md §4.6).
///
/// Each layer is rewound with the header bytes it consumed pushed back via a `Chain<Cursor<_>,
/// _>`, so the next layer sees an unmodified stream starting at byte zero (the "multi-reader
/// pushed after each header read" invariant).
pub struct ReaderStack {
    top: Box<dyn Read + Send>,
    depth: usize,
}

type Rewound = Chain<Cursor<Vec<u8>>, Box<dyn Read + Send>>;

impl ReaderStack {
    /// Build the stack for one raw input stream, detecting and unwrapping every known
    /// compression layer in turn until a disk-image format is hit or no more formats match.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a header read fails.
    pub fn build(source: Box<dyn Read + Send>) -> io::Result<(Self, Outcome)> {
        let mut remaining: HashSet<Format> = Format::ALL.into_iter().collect();
        let mut top = source;
        let mut depth = 0;

        let outcome = loop {
            let mut header = vec![0_u8; HEADER_SIZE];
            let filled = read_fill(top.as_mut(), &mut header)?;
            header.truncate(filled);

            let Some(matched) = format::detect(&header, &mut remaining) else {
                top = rewind(header, top);
                break Outcome::default();
            };

            let rewound = rewind(header, top);
            if matched.is_disk_image() {
                top = rewound;
                break Outcome { convert: true, format: Some(matched) };
            }

            top = matched.decompress(rewound);
            depth = depth.saturating_add(1);
        };

        Ok((Self { top, depth }, outcome))
    }

    /// How many compression layers were unwrapped to reach the current top of the stack
    #[must_use]
    pub fn layers_unwrapped(&self) -> usize {
        self.depth
    }

    /// Walk the stack in reverse, closing every layer; the last error encountered is returned
    /// but every layer is still given a chance to close (spec.md §4.6 invariant). Plain `Read`
    /// adapters have nothing to flush, so this degenerates to a drop, but the shape is kept so a
    /// future layer that does need cleanup (e.g. a counting/flushing wrapper) has somewhere to
    /// report an error from.
    pub fn close(self) -> io::Result<()> {
        drop(self.top);
        Ok(())
    }
}

impl Read for ReaderStack {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.top.read(buf)
    }
}

fn rewind(header: Vec<u8>, rest: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
    let chained: Rewound = Cursor::new(header).chain(rest);
    Box::new(chained)
}

fn read_fill(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total = total.saturating_add(n),
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}
