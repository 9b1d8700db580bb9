//! `LineNumberTable`: maps code offsets back to BASIC line numbers.
//!
//! Each entry is two `u16` values, `start_pc` and `line_number`. An entry
//! covers code from its `start_pc` up to the next entry's `start_pc`.

/// Accumulates line table entries while a method body is emitted.
#[derive(Debug, Default)]
pub struct LineTableBuilder {
    entries: Vec<(u16, u16)>, // (pc, line)
}

impl LineTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that code from `pc` onward belongs to `line`.
    ///
    /// A line with no code of its own is superseded by the next line marked
    /// at the same offset.
    pub fn add(&mut self, pc: u16, line: u16) {
        match self.entries.last_mut() {
            Some(last) if last.0 == pc => last.1 = line,
            _ => self.entries.push((pc, line)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<(u16, u16)> {
        self.entries
    }
}

/// Encodes the attribute body (without name index and length).
pub fn encode(entries: &[(u16, u16)], out: &mut Vec<u8>) {
    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for &(pc, line) in entries {
        out.extend_from_slice(&pc.to_be_bytes());
        out.extend_from_slice(&line.to_be_bytes());
    }
}

/// Line number covering `pc`, if any entry starts at or before it.
pub fn line_for_pc(entries: &[(u16, u16)], pc: u16) -> Option<u16> {
    entries
        .iter()
        .take_while(|&&(start, _)| start <= pc)
        .last()
        .map(|&(_, line)| line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lines_collapse_onto_the_next() {
        let mut b = LineTableBuilder::new();
        b.add(0, 10); // REM only
        b.add(0, 20);
        b.add(5, 30);
        assert_eq!(b.finish(), vec![(0, 20), (5, 30)]);
    }

    #[test]
    fn encode_writes_count_then_pairs() {
        let mut out = Vec::new();
        encode(&[(0, 10), (0x0102, 0x0304)], &mut out);
        assert_eq!(out, vec![0, 2, 0, 0, 0, 10, 1, 2, 3, 4]);
    }

    #[test]
    fn lookup_finds_covering_entry() {
        let entries = [(0, 10), (4, 20), (9, 30)];
        assert_eq!(line_for_pc(&entries, 0), Some(10));
        assert_eq!(line_for_pc(&entries, 5), Some(20));
        assert_eq!(line_for_pc(&entries, 100), Some(30));
        assert_eq!(line_for_pc(&[(3, 1)], 2), None);
    }
}
