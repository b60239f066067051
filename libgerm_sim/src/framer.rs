use byteorder::{BigEndian, ByteOrder};

use super::constants::*;

const FIRST_PAYLOAD_BYTES: usize = FIRST_FRAME_WORDS * WORD_SIZE;
const CONTINUATION_PAYLOAD_BYTES: usize = CONTINUATION_FRAME_WORDS * WORD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// (sequence, START_MAGIC, run id) header
    First,
    /// (sequence) header
    Continuation,
    /// (sequence) header and (0, END_MAGIC) footer
    Final,
}

/// One data datagram, header and footer included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub sequence: u32,
    pub bytes: Vec<u8>,
}

impl Frame {
    fn build(kind: FrameKind, header: &[u32], payload: &[u8], footer: &[u32]) -> Self {
        let header_len = header.len() * WORD_SIZE;
        let footer_len = footer.len() * WORD_SIZE;
        let mut bytes = vec![0u8; header_len + payload.len() + footer_len];
        BigEndian::write_u32_into(header, &mut bytes[..header_len]);
        bytes[header_len..header_len + payload.len()].copy_from_slice(payload);
        BigEndian::write_u32_into(footer, &mut bytes[header_len + payload.len()..]);
        Self {
            kind,
            sequence: header[0],
            bytes,
        }
    }

    pub fn first(run_id: u32, payload: &[u8]) -> Self {
        Self::build(FrameKind::First, &[0, START_MAGIC, run_id], payload, &[])
    }

    pub fn continuation(sequence: u32, payload: &[u8]) -> Self {
        Self::build(FrameKind::Continuation, &[sequence], payload, &[])
    }

    pub fn last(sequence: u32, payload: &[u8]) -> Self {
        Self::build(FrameKind::Final, &[sequence], payload, &[0, END_MAGIC])
    }

    /// The data words carried by the frame, without header or footer
    pub fn payload(&self) -> &[u8] {
        match self.kind {
            FrameKind::First => &self.bytes[FIRST_HEADER_SIZE..],
            FrameKind::Continuation => &self.bytes[SEQUENCE_HEADER_SIZE..],
            FrameKind::Final => &self.bytes[SEQUENCE_HEADER_SIZE..self.bytes.len() - FOOTER_SIZE],
        }
    }

    /// Run id from the header of a first frame
    pub fn run_id(&self) -> Option<u32> {
        match self.kind {
            FrameKind::First => Some(BigEndian::read_u32(&self.bytes[8..12])),
            _ => None,
        }
    }
}

/// PacketFramer cuts the byte stream of one run into data frames.
///
/// Sub-batches are appended to a tail buffer and full frames are sliced off its front: the first
/// frame once 1020 words are available, continuation frames of 1022 words after that. Whatever
/// is left when the run ends goes into the final frame, which then fits in a 4096 byte datagram.
/// A run that received sub-batches but never filled the first frame closes with a short first
/// frame and an empty final frame. Only a run with no sub-batches at all is a lone final frame.
/// Framing never looks at the arming state; callers decide what to do with each frame.
#[derive(Debug)]
pub struct PacketFramer {
    run_id: u32,
    sequence: u32,
    tail: Vec<u8>,
    first_sent: bool,
    received: bool,
}

impl PacketFramer {
    pub fn new(run_id: u32) -> Self {
        Self {
            run_id,
            sequence: 0,
            tail: Vec::with_capacity(FRAME_CAPACITY_BYTES),
            first_sent: false,
            received: false,
        }
    }

    /// Append one sub-batch of big-endian words and emit every frame that is now full.
    ///
    /// Returns the number of frames emitted.
    pub fn push<F: FnMut(Frame)>(&mut self, sub_batch: &[u8], mut emit: F) -> usize {
        debug_assert_eq!(sub_batch.len() % WORD_SIZE, 0);
        self.tail.extend_from_slice(sub_batch);
        self.received = true;

        let mut offset = 0;
        let mut emitted = 0;
        if !self.first_sent {
            if self.tail.len() < FIRST_PAYLOAD_BYTES {
                return 0;
            }
            emit(Frame::first(self.run_id, &self.tail[..FIRST_PAYLOAD_BYTES]));
            self.first_sent = true;
            self.sequence += 1;
            offset = FIRST_PAYLOAD_BYTES;
            emitted += 1;
        }

        while self.tail.len() - offset >= CONTINUATION_PAYLOAD_BYTES {
            let end = offset + CONTINUATION_PAYLOAD_BYTES;
            emit(Frame::continuation(self.sequence, &self.tail[offset..end]));
            self.sequence += 1;
            offset = end;
            emitted += 1;
        }

        self.tail.drain(..offset);
        emitted
    }

    /// Close the run with the final frame carrying whatever is left in the tail.
    ///
    /// If the first frame is still owed, it is emitted with the whole tail before the final frame.
    pub fn finish<F: FnMut(Frame)>(mut self, mut emit: F) -> Frame {
        if self.received && !self.first_sent {
            emit(Frame::first(self.run_id, &self.tail));
            self.tail.clear();
            self.sequence += 1;
        }
        Frame::last(self.sequence, &self.tail)
    }

    /// Sequence number the next frame will carry
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Words waiting in the tail
    pub fn pending_words(&self) -> usize {
        self.tail.len() / WORD_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Big-endian bytes of consecutive words starting at `start`
    fn words(start: u32, n: usize) -> Vec<u8> {
        let values: Vec<u32> = (start..start + n as u32).collect();
        let mut bytes = vec![0u8; n * WORD_SIZE];
        BigEndian::write_u32_into(&values, &mut bytes);
        bytes
    }

    fn frame_run(run_id: u32, sizes: &[usize]) -> (Vec<Frame>, Vec<u8>) {
        let mut framer = PacketFramer::new(run_id);
        let mut frames = Vec::new();
        let mut input = Vec::new();
        let mut next = 0u32;
        for &size in sizes {
            let batch = words(next, size);
            next += size as u32;
            input.extend_from_slice(&batch);
            framer.push(&batch, |f| frames.push(f));
        }
        let last = framer.finish(|f| frames.push(f));
        frames.push(last);
        (frames, input)
    }

    #[test]
    fn test_two_frame_run() {
        let (frames, _) = frame_run(3, &[1021, 5]);
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].kind, FrameKind::First);
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[0].payload().len(), 1020 * WORD_SIZE);
        assert_eq!(frames[0].run_id(), Some(3));
        assert_eq!(&frames[0].bytes[..12], &[0, 0, 0, 0, 0xFE, 0xED, 0xFA, 0xCE, 0, 0, 0, 3]);

        assert_eq!(frames[1].kind, FrameKind::Final);
        assert_eq!(frames[1].sequence, 1);
        assert_eq!(frames[1].payload().len(), 6 * WORD_SIZE);
        assert_eq!(&frames[1].bytes[..4], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_empty_run() {
        let (frames, _) = frame_run(1, &[]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::Final);
        assert_eq!(frames[0].sequence, 0);
        assert!(frames[0].payload().is_empty());
        assert_eq!(frames[0].bytes, vec![0, 0, 0, 0, 0, 0, 0, 0, 0xDE, 0xCA, 0xFB, 0xAD]);
    }

    #[test]
    fn test_short_run_still_has_first_frame() {
        let (frames, _) = frame_run(9, &[5]);
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].kind, FrameKind::First);
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[0].run_id(), Some(9));
        assert_eq!(frames[0].payload(), words(0, 5).as_slice());

        assert_eq!(frames[1].kind, FrameKind::Final);
        assert_eq!(frames[1].sequence, 1);
        assert!(frames[1].payload().is_empty());
    }

    #[test]
    fn test_lossless_and_contiguous() {
        let cases: [&[usize]; 6] = [
            &[1020],
            &[3, 500, 2000, 1, 5000, 0],
            &[1020, 1022],
            &[4096, 4096, 4096],
            &[0, 0, 1019],
            &[10_000],
        ];
        for sizes in cases {
            let (frames, input) = frame_run(7, sizes);

            let joined: Vec<u8> = frames.iter().flat_map(|f| f.payload().to_vec()).collect();
            assert_eq!(joined, input, "payload mismatch for {sizes:?}");

            for (idx, frame) in frames.iter().enumerate() {
                assert_eq!(frame.sequence, idx as u32);
                assert!(frame.bytes.len() <= FRAME_CAPACITY_BYTES);
            }

            let last = frames.last().unwrap();
            assert_eq!(last.kind, FrameKind::Final);
            assert_eq!(
                &last.bytes[last.bytes.len() - FOOTER_SIZE..],
                &[0, 0, 0, 0, 0xDE, 0xCA, 0xFB, 0xAD]
            );
            assert_eq!(
                frames.iter().filter(|f| f.kind == FrameKind::Final).count(),
                1
            );

            assert_eq!(frames[0].kind, FrameKind::First);
            assert_eq!(frames[0].run_id(), Some(7));
            assert_eq!(
                frames.iter().filter(|f| f.kind == FrameKind::First).count(),
                1
            );
        }
    }

    #[test]
    fn test_small_batches_accumulate() {
        let mut framer = PacketFramer::new(1);
        let mut count = 0;
        for idx in 0..101 {
            count += framer.push(&words(idx * 10, 10), |_| ());
        }
        // 1010 words are not enough for the first frame
        assert_eq!(count, 0);
        assert_eq!(framer.pending_words(), 1010);
        assert_eq!(framer.sequence(), 0);

        let mut frames = Vec::new();
        framer.push(&words(1010, 10), |f| frames.push(f));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::First);
        assert_eq!(framer.pending_words(), 0);
        assert_eq!(framer.sequence(), 1);

        // The first frame is already out, so finishing adds only the final frame
        let last = framer.finish(|f| frames.push(f));
        assert_eq!(frames.len(), 1);
        assert_eq!(last.sequence, 1);
    }

    #[test]
    fn test_exact_continuation_boundary() {
        let (frames, _) = frame_run(2, &[1020 + 1022]);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].kind, FrameKind::Continuation);
        assert_eq!(frames[1].payload().len(), CONTINUATION_PAYLOAD_BYTES);
        assert_eq!(
            frames[1].bytes.len(),
            SEQUENCE_HEADER_SIZE + CONTINUATION_PAYLOAD_BYTES
        );
        assert!(frames[2].payload().is_empty());
        assert_eq!(frames[2].sequence, 2);
    }
}
