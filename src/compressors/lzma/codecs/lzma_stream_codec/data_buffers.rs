use std::io::{Read, Write};

use tracing::trace;

use crate::error::Result;

use super::super::length_codec::MATCH_LEN_MAX;

use self::cyclic_buffer::CyclicBuffer;

mod cyclic_buffer;

/// The encoder's view of the input: a window of history behind a read head, plus some
/// bytes ahead of it that haven't been encoded yet.
pub struct EncoderDataBuffer {
    head: u64,
    max_forwards_bytes: u32,
    buf: CyclicBuffer<u8>,
}

impl EncoderDataBuffer {
    /// `backwards_size` bytes of history are always kept behind the head, on top of up to
    /// `max_forwards_bytes` of lookahead.
    pub fn new(backwards_size: u32, max_forwards_bytes: u32) -> Self {
        Self {
            buf: CyclicBuffer::new(backwards_size as usize + max_forwards_bytes as usize),
            head: 0,
            max_forwards_bytes,
        }
    }

    /// The number of bytes ahead of the head.
    pub fn forwards_bytes(&self) -> u32 {
        (self.buf.pos() - self.head) as u32
    }

    /// The number of bytes behind the head that can still be read.
    pub fn backwards_bytes(&self) -> u64 {
        (self.buf.capacity() - self.forwards_bytes() as usize) as u64
    }

    pub fn pos(&self) -> u64 {
        self.head
    }

    /// The number of bytes that can be appended without overwriting the history.
    pub fn available_append_bytes(&self) -> u32 {
        self.max_forwards_bytes - self.forwards_bytes()
    }

    /// `input` may not be longer than [`Self::available_append_bytes`].
    pub fn append_data(&mut self, input: &[u8]) {
        assert!(
            input.len() <= self.available_append_bytes() as usize,
            "input.len(): {}, available_append_bytes(): {}",
            input.len(),
            self.available_append_bytes()
        );

        self.buf.push_slice(input)
    }

    pub fn skip(&mut self, len: u32) {
        debug_assert!(len <= self.forwards_bytes());
        self.head += len as u64;
    }

    pub fn increment_pos(&mut self) {
        debug_assert!(self.forwards_bytes() > 0);
        self.head += 1;
    }

    /// Index of the byte at `offset` from the head, as a backwards offset into the ring.
    fn get_byte_index(&self, offset: i32) -> usize {
        (self.forwards_bytes() as i64 - offset as i64 - 1) as usize
    }

    /// The byte at `offset` relative to the head. 0 is the next unread byte, negative offsets
    /// reach into the history.
    pub fn get_byte(&self, offset: i32) -> u8 {
        self.buf.get_relative(self.get_byte_index(offset))
    }

    /// How many bytes from the head onwards repeat the bytes at distance `delta` behind
    /// them (0 being the byte right before), up to `max_len`. The first `start_len` bytes
    /// are assumed to match already.
    pub fn get_match_length(&self, start_len: u32, delta: u32, max_len: u32) -> u32 {
        self.get_match_length_at(0, start_len, delta, max_len)
    }

    /// Up to `len` bytes from right behind the head, oldest first.
    pub fn history(&self, len: u32) -> Vec<u8> {
        let len = (len as u64).min(self.backwards_bytes()) as i32;
        (1..=len).rev().map(|back| self.get_byte(-back)).collect()
    }

    /// Like [`Self::get_match_length`], for a match starting `ahead` bytes after the head.
    /// Distances that reach past the history give 0.
    pub fn get_match_length_at(&self, ahead: u32, start_len: u32, delta: u32, max_len: u32) -> u32 {
        let forwards = self.forwards_bytes();
        if ahead >= forwards || delta as u64 >= self.backwards_bytes() + ahead as u64 {
            return 0;
        }

        let max_len = max_len.min(forwards - ahead);
        if start_len >= max_len {
            return max_len;
        }

        let src_offset = (forwards - ahead - start_len) as usize;
        let src = self.buf.as_slices_after(src_offset);
        let dst = self.buf.as_slices_after(src_offset + delta as usize + 1);

        let (src, dst) = align_slices(src, dst);

        // Walking contiguous slices keeps the inner loop free of ring arithmetic
        let mut len = start_len;
        for (src, dst) in src.iter().zip(dst.iter()) {
            let max = ((max_len - len) as usize).min(src.len()).min(dst.len());
            let matched = src[..max]
                .iter()
                .zip(&dst[..max])
                .take_while(|(a, b)| a == b)
                .count();

            len += matched as u32;
            if matched < max || len >= max_len {
                break;
            }
        }

        len
    }
}

/// Given two pairs of slices, split and align them both into [&[T]; 3] each so that
/// the first two slices are the same length and the last slice is the remainder.
fn align_slices<'a, T>(
    mut left: (&'a [T], &'a [T]),
    mut right: (&'a [T], &'a [T]),
) -> ([&'a [T]; 3], [&'a [T]; 3]) {
    // Let the left side be the one with the shorter first slice
    if left.0.len() > right.0.len() {
        std::mem::swap(&mut left, &mut right);
    }

    let length_diff = (right.0.len() - left.0.len()).min(left.1.len());

    let left_1 = left.0;
    let right_1 = &right.0[..left_1.len()];

    let left_2 = &left.1[..length_diff];
    let right_2 = &right.0[left_1.len()..];

    let left_3 = &left.1[length_diff..];
    let right_3 = right.1;

    ([left_1, left_2, left_3], [right_1, right_2, right_3])
}

/// The decoder's sliding window. Decoded bytes are appended here, matches copy from it,
/// and whatever hasn't been written to the output yet is flushed in batches.
pub struct DecoderDataBuffer {
    buf: CyclicBuffer<u8>,
    flushed_pos: u64,

    /// Window position at the start of the current pass.
    block_start: u64,
    /// History that was already in the window when the pass started.
    train_size: u64,
}

impl DecoderDataBuffer {
    /// The window is allocated as it fills, so an oversized dictionary in an untrusted
    /// header costs nothing until the data is there.
    pub fn new(capacity: u32) -> Self {
        Self {
            buf: CyclicBuffer::growable(capacity as usize),
            flushed_pos: 0,
            block_start: 0,
            train_size: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.buf.max_capacity() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.buf.pos() == 0
    }

    pub fn position(&self) -> u64 {
        self.buf.pos()
    }

    /// Preload history from a dictionary. Returns whether any bytes were read.
    pub fn train(&mut self, mut dictionary: impl Read) -> Result<bool> {
        let mut chunk = [0u8; 1 << 12];
        let mut total = 0u64;

        loop {
            let read = match dictionary.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };

            self.buf.push_slice(&chunk[..read]);
            total += read as u64;
        }

        // Trained bytes are history, never output
        self.flushed_pos = self.buf.pos();
        trace!(bytes = total, window = self.buf.pos(), "trained window");

        Ok(total > 0)
    }

    /// Mark the start of a new pass. Everything already in the window becomes history the
    /// pass may refer to.
    pub fn start_block(&mut self) {
        self.flushed_pos = self.buf.pos();
        self.block_start = self.buf.pos();
        self.train_size = self.buf.capacity() as u64;
    }

    /// Bytes produced by the current pass.
    pub fn block_pos(&self) -> u64 {
        self.buf.pos() - self.block_start
    }

    /// How far back a match in the current pass may reach.
    pub fn available_history(&self) -> u64 {
        self.train_size + self.block_pos()
    }

    pub fn put_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// The byte `dist + 1` positions back, so 0 is the last byte written.
    pub fn get_byte(&self, dist: u32) -> u8 {
        self.buf.get_relative(dist as usize)
    }

    /// Repeat `len` bytes starting `dist + 1` bytes back. Overlapping copies repeat the
    /// pattern the way a byte by byte copy would.
    pub fn copy_block(&mut self, dist: u32, len: u32) {
        let (dist, len) = (dist as usize, len as usize);

        if len <= dist && dist + len < self.buf.max_capacity() {
            self.buf.append_past_data((dist - len)..dist);
        } else {
            for _ in 0..len {
                let byte = self.buf.get_relative(dist);
                self.buf.push(byte);
            }
        }
    }

    fn flushable_bytes(&self) -> u64 {
        self.buf.pos() - self.flushed_pos
    }

    /// Whether the next packet could overwrite bytes that haven't been flushed yet.
    pub fn must_flush(&self) -> bool {
        self.flushable_bytes() + MATCH_LEN_MAX as u64 > self.buf.max_capacity() as u64
    }

    /// Write every pending byte to `output`. Returns the number of bytes written.
    pub fn flush(&mut self, mut output: impl Write) -> Result<u64> {
        let flushable = self.flushable_bytes() as usize;
        if flushable == 0 {
            return Ok(0);
        }

        let (left, right) = self.buf.as_slices_after(flushable);
        output.write_all(left)?;
        output.write_all(right)?;

        self.flushed_pos = self.buf.pos();
        trace!(bytes = flushable, position = self.buf.pos(), "flushed window");

        Ok(flushable as u64)
    }
}
