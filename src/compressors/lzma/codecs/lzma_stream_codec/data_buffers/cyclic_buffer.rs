use std::ops::Range;

/// Storage a growable buffer starts with.
const INITIAL_GROWABLE_SIZE: usize = 1 << 16;

/// A fixed size ring of values. Writing never fails, old values are simply overwritten.
///
/// Reads are addressed by backwards offsets, where 0 is the most recently pushed value.
pub struct CyclicBuffer<T: Copy + Default> {
    buf: Vec<T>,
    /// Size the storage may grow to. Until it gets there nothing has wrapped, so
    /// `pos <= buf.len()`.
    limit: usize,

    /// Total number of values ever pushed. The next write lands at `pos % buf.len()`.
    pos: u64,
}

impl<T: Copy + Default> CyclicBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cyclic buffer capacity must be positive");

        Self {
            buf: vec![T::default(); capacity],
            limit: capacity,
            pos: 0,
        }
    }

    /// A ring that allocates as values arrive, up to `limit`.
    pub fn growable(limit: usize) -> Self {
        assert!(limit > 0, "cyclic buffer capacity must be positive");

        Self {
            buf: vec![T::default(); limit.min(INITIAL_GROWABLE_SIZE)],
            limit,
            pos: 0,
        }
    }

    /// Make room for `additional` values without wrapping, if the limit allows.
    fn reserve(&mut self, additional: usize) {
        let len = self.buf.len();
        if len == self.limit || self.pos + additional as u64 <= len as u64 {
            return;
        }

        let needed = (self.pos as usize).saturating_add(additional);
        let new_len = needed.max(len.saturating_mul(2)).min(self.limit);
        self.buf.resize(new_len, T::default());
    }

    #[cfg(test)]
    fn allocated(&self) -> usize {
        self.buf.len()
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Number of values that can currently be read back.
    pub fn capacity(&self) -> usize {
        self.pos.min(self.buf.len() as u64) as usize
    }

    pub fn max_capacity(&self) -> usize {
        self.limit
    }

    fn index_of(&self, pos: u64) -> usize {
        (pos % self.buf.len() as u64) as usize
    }

    pub fn get_relative(&self, backwards_offset: usize) -> T {
        assert!(
            backwards_offset < self.capacity(),
            "backwards_offset: {}, capacity: {}",
            backwards_offset,
            self.capacity()
        );

        self.buf[self.index_of(self.pos - backwards_offset as u64 - 1)]
    }

    /// The last `backwards_offset` values as two slices, oldest first. The second slice
    /// is only non-empty when the range wraps around the end of the storage.
    pub fn as_slices_after(&self, backwards_offset: usize) -> (&[T], &[T]) {
        assert!(
            backwards_offset <= self.capacity(),
            "backwards_offset: {}, capacity: {}",
            backwards_offset,
            self.capacity()
        );

        let buf = &self.buf;
        let index = self.index_of(self.pos);

        if backwards_offset <= index {
            (&buf[(index - backwards_offset)..index], &[])
        } else {
            (&buf[(buf.len() - (backwards_offset - index))..], &buf[..index])
        }
    }

    /// Values between two backwards offsets, `range.end` being the oldest.
    pub fn as_slices_between(&self, backwards_offset_range: Range<usize>) -> (&[T], &[T]) {
        let (left, right) = self.as_slices_after(backwards_offset_range.end);
        let len = backwards_offset_range.end - backwards_offset_range.start;

        if left.len() >= len {
            (&left[..len], &[])
        } else {
            (left, &right[..(len - left.len())])
        }
    }

    pub fn push(&mut self, val: T) {
        self.reserve(1);
        let index = self.index_of(self.pos);
        self.buf[index] = val;
        self.pos += 1;
    }

    pub fn push_slice(&mut self, mut val: &[T]) {
        self.reserve(val.len());
        while !val.is_empty() {
            let index = self.index_of(self.pos);
            let to_write = (self.buf.len() - index).min(val.len());

            self.buf[index..(index + to_write)].copy_from_slice(&val[..to_write]);
            self.pos += to_write as u64;
            val = &val[to_write..];
        }
    }

    /// Append a copy of the values between two backwards offsets.
    ///
    /// The source may not overlap the destination: `range.end >= len` and
    /// `range.end + len < max_capacity()`. Callers fall back to pushing one value at a
    /// time otherwise.
    pub fn append_past_data(&mut self, backwards_offset_range: Range<usize>) {
        let len = backwards_offset_range.end - backwards_offset_range.start;
        if len == 0 {
            return;
        }

        self.reserve(len);
        let size = self.buf.len();
        assert!(
            backwards_offset_range.end >= len && backwards_offset_range.end + len < size,
            "overlapping copy: range {:?}, capacity {}",
            backwards_offset_range,
            size
        );

        let dst_start = self.index_of(self.pos);
        let mut dst_end = (dst_start + len) % size;
        if dst_end == 0 {
            dst_end = size;
        }

        let src_start = self.index_of(self.pos - 1 - backwards_offset_range.end as u64);
        let mut src_end = (src_start + len) % size;
        if src_end == 0 {
            src_end = size;
        }

        let buf = &mut self.buf;

        // + is src, - is dst
        if src_end < src_start {
            // ++++]....[----]....[++++
            let (rest, src_first) = buf.split_at_mut(src_start);
            let (src_second, rest) = rest.split_at_mut(src_end);
            let dst = &mut rest[(dst_start - src_end)..(dst_end - src_end)];

            dst[..src_first.len()].copy_from_slice(src_first);
            dst[src_first.len()..].copy_from_slice(src_second);
        } else if dst_end < dst_start {
            // ----]....[++++]....[----
            let (rest, dst_first) = buf.split_at_mut(dst_start);
            let (dst_second, rest) = rest.split_at_mut(dst_end);
            let src = &rest[(src_start - dst_end)..(src_end - dst_end)];

            dst_first.copy_from_slice(&src[..dst_first.len()]);
            dst_second.copy_from_slice(&src[dst_first.len()..]);
        } else if src_start < dst_start {
            // ....[++++]....[----]....
            let (src, dst) = buf.split_at_mut(dst_start);
            dst[..len].copy_from_slice(&src[src_start..src_end]);
        } else {
            // ....[----]....[++++]....
            let (dst, src) = buf.split_at_mut(src_start);
            dst[dst_start..dst_end].copy_from_slice(&src[..len]);
        }

        self.pos += len as u64;
    }
}
