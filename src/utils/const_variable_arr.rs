/// A constant length array with a variable length exposed slice at runtime.
///
/// Used for the per pos_state tables, where the count is only known once `pb` is known
/// but is bounded at compile time, so the tables can stay inline instead of behind a Vec.
#[derive(Debug, Clone)]
pub struct ConstVariableArr<T, const MAX_LEN: usize> {
    arr: [T; MAX_LEN],
    len: usize,
}

impl<T, const MAX_LEN: usize> ConstVariableArr<T, MAX_LEN> {
    pub fn new(val: T, len: usize) -> Self
    where
        T: Clone,
    {
        assert!(len <= MAX_LEN, "len {} exceeds capacity {}", len, MAX_LEN);

        Self {
            // Every slot gets its own clone, the tables hold non-copy types
            arr: array_macro::array![_i => val.clone(); MAX_LEN],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        &self.arr[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.arr[..self.len]
    }
}

impl<T, const MAX_LEN: usize> std::ops::Index<usize> for ConstVariableArr<T, MAX_LEN> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

impl<T, const MAX_LEN: usize> std::ops::IndexMut<usize> for ConstVariableArr<T, MAX_LEN> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.as_mut_slice()[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_only_the_runtime_length() {
        let mut arr = ConstVariableArr::<Vec<u8>, 16>::new(vec![1, 2], 4);
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.as_slice().len(), 4);

        arr[3].push(3);
        assert_eq!(arr[3], vec![1, 2, 3]);
        assert_eq!(arr[0], vec![1, 2]);
    }

    #[test]
    #[should_panic]
    fn indexing_past_the_runtime_length_panics() {
        let arr = ConstVariableArr::<u32, 16>::new(0, 2);
        let _value = arr[2];
    }
}
