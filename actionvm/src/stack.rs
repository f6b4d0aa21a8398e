use crate::Value;

pub const DEFAULT_SEGMENT_SIZE: usize = 256;

/// Operand stack shared by the whole call chain.
///
/// Values live in fixed-capacity segments; every segment except the last
/// one is full, so absolute positions map to `(segment, offset)` with a
/// division and pushes never move existing values.
#[derive(Debug, Clone)]
pub struct OperandStack {
    segments: Vec<Vec<Value>>,
    spare: Vec<Vec<Value>>,
    segment_size: usize,
    len: usize,
}

impl Default for OperandStack {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE)
    }
}

impl OperandStack {
    #[must_use]
    pub fn new(segment_size: usize) -> Self {
        let segment_size = segment_size.max(1);
        Self {
            segments: vec![Vec::with_capacity(segment_size)],
            spare: Vec::new(),
            segment_size,
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Values that can be pushed without allocating.
    #[must_use]
    pub fn free(&self) -> usize {
        self.segments.len() * self.segment_size - self.len + self.spare.len() * self.segment_size
    }

    /// Pre-allocates room for `n` pushes.
    pub fn ensure_free(&mut self, n: usize) {
        while self.free() < n {
            self.spare.push(Vec::with_capacity(self.segment_size));
        }
    }

    /// Guarantees at least `n` values above `base`. Missing values are
    /// inserted as `undefined` directly above `base`; returns how many were
    /// inserted.
    pub fn ensure_size(&mut self, base: usize, n: usize) -> usize {
        let available = self.len.saturating_sub(base);
        if available >= n {
            return 0;
        }
        let missing = n - available;
        let above = self.pop_n(available);
        for _ in 0..missing {
            self.push(Value::Undefined);
        }
        for value in above {
            self.push(value);
        }
        missing
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.segment_size, index % self.segment_size)
    }

    pub fn push(&mut self, value: Value) {
        let last = self.segments.len() - 1;
        if self.segments[last].len() == self.segment_size {
            let segment = self
                .spare
                .pop()
                .unwrap_or_else(|| Vec::with_capacity(self.segment_size));
            self.segments.push(segment);
        }
        let last = self.segments.len() - 1;
        self.segments[last].push(value);
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<Value> {
        if self.len == 0 {
            return None;
        }
        let last = self.segments.len() - 1;
        let value = self.segments[last].pop();
        self.len -= 1;
        if last > 0 && self.segments[last].is_empty() {
            if let Some(segment) = self.segments.pop() {
                self.spare.push(segment);
            }
        }
        value
    }

    /// Value at absolute position `index` (0 is the bottom).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.len {
            return None;
        }
        let (segment, offset) = self.locate(index);
        self.segments[segment].get(offset).copied()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        if index >= self.len {
            return None;
        }
        let (segment, offset) = self.locate(index);
        self.segments[segment].get_mut(offset)
    }

    /// The nth value from the top (0-indexed).
    #[must_use]
    pub fn peek(&self, n: usize) -> Option<Value> {
        if n >= self.len {
            return None;
        }
        self.get(self.len - 1 - n)
    }

    pub fn peek_mut(&mut self, n: usize) -> Option<&mut Value> {
        if n >= self.len {
            return None;
        }
        let index = self.len - 1 - n;
        self.get_mut(index)
    }

    /// Removes the top `n` values (or fewer if the stack is shorter) and
    /// returns them bottom-to-top.
    pub fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let n = n.min(self.len);
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(v) = self.pop() {
                values.push(v);
            }
        }
        values.reverse();
        values
    }

    /// Swaps the values `i` and `j` positions from the top.
    pub fn swap(&mut self, i: usize, j: usize) {
        if i >= self.len || j >= self.len || i == j {
            return;
        }
        let a = self.len - 1 - i;
        let b = self.len - 1 - j;
        let (sa, oa) = self.locate(a);
        let (sb, ob) = self.locate(b);
        if sa == sb {
            self.segments[sa].swap(oa, ob);
        } else {
            let va = self.segments[sa][oa];
            self.segments[sa][oa] = self.segments[sb][ob];
            self.segments[sb][ob] = va;
        }
    }

    pub fn truncate(&mut self, height: usize) {
        while self.len > height {
            self.pop();
        }
    }

    /// Removes and returns everything above `base`, bottom-to-top.
    pub fn drain_from(&mut self, base: usize) -> Vec<Value> {
        self.pop_n(self.len.saturating_sub(base))
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.segments.iter().flat_map(|s| s.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_across_segment_boundaries() {
        let mut stack = OperandStack::new(4);
        for i in 0..10 {
            stack.push(Value::Int(i));
        }
        assert_eq!(stack.len(), 10);
        assert_eq!(stack.segment_count(), 3);
        assert_eq!(stack.peek(0), Some(Value::Int(9)));
        assert_eq!(stack.peek(9), Some(Value::Int(0)));
        assert_eq!(stack.get(4), Some(Value::Int(4)));
        for i in (0..10).rev() {
            assert_eq!(stack.pop(), Some(Value::Int(i)));
        }
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.segment_count(), 1);
    }

    #[test]
    fn segments_are_recycled() {
        let mut stack = OperandStack::new(2);
        stack.ensure_free(7);
        assert!(stack.free() >= 7);
        for i in 0..7 {
            stack.push(Value::Int(i));
        }
        assert_eq!(stack.free(), 1);
        stack.truncate(1);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.peek(0), Some(Value::Int(0)));
    }

    #[test]
    fn pop_n_and_swap_keep_order() {
        let mut stack = OperandStack::new(3);
        for i in 0..7 {
            stack.push(Value::Int(i));
        }
        stack.swap(0, 5);
        assert_eq!(stack.peek(0), Some(Value::Int(1)));
        assert_eq!(stack.peek(5), Some(Value::Int(6)));
        let top = stack.pop_n(3);
        assert_eq!(top, vec![Value::Int(4), Value::Int(5), Value::Int(1)]);
        assert_eq!(stack.len(), 4);
    }

    #[test]
    fn ensure_size_pads_above_base() {
        let mut stack = OperandStack::new(4);
        stack.push(Value::Int(7));
        stack.push(Value::Int(1));
        let padded = stack.ensure_size(1, 3);
        assert_eq!(padded, 2);
        let values: Vec<_> = stack.iter().collect();
        assert_eq!(
            values,
            vec![Value::Int(7), Value::Undefined, Value::Undefined, Value::Int(1)]
        );
        assert_eq!(stack.ensure_size(1, 2), 0);
    }
}
