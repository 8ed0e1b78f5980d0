/// Element capacity of a buffer that only ever grows.
///
/// A request above the current capacity sets the capacity to exactly the
/// requested count; smaller requests never shrink it.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct GrowableCapacity {
    capacity: u32,
}

impl GrowableCapacity {
    pub const fn new() -> Self {
        Self { capacity: 0 }
    }

    #[inline]
    pub fn get(&self) -> u32 {
        self.capacity
    }

    /// Returns `true` when the backing buffer must be reallocated.
    pub fn reserve(&mut self, required: u32) -> bool {
        if required <= self.capacity {
            return false;
        }
        self.capacity = required;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_running_maximum() {
        let mut c = GrowableCapacity::new();
        let mut seen = Vec::new();
        for n in [3, 1, 7, 7, 2, 10, 0] {
            c.reserve(n);
            seen.push(c.get());
        }
        assert_eq!(seen, vec![3, 3, 7, 7, 7, 10, 10]);
    }

    #[test]
    fn only_growth_requests_reallocate() {
        let mut c = GrowableCapacity::new();
        assert!(!c.reserve(0));
        assert!(c.reserve(4));
        assert!(!c.reserve(4));
        assert!(!c.reserve(2));
        assert!(c.reserve(5));
    }
}
