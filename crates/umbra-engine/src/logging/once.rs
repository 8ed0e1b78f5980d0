use std::collections::HashSet;
use std::hash::Hash;

/// Remembers which causes were already reported.
///
/// Per-frame recoverable problems (a missing camera, a material without its
/// texture) repeat every frame; they are logged the first time only.
#[derive(Debug)]
pub struct WarnOnce<K> {
    seen: HashSet<K>,
}

impl<K> Default for WarnOnce<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash> WarnOnce<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `key` is seen.
    pub fn first(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    /// Logs `message` at `warn` the first time `key` is seen.
    pub fn warn(&mut self, key: K, message: impl FnOnce() -> String) {
        if self.first(key) {
            log::warn!("{}", message());
        }
    }

    /// Logs `message` at `error` the first time `key` is seen.
    pub fn error(&mut self, key: K, message: impl FnOnce() -> String) {
        if self.first(key) {
            log::error!("{}", message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_occurrence_reports() {
        let mut w = WarnOnce::new();
        assert!(w.first("MainCamera"));
        assert!(!w.first("MainCamera"));
        assert!(w.first("LightCamera"));
    }

    #[test]
    fn message_is_built_only_once() {
        let mut w = WarnOnce::new();
        let mut built = 0;
        for _ in 0..3 {
            w.warn(7u32, || {
                built += 1;
                "missing".to_owned()
            });
        }
        assert_eq!(built, 1);
    }

    #[test]
    fn error_and_warn_share_the_seen_set() {
        let mut w = WarnOnce::new();
        let mut built = 0;
        w.error("MainCamera", || {
            built += 1;
            "camera missing".to_owned()
        });
        w.warn("MainCamera", || {
            built += 1;
            "camera missing".to_owned()
        });
        assert_eq!(built, 1);
    }
}
