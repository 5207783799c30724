//! Readiness counting across independently created editors.
//!
//! Only docx Documents are required. `ready` fires when the bound count
//! reaches the required count from below; dropping below the threshold
//! re-arms it for the next crossing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    ready: usize,
    required: usize,
    armed: bool,
}

impl Readiness {
    pub const fn new(required: usize) -> Self {
        Self {
            ready: 0,
            required,
            armed: true,
        }
    }

    /// Record a bound editor. Returns `true` when `ready` must fire.
    pub fn bound(&mut self) -> bool {
        if self.ready < self.required {
            self.ready += 1;
        }
        if self.armed && self.required > 0 && self.ready == self.required {
            self.armed = false;
            return true;
        }
        false
    }

    /// Record a destroyed editor.
    pub fn unbound(&mut self) {
        self.ready = self.ready.saturating_sub(1);
        if self.ready < self.required {
            self.armed = true;
        }
    }

    pub const fn ready(&self) -> usize {
        self.ready
    }

    pub const fn required(&self) -> usize {
        self.required
    }

    pub const fn is_ready(&self) -> bool {
        self.required > 0 && self.ready == self.required
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_at_threshold() {
        let mut readiness = Readiness::new(2);
        assert!(!readiness.bound());
        assert_eq!(readiness.ready(), 1);
        assert!(readiness.bound());
        assert!(readiness.is_ready());
    }

    #[test]
    fn test_never_exceeds_required() {
        let mut readiness = Readiness::new(1);
        assert!(readiness.bound());
        assert!(!readiness.bound());
        assert_eq!(readiness.ready(), 1);
    }

    #[test]
    fn test_rearms_after_drop() {
        let mut readiness = Readiness::new(2);
        readiness.bound();
        readiness.bound();
        readiness.unbound();
        assert!(!readiness.is_ready());
        assert!(readiness.bound());
    }

    #[test]
    fn test_zero_required_never_fires() {
        let mut readiness = Readiness::new(0);
        assert!(!readiness.bound());
        assert!(!readiness.is_ready());
    }
}
