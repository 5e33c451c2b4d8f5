use std::sync::atomic::{AtomicU8, Ordering};

use lastseen_core::mode::Mode;

/// Owner of the process-wide operating mode.
///
/// Replacement is a single atomic swap; the next evaluation pass sees it.
#[derive(Debug, Default)]
pub struct ModeSwitch {
    current: AtomicU8,
}

impl ModeSwitch {
    pub fn new(mode: Mode) -> Self {
        Self {
            current: AtomicU8::new(mode.as_u8()),
        }
    }

    pub fn get(&self) -> Mode {
        Mode::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Install `mode` and return the one it replaced.
    pub fn replace(&self, mode: Mode) -> Mode {
        Mode::from_u8(self.current.swap(mode.as_u8(), Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_normal_by_default() {
        assert_eq!(ModeSwitch::default().get(), Mode::Normal);
    }

    #[test]
    fn replace_returns_previous() {
        let switch = ModeSwitch::new(Mode::Night);
        assert_eq!(switch.replace(Mode::Vacation), Mode::Night);
        assert_eq!(switch.get(), Mode::Vacation);
    }
}
