//! Process-wide diagnostic logging switches
//!
//! Set at most once, at startup, and read on every query thereafter. Leaving
//! them unset is valid and means "off".

use once_cell::sync::OnceCell;

/// Diagnostic switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Request and log index utilization for every query batch
    pub index_metrics: bool,
}

static DIAGNOSTICS: OnceCell<Diagnostics> = OnceCell::new();

/// Install the process-wide switches
///
/// Returns `false` if they were already installed; the first value wins.
pub fn install(diagnostics: Diagnostics) -> bool {
    DIAGNOSTICS.set(diagnostics).is_ok()
}

/// Current switches, all off when never installed
pub fn current() -> Diagnostics {
    DIAGNOSTICS.get().copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_install_wins() {
        let first = install(Diagnostics {
            index_metrics: false,
        });
        let second = install(Diagnostics {
            index_metrics: true,
        });
        assert!(first);
        assert!(!second);
        assert!(!current().index_metrics);
    }
}
