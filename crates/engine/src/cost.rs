//! Request cost classification
//!
//! Every store call reports a request charge. The charge is bucketed into
//! three tiers and emitted as a diagnostic signal; it never changes control
//! flow.

use std::fmt;
use tracing::{info, warn};

/// Charges below this are cheap
pub const MODERATE_THRESHOLD: f64 = 100.0;
/// Charges at or above this are expensive
pub const EXPENSIVE_THRESHOLD: f64 = 200.0;

/// Cost bucket of a single store call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostTier {
    /// Below 100 units
    Cheap,
    /// 100 to 200 units
    Moderate,
    /// 200 units and above
    Expensive,
}

impl CostTier {
    /// Classify a request charge
    pub fn classify(charge: f64) -> Self {
        if charge < MODERATE_THRESHOLD {
            CostTier::Cheap
        } else if charge < EXPENSIVE_THRESHOLD {
            CostTier::Moderate
        } else {
            CostTier::Expensive
        }
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostTier::Cheap => write!(f, "cheap"),
            CostTier::Moderate => write!(f, "moderate"),
            CostTier::Expensive => write!(f, "expensive"),
        }
    }
}

/// Receives the cost signal of each store call
pub trait CostObserver: Send + Sync {
    /// Called once per store call
    fn observe(&self, operation: &str, tier: CostTier, charge: f64);
}

/// Classify a charge, log it and forward it to the observer
pub fn report(observer: Option<&dyn CostObserver>, operation: &str, charge: f64) -> CostTier {
    let tier = CostTier::classify(charge);
    match tier {
        CostTier::Cheap => {
            info!(target: "docrepo::cost", operation, charge, "request used {} units", charge)
        }
        CostTier::Moderate => info!(
            target: "docrepo::cost",
            operation,
            charge,
            "moderate request: used {} units",
            charge
        ),
        CostTier::Expensive => warn!(
            target: "docrepo::cost",
            operation,
            charge,
            "expensive request: used {} units",
            charge
        ),
    }
    if let Some(observer) = observer {
        observer.observe(operation, tier, charge);
    }
    tier
}
