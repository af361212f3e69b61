mod prober;

pub use prober::{LocatorCandidates, ProbeHit, Prober};
