pub mod manual_reachability;
pub mod probe_reachability;

pub use manual_reachability::ManualReachability;
pub use probe_reachability::ProbeReachability;
