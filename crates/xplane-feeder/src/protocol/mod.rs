/// Simulator wire protocols.
pub mod veh1;
