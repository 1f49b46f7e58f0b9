pub mod acquisition;
pub mod transport;
pub mod workflow;
