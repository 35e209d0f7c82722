pub mod compatibility;
pub mod discovery;
pub mod global;
pub mod propagation;
pub mod status;
