//! Quality gate for candidate answers

mod gate;

pub use gate::QualityGate;
