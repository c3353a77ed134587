//! Language model collaborator

mod model;

pub use model::LanguageModel;

#[cfg(test)]
pub use model::mock::MockLanguageModel;
