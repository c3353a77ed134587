//! Vector index collaborator - records, queries and matches

mod index;
mod record;

pub use index::VectorIndex;
pub use record::{Metadata, MetadataFilter, VectorMatch, VectorQuery, VectorRecord};

#[cfg(test)]
pub use index::MockVectorIndex;
