//! Domain records persisted in collection stores

pub mod block_rule;
pub mod drive;
pub mod person;
pub mod segment;
pub mod visit;
pub mod website;

// Re-export important models
pub use block_rule::{BlockKind, BlockRule};
pub use drive::DriveDocument;
pub use person::Person;
pub use segment::Segment;
pub use visit::Visit;
pub use website::{Website, domain_of, normalize_url};
