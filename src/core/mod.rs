pub mod models;
pub mod ownership;
pub mod process_tree;

pub use models::*;
pub use ownership::{Ownership, OwnershipClassifier};
pub use process_tree::ProcessSnapshot;
