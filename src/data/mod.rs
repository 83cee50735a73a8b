pub mod folder;
pub mod source;

pub use folder::InMemoryDataset;
pub use source::{Batches, ImageSource};
