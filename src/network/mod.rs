pub mod discriminator;
pub mod generator;
pub mod mapping;
pub mod network;
pub mod params;
pub mod spec;

pub use discriminator::Discriminator;
pub use generator::{StyleGenerator, SynthesisNetwork};
pub use mapping::MappingNetwork;
pub use network::{Module, Progressive};
pub use params::ParamSet;
pub use spec::ArchitectureSpec;
