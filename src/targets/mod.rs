pub mod builder;
pub mod resolver;
pub mod safety;

pub use builder::{subtract, TargetSet, TargetSetBuilder};
pub use resolver::NameResolver;
