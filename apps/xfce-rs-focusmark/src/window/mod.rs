pub mod directory;
pub mod error;
pub mod inactive;
pub mod overlay;
pub mod placement;
pub mod sync;

#[cfg(test)]
pub mod mock;
