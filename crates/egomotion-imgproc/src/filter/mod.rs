/// Kernels for filtering operations.
pub mod kernels;

mod ops;
pub use ops::*;

mod separable_filter;
pub use separable_filter::separable_filter;
