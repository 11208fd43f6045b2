//! Sparse cell storage.
//!
//! - [`SparseList`] - one ordered row or column
//! - [`MatrixStore`] - the 2-D grid, partitioned by a primary axis
//! - [`RegionStore`] - payloads attached to non-overlapping regions

mod matrix;
mod region_store;
mod sparse_list;

pub use matrix::MatrixStore;
pub use region_store::RegionStore;
pub use sparse_list::SparseList;
