//! Memory manager (§4.3, §4.4): a contiguous allocator and a demand-paged
//! pager, sharing only the `MEM_TOTAL` size constant (§9(b)).

pub mod alloc;
pub mod backing_store;
pub mod pager;
