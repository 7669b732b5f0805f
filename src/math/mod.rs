//! Slice-level arithmetic kernels. Callers check lengths first.

pub mod dot;
pub mod l1;
pub mod l2;
