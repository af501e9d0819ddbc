#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

pub mod bsp;
pub mod file;
pub mod format;
pub mod record;
