#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

pub mod codec;
pub mod deluxe;
pub mod error;
pub mod light;
pub mod migrate;
pub mod nomip;
pub mod pipeline;
pub mod remap;
pub mod shader_script;
pub mod tga;
