pub mod args;
mod concat;
mod coreg;
pub mod error;
mod fd;
mod moco;
mod run_all;
mod segment;
mod skull_strip;
mod smooth;
mod snapshot;
mod utils;
