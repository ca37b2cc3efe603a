pub mod prelude;
pub mod prep;
pub mod tools;
