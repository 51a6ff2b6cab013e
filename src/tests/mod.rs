#[macro_use]
mod macros;

mod array;
mod index;
