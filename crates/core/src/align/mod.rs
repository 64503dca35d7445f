pub mod grid;
pub mod key;
pub mod shift;
