pub mod buffer;
pub mod effects;
pub mod io;
