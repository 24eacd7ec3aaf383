pub mod core;
pub mod marks;
pub mod submissions;
