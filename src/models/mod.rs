pub mod requirement;

pub use requirement::*;
