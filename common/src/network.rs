pub mod range;
pub mod result;
