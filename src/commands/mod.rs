pub mod check;
pub mod cleanup;
pub mod start;
