pub mod safety;
pub mod structuring;
