pub mod browser;
pub mod csv;
