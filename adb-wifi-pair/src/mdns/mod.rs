pub mod browser;
pub mod listener;
