pub mod carving;
pub mod logger;
