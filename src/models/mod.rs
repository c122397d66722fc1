pub mod item;
pub mod progress;
