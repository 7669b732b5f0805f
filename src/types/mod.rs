pub mod id;
pub mod point;
