pub mod decoder;
pub mod normalize;
