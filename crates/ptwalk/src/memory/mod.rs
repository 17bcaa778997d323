pub mod error;
pub mod image;
pub mod kernel;
pub mod layers;
pub mod traits;
