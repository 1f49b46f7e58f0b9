pub mod image;
pub mod predictor;
