pub mod error;
pub mod image;
pub mod loading;
pub mod season;
pub mod settings;
pub mod types;
