//! Four-cut photo booth: capture four frames, arrange them on a themed
//! collage, decorate, and export a single PNG.

pub mod app;
pub mod capture;
pub mod collage;
pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod layout;
pub mod photo;
pub mod segmentation;
pub mod slots;

pub use error::{Error, Result};
