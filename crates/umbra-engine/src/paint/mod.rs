//! Color values shared by clear colors, tints and lighting parameters.

mod color;

pub use color::Color;
