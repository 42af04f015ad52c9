//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout for the login and log pages
//! - `input`: keyboard event handling
//! - `styles`: colors and text styling

pub mod input;
pub mod render;
pub mod styles;
