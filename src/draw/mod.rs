//! Drawable primitives handed from producer threads to the render loop.
//!
//! - [`Color`]: RGBA color with palette constants
//! - [`Shape`]: closed set of primitive variants
//! - [`Drawable`]: shape + color + transform, moved into the canvas on submit

pub mod color;
pub mod drawable;

pub use color::Color;
pub use drawable::{Bounds, Drawable, Point, Shape, Transform};

pub use color::{BLACK, BLUE, GREEN, ORANGE, PINK, RED, TRANSPARENT, WHITE, YELLOW};
