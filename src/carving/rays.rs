//! Ray generation module
//!
//! One segment per valid depth pixel, from the light source to the surface
//! point the pixel observed, tagged with the pixel's shadow state.

mod caster;

pub use caster::{Ray, RayCaster};
