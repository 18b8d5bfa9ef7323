//! Circle detection for coin tracking.
//!
//! Detection pipeline:
//! - Sobel gradients, thinned to one-pixel edges.
//! - Each edge votes along its gradient line for centers at every radius in
//!   range, into an accumulator downscaled by `dp`.
//! - Accumulator peaks above `param2` become centers, greedily spaced by
//!   `min_dist`, and get the radius best supported by the edges.
//!
//! Feed it a blurred grayscale frame; raw sensor noise produces spurious peaks.

mod detector;
mod gradient;
mod hough;
mod params;

pub use detector::{CircleDetector, FixedCircles, HoughCircleDetector};
pub use hough::hough_circles;
pub use params::{HoughCircleParams, HoughParamsError};
