use boardcal_core::{DetectedCircle, GrayImageView};
use nalgebra::{Matrix3, Vector3};

use crate::gradient::{edge_points, EdgePoint};
use crate::params::HoughCircleParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

struct Accumulator {
    width: usize,
    height: usize,
    dp: f32,
    votes: Vec<u32>,
}

impl Accumulator {
    fn new(img_w: usize, img_h: usize, dp: f32) -> Self {
        let width = (img_w as f32 / dp).ceil() as usize + 1;
        let height = (img_h as f32 / dp).ceil() as usize + 1;
        Self {
            width,
            height,
            dp,
            votes: vec![0; width * height],
        }
    }

    #[inline]
    fn vote(&mut self, x: f32, y: f32) {
        let ax = (x / self.dp).round();
        let ay = (y / self.dp).round();
        if ax < 0.0 || ay < 0.0 {
            return;
        }
        let (ax, ay) = (ax as usize, ay as usize);
        if ax >= self.width || ay >= self.height {
            return;
        }
        self.votes[ay * self.width + ax] += 1;
    }

    #[inline]
    fn at(&self, ax: isize, ay: isize) -> u32 {
        if ax < 0 || ay < 0 || ax as usize >= self.width || ay as usize >= self.height {
            return 0;
        }
        self.votes[ay as usize * self.width + ax as usize]
    }

    /// Cells at or above `min_votes` that beat their 8-neighborhood.
    ///
    /// Ties go to the cell earlier in raster order.
    fn peaks(&self, min_votes: u32) -> Vec<(u32, usize, usize)> {
        let mut out = Vec::new();
        for ay in 0..self.height {
            for ax in 0..self.width {
                let v = self.votes[ay * self.width + ax];
                if v == 0 || v < min_votes {
                    continue;
                }
                let (x, y) = (ax as isize, ay as isize);
                let mut is_peak = true;
                'nb: for dy in -1..=1 {
                    for dx in -1..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let n = self.at(x + dx, y + dy);
                        let earlier = dy < 0 || (dy == 0 && dx < 0);
                        if n > v || (earlier && n == v) {
                            is_peak = false;
                            break 'nb;
                        }
                    }
                }
                if is_peak {
                    out.push((v, ax, ay));
                }
            }
        }
        out.sort_by(|a, b| b.0.cmp(&a.0).then((a.2, a.1).cmp(&(b.2, b.1))));
        out
    }

    /// Vote-weighted 3x3 centroid of a peak, in image pixels.
    fn refine(&self, ax: usize, ay: usize) -> (f32, f32) {
        let mut sw = 0.0f32;
        let mut sx = 0.0f32;
        let mut sy = 0.0f32;
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let (x, y) = (ax as isize + dx, ay as isize + dy);
                let w = self.at(x, y) as f32;
                sw += w;
                sx += w * x as f32;
                sy += w * y as f32;
            }
        }
        if sw <= 0.0 {
            return (ax as f32 * self.dp, ay as f32 * self.dp);
        }
        (sx / sw * self.dp, sy / sw * self.dp)
    }
}

/// Run the Hough-gradient transform on a (pre-blurred) grayscale image.
///
/// Results are ordered by descending accumulator support.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(width = img.width, height = img.height))
)]
pub fn hough_circles(img: &GrayImageView<'_>, params: &HoughCircleParams) -> Vec<DetectedCircle> {
    let edges = edge_points(img, params.param1);
    if edges.is_empty() {
        return Vec::new();
    }

    let r0 = params.first_radius();
    let r1 = params.max_radius.max(r0);
    let mut acc = Accumulator::new(img.width, img.height, params.dp);
    for e in &edges {
        for r in r0..=r1 {
            let r = r as f32;
            acc.vote(e.x + r * e.ux, e.y + r * e.uy);
            acc.vote(e.x - r * e.ux, e.y - r * e.uy);
        }
    }

    let min_votes = params.param2.ceil().max(1.0) as u32;
    let peaks = acc.peaks(min_votes);
    log::debug!(
        "hough: {} edge points, {} accumulator peaks >= {}",
        edges.len(),
        peaks.len(),
        min_votes
    );

    let min_dist2 = params.min_dist * params.min_dist;
    let mut circles: Vec<DetectedCircle> = Vec::new();
    for (_, ax, ay) in peaks {
        let (cx, cy) = acc.refine(ax, ay);
        let too_close = circles.iter().any(|c| {
            let dx = c.center.x - cx;
            let dy = c.center.y - cy;
            dx * dx + dy * dy < min_dist2
        });
        if too_close {
            continue;
        }
        let Some(coarse) = best_radius(&edges, cx, cy, r0, r1) else {
            continue;
        };
        let (fx, fy) = match fit_circle(&edges, cx, cy, coarse) {
            Some((fx, fy)) if (fx - cx).hypot(fy - cy) <= coarse * 0.5 => (fx, fy),
            _ => (cx, cy),
        };
        let radius = best_radius(&edges, fx, fy, r0, r1).unwrap_or(coarse);
        circles.push(DetectedCircle::new(fx, fy, radius));
    }
    circles
}

/// Best-supported integer radius in `[r0, r1]`, refined to the mean distance
/// of the edges in that bin. `None` if no edge falls in range.
fn best_radius(edges: &[EdgePoint], cx: f32, cy: f32, r0: u32, r1: u32) -> Option<f32> {
    let bins = (r1 - r0 + 1) as usize;
    let mut count = vec![0u32; bins];
    let mut sum = vec![0.0f32; bins];
    for e in edges {
        let d = (e.x - cx).hypot(e.y - cy);
        let r = d.round();
        if r < r0 as f32 || r > r1 as f32 {
            continue;
        }
        let b = r as usize - r0 as usize;
        count[b] += 1;
        sum[b] += d;
    }
    let (best, &n) = count
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
    if n == 0 {
        return None;
    }
    Some(sum[best] / n as f32)
}

/// Edges within this many pixels of the coarse circle take part in the fit.
const FIT_BAND: f32 = 3.0;
/// Minimum |cos| between an edge gradient and the radial direction.
const FIT_MIN_ALIGNMENT: f32 = 0.3;
const FIT_MIN_POINTS: usize = 6;

/// Algebraic least-squares circle through the edges near the coarse circle
/// at `(cx, cy, r)`. Returns the fitted center.
///
/// Solves `x^2 + y^2 + D x + E y + F = 0` in coordinates relative to the
/// coarse center; `None` when too few edges qualify or the system is
/// singular.
fn fit_circle(edges: &[EdgePoint], cx: f32, cy: f32, r: f32) -> Option<(f32, f32)> {
    let mut ata = Matrix3::<f64>::zeros();
    let mut atb = Vector3::<f64>::zeros();
    let mut n = 0usize;
    for e in edges {
        let (dx, dy) = (e.x - cx, e.y - cy);
        let d = dx.hypot(dy);
        if d <= f32::EPSILON || (d - r).abs() > FIT_BAND {
            continue;
        }
        if ((dx * e.ux + dy * e.uy) / d).abs() < FIT_MIN_ALIGNMENT {
            continue;
        }
        let row = Vector3::new(dx as f64, dy as f64, 1.0);
        let rhs = -((dx * dx + dy * dy) as f64);
        ata += row * row.transpose();
        atb += row * rhs;
        n += 1;
    }
    if n < FIT_MIN_POINTS {
        return None;
    }
    let sol = ata.lu().solve(&atb)?;
    let (ox, oy) = (-0.5 * sol[0], -0.5 * sol[1]);
    if !ox.is_finite() || !oy.is_finite() {
        return None;
    }
    Some((cx + ox as f32, cy + oy as f32))
}
