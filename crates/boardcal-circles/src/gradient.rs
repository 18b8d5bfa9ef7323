use boardcal_core::GrayImageView;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// Thinned edge pixel with its Sobel gradient.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EdgePoint {
    pub x: f32,
    pub y: f32,
    /// Unit gradient direction.
    pub ux: f32,
    pub uy: f32,
}

/// Sobel edges above `threshold` (L1 magnitude), thinned by non-maximum
/// suppression along the quantized gradient direction.
///
/// Border pixels are never edges.
pub(crate) fn edge_points(img: &GrayImageView<'_>, threshold: f32) -> Vec<EdgePoint> {
    let (w, h) = (img.width, img.height);
    if w < 3 || h < 3 {
        return Vec::new();
    }
    let Some(luma) = img.to_luma() else {
        return Vec::new();
    };
    let gx = horizontal_sobel(&luma);
    let gy = vertical_sobel(&luma);
    let (gx, gy) = (gx.as_raw(), gy.as_raw());
    let mag: Vec<i32> = gx
        .iter()
        .zip(gy)
        .map(|(&dx, &dy)| (dx as i32).abs() + (dy as i32).abs())
        .collect();

    let mut out = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = mag[i];
            if (m as f32) <= threshold {
                continue;
            }
            let (dx, dy) = (gx[i] as i32, gy[i] as i32);
            let (sx, sy) = quantized_step(dx, dy);
            let fwd = mag[(y as isize + sy) as usize * w + (x as isize + sx) as usize];
            let back = mag[(y as isize - sy) as usize * w + (x as isize - sx) as usize];
            // Strict on one side so a two-pixel plateau keeps a single pixel.
            if m <= fwd || m < back {
                continue;
            }
            let (fx, fy) = (dx as f32, dy as f32);
            let norm = fx.hypot(fy);
            if norm <= f32::EPSILON {
                continue;
            }
            out.push(EdgePoint {
                x: x as f32,
                y: y as f32,
                ux: fx / norm,
                uy: fy / norm,
            });
        }
    }
    out
}

/// Neighbor step along the gradient, one of 4 directions (8-connected).
fn quantized_step(gx: i32, gy: i32) -> (isize, isize) {
    // tan(22.5 deg) ~= 0.4142, compared in integers with 1e4 scale.
    let (ax, ay) = (gx.abs() as i64, gy.abs() as i64);
    if ay * 10_000 <= ax * 4_142 {
        (1, 0)
    } else if ax * 10_000 <= ay * 4_142 {
        (0, 1)
    } else if (gx > 0) == (gy > 0) {
        (1, 1)
    } else {
        (1, -1)
    }
}
