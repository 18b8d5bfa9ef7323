//! Frame overlays drawn in place on the RGB frame.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Radius of the filled center marker.
pub const DOT_RADIUS: i32 = 3;
/// Half length of each crosshair diagonal.
pub const CROSSHAIR_REACH: i32 = 100;
pub const CROSSHAIR_THICKNESS: i32 = 6;

pub fn draw_dot(img: &mut RgbImage, x: f32, y: f32, color: Rgb<u8>) {
    let center = (x.round() as i32, y.round() as i32);
    draw_filled_circle_mut(img, center, DOT_RADIUS, color);
}

/// Straight segment `thickness` pixels wide, clipped to the image.
pub fn draw_line(
    img: &mut RgbImage,
    from: (i32, i32),
    to: (i32, i32),
    thickness: i32,
    color: Rgb<u8>,
) {
    let (fx, fy) = (from.0 as f32, from.1 as f32);
    let (tx, ty) = (to.0 as f32, to.1 as f32);
    let len = (tx - fx).hypot(ty - fy);
    if thickness <= 1 {
        draw_line_segment_mut(img, (fx, fy), (tx, ty), color);
        return;
    }
    if len <= f32::EPSILON {
        draw_filled_circle_mut(img, from, thickness / 2, color);
        return;
    }
    // Normal scaled to half the thickness.
    let half = thickness as f32 / 2.0;
    let (nx, ny) = (-(ty - fy) / len * half, (tx - fx) / len * half);
    let corner = |x: f32, y: f32| Point::new(x.round() as i32, y.round() as i32);
    let quad = [
        corner(fx + nx, fy + ny),
        corner(tx + nx, ty + ny),
        corner(tx - nx, ty - ny),
        corner(fx - nx, fy - ny),
    ];
    draw_polygon_mut(img, &quad, color);
}

/// Two diagonals through `(x, y)`, used to line up a coin with the image
/// center during offset calibration.
pub fn draw_crosshair(img: &mut RgbImage, x: f32, y: f32, color: Rgb<u8>) {
    let (cx, cy) = (x.round() as i32, y.round() as i32);
    let r = CROSSHAIR_REACH;
    draw_line(img, (cx - r, cy - r), (cx + r, cy + r), CROSSHAIR_THICKNESS, color);
    draw_line(img, (cx - r, cy + r), (cx + r, cy - r), CROSSHAIR_THICKNESS, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_is_clipped_at_the_border() {
        let mut img = RgbImage::new(10, 10);
        draw_dot(&mut img, 0.0, 0.0, BLUE);
        assert_eq!(*img.get_pixel(0, 0), BLUE);
        assert_eq!(*img.get_pixel(3, 0), BLUE);
        assert_eq!(*img.get_pixel(3, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn crosshair_covers_both_diagonals() {
        let mut img = RgbImage::new(300, 300);
        draw_crosshair(&mut img, 150.0, 150.0, RED);
        for (x, y) in [(60, 60), (240, 240), (60, 240), (240, 60), (150, 150)] {
            assert_eq!(*img.get_pixel(x, y), RED, "pixel ({x}, {y})");
        }
        assert_eq!(*img.get_pixel(150, 60), Rgb([0, 0, 0]));
        // beyond the reach
        assert_eq!(*img.get_pixel(20, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn thick_line_is_wider_than_one_pixel() {
        let mut img = RgbImage::new(20, 20);
        draw_line(&mut img, (2, 10), (17, 10), 6, GREEN);
        assert_eq!(*img.get_pixel(10, 8), GREEN);
        assert_eq!(*img.get_pixel(10, 12), GREEN);
        assert_eq!(*img.get_pixel(10, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn line_leaving_the_image_is_clipped() {
        let mut img = RgbImage::new(20, 20);
        draw_line(&mut img, (-30, -30), (10, 10), 6, RED);
        draw_line(&mut img, (5, 15), (5, 15), 6, RED);
        assert_eq!(*img.get_pixel(0, 0), RED);
        assert_eq!(*img.get_pixel(10, 10), RED);
        assert_eq!(*img.get_pixel(5, 15), RED);
        assert_eq!(*img.get_pixel(19, 0), Rgb([0, 0, 0]));
    }
}
