#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl From<::image::GrayImage> for GrayImage {
    fn from(img: ::image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.into_raw(),
        }
    }
}

impl<'a> GrayImageView<'a> {
    /// Borrow the pixels of an `image` buffer.
    pub fn from_luma(img: &'a ::image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw(),
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Owned `image` buffer for the `imageproc` kernels. `None` when the
    /// buffer length does not match the dimensions.
    pub fn to_luma(&self) -> Option<::image::GrayImage> {
        ::image::GrayImage::from_raw(self.width as u32, self.height as u32, self.data.to_vec())
    }
}

/// Mean intensity over `[y-h, y+h) x [x-h, x+h)`, clipped to the image.
///
/// The center is truncated to whole pixels. Returns `None` when nothing of
/// the window overlaps the image.
pub fn window_mean(src: &GrayImageView<'_>, x: f32, y: f32, half_width: u32) -> Option<f64> {
    let cx = x as i64;
    let cy = y as i64;
    let h = half_width as i64;

    let x0 = (cx - h).max(0);
    let y0 = (cy - h).max(0);
    let x1 = (cx + h).min(src.width as i64);
    let y1 = (cy + h).min(src.height as i64);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let mut sum = 0u64;
    for row in y0 as usize..y1 as usize {
        let start = row * src.width;
        sum += src.data[start + x0 as usize..start + x1 as usize]
            .iter()
            .map(|&v| v as u64)
            .sum::<u64>();
    }
    let count = ((x1 - x0) * (y1 - y0)) as f64;
    Some(sum as f64 / count)
}

/// Median filter with a square `ksize x ksize` kernel and replicated borders.
///
/// `ksize` must be odd; an even size is rounded up to the next odd one.
pub fn median_blur(src: &GrayImageView<'_>, ksize: u32) -> GrayImage {
    let r = ksize.max(1) / 2;
    if r == 0 || src.width == 0 || src.height == 0 {
        return GrayImage {
            width: src.width,
            height: src.height,
            data: src.data.to_vec(),
        };
    }
    match src.to_luma() {
        Some(luma) => GrayImage::from(imageproc::filter::median_filter(&luma, r, r)),
        None => GrayImage {
            width: src.width,
            height: src.height,
            data: src.data.to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(w: usize, h: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.data[y * w + x] = (x + y * 10) as u8;
            }
        }
        img
    }

    #[test]
    fn window_mean_inside_image() {
        let img = GrayImage {
            width: 4,
            height: 4,
            data: vec![100; 16],
        };
        let m = window_mean(&img.view(), 2.0, 2.0, 1).expect("mean");
        assert_eq!(m, 100.0);
    }

    #[test]
    fn window_mean_clips_at_top_left_corner() {
        let img = gradient_image(8, 8);
        // Window [-2, 2) x [-2, 2) clips to [0, 2) x [0, 2): values 0, 1, 10, 11.
        let m = window_mean(&img.view(), 0.0, 0.0, 2).expect("mean");
        assert!((m - 5.5).abs() < 1e-12, "got {m}");
    }

    #[test]
    fn window_mean_clips_at_bottom_right_corner() {
        let img = gradient_image(8, 8);
        // Window [6, 10) x [6, 10) clips to [6, 8) x [6, 8): values 66, 67, 76, 77.
        let m = window_mean(&img.view(), 8.0, 8.0, 2).expect("mean");
        assert!((m - 71.5).abs() < 1e-12, "got {m}");
    }

    #[test]
    fn window_mean_outside_image_is_none() {
        let img = gradient_image(8, 8);
        assert!(window_mean(&img.view(), 40.0, 3.0, 2).is_none());
        assert!(window_mean(&img.view(), -10.0, -10.0, 2).is_none());
    }

    #[test]
    fn window_mean_truncates_center() {
        let img = gradient_image(8, 8);
        let a = window_mean(&img.view(), 3.0, 3.0, 1);
        let b = window_mean(&img.view(), 3.9, 3.7, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn median_blur_removes_salt_noise() {
        let mut img = GrayImage {
            width: 9,
            height: 9,
            data: vec![50; 81],
        };
        img.data[4 * 9 + 4] = 255;
        let out = median_blur(&img.view(), 3);
        assert!(out.data.iter().all(|&v| v == 50));
    }

    #[test]
    fn median_blur_replicates_the_border() {
        // 3x3 median at the corner sees the corner pixel four times.
        let mut img = GrayImage {
            width: 5,
            height: 5,
            data: vec![10; 25],
        };
        img.data[0] = 200;
        img.data[1] = 200;
        let out = median_blur(&img.view(), 3);
        assert_eq!(out.data[0], 200);
        assert_eq!(out.data[2], 10);
    }

    #[test]
    fn luma_conversion_keeps_layout() {
        let img = gradient_image(5, 3);
        let luma = img.view().to_luma().expect("consistent buffer");
        assert_eq!(luma.dimensions(), (5, 3));
        assert_eq!(luma.get_pixel(4, 2).0[0], img.view().get(4, 2));
        let view = GrayImageView::from_luma(&luma);
        assert_eq!(view.data, img.data.as_slice());

        let short = GrayImageView {
            width: 4,
            height: 4,
            data: &img.data[..3],
        };
        assert!(short.to_luma().is_none());
    }

    #[test]
    fn median_blur_keeps_flat_regions_and_size() {
        let img = gradient_image(5, 3);
        let out = median_blur(&img.view(), 1);
        assert_eq!(out.data, img.data);
        let out = median_blur(&img.view(), 9);
        assert_eq!((out.width, out.height), (5, 3));
    }
}
