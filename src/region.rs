//! Hand crop region computation and extraction.
//!
//! The landmark network wants a tight, consistently oriented crop of the hand, not the whole
//! frame. This module computes that crop from a palm detection: a triangle of control points is
//! placed over the palm, scaled into source frame coordinates, and mapped onto fixed positions
//! in the crop via an affine transform. The same transform (inverted) later carries the
//! predicted landmarks back into the source frame.

use image::RgbImage;
use nalgebra::{Matrix2x3, Matrix3, Point2, Vector2, Vector3};

use crate::{
    detection::{anchors::Anchor, Keypoint, RawDetection, INPUT_SIZE},
    tensor::Tensor,
};

/// Side length of the square crop fed to the landmark network, in pixels.
pub const CROP_SIZE: u32 = 224;

/// Three control points spanning the hand crop region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    points: [Point2<f32>; 3],
}

impl Triangle {
    pub fn new(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> Self {
        Self { points: [a, b, c] }
    }

    pub fn points(&self) -> [Point2<f32>; 3] {
        self.points
    }
}

/// A 2D affine transform, stored as a 2x3 matrix.
#[derive(Debug, Clone, Copy)]
pub struct AffineTransform {
    matrix: Matrix2x3<f32>,
}

impl AffineTransform {
    /// Solves for the transform that maps the points of `from` onto the points of `to`.
    ///
    /// Returns [`None`] if the points of `from` are collinear (which includes coinciding
    /// points), since no unique transform exists then.
    pub fn between(from: &Triangle, to: &Triangle) -> Option<Self> {
        let [f0, f1, f2] = from.points();
        let [t0, t1, t2] = to.points();

        #[rustfmt::skip]
        let source = Matrix3::new(
            f0.x, f0.y, 1.0,
            f1.x, f1.y, 1.0,
            f2.x, f2.y, 1.0,
        );
        let inv = source.try_inverse()?;

        let row_x = inv * Vector3::new(t0.x, t1.x, t2.x);
        let row_y = inv * Vector3::new(t0.y, t1.y, t2.y);

        #[rustfmt::skip]
        let matrix = Matrix2x3::new(
            row_x[0], row_x[1], row_x[2],
            row_y[0], row_y[1], row_y[2],
        );
        Some(Self { matrix })
    }

    /// Applies the transform to a point.
    pub fn apply(&self, point: Point2<f32>) -> Point2<f32> {
        let out = self.matrix * Vector3::new(point.x, point.y, 1.0);
        Point2::new(out.x, out.y)
    }

    /// Returns the inverse transform.
    ///
    /// Returns [`None`] if the transform is not invertible, which happens when it collapses
    /// the plane onto a line or point.
    pub fn inverse(&self) -> Option<AffineTransform> {
        let m = &self.matrix;
        #[rustfmt::skip]
        let homogeneous = Matrix3::new(
            m[(0, 0)], m[(0, 1)], m[(0, 2)],
            m[(1, 0)], m[(1, 1)], m[(1, 2)],
            0.0, 0.0, 1.0,
        );
        let inv = homogeneous.try_inverse()?;

        #[rustfmt::skip]
        let matrix = Matrix2x3::new(
            inv[(0, 0)], inv[(0, 1)], inv[(0, 2)],
            inv[(1, 0)], inv[(1, 1)], inv[(1, 2)],
        );
        Some(AffineTransform { matrix })
    }
}

/// Computes and extracts the landmark network's input crop for a palm detection.
pub struct RegionTransformer {
    box_enlarge: f32,
    box_shift: f32,
}

impl RegionTransformer {
    /// The default factor applied to the palm box size when sizing the crop triangle.
    pub const DEFAULT_BOX_ENLARGE: f32 = 1.0;

    /// The default shift of the crop triangle along the wrist-to-palm axis, as a fraction of
    /// the keypoint distance.
    pub const DEFAULT_BOX_SHIFT: f32 = 0.2;

    pub fn new() -> Self {
        Self {
            box_enlarge: Self::DEFAULT_BOX_ENLARGE,
            box_shift: Self::DEFAULT_BOX_SHIFT,
        }
    }

    /// Sets the factor by which the palm box size is enlarged when sizing the crop.
    pub fn set_box_enlarge(&mut self, box_enlarge: f32) {
        self.box_enlarge = box_enlarge;
    }

    /// Sets how far the crop is shifted along the wrist-to-palm axis.
    pub fn set_box_shift(&mut self, box_shift: f32) {
        self.box_shift = box_shift;
    }

    /// Computes the crop triangle for a palm detection, in detector input coordinates.
    ///
    /// The triangle is anchored at the middle finger knuckle, extends along the wrist-to-palm
    /// axis and its perpendicular, and is shifted towards the fingers so the crop covers the
    /// whole hand rather than just the palm. Returns [`None`] when the wrist and middle finger
    /// keypoints coincide, leaving the palm direction undefined.
    pub fn triangle(&self, detection: RawDetection<'_>, anchor: &Anchor) -> Option<Triangle> {
        let wrist = detection.keypoint(Keypoint::Wrist, anchor);
        let palm = detection.keypoint(Keypoint::MiddleFingerMcp, anchor);

        let dir = palm - wrist;
        let len = dir.norm();
        if len == 0.0 {
            return None;
        }
        let dir = dir / len;
        let perp = Vector2::new(dir.y, -dir.x);

        let side = f32::max(detection.width(), detection.height()) * self.box_enlarge;
        let shift = (wrist - palm) * self.box_shift;

        let points = [palm, palm + dir * side, palm + perp * side].map(|p| p - shift);
        Some(Triangle { points })
    }

    /// Extracts the hand crop for `triangle` from the (padded) source frame.
    ///
    /// `triangle` is in detector input coordinates and is first scaled up into `source`'s
    /// coordinate system. The returned tensor is the `[1, 224, 224, 3]` crop with values in
    /// the 0.0 to 1.0 range; samples outside of `source` read as black. The returned transform
    /// maps source pixels into the crop and is what landmark projection needs.
    ///
    /// Returns [`None`] if the triangle is degenerate.
    pub fn extract(
        &self,
        source: &RgbImage,
        triangle: &Triangle,
    ) -> Option<(Tensor, AffineTransform)> {
        let scale = u32::max(source.width(), source.height()) as f32 / INPUT_SIZE as f32;
        let scaled = Triangle {
            points: triangle.points.map(|p| Point2::new(p.x * scale, p.y * scale)),
        };

        let half = CROP_SIZE as f32 * 0.5;
        let target = Triangle::new(
            Point2::new(half, half),
            Point2::new(half, 0.0),
            Point2::new(0.0, half),
        );

        let transform = AffineTransform::between(&scaled, &target)?;
        let inverse = transform.inverse()?;

        let size = CROP_SIZE as usize;
        let mut data = Vec::with_capacity(size * size * 3);
        for y in 0..CROP_SIZE {
            for x in 0..CROP_SIZE {
                let src = inverse.apply(Point2::new(x as f32, y as f32));
                let rgb = sample_bilinear(source, src.x, src.y);
                data.extend(rgb.map(|channel| channel / 255.0));
            }
        }
        let tensor = Tensor::from_iter(&[1, size, size, 3], data);

        Some((tensor, transform))
    }
}

impl Default for RegionTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples `image` at a fractional position, blending the 4 surrounding texels.
///
/// Texels outside of the image read as black, matching a constant black border.
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let texel = |x: i64, y: i64| -> [f32; 3] {
        if x < 0 || y < 0 || x >= i64::from(image.width()) || y >= i64::from(image.height()) {
            return [0.0; 3];
        }
        let pixel = image.get_pixel(x as u32, y as u32);
        [f32::from(pixel[0]), f32::from(pixel[1]), f32::from(pixel[2])]
    };

    let p00 = texel(x0, y0);
    let p10 = texel(x0 + 1, y0);
    let p01 = texel(x0, y0 + 1);
    let p11 = texel(x0 + 1, y0 + 1);

    let mut out = [0.0; 3];
    for channel in 0..3 {
        let top = p00[channel] * (1.0 - fx) + p10[channel] * fx;
        let bottom = p01[channel] * (1.0 - fx) + p11[channel] * fx;
        out[channel] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    use crate::detection::{anchors::AnchorTable, DetectorOutput, BOX_VALUES};

    use super::*;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        )
    }

    #[test]
    fn transform_maps_the_control_points() {
        let from = Triangle::new(
            Point2::new(10.0, 4.0),
            Point2::new(38.0, 12.0),
            Point2::new(6.0, 40.0),
        );
        let to = Triangle::new(
            Point2::new(112.0, 112.0),
            Point2::new(112.0, 0.0),
            Point2::new(0.0, 112.0),
        );

        let transform = AffineTransform::between(&from, &to).unwrap();
        for (f, t) in from.points().into_iter().zip(to.points()) {
            let mapped = transform.apply(f);
            assert_abs_diff_eq!(mapped.x, t.x, epsilon = 1e-3);
            assert_abs_diff_eq!(mapped.y, t.y, epsilon = 1e-3);
        }
    }

    #[test]
    fn transform_round_trips_through_its_inverse() {
        let from = Triangle::new(
            Point2::new(10.0, 4.0),
            Point2::new(38.0, 12.0),
            Point2::new(6.0, 40.0),
        );
        let to = Triangle::new(
            Point2::new(112.0, 112.0),
            Point2::new(112.0, 0.0),
            Point2::new(0.0, 112.0),
        );
        let transform = AffineTransform::between(&from, &to).unwrap();
        let inverse = transform.inverse().unwrap();

        let mut rng = fastrand::Rng::with_seed(0x7375_6e64);
        let probes = from.points().into_iter().chain(
            (0..32).map(|_| Point2::new(rng.f32() * 200.0 - 50.0, rng.f32() * 200.0 - 50.0)),
        );
        for point in probes {
            let back = inverse.apply(transform.apply(point));
            assert_abs_diff_eq!(back.x, point.x, epsilon = 1e-3);
            assert_abs_diff_eq!(back.y, point.y, epsilon = 1e-3);
        }
    }

    #[test]
    fn collinear_points_have_no_transform() {
        let collinear = Triangle::new(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        );
        assert!(AffineTransform::between(&collinear, &unit_triangle()).is_none());
    }

    #[test]
    fn squashing_transform_has_no_inverse() {
        let squash = AffineTransform::between(
            &unit_triangle(),
            &Triangle::new(
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(2.0, 0.0),
            ),
        )
        .unwrap();
        assert!(squash.inverse().is_none());
    }

    #[test]
    fn triangle_follows_the_palm_axis() {
        // Wrist at (100, 100), middle finger MCP at (100, 60): the palm points straight up.
        let mut row = [0.0; BOX_VALUES];
        row[2] = 30.0; // width
        row[3] = 20.0; // height
        row[4] = 100.0; // wrist
        row[5] = 100.0;
        row[8] = 100.0; // middle finger MCP
        row[9] = 60.0;
        let output = DetectorOutput::new(vec![0.0], row.to_vec()).unwrap();
        let anchors = AnchorTable::from_centers([(0.0, 0.0)]);

        let transformer = RegionTransformer::new();
        let triangle = transformer
            .triangle(output.detection(0), &anchors[0])
            .unwrap();

        let [a, b, c] = triangle.points();
        assert_eq!(a, Point2::new(100.0, 52.0));
        assert_eq!(b, Point2::new(100.0, 22.0));
        assert_eq!(c, Point2::new(70.0, 52.0));
    }

    #[test]
    fn coincident_keypoints_yield_no_triangle() {
        let row = [0.0; BOX_VALUES];
        let output = DetectorOutput::new(vec![0.0], row.to_vec()).unwrap();
        let anchors = AnchorTable::from_centers([(0.5, 0.5)]);

        let transformer = RegionTransformer::new();
        assert!(transformer
            .triangle(output.detection(0), &anchors[0])
            .is_none());
    }

    #[test]
    fn extract_samples_the_source_image() {
        let source = RgbImage::from_pixel(64, 64, Rgb([51, 102, 204]));
        // In detector coordinates; the source is 64 pixels wide, so everything is scaled by
        // 1/3 and this triangle ends up well inside the image.
        let triangle = Triangle::new(
            Point2::new(96.0, 96.0),
            Point2::new(96.0, 6.0),
            Point2::new(6.0, 96.0),
        );

        let transformer = RegionTransformer::new();
        let (crop, transform) = transformer.extract(&source, &triangle).unwrap();
        assert_eq!(crop.shape(), &[1, 224, 224, 3]);

        // The crop center maps back to (32, 32), deep inside the constant-colored image.
        let mapped = transform.apply(Point2::new(32.0, 32.0));
        assert_abs_diff_eq!(mapped.x, 112.0, epsilon = 1e-3);
        assert_abs_diff_eq!(mapped.y, 112.0, epsilon = 1e-3);

        let center = |channel| crop.index([0, 112, 112, channel]).as_singular();
        assert_abs_diff_eq!(center(0), 51.0 / 255.0, epsilon = 1e-4);
        assert_abs_diff_eq!(center(1), 102.0 / 255.0, epsilon = 1e-4);
        assert_abs_diff_eq!(center(2), 204.0 / 255.0, epsilon = 1e-4);
    }

    #[test]
    fn samples_outside_the_image_read_as_black() {
        let image = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        assert_eq!(sample_bilinear(&image, -5.0, 0.0), [0.0; 3]);
        assert_eq!(sample_bilinear(&image, 0.0, 7.5), [0.0; 3]);
        assert_eq!(sample_bilinear(&image, 0.0, 0.0), [255.0; 3]);
    }

    #[test]
    fn bilinear_sampling_blends_neighboring_texels() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([100, 200, 40]));
        assert_eq!(sample_bilinear(&image, 0.5, 0.0), [50.0, 100.0, 20.0]);
    }
}
