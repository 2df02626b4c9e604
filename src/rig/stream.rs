//! Stick-figure stream generator: one CSV line of joint values and one PNG
//! silhouette of the hand per sample.

use crate::models::{Dof, Result, RigConfig, SampleData};
use crate::rig::{HandGeometry, JointManager, StreamDataGenerator};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use uuid::Uuid;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const THUMB_COLOR: Rgb<u8> = Rgb([200, 60, 40]);
const INDEX_COLOR: Rgb<u8> = Rgb([40, 90, 200]);
const JOINT_COLOR: Rgb<u8> = Rgb([20, 20, 20]);

/// Half-width of a finger stroke in pixels.
const STROKE_RADIUS: f64 = 2.5;

/// Renders the simulated hand and names each image uniquely.
pub struct StickFigureStream {
    geometry: HandGeometry,
    prefix: String,
    width: u32,
    height: u32,
}

impl StickFigureStream {
    pub fn new(rig: &RigConfig, prefix: impl Into<String>) -> Self {
        Self {
            geometry: HandGeometry::from_config(rig),
            prefix: prefix.into(),
            width: rig.image_width,
            height: rig.image_height,
        }
    }

    /// Render the current pose.
    pub fn render(&self, joints: &dyn JointManager) -> RgbImage {
        let pose = self.geometry.pose(joints);
        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        for (points, color) in [(&pose.thumb, THUMB_COLOR), (&pose.index, INDEX_COLOR)] {
            for seg in points.windows(2) {
                draw_stroke(&mut img, seg[0], seg[1], STROKE_RADIUS, color);
            }
            for &p in points.iter() {
                draw_stroke(&mut img, p, p, STROKE_RADIUS + 1.0, JOINT_COLOR);
            }
        }
        img
    }

    fn image_name(&self) -> String {
        format!("{}_{}.png", self.prefix, Uuid::new_v4().simple())
    }
}

impl StreamDataGenerator for StickFigureStream {
    fn header(&self) -> String {
        let mut header = String::from("image");
        for dof in Dof::ALL {
            header.push(',');
            header.push_str(dof.name());
        }
        header
    }

    fn sample(&mut self, joints: &dyn JointManager) -> Result<SampleData> {
        let image_name = self.image_name();

        let mut data_line = image_name.clone();
        for dof in Dof::ALL {
            data_line.push_str(&format!(",{:.6}", joints.get(dof)));
        }

        let mut image = Vec::new();
        self.render(joints)
            .write_to(&mut Cursor::new(&mut image), ImageFormat::Png)?;

        Ok(SampleData {
            data_line,
            image_name,
            image,
        })
    }
}

/// Paint every pixel within `radius` of the segment `a`–`b`.
fn draw_stroke(img: &mut RgbImage, a: [f64; 2], b: [f64; 2], radius: f64, color: Rgb<u8>) {
    let (w, h) = (img.width() as f64, img.height() as f64);
    let x0 = (a[0].min(b[0]) - radius).floor().max(0.0);
    let x1 = (a[0].max(b[0]) + radius).ceil().min(w - 1.0);
    let y0 = (a[1].min(b[1]) - radius).floor().max(0.0);
    let y1 = (a[1].max(b[1]) + radius).ceil().min(h - 1.0);
    if x0 > x1 || y0 > y1 {
        return;
    }

    let ab = [b[0] - a[0], b[1] - a[1]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    for py in y0 as u32..=y1 as u32 {
        for px in x0 as u32..=x1 as u32 {
            let p = [px as f64 + 0.5, py as f64 + 0.5];
            let t = if len2 > 0.0 {
                (((p[0] - a[0]) * ab[0] + (p[1] - a[1]) * ab[1]) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let dx = p[0] - (a[0] + t * ab[0]);
            let dy = p[1] - (a[1] + t * ab[1]);
            if dx * dx + dy * dy <= radius * radius {
                img.put_pixel(px, py, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::SimulatedHand;

    #[test]
    fn test_header_lists_dofs_in_order() {
        let stream = StickFigureStream::new(&RigConfig::default(), "hand");
        assert_eq!(stream.header(), "image,gamma1,gamma2,gamma3,alpha1,alpha2,beta");
    }

    #[test]
    fn test_sample_line_matches_image_name() {
        let mut stream = StickFigureStream::new(&RigConfig::default(), "hand");
        let mut hand = SimulatedHand::new();
        hand.set(Dof::Beta, 5.0);

        let sample = stream.sample(&hand).unwrap();
        assert!(sample.image_name.starts_with("hand_"));
        assert!(sample.image_name.ends_with(".png"));

        let fields: Vec<&str> = sample.data_line.split(',').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], sample.image_name);
        assert_eq!(fields[6], "5.000000");

        // PNG signature
        assert_eq!(&sample.image[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_image_names_unique() {
        let mut stream = StickFigureStream::new(&RigConfig::default(), "hand");
        let hand = SimulatedHand::new();
        let a = stream.sample(&hand).unwrap();
        let b = stream.sample(&hand).unwrap();
        assert_ne!(a.image_name, b.image_name);
    }

    #[test]
    fn test_render_draws_fingers() {
        let stream = StickFigureStream::new(&RigConfig::default(), "hand");
        let img = stream.render(&SimulatedHand::new());
        assert_eq!(img.dimensions(), (128, 128));
        // Thumb lies along y = 100 at rest
        assert_eq!(*img.get_pixel(55, 100), THUMB_COLOR);
        // Index lies along x = 60 at rest
        assert_eq!(*img.get_pixel(60, 40), INDEX_COLOR);
        assert_eq!(*img.get_pixel(5, 5), BACKGROUND);
    }
}
