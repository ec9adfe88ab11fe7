use crate::processing::Detection;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [0, 194, 255],
    [132, 56, 255],
];

/// Draws detection boxes onto a copy of the source image.
pub struct Renderer {
    thickness: u32,
}

impl Renderer {
    pub fn new(thickness: u32) -> Self {
        Self {
            thickness: thickness.max(1),
        }
    }

    pub fn color_for(class_id: u16) -> Rgb<u8> {
        Rgb(PALETTE[class_id as usize % PALETTE.len()])
    }

    pub fn render(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            self.draw_box(&mut canvas, detection);
        }
        canvas
    }

    fn draw_box(&self, canvas: &mut RgbImage, detection: &Detection) {
        let color = Self::color_for(detection.class_id);

        let x = detection.x1.round() as i32;
        let y = detection.y1.round() as i32;
        let w = detection.width().round() as i32;
        let h = detection.height().round() as i32;

        // Thick borders are drawn as nested one-pixel rectangles growing inwards.
        for inset in 0..self.thickness as i32 {
            let inner_w = w - 2 * inset;
            let inner_h = h - 2 * inset;
            if inner_w <= 0 || inner_h <= 0 {
                break;
            }
            let rect = Rect::at(x + inset, y + inset).of_size(inner_w as u32, inner_h as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(3)
    }
}
