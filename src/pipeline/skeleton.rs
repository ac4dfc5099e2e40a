use crate::{config::Stroke, types::NormalizedLandmark};

/// Bone topology of the 21-point hand model.
pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// Target of the per-cycle overlay drawing.
pub trait DrawingSurface {
    fn clear(&mut self);
    fn draw_connectors(&mut self, landmarks: &[NormalizedLandmark], connections: &[(usize, usize)]);
    fn draw_landmarks(&mut self, landmarks: &[NormalizedLandmark]);
}

/// Fixed-size RGBA raster. Cleared pixels are fully transparent so the canvas
/// can sit on top of the video preview.
pub struct Canvas {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    connector: Stroke,
    landmark: Stroke,
    revision: u64,
}

impl Canvas {
    pub fn new(width: u32, height: u32, connector: Stroke, landmark: Stroke) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
            connector,
            landmark,
            revision: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    /// Bumped on every mutation; lets the UI skip re-uploading an unchanged canvas.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) as usize) * 4;
        let px = self.rgba.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.rgba.iter().all(|&b| b == 0)
    }

    fn to_pixel(&self, landmark: &NormalizedLandmark) -> (f32, f32) {
        (
            landmark.x * self.width as f32,
            landmark.y * self.height as f32,
        )
    }
}

impl DrawingSurface for Canvas {
    fn clear(&mut self) {
        self.rgba.fill(0);
        self.revision += 1;
    }

    fn draw_connectors(&mut self, landmarks: &[NormalizedLandmark], connections: &[(usize, usize)]) {
        let stroke = self.connector;
        for &(a, b) in connections {
            if let (Some(la), Some(lb)) = (landmarks.get(a), landmarks.get(b)) {
                let (pa, pb) = (self.to_pixel(la), self.to_pixel(lb));
                draw_line(
                    &mut self.rgba,
                    self.width,
                    self.height,
                    pa,
                    pb,
                    stroke.color,
                    stroke.line_width,
                );
            }
        }
        self.revision += 1;
    }

    fn draw_landmarks(&mut self, landmarks: &[NormalizedLandmark]) {
        let stroke = self.landmark;
        let radius = stroke.line_width.max(1) + 2;
        for landmark in landmarks {
            let (x, y) = self.to_pixel(landmark);
            draw_circle(
                &mut self.rgba,
                self.width,
                self.height,
                (x as i32, y as i32),
                radius,
                stroke.color,
            );
        }
        self.revision += 1;
    }
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: (f32, f32),
    p1: (f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    put_pixel_safe(buffer, width, height, x0 + ox, y0 + oy, color);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 4;
    if idx + 3 < buffer.len() {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONNECTOR_STROKE, LANDMARK_STROKE};

    fn canvas() -> Canvas {
        Canvas::new(100, 50, CONNECTOR_STROKE, LANDMARK_STROKE)
    }

    #[test]
    fn connectors_are_drawn_between_connected_points() {
        let mut canvas = canvas();
        let points = [
            NormalizedLandmark::new(0.1, 0.5, 0.0),
            NormalizedLandmark::new(0.9, 0.5, 0.0),
        ];
        canvas.draw_connectors(&points, &[(0, 1)]);

        assert_eq!(canvas.pixel(50, 25), Some(CONNECTOR_STROKE.color));
        // width 5 covers two pixels on each side of the line
        assert_eq!(canvas.pixel(50, 27), Some(CONNECTOR_STROKE.color));
        assert_eq!(canvas.pixel(50, 30), Some([0, 0, 0, 0]));
    }

    #[test]
    fn connections_to_missing_points_are_skipped() {
        let mut canvas = canvas();
        let points = [NormalizedLandmark::new(0.5, 0.5, 0.0)];
        canvas.draw_connectors(&points, HAND_CONNECTIONS);
        assert!(canvas.is_blank());
    }

    #[test]
    fn landmarks_are_drawn_as_points() {
        let mut canvas = canvas();
        canvas.draw_landmarks(&[NormalizedLandmark::new(0.2, 0.2, 0.0)]);
        assert_eq!(canvas.pixel(20, 10), Some(LANDMARK_STROKE.color));
        assert_eq!(canvas.pixel(80, 40), Some([0, 0, 0, 0]));
    }

    #[test]
    fn clear_resets_pixels_and_bumps_revision() {
        let mut canvas = canvas();
        canvas.draw_landmarks(&[NormalizedLandmark::new(0.5, 0.5, 0.0)]);
        let before = canvas.revision();
        assert!(!canvas.is_blank());

        canvas.clear();
        assert!(canvas.is_blank());
        assert!(canvas.revision() > before);
    }

    #[test]
    fn out_of_bounds_points_are_clipped() {
        let mut canvas = canvas();
        let points = [
            NormalizedLandmark::new(-0.5, -0.5, 0.0),
            NormalizedLandmark::new(1.5, 1.5, 0.0),
        ];
        canvas.draw_connectors(&points, &[(0, 1)]);
        canvas.draw_landmarks(&points);
        assert_eq!(canvas.pixel(0, 0), Some(CONNECTOR_STROKE.color));
        assert_eq!(canvas.pixel(100, 50), None);
    }

    #[test]
    fn hand_topology_references_21_points() {
        let max = HAND_CONNECTIONS
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .max()
            .unwrap_or(0);
        assert_eq!(max, 20);
    }
}
