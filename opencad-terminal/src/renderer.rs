/// ASCII rasterizer for terminal rendering
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::Matrix4;
use opencad_core::geometry::face_normal;
use opencad_core::{RenderDescriptor, Scene, Triangle, TriangleClip};
use std::io::Write;

use crate::camera::Camera;
use crate::transform::{part_matrix, RotationState};

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Character used for wireframe edges
const EDGE_CHAR: char = '#';

/// ASCII renderer that converts a scene to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
        }
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
    }

    /// Character at a cell, for inspection
    pub fn cell(&self, x: usize, y: usize) -> char {
        self.char_buffer[y * self.width + x]
    }

    /// Number of cells covered by geometry
    pub fn covered_cells(&self) -> usize {
        self.char_buffer.iter().filter(|&&c| c != ' ').count()
    }

    /// Draw every part with its descriptor applied.
    ///
    /// Triangles entirely behind a clip plane are dropped. At terminal
    /// resolution straddling triangles are drawn whole.
    pub fn render_scene(
        &mut self,
        scene: &Scene,
        descriptors: &[RenderDescriptor],
        rotation: &RotationState,
        camera: &Camera,
    ) {
        let view_projection = camera.projection_matrix() * camera.view_matrix();
        let pivot = scene.bounds().center();

        for descriptor in descriptors {
            let Some(part) = scene.parts().get(descriptor.part) else {
                continue;
            };
            let model = part_matrix(rotation, &pivot, &descriptor.translation);

            for triangle in part.triangles() {
                if descriptor.classify(&triangle) == TriangleClip::Clipped {
                    continue;
                }
                self.render_triangle(
                    &triangle,
                    &model,
                    &view_projection,
                    camera,
                    descriptor.wireframe,
                );
            }
        }
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        model: &Matrix4<f32>,
        view_projection: &Matrix4<f32>,
        camera: &Camera,
        wireframe: bool,
    ) {
        let world = triangle.vertices.map(|v| model.transform_point(&v));

        // Project vertices to screen space
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (slot, vertex) in screen_coords.iter_mut().zip(&world) {
            match camera.project_to_screen(
                vertex,
                view_projection,
                self.width as u32,
                self.height as u32,
            ) {
                Some(coords) => *slot = coords,
                None => return, // Triangle is clipped
            }
        }

        if wireframe {
            for i in 0..3 {
                self.draw_line(screen_coords[i], screen_coords[(i + 1) % 3]);
            }
            return;
        }

        // Headlight shading, both sides lit
        let normal = face_normal(&world[0], &world[1], &world[2]);
        let light_dir = (camera.position - camera.target).normalize();
        let brightness = normal.dot(&light_dir).abs();

        // Map brightness to character
        let char_index = (brightness * (LUMINOSITY_RAMP.len() - 1) as f32) as usize;
        let char_index = char_index.clamp(1, LUMINOSITY_RAMP.len() - 1);
        let character = LUMINOSITY_RAMP[char_index];

        self.rasterize_triangle(&screen_coords, character);
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], character: char) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                if let Some((w0, w1, w2)) =
                    barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py))
                {
                    if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                        let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                        self.plot(x, y, depth, character);
                    }
                }
            }
        }
    }

    /// DDA line between two screen points with interpolated depth
    fn draw_line(&mut self, from: (f32, f32, f32), to: (f32, f32, f32)) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as i32;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            let depth = from.2 + (to.2 - from.2) * t;
            self.plot(x.floor() as i32, y.floor() as i32, depth, EDGE_CHAR);
        }
    }

    fn plot(&mut self, x: i32, y: i32, depth: f32, character: char) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if depth < self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.char_buffer[idx] = character;
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let c = self.char_buffer[y * self.width + x];

                // Color based on character intensity
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    '#' | '%' | '@' => Color::Cyan,
                    _ => Color::White,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencad_core::{compute_render_descriptors, ViewConfig, ViewModifiers};

    const SQUARE: &str = "o Plate\nv -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nf 1 2 3 4\n";

    // Two plates stacked above and below y = 0
    const STACK: &str = "o Top\nv -1 0.5 0\nv 1 0.5 0\nv 1 1.5 0\nv -1 1.5 0\nf 1 2 3 4\n\
                         o Bottom\nv -1 -1.5 0\nv 1 -1.5 0\nv 1 -0.5 0\nv -1 -0.5 0\nf 5 6 7 8\n";

    fn render(modifiers: ViewModifiers) -> AsciiRenderer {
        render_obj(SQUARE, modifiers)
    }

    fn render_obj(source: &str, modifiers: ViewModifiers) -> AsciiRenderer {
        let scene = opencad_core::obj::parse_obj(source).unwrap();
        let descriptors = compute_render_descriptors(&scene, &modifiers, &ViewConfig::default());
        let mut camera = Camera::new(40, 20);
        camera.frame(&scene.bounds(), 0.0);

        let mut renderer = AsciiRenderer::new(40, 20);
        renderer.render_scene(&scene, &descriptors, &RotationState::default(), &camera);
        renderer
    }

    #[test]
    fn test_filled_square_covers_center() {
        let renderer = render(ViewModifiers::default());
        assert_ne!(renderer.cell(20, 10), ' ');
        assert_eq!(renderer.cell(0, 0), ' ');
    }

    #[test]
    fn test_wireframe_leaves_interior_empty() {
        let filled = render(ViewModifiers::default()).covered_cells();
        let renderer = render(ViewModifiers::default().with_wireframe(true));
        assert!(renderer.covered_cells() > 0);
        assert!(renderer.covered_cells() < filled);
    }

    #[test]
    fn test_section_plane_drops_upper_part() {
        let full = render_obj(STACK, ViewModifiers::default());
        let sectioned = render_obj(STACK, ViewModifiers::default().with_sectioning(true));

        assert!(sectioned.covered_cells() > 0);
        assert!(sectioned.covered_cells() < full.covered_cells());
        // Upper rows are empty once the top plate is cut away
        assert!((0..40).all(|x| sectioned.cell(x, 6) == ' '));
        assert!((0..40).any(|x| full.cell(x, 6) != ' '));
    }

    #[test]
    fn test_straddling_triangles_drawn_whole() {
        let full = render(ViewModifiers::default()).covered_cells();
        let sectioned = render(ViewModifiers::default().with_sectioning(true)).covered_cells();
        assert_eq!(sectioned, full);
    }

    #[test]
    fn test_clear_resets_buffers() {
        let mut renderer = render(ViewModifiers::default());
        renderer.clear();
        assert_eq!(renderer.covered_cells(), 0);
    }

    #[test]
    fn test_barycentric_degenerate() {
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.5, 0.5)).is_none());
    }
}
