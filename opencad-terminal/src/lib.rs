/// Terminal viewer for STL and OBJ models
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use opencad_core::ViewerSession;
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub mod camera;
pub mod renderer;
pub mod transform;

pub use camera::Camera;
pub use renderer::AsciiRenderer;
pub use transform::RotationState;

/// Rotation applied per key press (radians)
const ROTATE_STEP: f32 = 0.1;

/// Explode factor change per `+`/`-` press
const EXPLODE_STEP: f32 = 0.25;

/// Rows reserved for the status lines at the top
const STATUS_ROWS: usize = 2;

/// Cube shown when no model is given on the command line
pub const DEMO_CUBE_OBJ: &str = "\
o Cube
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
f 1 4 3 2
f 5 6 7 8
f 1 2 6 5
f 2 3 7 6
f 3 4 8 7
f 4 1 5 8
";

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    session: ViewerSession,
    rotation: RotationState,
    camera: Camera,
    renderer: AsciiRenderer,
    width: u16,
    height: u16,
    framed_revision: Option<u64>,
    running: bool,
    share_requested: bool,
    auto_spin: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// Viewer sized to the current terminal
    pub fn new(session: ViewerSession) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(session, width, height))
    }

    pub fn with_size(session: ViewerSession, width: u16, height: u16) -> Self {
        Self {
            session,
            rotation: RotationState::new(0.3, 0.3, 0.0),
            camera: Camera::new(width as u32, height as u32),
            renderer: AsciiRenderer::new(width as usize, height as usize),
            width,
            height,
            framed_revision: None,
            running: true,
            share_requested: false,
            auto_spin: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        }
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the user asked for a share token with `p`
    pub fn share_requested(&self) -> bool {
        self.share_requested
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::from_millis(0))? {
                self.handle_event(event::read()?);
            }

            // Update
            self.update();

            // Render
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent { code, kind, .. }) if kind != KeyEventKind::Release => {
                self.handle_key(code);
            }
            Event::Resize(width, height) => self.resize(width, height),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('w') | KeyCode::Up => {
                self.rotation.rotate(ROTATE_STEP, 0.0, 0.0);
            }
            KeyCode::Char('s') | KeyCode::Down => {
                self.rotation.rotate(-ROTATE_STEP, 0.0, 0.0);
            }
            KeyCode::Char('a') | KeyCode::Left => {
                self.rotation.rotate(0.0, -ROTATE_STEP, 0.0);
            }
            KeyCode::Char('d') | KeyCode::Right => {
                self.rotation.rotate(0.0, ROTATE_STEP, 0.0);
            }
            KeyCode::Char('e') => {
                self.rotation.rotate(0.0, 0.0, ROTATE_STEP);
            }
            KeyCode::Char('r') => {
                self.rotation.rotate(0.0, 0.0, -ROTATE_STEP);
            }
            KeyCode::Char(' ') => {
                self.auto_spin = !self.auto_spin;
            }
            KeyCode::Char('f') => {
                self.session.toggle_wireframe();
            }
            KeyCode::Char('c') => {
                self.session.toggle_sectioning();
            }
            KeyCode::Char('x') => {
                self.session.toggle_exploded();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let factor = self.session.modifiers().explode_factor + EXPLODE_STEP;
                self.session.set_explode_factor(factor);
            }
            KeyCode::Char('-') => {
                let factor = self.session.modifiers().explode_factor - EXPLODE_STEP;
                self.session.set_explode_factor(factor);
            }
            KeyCode::Char('p') => {
                self.share_requested = true;
                info!("Share token will be printed on exit");
            }
            _ => {}
        }
    }

    fn resize(&mut self, width: u16, height: u16) {
        debug!(width, height, "Terminal resized");
        self.width = width;
        self.height = height;
        self.camera = Camera::new(width as u32, height as u32);
        self.renderer = AsciiRenderer::new(width as usize, height as usize);
        self.framed_revision = None;
    }

    fn update(&mut self) {
        // Continuous slow rotation for demo effect
        if self.auto_spin {
            self.rotation.rotate(0.01, 0.015, 0.0);
        }
        self.reframe();
    }

    /// Re-aim the camera whenever the scene or explode state changed
    fn reframe(&mut self) {
        let revision = self.session.revision();
        if self.framed_revision == Some(revision) {
            return;
        }
        if let Some(scene) = self.session.scene() {
            let modifiers = self.session.modifiers();
            let headroom = if modifiers.exploded {
                modifiers.explode_factor
            } else {
                0.0
            };
            self.camera.frame(&scene.bounds(), headroom);
        }
        self.framed_revision = Some(revision);
    }

    /// Render the current view into the character buffer
    pub fn render_frame(&mut self) {
        self.reframe();
        self.renderer.clear();
        if self.width == 0 || self.height == 0 {
            return;
        }
        if let Some(scene) = self.session.scene() {
            let descriptors = self.session.render_descriptors();
            self.renderer
                .render_scene(scene, &descriptors, &self.rotation, &self.camera);
        }
    }

    /// Status and hierarchy lines drawn over the model
    pub fn overlay_lines(&self) -> Vec<String> {
        let on_off = |flag: bool| if flag { "on" } else { "off" };
        let modifiers = self.session.modifiers();

        let mut lines = vec![
            format!(
                "OpenCAD | FPS: {:.1} | WASD/Arrows=Rotate E/R=Roll F=Wire C=Section X=Explode +/-=Factor P=Share Q=Quit",
                self.fps
            ),
            format!(
                "Wireframe: {} | Section: {} | Explode: {} ({:.2})",
                on_off(modifiers.wireframe),
                on_off(modifiers.sectioning),
                on_off(modifiers.exploded),
                modifiers.explode_factor
            ),
        ];

        let room = (self.height as usize).saturating_sub(STATUS_ROWS + 1);
        let hierarchy = self.session.hierarchy();
        if !hierarchy.is_empty() && room > 0 {
            lines.push("Parts:".to_string());
            let shown = hierarchy.len().min(room.saturating_sub(1));
            lines.extend(hierarchy.iter().take(shown).map(|name| format!("  {name}")));
            if shown < hierarchy.len() {
                lines.push(format!("  ... {} more", hierarchy.len() - shown));
            }
        }

        lines
    }

    fn render(&mut self) -> io::Result<()> {
        self.render_frame();

        // Output to terminal
        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;

        self.renderer.draw(&mut stdout)?;

        // Draw UI overlay
        let width = self.width as usize;
        for (row, line) in self.overlay_lines().iter().enumerate() {
            if row >= self.height as usize {
                break;
            }
            let color = if row < STATUS_ROWS {
                Color::Yellow
            } else {
                Color::Green
            };
            let text: String = line.chars().take(width).collect();
            queue!(
                stdout,
                cursor::MoveTo(0, row as u16),
                SetForegroundColor(color),
                Print(text),
                ResetColor
            )?;
        }
        if !self.session.is_loaded() {
            queue!(
                stdout,
                cursor::MoveTo(0, STATUS_ROWS as u16),
                terminal::Clear(ClearType::CurrentLine),
                Print("No model loaded")
            )?;
        }

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencad_core::{ModelFormat, ModelSource};

    const PARTS: &[u8] = b"o Wheel\nv 0 0 0\nv 1 0 0\nv 1 1 0\nf 1 2 3\n\
                           o Axle\nv 3 0 0\nv 4 0 0\nv 4 1 0\nf 4 5 6\n";

    fn app() -> TerminalApp {
        let mut session = ViewerSession::default();
        session
            .load(ModelSource::new(PARTS.to_vec(), ModelFormat::Obj, "cart.obj"))
            .unwrap();
        TerminalApp::with_size(session, 80, 24)
    }

    #[test]
    fn test_demo_cube_loads() {
        let mut session = ViewerSession::default();
        let scene = session
            .load(ModelSource::new(DEMO_CUBE_OBJ.as_bytes().to_vec(), ModelFormat::Obj, "cube.obj"))
            .unwrap();
        assert_eq!(scene.triangle_count(), 12);
        assert_eq!(session.hierarchy(), vec!["Cube".to_string()]);
    }

    #[test]
    fn test_view_keys_drive_session() {
        let mut app = app();
        app.handle_key(KeyCode::Char('f'));
        app.handle_key(KeyCode::Char('c'));
        app.handle_key(KeyCode::Char('x'));
        app.handle_key(KeyCode::Char('+'));
        app.handle_key(KeyCode::Char('+'));
        app.handle_key(KeyCode::Char('-'));

        let modifiers = app.session().modifiers();
        assert!(modifiers.wireframe);
        assert!(modifiers.sectioning);
        assert!(modifiers.exploded);
        assert!((modifiers.explode_factor - EXPLODE_STEP).abs() < 1e-6);

        app.handle_key(KeyCode::Char('f'));
        assert!(!app.session().modifiers().wireframe);
    }

    #[test]
    fn test_explode_factor_never_negative() {
        let mut app = app();
        app.handle_key(KeyCode::Char('-'));
        assert_eq!(app.session().modifiers().explode_factor, 0.0);
    }

    #[test]
    fn test_quit_and_share_keys() {
        let mut app = app();
        assert!(app.is_running());
        assert!(!app.share_requested());

        app.handle_key(KeyCode::Char('p'));
        app.handle_key(KeyCode::Esc);
        assert!(app.share_requested());
        assert!(!app.is_running());
    }

    #[test]
    fn test_overlay_lists_hierarchy() {
        let mut app = app();
        app.handle_key(KeyCode::Char('x'));
        let lines = app.overlay_lines();

        assert!(lines[1].contains("Explode: on"));
        assert!(lines.contains(&"  Wheel".to_string()));
        assert!(lines.contains(&"  Axle".to_string()));
    }

    #[test]
    fn test_render_frame_draws_model() {
        let mut app = app();
        app.render_frame();
        assert!(app.renderer.covered_cells() > 0);

        let mut empty = TerminalApp::with_size(ViewerSession::default(), 80, 24);
        empty.render_frame();
        assert_eq!(empty.renderer.covered_cells(), 0);
        assert_eq!(empty.overlay_lines().len(), 2);
    }

    #[test]
    fn test_zero_sized_terminal_renders_nothing() {
        let mut app = app();
        for (width, height) in [(0, 24), (80, 0), (0, 0)] {
            app.handle_event(Event::Resize(width, height));
            app.render_frame();
            assert_eq!(app.renderer.covered_cells(), 0);
        }

        app.handle_event(Event::Resize(80, 24));
        app.render_frame();
        assert!(app.renderer.covered_cells() > 0);

        let mut narrow = TerminalApp::with_size(ViewerSession::default(), 0, 0);
        narrow.render_frame();
        assert_eq!(narrow.renderer.covered_cells(), 0);
    }
}
