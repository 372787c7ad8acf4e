//! # Peripherals
//!
//! Trait interfaces for the external collaborators this runtime forwards
//! statements to but never implements itself (§6): graphics, audio, the
//! file system, and program persistence. A host wires concrete
//! implementations in; this crate only needs the shape of the call.

/// Sprite byte-array wire format used by `GET`/`PUT`: the first four bytes
/// are two little-endian `u16`s (width, height), followed by
/// `width * height` row-major pixel color-index bytes.
pub mod sprite {
    pub fn encode(width: u16, height: u16, pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + pixels.len());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(pixels);
        out
    }

    /// Returns `(width, height, pixels)`, or `None` if `bytes` is too short
    /// to even hold the header or its declared pixel payload.
    pub fn decode(bytes: &[u8]) -> Option<(u16, u16, &[u8])> {
        if bytes.len() < 4 {
            return None;
        }
        let width = u16::from_le_bytes([bytes[0], bytes[1]]);
        let height = u16::from_le_bytes([bytes[2], bytes[3]]);
        let pixel_count = width as usize * height as usize;
        let pixels = bytes.get(4..4 + pixel_count)?;
        Some((width, height, pixels))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: Option<i32>,
    pub boxed: bool,
    pub filled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleStyle {
    pub color: Option<i32>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub aspect: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintColors {
    pub paint_color: Option<i32>,
    pub border_color: Option<i32>,
}

/// Operations the core invokes on a graphics peripheral (§6). A supertrait
/// of [`crate::eval::PointSource`] so a `&mut dyn GraphicsPeripheral` can be
/// reborrowed as `&dyn PointSource` to back the `POINT` builtin wherever an
/// `EvalContext` is built (stable trait-object upcasting).
pub trait GraphicsPeripheral: crate::eval::PointSource {
    fn set_screen_mode(&mut self, mode: i32);
    fn cls(&mut self, mode: Option<i32>);
    fn set_color(&mut self, fg: Option<i32>, bg: Option<i32>, border: Option<i32>);
    fn pset(&mut self, x: i32, y: i32, color: Option<i32>);
    fn preset(&mut self, x: i32, y: i32, color: Option<i32>);
    fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, style: LineStyle);
    fn circle(&mut self, x: i32, y: i32, radius: i32, style: CircleStyle);
    fn paint(&mut self, x: i32, y: i32, colors: PaintColors);
    fn get_sprite(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) -> Vec<u8>;
    fn put_sprite(&mut self, x: i32, y: i32, bytes: &[u8], action: Option<i32>);
    fn set_view(&mut self, args: &[f64]);
    fn set_window(&mut self, args: &[f64]);
    fn set_palette(&mut self, args: &[f64]);
    fn draw(&mut self, commands: &str);
}

/// Operations the core invokes on an audio peripheral (§6).
pub trait AudioPeripheral {
    fn sound(&mut self, freq: f64, duration: f64);
    /// `mml` is a Music Macro Language string, opaque to the core.
    fn play(&mut self, mml: &str);
}

/// Operations the core invokes on the file-system peripheral (§6).
pub trait FileSystemPeripheral {
    fn open(&mut self, mode: &str, number: i32, name: &str, rec_len: Option<i32>) -> Result<(), String>;
    fn close(&mut self, numbers: &[i32]);
    fn print(&mut self, number: i32, text: &str) -> Result<(), String>;
    fn input(&mut self, number: i32) -> Result<String, String>;
}

/// Operations the core invokes on the persistence peripheral (§6).
pub trait PersistencePeripheral {
    fn save(&mut self, name: &str, statements: &str) -> Result<(), String>;
    fn load(&mut self, name: &str) -> Result<String, String>;
}

/// The peripherals the interpreter may forward statements to during a run.
/// Every field is optional: a host that never uses `SCREEN`/`SOUND`/`OPEN`
/// statements need not implement anything here, and a statement that
/// forwards to a missing peripheral fails with `IllegalFunctionCall`.
#[derive(Default)]
pub struct Peripherals<'a> {
    pub graphics: Option<&'a mut dyn GraphicsPeripheral>,
    pub audio: Option<&'a mut dyn AudioPeripheral>,
    pub files: Option<&'a mut dyn FileSystemPeripheral>,
    pub persistence: Option<&'a mut dyn PersistencePeripheral>,
}
