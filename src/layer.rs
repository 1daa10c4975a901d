//! # Layers and Compositions
//!
//! A [`Composition`] is a canvas size plus an ordered stack of [`Layer`]s.
//! Array order is paint order: the last layer is the top of the stack.
//!
//! Every layer shares an id, a visibility flag and an origin; the variant
//! payload ([`LayerKind`]) carries the type-specific parameters. The same
//! types serve API construction and JSON documents:
//!
//! ```json
//! {
//!   "width": 128,
//!   "height": 250,
//!   "layers": [
//!     { "id": "bg", "type": "rectangle", "width": 128, "height": 250, "color": 255 },
//!     { "id": "hello", "type": "text", "text": "HELLO", "x": 20, "y": 120 }
//!   ]
//! }
//! ```
//!
//! ## Example
//!
//! ```
//! use tinta::layer::{Composition, RectangleLayer, TextLayer};
//!
//! let mut comp = Composition::new(128, 250);
//! comp.add_rectangle_layer("bg", 0, 0, RectangleLayer::new(128, 250).color(255)).unwrap();
//! comp.add_text_layer("hello", 20, 120, TextLayer::new("HELLO")).unwrap();
//! comp.toggle_layer("bg").unwrap();
//! assert!(!comp.layer("bg").unwrap().visible);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::buffer::{BLACK, PixelBuffer, WHITE};
use crate::dither::DitherMode;
use crate::error::{Result, TintaError};
use crate::ops::{ResizeMode, Rotation};
use crate::panel::PanelConfig;

/// Size of a QR placeholder when the layer does not specify one.
pub const DEFAULT_QR_SIZE: u32 = 70;

fn default_true() -> bool {
    true
}

fn default_brightness() -> f32 {
    1.0
}

fn default_font_size() -> u32 {
    1
}

fn default_padding() -> u32 {
    2
}

fn default_rect_size() -> u32 {
    10
}

fn default_width() -> u32 {
    128
}

fn default_height() -> u32 {
    250
}

// ============================================================================
// PLACEHOLDERS
// ============================================================================

/// Marks a template layer whose content is substituted at render time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderType {
    #[default]
    None,
    /// Text replaced by the device's IP address.
    Ip,
    /// Image replaced by a generated QR code.
    Qr,
}

/// QR error correction level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// ~7% recovery
    L,
    /// ~15% recovery
    #[default]
    M,
    /// ~25% recovery
    Q,
    /// ~30% recovery
    H,
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCorrection::L => "L",
            ErrorCorrection::M => "M",
            ErrorCorrection::Q => "Q",
            ErrorCorrection::H => "H",
        };
        f.write_str(s)
    }
}

impl FromStr for ErrorCorrection {
    type Err = TintaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "L" => Ok(ErrorCorrection::L),
            "M" => Ok(ErrorCorrection::M),
            "Q" => Ok(ErrorCorrection::Q),
            "H" => Ok(ErrorCorrection::H),
            _ => Err(TintaError::UnsupportedMode(format!("error correction '{}'", s))),
        }
    }
}

// ============================================================================
// LAYER VARIANTS
// ============================================================================

/// Bitmap layer loaded from a file or an in-memory buffer.
///
/// When `width`/`height` are both set they give the layer's footprint;
/// otherwise the footprint is the canvas space remaining from the origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageLayer {
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    /// In-memory bitmap; takes precedence over `image_path`. Never serialized.
    #[serde(skip)]
    pub image_data: Option<PixelBuffer>,
    #[serde(default)]
    pub resize_mode: ResizeMode,
    #[serde(default)]
    pub dither_mode: DitherMode,
    /// Multiplier on raw pixel values.
    #[serde(default = "default_brightness")]
    pub brightness: f32,
    /// `-100..100`, 0 = unchanged.
    #[serde(default)]
    pub contrast: f32,
    #[serde(default)]
    pub rotate: Rotation,
    #[serde(default)]
    pub flip_h: bool,
    #[serde(default)]
    pub flip_v: bool,
    /// Crop window origin for [`ResizeMode::Crop`]; `None` centres.
    #[serde(default)]
    pub crop_x: Option<i32>,
    #[serde(default)]
    pub crop_y: Option<i32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub placeholder_type: PlaceholderType,
    #[serde(default)]
    pub error_correction: Option<ErrorCorrection>,
}

impl Default for ImageLayer {
    fn default() -> Self {
        Self {
            image_path: None,
            image_data: None,
            resize_mode: ResizeMode::Fit,
            dither_mode: DitherMode::FloydSteinberg,
            brightness: 1.0,
            contrast: 0.0,
            rotate: Rotation::None,
            flip_h: false,
            flip_v: false,
            crop_x: None,
            crop_y: None,
            width: None,
            height: None,
            placeholder_type: PlaceholderType::None,
            error_correction: None,
        }
    }
}

impl ImageLayer {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_buffer(buffer: PixelBuffer) -> Self {
        Self {
            image_data: Some(buffer),
            ..Default::default()
        }
    }

    /// QR placeholder with a preview bitmap until real data is substituted.
    pub fn qr_placeholder(width: u32, height: u32, level: ErrorCorrection) -> Self {
        Self {
            image_data: Some(qr_preview(width, height)),
            resize_mode: ResizeMode::Stretch,
            dither_mode: DitherMode::None,
            width: Some(width),
            height: Some(height),
            placeholder_type: PlaceholderType::Qr,
            error_correction: Some(level),
            ..Default::default()
        }
    }

    pub fn resize_mode(mut self, mode: ResizeMode) -> Self {
        self.resize_mode = mode;
        self
    }

    pub fn dither(mut self, mode: DitherMode) -> Self {
        self.dither_mode = mode;
        self
    }

    pub fn brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn contrast(mut self, contrast: f32) -> Self {
        self.contrast = contrast;
        self
    }

    pub fn rotate(mut self, rotation: Rotation) -> Self {
        self.rotate = rotation;
        self
    }

    pub fn flip_h(mut self) -> Self {
        self.flip_h = true;
        self
    }

    pub fn flip_v(mut self) -> Self {
        self.flip_v = true;
        self
    }

    pub fn crop_at(mut self, x: i32, y: i32) -> Self {
        self.crop_x = Some(x);
        self.crop_y = Some(y);
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Load the source bitmap as grayscale.
    ///
    /// In-memory data wins over the file path. Fails with
    /// [`TintaError::SourceLoad`] when neither yields a bitmap.
    pub fn load_source(&self) -> Result<PixelBuffer> {
        if let Some(ref data) = self.image_data {
            return Ok(data.clone());
        }
        match self.image_path {
            Some(ref path) => PixelBuffer::load(path),
            None => Err(TintaError::SourceLoad("layer has no image source".into())),
        }
    }
}

/// Text layer rendered with the compositor's text renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLayer {
    #[serde(default)]
    pub text: String,
    /// 0 = black, 255 = white.
    #[serde(default)]
    pub color: u8,
    #[serde(default)]
    pub rotate: Rotation,
    #[serde(default)]
    pub flip_h: bool,
    #[serde(default)]
    pub flip_v: bool,
    /// Integer scale factor, at least 1.
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Paint a white box (text plus padding) behind the glyphs.
    #[serde(default)]
    pub background: bool,
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default)]
    pub placeholder_type: PlaceholderType,
}

impl Default for TextLayer {
    fn default() -> Self {
        Self {
            text: String::new(),
            color: BLACK,
            rotate: Rotation::None,
            flip_h: false,
            flip_v: false,
            font_size: 1,
            background: false,
            padding: 2,
            placeholder_type: PlaceholderType::None,
        }
    }
}

impl TextLayer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Text slot filled with the IP address at render time.
    pub fn ip_placeholder(sample: impl Into<String>) -> Self {
        Self {
            text: sample.into(),
            placeholder_type: PlaceholderType::Ip,
            ..Default::default()
        }
    }

    pub fn color(mut self, color: u8) -> Self {
        self.color = color;
        self
    }

    pub fn font_size(mut self, size: u32) -> Self {
        self.font_size = size.max(1);
        self
    }

    pub fn background(mut self, padding: u32) -> Self {
        self.background = true;
        self.padding = padding;
        self
    }

    pub fn rotate(mut self, rotation: Rotation) -> Self {
        self.rotate = rotation;
        self
    }

    pub fn flip_h(mut self) -> Self {
        self.flip_h = true;
        self
    }

    pub fn flip_v(mut self) -> Self {
        self.flip_v = true;
        self
    }
}

/// Filled or outlined rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectangleLayer {
    #[serde(default = "default_rect_size")]
    pub width: u32,
    #[serde(default = "default_rect_size")]
    pub height: u32,
    #[serde(default = "default_true")]
    pub filled: bool,
    #[serde(default)]
    pub color: u8,
}

impl Default for RectangleLayer {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            filled: true,
            color: BLACK,
        }
    }
}

impl RectangleLayer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Draw only the 1-pixel border.
    pub fn outline(mut self) -> Self {
        self.filled = false;
        self
    }

    pub fn color(mut self, color: u8) -> Self {
        self.color = color;
        self
    }
}

/// Type-specific layer payload.
///
/// The `#[serde(tag = "type")]` attribute enables JSON like
/// `{"type": "text", "text": "Hello"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    Image(ImageLayer),
    Text(TextLayer),
    Rectangle(RectangleLayer),
}

impl LayerKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Image(_) => "image",
            LayerKind::Text(_) => "text",
            LayerKind::Rectangle(_) => "rectangle",
        }
    }

    pub fn placeholder_type(&self) -> PlaceholderType {
        match self {
            LayerKind::Image(img) => img.placeholder_type,
            LayerKind::Text(text) => text.placeholder_type,
            LayerKind::Rectangle(_) => PlaceholderType::None,
        }
    }
}

/// One visual element of a composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    /// Unique within a composition.
    pub id: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(flatten)]
    pub kind: LayerKind,
}

impl Layer {
    pub fn new(id: impl Into<String>, x: i32, y: i32, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            visible: true,
            x,
            y,
            kind,
        }
    }
}

// ============================================================================
// QR PREVIEW
// ============================================================================

/// Placeholder bitmap shown for a QR layer before real data is substituted.
///
/// White field, 2-pixel black border and, when there is room, a solid
/// 20x10 block in the centre.
pub fn qr_preview(width: u32, height: u32) -> PixelBuffer {
    let mut img = PixelBuffer::new(width, height, WHITE);
    img.fill_rect(0, 0, width, 2, BLACK);
    img.fill_rect(0, height as i32 - 2, width, 2, BLACK);
    img.fill_rect(0, 0, 2, height, BLACK);
    img.fill_rect(width as i32 - 2, 0, 2, height, BLACK);

    if height > 10 && width > 20 {
        let cx = (width / 2) as i32;
        let cy = (height / 2) as i32;
        img.fill_rect(cx - 10, cy - 5, 20, 10, BLACK);
    }
    img
}

// ============================================================================
// COMPOSITION
// ============================================================================

/// Canvas dimensions plus an ordered layer stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    layers: Vec<Layer>,
}

impl Composition {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
        }
    }

    /// Empty composition sized for a panel.
    pub fn for_panel(panel: &PanelConfig) -> Self {
        Self::new(panel.width, panel.height)
    }

    /// Parse a composition document, rejecting duplicate ids.
    pub fn from_json(json: &str) -> Result<Self> {
        let comp: Composition = serde_json::from_str(json)?;
        comp.validate()?;
        Ok(comp)
    }

    /// Read and parse a composition document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Pretty-printed JSON. In-memory image data is omitted.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check layer id uniqueness.
    pub fn validate(&self) -> Result<()> {
        for (i, layer) in self.layers.iter().enumerate() {
            if self.layers[..i].iter().any(|l| l.id == layer.id) {
                return Err(TintaError::DuplicateId(layer.id.clone()));
            }
        }
        Ok(())
    }

    /// Layers in paint order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| TintaError::UnknownId(id.to_string()))
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Append a layer to the top of the stack and return its id.
    pub fn add_layer(&mut self, layer: Layer) -> Result<String> {
        if self.layer(&layer.id).is_some() {
            return Err(TintaError::DuplicateId(layer.id));
        }
        let id = layer.id.clone();
        self.layers.push(layer);
        Ok(id)
    }

    pub fn add_image_layer(
        &mut self,
        id: impl Into<String>,
        x: i32,
        y: i32,
        image: ImageLayer,
    ) -> Result<String> {
        self.add_layer(Layer::new(id, x, y, LayerKind::Image(image)))
    }

    pub fn add_text_layer(
        &mut self,
        id: impl Into<String>,
        x: i32,
        y: i32,
        text: TextLayer,
    ) -> Result<String> {
        self.add_layer(Layer::new(id, x, y, LayerKind::Text(text)))
    }

    pub fn add_rectangle_layer(
        &mut self,
        id: impl Into<String>,
        x: i32,
        y: i32,
        rect: RectangleLayer,
    ) -> Result<String> {
        self.add_layer(Layer::new(id, x, y, LayerKind::Rectangle(rect)))
    }

    /// Remove a layer and hand it back.
    pub fn remove_layer(&mut self, id: &str) -> Result<Layer> {
        let idx = self.position(id)?;
        Ok(self.layers.remove(idx))
    }

    /// Flip visibility; returns the new state.
    pub fn toggle_layer(&mut self, id: &str) -> Result<bool> {
        let idx = self.position(id)?;
        let layer = &mut self.layers[idx];
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    /// Relocate a layer within the stack. `new_index` is clamped to the
    /// valid range, so `usize::MAX` moves the layer to the top.
    pub fn move_layer(&mut self, id: &str, new_index: usize) -> Result<()> {
        let old = self.position(id)?;
        let layer = self.layers.remove(old);
        let new_index = new_index.min(self.layers.len());
        self.layers.insert(new_index, layer);
        Ok(())
    }

    /// Patch named fields of a layer from a JSON object.
    ///
    /// Keys the layer's variant does not have are ignored; `id` and `type`
    /// are protected. A QR placeholder whose `width`/`height` changes gets a
    /// fresh preview bitmap so a stale one is never shown.
    ///
    /// ```
    /// use serde_json::json;
    /// use tinta::layer::{Composition, LayerKind, TextLayer};
    ///
    /// let mut comp = Composition::new(64, 64);
    /// comp.add_text_layer("t", 0, 0, TextLayer::new("a")).unwrap();
    /// comp.update_layer("t", &json!({"text": "b", "x": 5})).unwrap();
    ///
    /// let layer = comp.layer("t").unwrap();
    /// assert_eq!(layer.x, 5);
    /// assert!(matches!(&layer.kind, LayerKind::Text(t) if t.text == "b"));
    /// ```
    pub fn update_layer(&mut self, id: &str, patch: &Value) -> Result<()> {
        let Some(changes) = patch.as_object() else {
            return Err(TintaError::InvalidPatch("patch must be a JSON object".into()));
        };
        for protected in ["id", "type"] {
            if changes.contains_key(protected) {
                return Err(TintaError::InvalidPatch(format!(
                    "field '{}' cannot be changed",
                    protected
                )));
            }
        }

        let idx = self.position(id)?;
        let current = &self.layers[idx];
        let dims_changing = current.kind.placeholder_type() == PlaceholderType::Qr
            && (changes.contains_key("width") || changes.contains_key("height"));

        let mut value = serde_json::to_value(current)?;
        if let Some(fields) = value.as_object_mut() {
            for (key, new_value) in changes {
                if fields.contains_key(key) {
                    fields.insert(key.clone(), new_value.clone());
                }
            }
        }
        let mut patched: Layer =
            serde_json::from_value(value).map_err(|e| TintaError::InvalidPatch(e.to_string()))?;

        if let (LayerKind::Image(new_img), LayerKind::Image(old_img)) =
            (&mut patched.kind, &mut self.layers[idx].kind)
        {
            new_img.image_data = old_img.image_data.take();
            if dims_changing {
                let w = new_img.width.unwrap_or(DEFAULT_QR_SIZE);
                let h = new_img.height.unwrap_or(DEFAULT_QR_SIZE);
                new_img.image_data = Some(qr_preview(w, h));
            }
        }

        self.layers[idx] = patched;
        Ok(())
    }

    /// Serializable snapshot of every layer's fields, in paint order.
    pub fn get_layer_info(&self) -> Result<Vec<Value>> {
        self.layers
            .iter()
            .map(|l| serde_json::to_value(l).map_err(TintaError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ids(comp: &Composition) -> Vec<&str> {
        comp.layers().iter().map(|l| l.id.as_str()).collect()
    }

    fn three_layers() -> Composition {
        let mut comp = Composition::new(64, 64);
        comp.add_rectangle_layer("a", 0, 0, RectangleLayer::default()).unwrap();
        comp.add_rectangle_layer("b", 0, 0, RectangleLayer::default()).unwrap();
        comp.add_rectangle_layer("c", 0, 0, RectangleLayer::default()).unwrap();
        comp
    }

    #[test]
    fn test_add_returns_id_and_rejects_duplicates() {
        let mut comp = Composition::new(10, 10);
        let id = comp.add_text_layer("t", 1, 2, TextLayer::new("x")).unwrap();
        assert_eq!(id, "t");
        let err = comp
            .add_rectangle_layer("t", 0, 0, RectangleLayer::default())
            .unwrap_err();
        assert!(matches!(err, TintaError::DuplicateId(ref id) if id == "t"));
        assert_eq!(comp.len(), 1);
    }

    #[test]
    fn test_remove_and_unknown_id() {
        let mut comp = three_layers();
        let removed = comp.remove_layer("b").unwrap();
        assert_eq!(removed.id, "b");
        assert_eq!(ids(&comp), vec!["a", "c"]);
        assert!(matches!(comp.remove_layer("b"), Err(TintaError::UnknownId(_))));
    }

    #[test]
    fn test_toggle() {
        let mut comp = three_layers();
        assert!(!comp.toggle_layer("a").unwrap());
        assert!(comp.toggle_layer("a").unwrap());
        assert!(matches!(comp.toggle_layer("zz"), Err(TintaError::UnknownId(_))));
    }

    #[test]
    fn test_move_layer_clamps() {
        let mut comp = three_layers();
        comp.move_layer("a", 99).unwrap();
        assert_eq!(ids(&comp), vec!["b", "c", "a"]);
        comp.move_layer("a", 0).unwrap();
        assert_eq!(ids(&comp), vec!["a", "b", "c"]);
        comp.move_layer("c", 1).unwrap();
        assert_eq!(ids(&comp), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_update_layer_patches_known_fields() {
        let mut comp = three_layers();
        comp.update_layer("b", &json!({"width": 40, "filled": false, "bogus": 1}))
            .unwrap();
        let LayerKind::Rectangle(rect) = &comp.layer("b").unwrap().kind else {
            panic!("expected rectangle");
        };
        assert_eq!(rect.width, 40);
        assert_eq!(rect.height, 10);
        assert!(!rect.filled);
    }

    #[test]
    fn test_update_layer_rejects_protected_and_bad_values() {
        let mut comp = three_layers();
        assert!(matches!(
            comp.update_layer("a", &json!({"id": "z"})),
            Err(TintaError::InvalidPatch(_))
        ));
        assert!(matches!(
            comp.update_layer("a", &json!({"width": "wide"})),
            Err(TintaError::InvalidPatch(_))
        ));
        assert!(matches!(
            comp.update_layer("a", &json!([1, 2])),
            Err(TintaError::InvalidPatch(_))
        ));
        assert!(matches!(
            comp.update_layer("nope", &json!({})),
            Err(TintaError::UnknownId(_))
        ));
    }

    #[test]
    fn test_update_keeps_image_data() {
        let mut comp = Composition::new(32, 32);
        let data = PixelBuffer::new(4, 4, 77);
        comp.add_image_layer("img", 0, 0, ImageLayer::from_buffer(data.clone()))
            .unwrap();
        comp.update_layer("img", &json!({"brightness": 1.5})).unwrap();
        let LayerKind::Image(img) = &comp.layer("img").unwrap().kind else {
            panic!("expected image");
        };
        assert_eq!(img.brightness, 1.5);
        assert_eq!(img.image_data.as_ref(), Some(&data));
    }

    #[test]
    fn test_update_qr_placeholder_regenerates_preview() {
        let mut comp = Composition::new(128, 250);
        comp.add_image_layer("qr", 10, 10, ImageLayer::qr_placeholder(70, 70, ErrorCorrection::M))
            .unwrap();
        comp.update_layer("qr", &json!({"width": 90, "height": 40})).unwrap();

        let LayerKind::Image(img) = &comp.layer("qr").unwrap().kind else {
            panic!("expected image");
        };
        let preview = img.image_data.as_ref().unwrap();
        assert_eq!(preview.dimensions(), (90, 40));
        assert_eq!(preview, &qr_preview(90, 40));
    }

    #[test]
    fn test_qr_preview_pattern() {
        let p = qr_preview(30, 20);
        // Border
        assert_eq!(p.get(0, 0).unwrap(), BLACK);
        assert_eq!(p.get(29, 19).unwrap(), BLACK);
        assert_eq!(p.get(1, 10).unwrap(), BLACK);
        // Inside border, outside centre block
        assert_eq!(p.get(3, 3).unwrap(), WHITE);
        // Centre block
        assert_eq!(p.get(15, 10).unwrap(), BLACK);

        // Too small for the centre block
        let small = qr_preview(20, 20);
        assert_eq!(small.get(10, 10).unwrap(), WHITE);
    }

    #[test]
    fn test_json_defaults() {
        let comp = Composition::from_json(
            r#"{
                "layers": [
                    {"id": "i", "type": "image", "image_path": "logo.png"},
                    {"id": "t", "type": "text", "text": "hi"},
                    {"id": "r", "type": "rectangle"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!((comp.width, comp.height), (128, 250));

        let LayerKind::Image(img) = &comp.layers()[0].kind else {
            panic!("expected image");
        };
        assert_eq!(img.resize_mode, ResizeMode::Fit);
        assert_eq!(img.dither_mode, DitherMode::FloydSteinberg);
        assert_eq!(img.brightness, 1.0);
        assert!(comp.layers()[0].visible);

        let LayerKind::Text(text) = &comp.layers()[1].kind else {
            panic!("expected text");
        };
        assert_eq!((text.color, text.font_size, text.padding), (0, 1, 2));

        let LayerKind::Rectangle(rect) = &comp.layers()[2].kind else {
            panic!("expected rectangle");
        };
        assert_eq!((rect.width, rect.height, rect.filled), (10, 10, true));
    }

    #[test]
    fn test_json_rejects_duplicates_and_bad_rotation() {
        let dup = r#"{"width": 8, "height": 8, "layers": [
            {"id": "a", "type": "rectangle"}, {"id": "a", "type": "rectangle"}]}"#;
        assert!(matches!(Composition::from_json(dup), Err(TintaError::DuplicateId(_))));

        let rot = r#"{"layers": [{"id": "t", "type": "text", "rotate": 45}]}"#;
        assert!(Composition::from_json(rot).is_err());

        let mode = r#"{"layers": [{"id": "i", "type": "image", "resize_mode": "zoom"}]}"#;
        assert!(Composition::from_json(mode).is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_fields() {
        let mut comp = Composition::new(250, 128);
        comp.add_image_layer(
            "img",
            3,
            4,
            ImageLayer::from_path("a.png")
                .resize_mode(ResizeMode::Crop)
                .rotate(Rotation::Ccw270)
                .crop_at(5, 6),
        )
        .unwrap();
        comp.add_text_layer("ip", 0, 0, TextLayer::ip_placeholder("0.0.0.0").background(4))
            .unwrap();

        let back = Composition::from_json(&comp.to_json().unwrap()).unwrap();
        assert_eq!(back.get_layer_info().unwrap(), comp.get_layer_info().unwrap());
    }

    #[test]
    fn test_layer_info_shape() {
        let mut comp = Composition::new(10, 10);
        comp.add_text_layer("t", 1, 2, TextLayer::new("x").rotate(Rotation::Ccw90))
            .unwrap();
        let info = comp.get_layer_info().unwrap();
        assert_eq!(info[0]["type"], json!("text"));
        assert_eq!(info[0]["id"], json!("t"));
        assert_eq!(info[0]["rotate"], json!(90));
        assert_eq!(info[0]["placeholder_type"], json!("none"));
    }

    #[test]
    fn test_load_source_prefers_buffer() {
        let layer = ImageLayer {
            image_path: Some("/does/not/exist.png".into()),
            image_data: Some(PixelBuffer::new(2, 2, 9)),
            ..Default::default()
        };
        assert_eq!(layer.load_source().unwrap().get(0, 0).unwrap(), 9);

        let missing = ImageLayer::from_path("/does/not/exist.png");
        assert!(matches!(missing.load_source(), Err(TintaError::SourceLoad(_))));
    }
}
