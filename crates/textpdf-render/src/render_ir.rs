use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Millimetres per typographic point.
pub const MM_PER_PT: f32 = 25.4 / 72.0;

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Default text color.
    pub const BLACK: Self = Self::gray(0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Neutral gray with equal channels.
    pub const fn gray(level: u8) -> Self {
        Self::new(level, level, level)
    }
}

/// Font face style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

/// Explicit font context carried by every measure and draw call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// Font family name.
    pub family: Arc<str>,
    pub style: FontStyle,
    /// Size in points.
    pub size_pt: f32,
    pub color: Rgb,
}

impl FontSpec {
    /// Black normal-style font.
    pub fn new(family: Arc<str>, size_pt: f32) -> Self {
        Self {
            family,
            style: FontStyle::Normal,
            size_pt,
            color: Rgb::BLACK,
        }
    }

    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }
}

/// Horizontal anchoring of a text command relative to its `x`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Page layer a command belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLayer {
    /// Title, body, and divider commands.
    #[default]
    Content,
    /// Header and footer commands.
    Chrome,
}

/// Text draw command. Coordinates are millimetres from the top-left corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextCommand {
    pub text: String,
    /// Anchor x.
    pub x: f32,
    /// Baseline y.
    pub y: f32,
    pub align: TextAlign,
    pub font: FontSpec,
    pub layer: PageLayer,
}

/// Straight line command.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleCommand {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub color: Rgb,
    /// Stroke width in millimetres.
    pub thickness: f32,
}

impl RuleCommand {
    /// Horizontal rule from `x1` to `x2` at `y`.
    pub fn horizontal(x1: f32, x2: f32, y: f32, color: Rgb) -> Self {
        Self {
            x1,
            y1: y,
            x2,
            y2: y,
            color,
            thickness: 0.2,
        }
    }
}

/// Layout output commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Text(TextCommand),
    Rule(RuleCommand),
}

impl DrawCommand {
    /// Text payload for text commands.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(cmd) => Some(cmd.text.as_str()),
            Self::Rule(_) => None,
        }
    }

    /// Vertical position used for bottom-margin checks.
    pub fn y(&self) -> f32 {
        match self {
            Self::Text(cmd) => cmd.y,
            Self::Rule(cmd) => cmd.y1.max(cmd.y2),
        }
    }
}

/// Page represented as backend-agnostic draw commands.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderPage {
    /// 1-based page number.
    pub page_number: usize,
    /// Content-layer draw commands.
    pub content_commands: Vec<DrawCommand>,
    /// Chrome-layer draw commands (header/footer).
    pub chrome_commands: Vec<DrawCommand>,
}

impl RenderPage {
    const INITIAL_CONTENT_COMMAND_CAPACITY: usize = 16;
    const INITIAL_CHROME_COMMAND_CAPACITY: usize = 3;

    /// Create an empty page.
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            content_commands: Vec::with_capacity(0),
            chrome_commands: Vec::with_capacity(0),
        }
    }

    /// Push a content-layer command.
    pub fn push_content_command(&mut self, cmd: DrawCommand) {
        if self.content_commands.capacity() == 0 {
            self.content_commands
                .reserve(Self::INITIAL_CONTENT_COMMAND_CAPACITY);
        }
        self.content_commands.push(cmd);
    }

    /// Push a chrome-layer command.
    pub fn push_chrome_command(&mut self, cmd: DrawCommand) {
        if self.chrome_commands.capacity() == 0 {
            self.chrome_commands
                .reserve(Self::INITIAL_CHROME_COMMAND_CAPACITY);
        }
        self.chrome_commands.push(cmd);
    }

    /// Push a command into the layer it names.
    pub fn push_command(&mut self, layer: PageLayer, cmd: DrawCommand) {
        match layer {
            PageLayer::Content => self.push_content_command(cmd),
            PageLayer::Chrome => self.push_chrome_command(cmd),
        }
    }

    /// Iterate content then chrome commands without allocating.
    pub fn merged_commands_iter(
        &self,
    ) -> core::iter::Chain<core::slice::Iter<'_, DrawCommand>, core::slice::Iter<'_, DrawCommand>>
    {
        self.content_commands
            .iter()
            .chain(self.chrome_commands.iter())
    }

    /// Text of every content-layer text command in emission order.
    pub fn content_lines(&self) -> Vec<&str> {
        self.content_commands
            .iter()
            .filter_map(DrawCommand::text)
            .collect()
    }

    /// Text of every chrome-layer text command in emission order.
    pub fn chrome_lines(&self) -> Vec<&str> {
        self.chrome_commands
            .iter()
            .filter_map(DrawCommand::text)
            .collect()
    }
}

/// Fixed page geometry in millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl PageGeometry {
    /// A4 portrait, 210 x 297 mm.
    pub const fn a4_portrait() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin_top: 25.0,
            margin_bottom: 25.0,
            margin_left: 20.0,
            margin_right: 20.0,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }

    /// Lowest y a non-footer line may reach.
    pub fn content_bottom(&self) -> f32 {
        self.height - self.margin_bottom
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4_portrait()
    }
}

/// Vertical write position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutCursor {
    /// 0-based page index.
    pub page_index: usize,
    /// Next baseline y in millimetres.
    pub y: f32,
}

impl LayoutCursor {
    /// Cursor at the top margin of the first page.
    pub fn start(geometry: &PageGeometry) -> Self {
        Self {
            page_index: 0,
            y: geometry.margin_top,
        }
    }

    /// 1-based page number.
    pub fn page_number(&self) -> usize {
        self.page_index + 1
    }

    /// Whether `advance` more millimetres would cross the bottom margin.
    pub fn would_overflow(&self, advance: f32, geometry: &PageGeometry) -> bool {
        self.y + advance > geometry.content_bottom()
    }

    /// Move to the top of the next page.
    pub fn break_page(&mut self, geometry: &PageGeometry) {
        self.page_index += 1;
        self.y = geometry.margin_top;
    }
}
