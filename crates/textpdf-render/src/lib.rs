//! Render IR, paginator, and conversion pipeline for `textpdf`.

#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod progress;
mod render_engine;
mod render_ir;
mod render_layout;
mod renderer;

pub use progress::{
    ProgressEvent, ProgressReporter, ProgressStage, LAYOUT_PROGRESS_SPAN, LAYOUT_PROGRESS_START,
};
pub use render_engine::{ConversionOutput, RenderEngine, RenderEngineError, RenderEngineOptions};
pub use render_ir::{
    DrawCommand, FontSpec, FontStyle, LayoutCursor, PageGeometry, PageLayer, RenderPage, Rgb,
    RuleCommand, TextAlign, TextCommand, MM_PER_PT,
};
pub use render_layout::{
    BlockStyle, LayoutConfig, LayoutDocument, LayoutEngine, LayoutError, LayoutPhase,
    LayoutSummary,
};
pub use renderer::{
    wrap_text, HeuristicMeasurer, PageRenderer, RecordingRenderer, RenderError, TextMeasurer,
};
