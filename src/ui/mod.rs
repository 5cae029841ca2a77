//! 展示层：ratatui 表格绘制到离屏 Buffer（render），再转成终端文本（terminal）

pub mod render;
pub mod terminal;

pub use render::{batch_view, example_view, explanation_view, matches_view, outcome_view, tests_view};
pub use terminal::{buffer_to_string, render_views, terminal_width};
