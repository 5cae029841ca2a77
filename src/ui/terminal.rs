//! 离屏 Buffer → 终端文本
//!
//! 逐行读取单元格；宽字符（emoji、汉字）之后的占位格跳过。ansi 为 true 时按前景色与粗体分段着色。

use std::fmt::Write as _;

use crossterm::style::{style, Color as TermColor, Stylize};
use ratatui::buffer::Buffer;
use ratatui::style::{Color, Modifier};
use unicode_width::UnicodeWidthStr;

/// 终端宽度（无法获取时 100），限制在 60..=160
pub fn terminal_width() -> u16 {
    crossterm::terminal::size()
        .map(|(w, _)| w)
        .unwrap_or(100)
        .clamp(60, 160)
}

fn term_color(color: Color) -> Option<TermColor> {
    let c = match color {
        Color::Reset => return None,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        Color::LightRed => TermColor::Red,
        Color::LightGreen => TermColor::Green,
        Color::LightYellow => TermColor::Yellow,
        Color::LightBlue => TermColor::Blue,
        Color::LightMagenta => TermColor::Magenta,
        Color::LightCyan => TermColor::Cyan,
        Color::White => TermColor::White,
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
        Color::Indexed(i) => TermColor::AnsiValue(i),
    };
    Some(c)
}

/// 同样式的一段文本
struct Run {
    fg: Color,
    bold: bool,
    text: String,
}

fn row_runs(buf: &Buffer, y: u16) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut skip = 0usize;
    for x in 0..buf.area.width {
        let idx = buf.index_of(buf.area.x + x, buf.area.y + y);
        let Some(cell) = buf.content.get(idx) else {
            continue;
        };
        if skip > 0 {
            skip -= 1;
            continue;
        }
        let symbol = cell.symbol();
        skip = symbol.width().saturating_sub(1);

        let bold = cell.modifier.contains(Modifier::BOLD);
        match runs.last_mut() {
            Some(run) if run.fg == cell.fg && run.bold == bold => run.text.push_str(symbol),
            _ => runs.push(Run {
                fg: cell.fg,
                bold,
                text: symbol.to_string(),
            }),
        }
    }

    // 去掉行尾空白
    while let Some(last) = runs.last_mut() {
        let trimmed = last.text.trim_end().len();
        if trimmed == 0 {
            runs.pop();
        } else {
            last.text.truncate(trimmed);
            break;
        }
    }
    runs
}

/// 把 Buffer 转成多行文本（每行以换行结尾）
pub fn buffer_to_string(buf: &Buffer, ansi: bool) -> String {
    let mut out = String::new();
    for y in 0..buf.area.height {
        for run in row_runs(buf, y) {
            if !ansi {
                out.push_str(&run.text);
                continue;
            }
            let mut styled = style(run.text.as_str());
            if let Some(c) = term_color(run.fg) {
                styled = styled.with(c);
            }
            if run.bold {
                styled = styled.bold();
            }
            let _ = write!(out, "{styled}");
        }
        out.push('\n');
    }
    out
}

/// 多个视图依次拼接，中间空一行
pub fn render_views(views: &[Buffer], ansi: bool) -> String {
    views
        .iter()
        .map(|b| buffer_to_string(b, ansi))
        .collect::<Vec<_>>()
        .join("\n")
}
