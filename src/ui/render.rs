//! 结果渲染
//!
//! 检索结果、示例、推荐检验、解释文本、示例批次分别画成 ratatui 表格，
//! 绘制到离屏 Buffer（高度按换行后的行数预先算好），再由 terminal 模块转成终端文本。

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Paragraph, Row, Table, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::retrieval::RetrievalMatch;
use crate::types::{Assumption, FindTestResponse, TestExample};
use crate::workflow::{ExampleBatch, WorkflowOutcome};

/// 最窄渲染宽度；更窄时按此宽度绘制
pub const MIN_WIDTH: u16 = 40;

const PASS_MARK: &str = "✅";
const FAIL_MARK: &str = "❌";
const ELLIPSIS: &str = "…";

/// 按显示宽度换行（中日文、emoji 占两列）
pub fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        let mut line_width = 0;
        for ch in para.chars() {
            let w = ch.width().unwrap_or(0);
            if line_width + w > width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            line.push(ch);
            line_width += w;
        }
        lines.push(line);
    }
    lines
}

fn styled_lines(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_text(text, width)
        .into_iter()
        .map(|l| Line::from(Span::styled(l, style)))
        .collect()
}

/// 前提条件：每条一行（或多行），通过 ✅ 绿色，不通过 ❌ 红色；为空时显示 None
pub fn assumption_lines(assumptions: &[Assumption], width: usize) -> Vec<Line<'static>> {
    if assumptions.is_empty() {
        return vec![Line::from(Span::styled("None", Style::default().fg(Color::DarkGray)))];
    }
    let mut lines = Vec::new();
    for a in assumptions {
        let (mark, color) = if a.pass_status {
            (PASS_MARK, Color::Green)
        } else {
            (FAIL_MARK, Color::Red)
        };
        let indent = mark.width() + 1;
        for (i, part) in wrap_text(&a.description, width.saturating_sub(indent).max(1))
            .into_iter()
            .enumerate()
        {
            let prefix = if i == 0 {
                format!("{mark} ")
            } else {
                " ".repeat(indent)
            };
            lines.push(Line::from(vec![
                Span::styled(prefix, Style::default().fg(color)),
                Span::styled(part, Style::default().fg(color)),
            ]));
        }
    }
    lines
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

fn header_style() -> Style {
    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
}

/// Rect::new 会把面积压到 u16::MAX 以内，这里算出给定宽度下不被压缩的最大高度
fn max_height(width: u16) -> usize {
    usize::from(u16::MAX) / usize::from(width.max(1))
}

/// 截到 max 行，末行换成省略标记
fn clip_lines(mut lines: Vec<Line<'static>>, max: usize) -> Vec<Line<'static>> {
    let max = max.max(1);
    if lines.len() > max {
        lines.truncate(max - 1);
        lines.push(Line::from(Span::styled(ELLIPSIS, Style::default().fg(Color::DarkGray))));
    }
    lines
}

/// 每行单元格的行数上限：总行数放得下时不限；否则取使总和不超过 avail 的最大上限
fn row_cap(heights: &[usize], avail: usize) -> usize {
    if heights.iter().sum::<usize>() <= avail {
        return usize::MAX;
    }
    let fits = |cap: usize| heights.iter().map(|h| (*h).min(cap)).sum::<usize>() <= avail;
    let mut cap = (avail / heights.len().max(1)).max(1);
    while fits(cap + 1) {
        cap += 1;
    }
    cap
}

fn draw<W: Widget>(widget: W, width: u16, height: u16) -> Buffer {
    let mut buf = Buffer::empty(Rect::new(0, 0, width, height));
    widget.render(buf.area, &mut buf);
    buf
}

/// 两列（Field / Value）表格，Value 列已按宽度换行
fn field_table(title: String, rows: Vec<(&'static str, Vec<Line<'static>>)>, width: u16) -> Buffer {
    let label_width = rows.iter().map(|(k, _)| k.width()).max().unwrap_or(5).max("Field".len());
    let heights: Vec<usize> = rows.iter().map(|(_, v)| v.len().max(1)).collect();
    let cap = row_cap(&heights, max_height(width).saturating_sub(3));
    let rows: Vec<_> = rows.into_iter().map(|(k, v)| (k, clip_lines(v, cap))).collect();
    let body_height: usize = rows.iter().map(|(_, v)| v.len().max(1)).sum();
    let table_rows: Vec<Row> = rows
        .into_iter()
        .map(|(label, value)| {
            let h = to_u16(value.len().max(1));
            Row::new(vec![
                Cell::from(label).style(Style::default().fg(Color::Cyan)),
                Cell::from(Text::from(value)),
            ])
            .height(h)
        })
        .collect();

    let value_width = width.saturating_sub(to_u16(label_width) + 3);
    let table = Table::new(
        table_rows,
        [Constraint::Length(to_u16(label_width)), Constraint::Length(value_width)],
    )
    .header(Row::new(vec!["Field", "Value"]).style(header_style()))
    .column_spacing(1)
    .block(Block::bordered().title(title));

    // 边框 2 行 + 表头 1 行
    draw(table, width, to_u16(body_height + 3))
}

/// Value 列可用宽度：总宽 - 边框 2 - 列间距 1 - 标签列
fn value_width(width: u16, label: &str) -> usize {
    (width as usize).saturating_sub(label.width() + 3).max(10)
}

/// 检索结果表：文章标题 / 文本块 / 相似度
pub fn matches_view(matches: &[RetrievalMatch], width: u16) -> Buffer {
    let width = width.max(MIN_WIDTH);
    let title_w = ((width as usize) / 4).clamp(12, 32);
    let score_w = 6;
    // 边框 2 + 两个列间距
    let content_w = (width as usize).saturating_sub(title_w + score_w + 4).max(10);

    // 行数超过一屏 Buffer 能容纳的高度时只画前面的结果，标题注明
    let avail = max_height(width).saturating_sub(3);
    let shown = &matches[..matches.len().min(avail)];
    let cells: Vec<_> = shown
        .iter()
        .map(|m| {
            (
                styled_lines(&m.article_title, title_w, Style::default().fg(Color::Green)),
                styled_lines(&m.chunk_content, content_w, Style::default().fg(Color::Cyan)),
            )
        })
        .collect();
    let heights: Vec<usize> = cells.iter().map(|(t, c)| t.len().max(c.len()).max(1)).collect();
    let cap = row_cap(&heights, avail);

    let mut body_height = 0;
    let rows: Vec<Row> = shown
        .iter()
        .zip(cells)
        .map(|(m, (title, content))| {
            let title = clip_lines(title, cap);
            let content = clip_lines(content, cap);
            let h = title.len().max(content.len()).max(1);
            body_height += h;
            Row::new(vec![
                Cell::from(Text::from(title)),
                Cell::from(Text::from(content)),
                Cell::from(format!("{:.3}", m.score)).style(Style::default().fg(Color::Magenta)),
            ])
            .height(to_u16(h))
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(to_u16(title_w)),
            Constraint::Length(to_u16(content_w)),
            Constraint::Length(score_w as u16),
        ],
    )
    .header(Row::new(vec!["Article Title", "Chunk Content", "Score"]).style(header_style()))
    .column_spacing(1)
    .block(Block::bordered().title(if shown.len() < matches.len() {
        format!(" Query Results ({} of {}) ", shown.len(), matches.len())
    } else {
        format!(" Query Results ({}) ", matches.len())
    }));

    draw(table, width, to_u16(body_height + 3))
}

/// 示例表：情境、检验名、描述、检查前提、执行步骤、注意事项、前提条件
pub fn example_view(example: &TestExample, width: u16) -> Buffer {
    let width = width.max(MIN_WIDTH);
    let vw = value_width(width, "Check Assumptions");
    let value = Style::default().fg(Color::Magenta);
    let rows = vec![
        ("Situation", styled_lines(&example.situation, vw, value)),
        ("Test Name", styled_lines(&example.test_name, vw, value)),
        ("Description", styled_lines(&example.description, vw, value)),
        ("Check Assumptions", styled_lines(&example.check_assumptions, vw, value)),
        ("Apply Test", styled_lines(&example.apply_test, vw, value)),
        ("Notes", styled_lines(&example.notes, vw, value)),
        ("Assumptions", assumption_lines(&example.assumptions(), vw)),
    ];
    field_table(format!(" Test Example: {} ", example.test_name), rows, width)
}

/// 推荐检验：先一张情境表，再每个推荐检验一张表
pub fn tests_view(response: &FindTestResponse, width: u16) -> Vec<Buffer> {
    let width = width.max(MIN_WIDTH);
    let vw = value_width(width, "Assumptions");
    let value = Style::default().fg(Color::Magenta);

    let mut out = vec![field_table(
        " Situation ".to_string(),
        vec![("Situation", styled_lines(&response.situation, vw, Style::default().fg(Color::Cyan)))],
        width,
    )];
    for rec in &response.recommended_tests {
        out.push(field_table(
            format!(" Test Recommendation: {} ", rec.test_name),
            vec![
                ("Test Name", styled_lines(&rec.test_name, vw, value)),
                ("Assumptions", assumption_lines(&rec.assumptions(), vw)),
            ],
            width,
        ));
    }
    out
}

/// 解释文本：带标题边框的段落；超出单个 Buffer 高度时分页
pub fn explanation_view(text: &str, width: u16) -> Vec<Buffer> {
    let width = width.max(MIN_WIDTH);
    let lines = styled_lines(text.trim(), (width as usize).saturating_sub(2), Style::default());
    let page = max_height(width).saturating_sub(2).max(1);
    let title_style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    lines
        .chunks(page)
        .enumerate()
        .map(|(i, chunk)| {
            let title = if i == 0 { " Explanation " } else { " Explanation (cont.) " };
            let paragraph = Paragraph::new(Text::from(chunk.to_vec()))
                .block(Block::bordered().title(Span::styled(title, title_style)));
            draw(paragraph, width, to_u16(chunk.len() + 2))
        })
        .collect()
}

/// 示例批次：每个保留的示例一张表，有失败时追加失败表
pub fn batch_view(batch: &ExampleBatch, width: u16) -> Vec<Buffer> {
    let width = width.max(MIN_WIDTH);
    let mut out: Vec<Buffer> = batch.examples.iter().map(|e| example_view(e, width)).collect();
    if batch.failures.is_empty() {
        return out;
    }

    let kind_w = 14;
    let msg_w = (width as usize).saturating_sub(5 + kind_w + 4).max(10);
    let messages: Vec<_> = batch
        .failures
        .iter()
        .map(|f| styled_lines(&f.message, msg_w, Style::default().fg(Color::Red)))
        .collect();
    let heights: Vec<usize> = messages.iter().map(|m| m.len().max(1)).collect();
    let cap = row_cap(&heights, max_height(width).saturating_sub(3));
    let mut body_height = 0;
    let rows: Vec<Row> = batch
        .failures
        .iter()
        .zip(messages)
        .map(|(f, msg)| {
            let msg = clip_lines(msg, cap);
            body_height += msg.len().max(1);
            let h = to_u16(msg.len().max(1));
            Row::new(vec![
                Cell::from(f.label.to_string()),
                Cell::from(format!("{:?}", f.kind)).style(Style::default().fg(Color::Yellow)),
                Cell::from(Text::from(msg)),
            ])
            .height(h)
        })
        .collect();
    let title = format!(
        " Batch {}: {} kept, {} failed of {} ",
        batch.batch_id.simple(),
        batch.examples.len(),
        batch.failures.len(),
        batch.dispatched
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(kind_w as u16),
            Constraint::Length(to_u16(msg_w)),
        ],
    )
    .header(Row::new(vec!["Task", "Kind", "Error"]).style(header_style()))
    .column_spacing(1)
    .block(Block::bordered().title(title));
    out.push(draw(table, width, to_u16(body_height + 3)));
    out
}

/// 按结果类型选择视图
pub fn outcome_view(outcome: &WorkflowOutcome, width: u16) -> Vec<Buffer> {
    match outcome {
        WorkflowOutcome::Matches(m) => vec![matches_view(m, width)],
        WorkflowOutcome::Tests(t) => tests_view(t, width),
        WorkflowOutcome::Example(e) => vec![example_view(e, width)],
        WorkflowOutcome::Explanation(text) => explanation_view(text, width),
        WorkflowOutcome::Examples(batch) => batch_view(batch, width),
    }
}
