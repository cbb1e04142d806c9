//! Status message log.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;

/// Newest first.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows: Vec<Row> = app
        .events
        .iter()
        .rev()
        .map(|event| {
            Row::new(vec![
                Cell::from(event.at.format("%H:%M:%S").to_string())
                    .style(Style::default().add_modifier(Modifier::DIM)),
                Cell::from(event.level.label()).style(app.theme.level_style(event.level)),
                Cell::from(event.text.clone()),
            ])
        })
        .collect();

    let widths = [Constraint::Length(9), Constraint::Length(6), Constraint::Fill(1)];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Time", "Level", "Message"]).style(app.theme.header))
        .block(
            Block::default()
                .title(format!(" Events ({}) ", app.events.len()))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.frame)),
        )
        .row_highlight_style(app.theme.selected);

    let mut state = TableState::default();
    if !app.events.is_empty() {
        state.select(Some(app.event_scroll.min(app.events.len() - 1)));
    }
    frame.render_stateful_widget(table, area, &mut state);
}
