use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Mode, View};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.analysis.is_some() {
        if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
            app.close_overlay();
        }
        return;
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        // View switching
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),
        KeyCode::Char('1') => app.set_view_index(0),
        KeyCode::Char('2') => app.set_view_index(1),
        KeyCode::Char('3') => app.set_view_index(2),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),

        // Selection
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),

        KeyCode::Esc => {
            app.close_overlay();
        }

        // Help
        KeyCode::Char('?') => app.toggle_help(),

        // Export
        KeyCode::Char('E') => {
            let export_path = PathBuf::from(match app.mode {
                Mode::Sensors => "sensor_export.json",
                Mode::Gps => "gps_export.json",
            });
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => match app.mode {
            Mode::Sensors => handle_sensor_key(app, key),
            Mode::Gps => handle_gps_key(app, key),
        },
    }
}

fn handle_sensor_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('t') => {
            let range = app.cycle_time_range();
            app.set_status_message(format!("Time range: {}", range.label()));
        }
        KeyCode::Char('n') if app.current_view == View::Trends => app.next_sensor(),
        KeyCode::Char('a') => app.archive_now(),
        KeyCode::Char('m') => app.toggle_mock_data(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_read_interval(1),
        KeyCode::Char('-') => app.adjust_read_interval(-1),
        _ => {}
    }
}

fn handle_gps_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('s') => app.start_trip(),
        KeyCode::Char('e') => app.end_trip(),
        KeyCode::Char('g') => app.add_geofence_here(),
        KeyCode::Char('u') => app.toggle_units(),
        KeyCode::Char('p') | KeyCode::Char(' ') => app.toggle_playback(),
        KeyCode::Char('x') => app.stop_playback(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_playback_speed(2.0),
        KeyCode::Char('-') => app.adjust_playback_speed(0.5),
        KeyCode::Enter if app.current_view == View::Trips => app.analyze_selected_trip(),
        _ => {}
    }
}
