use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use coleta_core::model::PointId;

use crate::app::{App, Focus, Screen, move_down, move_up};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.load_options`() again after a failed start
    ReloadOptions,
    /// Run `service.point_detail`(...) for the point under the cursor
    LoadPointDetail(PointId),
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Char, Down, Enter, Esc, Left, Tab, Up};

    // Global quit shortcuts
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if key.code == Char('q') && key.modifiers.is_empty() {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::RegionSelect => match key.code {
            Up | Char('k') => move_up(&mut app.region_list_index),
            Down | Char('j') => move_down(&mut app.region_list_index, app.options.regions.len()),
            Enter | Char(' ') => app.select_current_region(),
            Char('r') if app.options.regions.is_empty() => action = Action::ReloadOptions,
            _ => {}
        },

        Screen::MunicipalitySelect => match key.code {
            Up | Char('k') => move_up(&mut app.municipality_list_index),
            Down | Char('j') => move_down(
                &mut app.municipality_list_index,
                app.snapshot.municipalities.len(),
            ),
            Enter | Char(' ') => app.select_current_municipality(),
            Left | Esc => app.back(),
            _ => {}
        },

        Screen::Points => match key.code {
            Tab | BackTab => {
                app.focus = match app.focus {
                    Focus::Categories => Focus::Points,
                    Focus::Points => Focus::Categories,
                };
            }
            Up | Char('k') => match app.focus {
                Focus::Categories => move_up(&mut app.category_list_index),
                Focus::Points => move_up(&mut app.point_list_index),
            },
            Down | Char('j') => match app.focus {
                Focus::Categories => move_down(
                    &mut app.category_list_index,
                    app.options.categories.len(),
                ),
                Focus::Points => {
                    move_down(&mut app.point_list_index, app.snapshot.points.len());
                }
            },
            Char(' ') => app.toggle_current_category(),
            Enter => match app.focus {
                Focus::Categories => app.toggle_current_category(),
                Focus::Points => {
                    if let Some(point) = app.current_point() {
                        action = Action::LoadPointDetail(point.id);
                    }
                }
            },
            Char('c') => app.service.coordinator().clear_selection(),
            Char('r') => app.service.coordinator().retry(),
            Left | Esc => app.back(),
            _ => {}
        },

        Screen::PointDetail => match key.code {
            Left | Esc | Char('b') => app.back(),
            _ => {}
        },
    }
    action
}
