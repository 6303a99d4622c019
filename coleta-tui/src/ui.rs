use coleta_core::{
    coordinator::QueryStatus,
    model::{Coordinate, Viewport},
    ports::ErrorKind,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
};

use crate::app::{App, Focus, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    // Title / header
    let header = Paragraph::new(format!(
        "coleta – waste collection points · {}",
        app.service.backend().name
    ))
    .block(Block::default().borders(Borders::ALL).title("Coleta"));
    frame.render_widget(header, *header_area);

    // Main screen
    match app.screen {
        Screen::RegionSelect => draw_region_select(frame, app, *content_area),
        Screen::MunicipalitySelect => draw_municipality_select(frame, app, *content_area),
        Screen::Points => draw_points(frame, app, *content_area),
        Screen::PointDetail => draw_point_detail(frame, app, *content_area),
    }

    // Status bar
    let nav_hint = match app.screen {
        Screen::RegionSelect if app.options.regions.is_empty() => "r retry · q/Ctrl-C quit",
        Screen::RegionSelect => "↑/↓ move · Enter/Space select region · q/Ctrl-C quit",
        Screen::MunicipalitySelect => {
            "↑/↓ move · Enter/Space select municipality · Left/Esc back · q/Ctrl-C quit"
        }
        Screen::Points => {
            "Tab switch pane · Space toggle material · Enter open point · c clear · r retry · Esc back · q quit"
        }
        Screen::PointDetail => "Esc/←/b back to points · q/Ctrl-C quit",
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn highlight() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn draw_region_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = app
        .options
        .regions
        .iter()
        .enumerate()
        .map(|(idx, region)| {
            let prefix = if idx == app.region_list_index {
                "> "
            } else {
                "  "
            };
            ListItem::new(format!("{prefix}{}", region.code))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Select region (↑/↓, Enter)"),
        )
        .highlight_style(highlight());

    let mut state = ListState::default();
    if !app.options.regions.is_empty() {
        state.select(Some(app.region_list_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_municipality_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let region = app
        .snapshot
        .region
        .as_ref()
        .map_or_else(|| "<region>".to_owned(), ToString::to_string);
    let title = format!("Municipalities in {region} (↑/↓, Enter)");

    let municipalities = &app.snapshot.municipalities;
    if municipalities.is_empty() {
        let text = match app.snapshot.municipality_error {
            Some(kind) => format!("Could not load municipalities: {}", error_text(kind)),
            None => "Loading municipalities…".to_owned(),
        };
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let items = municipalities
        .iter()
        .map(|municipality| ListItem::new(municipality.name.clone()))
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(highlight())
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.municipality_list_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_points(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(32), // material toggles
            Constraint::Min(0),     // viewport + points
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [categories_area, right_area] = chunks else {
        return;
    };

    draw_category_toggles(frame, app, *categories_area);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(*right_area);

    let chunks = right_chunks.as_ref();
    let [viewport_area, table_area] = chunks else {
        return;
    };

    let viewport = Paragraph::new(viewport_label(&app.viewport))
        .block(Block::default().borders(Borders::ALL).title("Map"));
    frame.render_widget(viewport, *viewport_area);

    draw_point_table(frame, app, *table_area);
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let block = Block::default().borders(Borders::ALL).title(title);
    if focused {
        block.border_style(Style::default().fg(Color::Cyan))
    } else {
        block
    }
}

fn draw_category_toggles(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = app
        .options
        .categories
        .iter()
        .map(|category| {
            let selected = app.snapshot.is_selected(category.id);
            let marker = if selected { "[x]" } else { "[ ]" };
            let style = if selected {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(format!("{marker} {}", category.label)).style(style)
        })
        .collect::<Vec<ListItem<'_>>>();

    let title = if app.snapshot.selection.is_empty() {
        "Materials (all)".to_owned()
    } else {
        format!("Materials ({} selected)", app.snapshot.selection.len())
    };

    let list = List::new(items)
        .block(pane_block(title, app.focus == Focus::Categories))
        .highlight_style(highlight());

    let mut state = ListState::default();
    if !app.options.categories.is_empty() && app.focus == Focus::Categories {
        state.select(Some(app.category_list_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_point_table(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let municipality = app.snapshot.municipality.as_deref().unwrap_or("<municipality>");
    let title = format!("Collection points in {municipality}");
    let focused = app.focus == Focus::Points;
    let snapshot = &app.snapshot;

    let message = match snapshot.status {
        QueryStatus::Idle => Some("Pick a municipality to look for collection points.".to_owned()),
        QueryStatus::Loading => Some("Loading collection points…".to_owned()),
        QueryStatus::Failed => Some(format!(
            "{} Press r to retry.",
            snapshot.error.map_or("Request failed.", error_text)
        )),
        QueryStatus::Ready if snapshot.is_empty() => {
            Some("No collection point accepts the selected materials here.".to_owned())
        }
        QueryStatus::Ready => None,
    };

    if let Some(message) = message {
        let style = if snapshot.status == QueryStatus::Failed {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };
        let paragraph = Paragraph::new(message)
            .block(pane_block(title, focused))
            .style(style)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let rows = snapshot.points.iter().map(|point| {
        Row::new(vec![
            Cell::from(point.id.to_string()),
            Cell::from(point.name.clone()),
            Cell::from(format!("{:.5}", point.coordinate.latitude)),
            Cell::from(format!("{:.5}", point.coordinate.longitude)),
        ])
    });

    let column_widths = [
        Constraint::Length(6),
        Constraint::Min(20),
        Constraint::Length(11),
        Constraint::Length(11),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Id", "Name", "Latitude", "Longitude"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(pane_block(
            format!("{title} ({})", snapshot.points.len()),
            focused,
        ))
        .row_highlight_style(highlight())
        .column_spacing(1);

    let mut state = TableState::default();
    if focused {
        state.select(Some(app.point_list_index));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_point_detail(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(detail) = &app.detail else {
        let paragraph = Paragraph::new("No point loaded.")
            .block(Block::default().borders(Borders::ALL).title("Point"));
        frame.render_widget(paragraph, area);
        return;
    };

    let point = &detail.point;
    let mut lines = vec![
        Line::from(Span::styled(
            point.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Position: {}", coordinate_label(point.coordinate))),
        Line::from(format!("Image: {}", point.image_ref)),
        Line::from(""),
        Line::from(format!("Accepts: {}", detail.items.join(", "))),
    ];

    let contacts = [
        ("Address", detail.address.as_deref()),
        ("E-mail", detail.email.as_deref()),
        ("WhatsApp", detail.whatsapp.as_deref()),
    ];
    for (label, value) in contacts {
        if let Some(value) = value {
            lines.push(Line::from(format!("{label}: {value}")));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Point {} (Esc/←/b to go back)", point.id)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn error_text(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network => "Network error, check the connection.",
        ErrorKind::Server => "The server could not answer.",
        ErrorKind::PermissionDenied => "Permission denied.",
    }
}

fn coordinate_label(coordinate: Coordinate) -> String {
    format!("{:.5}, {:.5}", coordinate.latitude, coordinate.longitude)
}

fn viewport_label(viewport: &Viewport) -> String {
    match viewport {
        Viewport::Centered {
            center,
            latitude_delta,
            longitude_delta,
        } => format!(
            "Centred on {} (span {latitude_delta}° × {longitude_delta}°)",
            coordinate_label(*center)
        ),
        Viewport::Unavailable => "Location unavailable, map has no centre".to_owned(),
    }
}
