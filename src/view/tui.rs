//! # Terminal Front End
//!
//! The presentation thread. It owns the [`PresentationModel`], applies refresh updates that arrive
//! through cursive's callback sink and runs [`Command`]s on key presses.

use std::{iter, ops::Range};

use anyhow::{anyhow, Context, Result};
use cursive::{
    event::{Event, Key},
    theme::{BaseColor, Color, ColorStyle, Effect, Style},
    traits::{Nameable, Resizable},
    utils::markup::StyledString,
    views::{LinearLayout, TextView},
    CbSink, Cursive,
};
use tracing::debug;

use crate::{
    device::pci::device::Device,
    monitor::{source::DeviceSource, Disconnected, Synchronizer, Update, UpdateSink},
};

use super::{
    command::Command,
    fields::CellStyle,
    model::{Orientation, PresentationModel},
};

/// Lines below the table: refresh error, status and key help.
const FOOTER_LINES: usize = 4;

const TABLE: &str = "table";
const REFRESH_ERROR: &str = "refresh-error";
const STATUS: &str = "status";
const CYCLE_TIME: &str = "cycle-time";

const HELP: &str = "R: sec. bus reset  L: link disable  r: retrain  C/c: compliance on/off  q: quit";

#[derive(Debug)]
struct App {
    model: PresentationModel,
    live: bool,
}

fn cell_style(style: CellStyle) -> Style {
    let front = |color| Style::from(ColorStyle::front(Color::Dark(color)));

    match style {
        CellStyle::Normal => Style::none(),
        CellStyle::Bridge => front(BaseColor::Blue),
        CellStyle::Alert => front(BaseColor::Red),
        CellStyle::Good => front(BaseColor::Green),
    }
}

/// Pick the lines to show after the always visible first one, such that `selected` is visible
/// and as many lines as fit into `budget` are shown.
fn scroll_window(sizes: &[usize], selected: usize, budget: usize) -> Range<usize> {
    if sizes.len() <= 1 {
        return 1..1;
    }

    let budget = budget.saturating_sub(sizes[0]);
    let selected = selected.clamp(1, sizes.len() - 1);

    let mut start = 1;
    while start < selected && sizes[start..=selected].iter().sum::<usize>() > budget {
        start += 1;
    }

    let mut end = selected + 1;
    let mut used: usize = sizes[start..end].iter().sum();
    while end < sizes.len() && used + sizes[end] <= budget {
        used += sizes[end];
        end += 1;
    }

    start..end
}

/// Render the visible part of the table into `width` by `height` cells.
fn render(model: &PresentationModel, width: usize, height: usize) -> StyledString {
    let (rows, cols) = (model.rows(), model.columns());
    let (sel_row, sel_col) = model.selection();

    let widths: Vec<usize> = (0..cols)
        .map(|col| {
            (0..rows)
                .filter_map(|row| model.cell(row, col))
                .map(|(text, _)| text.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let col_sizes: Vec<usize> = widths.iter().map(|w| w + 1).collect();
    let visible_cols: Vec<usize> = iter::once(0)
        .chain(scroll_window(&col_sizes, sel_col, width))
        .collect();
    let visible_rows = iter::once(0).chain(scroll_window(&vec![1; rows], sel_row, height));

    let mut out = StyledString::new();
    for row in visible_rows {
        for &col in &visible_cols {
            let (text, style) = model.cell(row, col).unwrap_or(("", CellStyle::Normal));
            let mut style = cell_style(style);

            if (row, col) == (sel_row, sel_col) && model.cell_ref(row, col).is_some() {
                style = Style::merge(&[style, Effect::Reverse.into()]);
            }

            out.append_styled(format!("{text:<width$}", width = widths[col]), style);
            out.append_plain(" ");
        }
        out.append_plain("\n");
    }

    out
}

fn refresh_error_line(message: &str) -> StyledString {
    StyledString::styled(message, cell_style(CellStyle::Alert))
}

/// Redraw all views from the model.
fn draw(s: &mut Cursive) {
    let size = s.screen_size();
    let Some((table, refresh_error, status, cycle_time)) = s.with_user_data(|app: &mut App| {
        (
            render(&app.model, size.x, size.y.saturating_sub(FOOTER_LINES)),
            app.model.refresh_error().map(refresh_error_line).unwrap_or_default(),
            app.model.status().to_owned(),
            app.model.cycle_time_text(),
        )
    }) else {
        return;
    };

    s.call_on_name(TABLE, |v: &mut TextView| v.set_content(table));
    s.call_on_name(REFRESH_ERROR, |v: &mut TextView| v.set_content(refresh_error));
    s.call_on_name(STATUS, |v: &mut TextView| v.set_content(status));
    s.call_on_name(CYCLE_TIME, |v: &mut TextView| v.set_content(cycle_time));
}

fn move_selection(s: &mut Cursive, rows: isize, cols: isize) {
    s.with_user_data(|app: &mut App| {
        app.model.move_selection(rows, cols);
        let description = app.model.describe_selection().unwrap_or_default();
        app.model.set_status(description);
    });
    draw(s);
}

fn run_command(s: &mut Cursive, command: Command) {
    s.with_user_data(|app: &mut App| {
        let status = match app.model.selected() {
            Some(selected) => command.run_live(selected.context, app.live),
            None => "No device selected".to_owned(),
        };
        app.model.set_status(status);
    });
    draw(s);
}

fn build_layout(siv: &mut Cursive) {
    let footer = LinearLayout::horizontal()
        .child(
            LinearLayout::vertical()
                .child(TextView::new("").with_name(STATUS).fixed_height(2))
                .child(TextView::new(HELP))
                .full_width(),
        )
        .child(TextView::new("").with_name(CYCLE_TIME).fixed_width(8));

    siv.add_fullscreen_layer(
        LinearLayout::vertical()
            .child(TextView::new("").no_wrap().with_name(TABLE).full_screen())
            .child(TextView::new("").no_wrap().with_name(REFRESH_ERROR))
            .child(footer),
    );
}

fn bind_keys(siv: &mut Cursive) {
    for command in Command::ALL {
        siv.add_global_callback(command.key(), move |s| run_command(s, command));
    }

    siv.add_global_callback('q', Cursive::quit);
    siv.add_global_callback('Q', Cursive::quit);
    siv.add_global_callback(Key::Esc, Cursive::quit);
    siv.add_global_callback(Event::CtrlChar('c'), Cursive::quit);

    siv.add_global_callback(Key::Up, |s| move_selection(s, -1, 0));
    siv.add_global_callback(Key::Down, |s| move_selection(s, 1, 0));
    siv.add_global_callback(Key::Left, |s| move_selection(s, 0, -1));
    siv.add_global_callback(Key::Right, |s| move_selection(s, 0, 1));
}

/// Refresh updates are applied on the UI thread, in the order they were published.
impl UpdateSink for CbSink {
    fn publish(&self, update: Update) -> Result<(), Disconnected> {
        let redraw = !matches!(update, Update::Device(_));

        self.send(Box::new(move |s: &mut Cursive| {
            s.with_user_data(|app: &mut App| app.model.apply(update));
            // Whole cycles are drawn at once.
            if redraw {
                draw(s);
            }
        }))
        .map_err(|_| Disconnected)
    }
}

/// Show `devices` in the terminal until the user quits.
///
/// Devices are refreshed from `source` on a background thread.
pub fn run<S: DeviceSource + 'static>(
    devices: Vec<Device>,
    source: S,
    orientation: Orientation,
) -> Result<()> {
    let live = source.is_live();

    let mut siv = cursive::default();
    siv.set_user_data(App {
        model: PresentationModel::new(orientation),
        live,
    });
    build_layout(&mut siv);
    bind_keys(&mut siv);

    let refresh = Synchronizer::new(devices, source, siv.cb_sink().clone())
        .spawn()
        .context("Failed to start refresh thread")?;

    let result = siv
        .try_run()
        .map_err(|err| anyhow!("Failed to run terminal: {err}"));

    // The refresh thread stops once the callback queue is gone.
    debug!("Quitting, waiting for refresh thread");
    drop(siv);
    refresh
        .join()
        .map_err(|_| anyhow!("Refresh thread panicked"))?;

    result
}
