//! # Presentation Model
//!
//! The [`PresentationModel`] is the table the front end draws. It is owned by the presentation
//! thread and only changes through [`PresentationModel::apply`] and the selection methods.
//!
//! Devices are kept in ascending address order. The model has a header line holding field titles
//! and one line per device. In vertical layout, lines are rows. In horizontal layout, they are
//! columns.

use std::{cmp::Ordering, sync::Arc, time::Duration};

use tracing::trace;

use crate::{
    device::pci::express::DecodeError,
    monitor::{context::RenderContext, Update},
};

use super::fields::{CellStyle, FieldKind};

/// Whether devices are laid out as rows or columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// One row per device, one column per field.
    #[default]
    Vertical,
    /// One column per device, one row per field.
    Horizontal,
}

/// A rendered table cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    /// The cell text.
    pub text: String,
    /// How the cell is highlighted.
    pub style: CellStyle,
}

impl Cell {
    fn render(field: FieldKind, ctx: &RenderContext) -> Self {
        Self {
            text: field.text(ctx),
            style: field.style(ctx),
        }
    }
}

/// What a table cell shows.
#[derive(Debug, Clone, Copy)]
pub struct CellRef<'a> {
    /// The decode results of the device the cell belongs to.
    pub context: &'a Arc<RenderContext>,
    /// The field shown in the cell.
    pub field: FieldKind,
}

#[derive(Debug)]
struct DeviceLine {
    context: Arc<RenderContext>,
    /// One cell per entry of [`FieldKind::ALL`].
    cells: Vec<Cell>,
}

/// The table of devices and fields.
#[derive(Debug, Default)]
pub struct PresentationModel {
    orientation: Orientation,
    devices: Vec<DeviceLine>,
    selection: (usize, usize),
    cycle_time: Option<Duration>,
    status: String,
    /// The last refresh failure. Cleared by a cycle that completes without one.
    refresh_error: Option<String>,
    failed_this_cycle: bool,
}

impl PresentationModel {
    /// Create an empty model. The selection starts on the first device's address.
    #[must_use]
    pub fn new(orientation: Orientation) -> Self {
        let selection = match orientation {
            Orientation::Vertical => (1, 0),
            Orientation::Horizontal => (0, 1),
        };

        Self {
            orientation,
            selection,
            ..Default::default()
        }
    }

    /// The layout orientation.
    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Apply an update from the refresh thread.
    pub fn apply(&mut self, update: Update) {
        match update {
            Update::Device(context) => {
                self.upsert(*context);
            }
            Update::Error(message) => {
                self.refresh_error = Some(message);
                self.failed_this_cycle = true;
            }
            Update::CycleTime(elapsed) => {
                if !self.failed_this_cycle {
                    self.refresh_error = None;
                }
                self.failed_this_cycle = false;
                self.cycle_time = Some(elapsed);
            }
        }
    }

    /// Find the position of `addr`: either where it is, or where it has to be inserted.
    fn rank(&self, addr: &str) -> (usize, bool) {
        for (pos, line) in self.devices.iter().enumerate() {
            match line.context.addr().cmp(addr) {
                Ordering::Equal => return (pos, true),
                Ordering::Greater => return (pos, false),
                Ordering::Less => {}
            }
        }

        (self.devices.len(), false)
    }

    /// Insert a device or replace all of its cells. Returns the device's position.
    ///
    /// If the PCI Express capability of a known device could not be decoded because the dump was
    /// too short, its Express cells keep their previous text.
    pub fn upsert(&mut self, context: RenderContext) -> usize {
        let (pos, known) = self.rank(context.addr());
        let cells = FieldKind::ALL
            .iter()
            .map(|&field| Cell::render(field, &context));

        if known {
            let line = &mut self.devices[pos];
            let keep_express = matches!(
                context.express_error(),
                Some(DecodeError::Truncated { .. })
            );

            for ((field, old), new) in FieldKind::ALL.iter().zip(&mut line.cells).zip(cells) {
                if !(keep_express && field.is_express()) {
                    *old = new;
                }
            }
            line.context = Arc::new(context);
        } else {
            trace!("New device {} at position {pos}", context.addr());
            self.devices.insert(
                pos,
                DeviceLine {
                    cells: cells.collect(),
                    context: Arc::new(context),
                },
            );
        }

        pos
    }

    /// The number of devices in the table.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Device addresses in display order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|line| line.context.addr())
    }

    /// The number of table rows, including the header.
    #[must_use]
    pub fn rows(&self) -> usize {
        match self.orientation {
            Orientation::Vertical => self.devices.len() + 1,
            Orientation::Horizontal => FieldKind::ALL.len(),
        }
    }

    /// The number of table columns, including the header.
    #[must_use]
    pub fn columns(&self) -> usize {
        match self.orientation {
            Orientation::Vertical => FieldKind::ALL.len(),
            Orientation::Horizontal => self.devices.len() + 1,
        }
    }

    /// Map table coordinates to a line (0 is the header) and a field index.
    const fn locate(&self, row: usize, col: usize) -> (usize, usize) {
        match self.orientation {
            Orientation::Vertical => (row, col),
            Orientation::Horizontal => (col, row),
        }
    }

    /// The cell at `(row, col)`. Header cells hold field titles.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<(&str, CellStyle)> {
        let (line, field) = self.locate(row, col);
        let kind = FieldKind::ALL.get(field)?;

        if line == 0 {
            let title = match self.orientation {
                Orientation::Vertical => kind.title().trim_start(),
                Orientation::Horizontal => kind.title(),
            };
            return Some((title, CellStyle::Normal));
        }

        let cell = self.devices.get(line - 1)?.cells.get(field)?;
        Some((&cell.text, cell.style))
    }

    /// The device and field behind the cell at `(row, col)`. Header cells have none.
    #[must_use]
    pub fn cell_ref(&self, row: usize, col: usize) -> Option<CellRef<'_>> {
        let (line, field) = self.locate(row, col);
        let device = self.devices.get(line.checked_sub(1)?)?;

        Some(CellRef {
            context: &device.context,
            field: *FieldKind::ALL.get(field)?,
        })
    }

    /// The selected cell as `(row, col)`.
    #[must_use]
    pub const fn selection(&self) -> (usize, usize) {
        self.selection
    }

    /// The device and field behind the selected cell.
    #[must_use]
    pub fn selected(&self) -> Option<CellRef<'_>> {
        self.cell_ref(self.selection.0, self.selection.1)
    }

    /// Move the selection, staying within device cells.
    pub fn move_selection(&mut self, rows: isize, cols: isize) {
        let (min_row, min_col) = match self.orientation {
            Orientation::Vertical => (1, 0),
            Orientation::Horizontal => (0, 1),
        };
        let clamp = |pos: usize, delta: isize, min: usize, count: usize| {
            pos.saturating_add_signed(delta)
                .min(count.saturating_sub(1))
                .max(min)
        };

        self.selection = (
            clamp(self.selection.0, rows, min_row, self.rows()),
            clamp(self.selection.1, cols, min_col, self.columns()),
        );
    }

    /// Describe the selected cell for the status line.
    #[must_use]
    pub fn describe_selection(&self) -> Option<String> {
        let selected = self.selected()?;
        let dev = selected.context.device();

        let mut lines = Vec::new();
        if dev.vendor_name.is_some() || dev.device_name.is_some() {
            lines.push(format!(
                "{} - {}",
                dev.vendor_name.as_deref().unwrap_or("?"),
                dev.device_name.as_deref().unwrap_or("?")
            ));
        }
        lines.extend(selected.field.detail(selected.context));

        Some(lines.join("\n"))
    }

    /// The duration of the last refresh cycle in whole milliseconds, e.g. `12ms`.
    #[must_use]
    pub fn cycle_time_text(&self) -> String {
        self.cycle_time
            .map(|elapsed| format!("{}ms", (elapsed.as_micros() + 500) / 1000))
            .unwrap_or_default()
    }

    /// The status message.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Replace the status message.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// The error of the most recent refresh cycle, if it failed.
    #[must_use]
    pub fn refresh_error(&self) -> Option<&str> {
        self.refresh_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::pci::{
        constants::config_space::capability_id::PCI_EXPRESS, device::tests::ConfigBuilder,
        express::ExpressCapabilityRegisters,
    };

    fn plain(addr: &str) -> RenderContext {
        RenderContext::new(ConfigBuilder::new(0x8086, 0x1234).device(addr))
    }

    fn express(addr: &str, lnk_sta: u16, len: usize) -> RenderContext {
        let regs = ExpressCapabilityRegisters {
            lnk_sta,
            ..Default::default()
        };
        RenderContext::new(
            ConfigBuilder::new(0x8086, 0x9d10)
                .capability(PCI_EXPRESS, 0x40, &regs.to_le_bytes())
                .truncate(len)
                .device(addr),
        )
    }

    fn field_col(field: FieldKind) -> usize {
        FieldKind::ALL.iter().position(|&f| f == field).unwrap()
    }

    fn addrs(model: &PresentationModel) -> Vec<&str> {
        model.addresses().collect()
    }

    #[test]
    fn devices_are_sorted_on_arrival() {
        let mut model = PresentationModel::new(Orientation::Vertical);

        for addr in ["0000:01:00.0", "0000:03:00.0", "0000:02:00.0"] {
            model.upsert(plain(addr));
        }

        assert_eq!(addrs(&model), ["0000:01:00.0", "0000:02:00.0", "0000:03:00.0"]);
    }

    #[test]
    fn late_device_lands_between_neighbours() {
        let mut model = PresentationModel::new(Orientation::Vertical);
        model.upsert(plain("0000:00:00.0"));
        model.upsert(plain("0000:05:00.0"));

        assert_eq!(model.upsert(plain("0000:03:00.0")), 1);
        assert_eq!(
            addrs(&model),
            ["0000:00:00.0", "0000:03:00.0", "0000:05:00.0"]
        );

        // Known devices keep their place.
        assert_eq!(model.upsert(plain("0000:05:00.0")), 2);
        assert_eq!(model.device_count(), 3);
    }

    #[test]
    fn header_holds_titles() {
        let mut model = PresentationModel::new(Orientation::Vertical);
        model.upsert(plain("0000:00:00.0"));

        let errors = field_col(FieldKind::Errors);
        assert_eq!(model.cell(0, errors), Some(("Errors", CellStyle::Normal)));
        assert_eq!(model.cell(1, 0), Some(("0000:00:00.0", CellStyle::Normal)));
        assert_eq!(model.cell(2, 0), None);
        assert!(model.cell_ref(0, 0).is_none());
    }

    #[test]
    fn horizontal_layout_transposes_the_table() {
        let mut model = PresentationModel::new(Orientation::Horizontal);
        model.upsert(plain("0000:02:00.0"));
        model.upsert(plain("0000:01:00.0"));

        assert_eq!(model.rows(), FieldKind::ALL.len());
        assert_eq!(model.columns(), 3);

        let errors = field_col(FieldKind::Errors);
        assert_eq!(model.cell(errors, 0), Some(("  Errors", CellStyle::Normal)));

        let cell = model.cell_ref(field_col(FieldKind::Ids), 2).unwrap();
        assert_eq!(cell.context.addr(), "0000:02:00.0");
        assert_eq!(cell.field, FieldKind::Ids);
    }

    #[test]
    fn short_dump_keeps_previous_express_cells() {
        let mut model = PresentationModel::new(Orientation::Vertical);
        let lnk_sta = field_col(FieldKind::LnkSta);
        let control = field_col(FieldKind::Control);

        model.upsert(express("0000:00:1c.0", 0x2011, 256));
        assert_eq!(model.cell(1, lnk_sta).unwrap().0, "2011");

        model.upsert(express("0000:00:1c.0", 0x0000, 0x60));
        assert_eq!(model.cell(1, lnk_sta).unwrap().0, "2011");
        assert_eq!(model.cell(1, control).unwrap().0, "0000");
        assert!(model.selected().unwrap().context.express().is_none());
    }

    #[test]
    fn vanished_capability_blanks_express_cells() {
        let mut model = PresentationModel::new(Orientation::Vertical);
        let lnk_sta = field_col(FieldKind::LnkSta);

        model.upsert(express("0000:00:1c.0", 0x2011, 256));
        model.upsert(plain("0000:00:1c.0"));

        assert_eq!(model.cell(1, lnk_sta).unwrap().0, "");
    }

    #[test]
    fn updates_are_applied() {
        let mut model = PresentationModel::new(Orientation::Vertical);

        model.apply(Update::Device(Box::new(plain("0000:00:00.0"))));
        model.apply(Update::Error("Failed to read config space".to_owned()));
        model.apply(Update::CycleTime(Duration::from_micros(12_600)));

        assert_eq!(model.device_count(), 1);
        assert_eq!(model.refresh_error(), Some("Failed to read config space"));
        assert_eq!(model.cycle_time_text(), "13ms");
    }

    #[test]
    fn refresh_errors_leave_the_status_alone() {
        let mut model = PresentationModel::new(Orientation::Vertical);
        model.set_status("0000:00:1c.0: link disable failed: permission denied");

        for _ in 0..3 {
            model.apply(Update::Error("Failed to read config space".to_owned()));
            model.apply(Update::CycleTime(Duration::from_millis(1)));
        }

        assert_eq!(
            model.status(),
            "0000:00:1c.0: link disable failed: permission denied"
        );
        assert_eq!(model.refresh_error(), Some("Failed to read config space"));

        // A clean cycle clears the error.
        model.apply(Update::CycleTime(Duration::from_millis(1)));
        assert_eq!(model.refresh_error(), None);
    }

    #[test]
    fn selection_stays_on_device_cells() {
        let mut model = PresentationModel::new(Orientation::Vertical);
        model.upsert(plain("0000:00:00.0"));
        model.upsert(plain("0000:01:00.0"));

        model.move_selection(-1, -1);
        assert_eq!(model.selection(), (1, 0));

        model.move_selection(10, 100);
        assert_eq!(model.selection(), (2, FieldKind::ALL.len() - 1));

        assert_eq!(model.selected().unwrap().context.addr(), "0000:01:00.0");
    }

    #[test]
    fn selection_describes_device_and_field() {
        let mut model = PresentationModel::new(Orientation::Vertical);
        let mut dev = ConfigBuilder::new(0x8086, 0x1237).device("0000:00:00.0");
        dev.vendor_name = Some("Intel Corporation".to_owned());
        model.upsert(RenderContext::new(dev));

        model.move_selection(0, field_col(FieldKind::Control) as isize);

        let text = model.describe_selection().unwrap();
        assert!(text.starts_with("Intel Corporation - ?\nI/O-"));
    }

    #[test]
    fn empty_model_has_no_selection() {
        let model = PresentationModel::new(Orientation::Horizontal);

        assert!(model.selected().is_none());
        assert!(model.describe_selection().is_none());
        assert_eq!(model.cycle_time_text(), "");
    }
}
