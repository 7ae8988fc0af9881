//! Roving-tabindex keyboard navigation over the date grid.
//!
//! Only one cell of the grid is reachable with Tab at a time. Arrow keys
//! move that tab stop by a day or a week; when the target falls in another
//! month the navigator asks the host to change the displayed month and
//! finishes the move on the next [`GridFocusNavigator::after_render`] call,
//! once the target cell exists.
//!
//! The navigator never holds cell handles across renders. It stores dates
//! and asks the [`GridSurface`] to resolve them every time.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::datetime::add_days;
use crate::error::{CalendarError, CalendarResult};
use crate::matrix::WeekMatrix;

/// DOM-style tab index. Only `Reachable` (0) and `Skipped` (-1) are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TabIndex {
    Reachable,
    Skipped,
}

impl TabIndex {
    pub fn value(self) -> i32 {
        match self {
            TabIndex::Reachable => 0,
            TabIndex::Skipped => -1,
        }
    }
}

impl fmt::Display for TabIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// What the rendering layer exposes to the navigator.
pub trait GridSurface {
    type Handle: Clone + PartialEq + fmt::Debug;

    /// Looks up the rendered cell for `date`, if the current grid has one.
    fn resolve_cell(&self, date: NaiveDate) -> Option<Self::Handle>;

    fn set_tab_index(&mut self, cell: &Self::Handle, index: TabIndex);

    fn focus(&mut self, cell: &Self::Handle);

    /// Whether keyboard focus is currently inside the grid container.
    fn contains_focus(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavKey {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

impl NavKey {
    /// Maps a DOM `KeyboardEvent.key` value. Anything else is not a
    /// navigation key.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "ArrowLeft" => Some(NavKey::ArrowLeft),
            "ArrowRight" => Some(NavKey::ArrowRight),
            "ArrowUp" => Some(NavKey::ArrowUp),
            "ArrowDown" => Some(NavKey::ArrowDown),
            _ => None,
        }
    }

    pub fn day_offset(self) -> i64 {
        match self {
            NavKey::ArrowLeft => -1,
            NavKey::ArrowRight => 1,
            NavKey::ArrowUp => -7,
            NavKey::ArrowDown => 7,
        }
    }

    fn month_step(self) -> MonthStep {
        if self.day_offset() < 0 {
            MonthStep::Previous
        } else {
            MonthStep::Next
        }
    }
}

/// Month change the host must apply before the next render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonthStep {
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOutcome {
    pub target: Option<NaiveDate>,
    /// Set when `target` lies in another month than the pressed cell.
    /// `DatePicker::key_down_cell` already shows the target's month and
    /// does not apply this step; hosts using the picker must not apply
    /// it again.
    pub month_request: Option<MonthStep>,
}

impl KeyOutcome {
    pub fn ignored() -> Self {
        Self {
            target: None,
            month_request: None,
        }
    }

    pub fn is_handled(&self) -> bool {
        self.target.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusResolution {
    /// Nothing was pending.
    Idle,
    /// The pending target now holds the tab stop and DOM focus.
    Applied(NaiveDate),
    /// The pending target had no rendered cell; the move was dropped.
    Abandoned(NaiveDate),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FocusState {
    pub current_focusable: Option<NaiveDate>,
    pub pending_focus: Option<NaiveDate>,
    pub last_focused: Option<NaiveDate>,
}

pub struct GridFocusNavigator<S: GridSurface> {
    container: Option<S>,
    state: FocusState,
    default_stop: Option<NaiveDate>,
    consecutive_misses: u32,
}

impl<S: GridSurface> Default for GridFocusNavigator<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GridSurface> GridFocusNavigator<S> {
    pub fn new() -> Self {
        Self {
            container: None,
            state: FocusState::default(),
            default_stop: None,
            consecutive_misses: 0,
        }
    }

    pub fn register_container(&mut self, surface: S) {
        debug!("grid container registered");
        self.container = Some(surface);
    }

    pub fn container(&self) -> Option<&S> {
        self.container.as_ref()
    }

    pub fn container_mut(&mut self) -> Option<&mut S> {
        self.container.as_mut()
    }

    pub fn focus_state(&self) -> FocusState {
        self.state
    }

    /// The date whose cell should hold tab index 0: the pending target
    /// while a move is in flight, else the last focused cell, else the
    /// first day of the displayed month.
    pub fn tab_stop(&self) -> Option<NaiveDate> {
        self.state
            .pending_focus
            .or(self.state.last_focused)
            .or(self.default_stop)
    }

    /// Like [`tab_stop`](Self::tab_stop), skipping candidates `matrix`
    /// has no cell for.
    pub fn tab_stop_in(&self, matrix: &WeekMatrix) -> Option<NaiveDate> {
        [self.state.pending_focus, self.state.last_focused, self.default_stop]
            .into_iter()
            .flatten()
            .find(|date| matrix.contains(*date))
    }

    fn surface_mut(&mut self) -> CalendarResult<&mut S> {
        self.container.as_mut().ok_or(CalendarError::MissingContainer)
    }

    /// Arrow key pressed on the cell for `date`.
    ///
    /// The cell is demoted immediately; the target is promoted by the next
    /// [`after_render`](Self::after_render).
    #[instrument(skip(self))]
    pub fn on_cell_key_down(&mut self, date: NaiveDate, key: Option<NavKey>) -> CalendarResult<KeyOutcome> {
        let Some(key) = key else {
            return Ok(KeyOutcome::ignored());
        };

        let surface = self.surface_mut()?;
        if let Some(cell) = surface.resolve_cell(date) {
            surface.set_tab_index(&cell, TabIndex::Skipped);
        }

        let target = add_days(date, key.day_offset());
        let month_request = crosses_month(date, target).then(|| key.month_step());

        self.state.current_focusable = Some(date);
        self.state.last_focused = Some(date);
        if let Some(replaced) = self.state.pending_focus.replace(target) {
            trace!(%replaced, %target, "pending focus target replaced");
        }

        debug!(%date, %target, ?month_request, "focus move requested");
        Ok(KeyOutcome {
            target: Some(target),
            month_request,
        })
    }

    /// Deferred half of a key move. Call once the grid has re-rendered.
    #[instrument(skip(self))]
    pub fn after_render(&mut self) -> CalendarResult<FocusResolution> {
        let previous = self.state.last_focused;
        let pending = self.state.pending_focus;
        let surface = self.surface_mut()?;

        let Some(target) = pending else {
            return Ok(FocusResolution::Idle);
        };

        let Some(cell) = surface.resolve_cell(target) else {
            if let Some(prev_cell) = previous.and_then(|date| surface.resolve_cell(date)) {
                surface.set_tab_index(&prev_cell, TabIndex::Reachable);
            }
            self.state.pending_focus = None;
            self.consecutive_misses += 1;
            let miss = CalendarError::NoMatchingCell(target);
            if self.consecutive_misses > 1 {
                warn!(error = %miss, misses = self.consecutive_misses, "focus target repeatedly missing from grid");
            } else {
                debug!(error = %miss, "focus target not rendered; move abandoned");
            }
            return Ok(FocusResolution::Abandoned(target));
        };

        if let Some(prev_cell) = previous
            .filter(|date| *date != target)
            .and_then(|date| surface.resolve_cell(date))
        {
            surface.set_tab_index(&prev_cell, TabIndex::Skipped);
        }
        surface.set_tab_index(&cell, TabIndex::Reachable);
        surface.focus(&cell);

        self.state.pending_focus = None;
        self.state.last_focused = Some(target);
        self.consecutive_misses = 0;
        debug!(%target, "focus applied");
        Ok(FocusResolution::Applied(target))
    }

    /// Click on the cell for `date`: it becomes the tab stop right away.
    #[instrument(skip(self))]
    pub fn on_cell_click(&mut self, date: NaiveDate) -> CalendarResult<()> {
        let previous = self.tab_stop();
        let surface = self.surface_mut()?;

        if let Some(prev_cell) = previous
            .filter(|prev| *prev != date)
            .and_then(|prev| surface.resolve_cell(prev))
        {
            surface.set_tab_index(&prev_cell, TabIndex::Skipped);
        }
        if let Some(cell) = surface.resolve_cell(date) {
            surface.set_tab_index(&cell, TabIndex::Reachable);
        }

        self.state.pending_focus = None;
        self.state.last_focused = Some(date);
        Ok(())
    }

    /// Arrow keys must not scroll the page while focus is in the grid.
    pub fn should_prevent_default(&self, key: Option<NavKey>) -> bool {
        key.is_some() && self.container.as_ref().is_some_and(GridSurface::contains_focus)
    }

    /// Records the new grid's default tab stop and drops a focused date
    /// the grid cannot show, unless a move into it is still pending.
    pub fn on_grid_changed(&mut self, matrix: &WeekMatrix) {
        self.default_stop = Some(matrix.first_of_month());
        if self.state.pending_focus.is_some() {
            return;
        }
        if let Some(last) = self.state.last_focused
            && !matrix.contains(last)
        {
            trace!(%last, "tab stop left the grid");
            self.state = FocusState::default();
        }
    }
}

fn crosses_month(from: NaiveDate, to: NaiveDate) -> bool {
    from.month() != to.month() || from.year() != to.year()
}

/// Grid surface kept entirely in memory, keyed by date. Used by the CLI
/// and by tests in place of rendered cells.
#[derive(Debug, Default, Clone)]
pub struct MemoryGrid {
    tab_indices: BTreeMap<NaiveDate, TabIndex>,
    focused: Option<NaiveDate>,
    has_focus: bool,
}

impl MemoryGrid {
    /// Replaces every cell with a fresh one per day of `matrix`.
    pub fn render(&mut self, matrix: &WeekMatrix, tab_stop: NaiveDate) {
        self.load(matrix.days().map(|day| {
            let index = if day == tab_stop { TabIndex::Reachable } else { TabIndex::Skipped };
            (day, index)
        }));
    }

    pub fn load(&mut self, cells: impl IntoIterator<Item = (NaiveDate, TabIndex)>) {
        self.tab_indices = cells.into_iter().collect();
        if self.focused.is_some_and(|day| !self.tab_indices.contains_key(&day)) {
            self.focused = None;
        }
    }

    pub fn tab_index(&self, date: NaiveDate) -> Option<TabIndex> {
        self.tab_indices.get(&date).copied()
    }

    /// Dates whose cell currently holds tab index 0.
    pub fn reachable(&self) -> Vec<NaiveDate> {
        self.tab_indices
            .iter()
            .filter(|(_, index)| **index == TabIndex::Reachable)
            .map(|(day, _)| *day)
            .collect()
    }

    pub fn focused(&self) -> Option<NaiveDate> {
        self.focused
    }

    pub fn set_focus_inside(&mut self, inside: bool) {
        self.has_focus = inside;
    }
}

impl GridSurface for MemoryGrid {
    type Handle = NaiveDate;

    fn resolve_cell(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.tab_indices.contains_key(&date).then_some(date)
    }

    fn set_tab_index(&mut self, cell: &NaiveDate, index: TabIndex) {
        self.tab_indices.insert(*cell, index);
    }

    fn focus(&mut self, cell: &NaiveDate) {
        self.focused = Some(*cell);
        self.has_focus = true;
    }

    fn contains_focus(&self) -> bool {
        self.has_focus
    }
}
