//! Date picker controller: displayed month, selection and keyboard focus.

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::cell_props::{CellAttributes, CellContext, compose_cell_props};
use crate::datetime::{first_day_of_month, local_midnight, shift_months};
use crate::error::CalendarResult;
use crate::matrix::{WeekMatrix, build_week_matrix};
use crate::navigator::{FocusResolution, GridFocusNavigator, GridSurface, KeyOutcome, MemoryGrid, NavKey};

pub struct DatePicker<S: GridSurface> {
    tz: Tz,
    selected_day: NaiveDate,
    /// First day of the displayed month.
    selected_month: NaiveDate,
    today: NaiveDate,
    weeks: WeekMatrix,
    navigator: GridFocusNavigator<S>,
}

impl<S: GridSurface> DatePicker<S> {
    pub fn new(date: &DateTime<Tz>, today: &DateTime<Tz>) -> Self {
        let tz = date.timezone();
        let selected_day = date.date_naive();
        let weeks = build_week_matrix(date);
        let mut navigator = GridFocusNavigator::new();
        navigator.on_grid_changed(&weeks);

        Self {
            tz,
            selected_day,
            selected_month: first_day_of_month(selected_day),
            today: today.with_timezone(&tz).date_naive(),
            weeks,
            navigator,
        }
    }

    pub fn selected_day(&self) -> NaiveDate {
        self.selected_day
    }

    pub fn selected_month(&self) -> NaiveDate {
        self.selected_month
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn weeks(&self) -> &WeekMatrix {
        &self.weeks
    }

    pub fn navigator(&self) -> &GridFocusNavigator<S> {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut GridFocusNavigator<S> {
        &mut self.navigator
    }

    /// "January 2024"
    pub fn month_year_label(&self) -> String {
        self.selected_month.format("%B %Y").to_string()
    }

    pub fn next_month(&mut self) {
        self.show_month(shift_months(self.selected_month, 1));
    }

    pub fn prev_month(&mut self) {
        self.show_month(shift_months(self.selected_month, -1));
    }

    /// Follows a date chosen elsewhere: selects it and shows its month.
    pub fn sync_to(&mut self, date: NaiveDate) {
        self.selected_day = date;
        self.show_month(date);
    }

    fn show_month(&mut self, date: NaiveDate) {
        let month = first_day_of_month(date);
        if month == self.selected_month {
            return;
        }
        self.selected_month = month;
        self.weeks = build_week_matrix(&local_midnight(&self.tz, month));
        self.navigator.on_grid_changed(&self.weeks);
        debug!(month = %self.month_year_label(), "displayed month changed");
    }

    pub fn register_container(&mut self, surface: S) {
        self.navigator.register_container(surface);
    }

    /// Attributes for the cell of `date` in row `week_index`.
    pub fn cell_props(&self, date: &DateTime<Tz>, week_index: usize, hide_outside_month: bool) -> CellAttributes {
        let ctx = CellContext {
            displayed_month: self.selected_month,
            selected_day: self.selected_day,
            today: self.today,
            tab_stop: self.navigator.tab_stop_in(&self.weeks),
        };
        compose_cell_props(&ctx, date.with_timezone(&self.tz).date_naive(), week_index, hide_outside_month)
    }

    /// Attributes for the whole grid, row by row.
    pub fn grid_props(&self, hide_outside_month: bool) -> Vec<Vec<CellAttributes>> {
        self.weeks
            .rows()
            .iter()
            .enumerate()
            .map(|(week_index, row)| {
                row.iter()
                    .map(|cell| self.cell_props(cell, week_index, hide_outside_month))
                    .collect()
            })
            .collect()
    }

    pub fn click_cell(&mut self, date: NaiveDate) -> CalendarResult<()> {
        self.navigator.on_cell_click(date)?;
        if self.is_outside_month(date) {
            self.selected_day = date;
        }
        Ok(())
    }

    /// Arrow key on the cell of `date`. When the target lies outside the
    /// displayed month, the target's month is shown before the next render.
    ///
    /// The month follows the target rather than
    /// `KeyOutcome::month_request`, which is relative to the pressed cell:
    /// leaving an outside-month cell towards the displayed month keeps it.
    /// The returned request is informational and must not be applied
    /// again with `next_month`/`prev_month`.
    #[instrument(skip(self))]
    pub fn key_down_cell(&mut self, date: NaiveDate, key: Option<NavKey>) -> CalendarResult<KeyOutcome> {
        let outcome = self.navigator.on_cell_key_down(date, key)?;
        if let Some(target) = outcome.target
            && self.is_outside_month(target)
        {
            self.show_month(target);
        }
        Ok(outcome)
    }

    pub fn after_render(&mut self) -> CalendarResult<FocusResolution> {
        self.navigator.after_render()
    }

    pub fn should_prevent_default(&self, key: Option<NavKey>) -> bool {
        self.navigator.should_prevent_default(key)
    }

    fn is_outside_month(&self, date: NaiveDate) -> bool {
        date.year() != self.selected_month.year() || date.month() != self.selected_month.month()
    }
}

impl DatePicker<MemoryGrid> {
    /// Re-creates every cell of the in-memory grid from the composed props.
    /// No-op until a grid is registered.
    pub fn render(&mut self, hide_outside_month: bool) {
        let cells: Vec<_> = self
            .grid_props(hide_outside_month)
            .into_iter()
            .flatten()
            .map(|props| (props.date, props.tab_index))
            .collect();
        if let Some(grid) = self.navigator.container_mut() {
            grid.load(cells);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::MonthStep;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn ny(date: NaiveDate) -> DateTime<Tz> {
        local_midnight(&chrono_tz::America::New_York, date)
    }

    fn picker(date: NaiveDate) -> DatePicker<MemoryGrid> {
        let mut picker = DatePicker::new(&ny(date), &ny(ymd(2024, 1, 20)));
        picker.register_container(MemoryGrid::default());
        picker.render(false);
        picker
    }

    fn reachable(picker: &DatePicker<MemoryGrid>) -> Vec<NaiveDate> {
        picker.navigator().container().expect("container").reachable()
    }

    #[test]
    fn label_and_month_stepping() {
        let mut picker = picker(ymd(2024, 1, 17));
        assert_eq!(picker.month_year_label(), "January 2024");

        picker.prev_month();
        assert_eq!(picker.month_year_label(), "December 2023");
        assert_eq!(picker.weeks().first_of_month(), ymd(2023, 12, 1));

        picker.next_month();
        picker.next_month();
        assert_eq!(picker.month_year_label(), "February 2024");
        assert_eq!(picker.selected_day(), ymd(2024, 1, 17));
    }

    #[test]
    fn sync_to_moves_selection_and_month() {
        let mut picker = picker(ymd(2024, 1, 17));
        picker.sync_to(ymd(2024, 5, 9));
        assert_eq!(picker.selected_day(), ymd(2024, 5, 9));
        assert_eq!(picker.selected_month(), ymd(2024, 5, 1));
        assert!(picker.weeks().contains(ymd(2024, 5, 31)));
    }

    #[test]
    fn initial_render_has_one_stop_on_the_first() {
        let picker = picker(ymd(2024, 1, 17));
        assert_eq!(reachable(&picker), vec![ymd(2024, 1, 1)]);

        let props = picker.grid_props(true);
        assert_eq!(props.len(), 6);
        assert!(props[0][0].hidden);
        assert!(props[0][1].is_first_date_of_grid);
        assert!(props[2][3].is_selected);
        assert!(props[2][6].is_today);
    }

    #[test]
    fn click_on_outside_day_selects_it() {
        let mut picker = picker(ymd(2024, 1, 17));
        picker.click_cell(ymd(2024, 1, 9)).expect("click");
        assert_eq!(picker.selected_day(), ymd(2024, 1, 17));

        picker.click_cell(ymd(2024, 2, 3)).expect("click");
        assert_eq!(picker.selected_day(), ymd(2024, 2, 3));
        assert_eq!(reachable(&picker), vec![ymd(2024, 2, 3)]);
    }

    #[test]
    fn right_from_month_end_shows_next_month_and_focuses_first() {
        let mut picker = picker(ymd(2024, 1, 17));
        picker.click_cell(ymd(2024, 1, 31)).expect("click");

        let outcome = picker
            .key_down_cell(ymd(2024, 1, 31), Some(NavKey::ArrowRight))
            .expect("key handled");
        assert_eq!(outcome.month_request, Some(MonthStep::Next));
        assert_eq!(picker.month_year_label(), "February 2024");

        picker.render(false);
        assert_eq!(reachable(&picker), vec![ymd(2024, 2, 1)]);
        assert_eq!(picker.after_render(), Ok(FocusResolution::Applied(ymd(2024, 2, 1))));
        assert_eq!(reachable(&picker), vec![ymd(2024, 2, 1)]);
        assert_eq!(
            picker.navigator().container().expect("container").focused(),
            Some(ymd(2024, 2, 1))
        );
    }

    #[test]
    fn leaving_an_outside_day_into_the_displayed_month_keeps_it() {
        let mut picker = picker(ymd(2024, 1, 17));
        picker.click_cell(ymd(2023, 12, 31)).expect("click");

        let outcome = picker
            .key_down_cell(ymd(2023, 12, 31), Some(NavKey::ArrowRight))
            .expect("key handled");
        assert_eq!(outcome.month_request, Some(MonthStep::Next));
        assert_eq!(picker.month_year_label(), "January 2024");

        picker.render(false);
        assert_eq!(picker.after_render(), Ok(FocusResolution::Applied(ymd(2024, 1, 1))));
        assert_eq!(reachable(&picker), vec![ymd(2024, 1, 1)]);
    }

    #[test]
    fn moving_within_a_trailing_month_shows_that_month() {
        let mut picker = picker(ymd(2024, 1, 17));
        picker.click_cell(ymd(2024, 2, 8)).expect("click");

        let outcome = picker
            .key_down_cell(ymd(2024, 2, 8), Some(NavKey::ArrowDown))
            .expect("key handled");
        assert_eq!(outcome.month_request, None);
        assert_eq!(picker.month_year_label(), "February 2024");

        picker.render(false);
        assert_eq!(picker.after_render(), Ok(FocusResolution::Applied(ymd(2024, 2, 15))));
        assert_eq!(reachable(&picker), vec![ymd(2024, 2, 15)]);
    }

    #[test]
    fn ignored_keys_leave_month_alone() {
        let mut picker = picker(ymd(2024, 1, 17));
        let outcome = picker
            .key_down_cell(ymd(2024, 1, 31), NavKey::from_key_name("Escape"))
            .expect("ignored");
        assert!(!outcome.is_handled());
        assert_eq!(picker.month_year_label(), "January 2024");
        assert!(!picker.should_prevent_default(NavKey::from_key_name("Escape")));
    }
}
