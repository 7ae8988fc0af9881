//! Per-cell attributes for a day in the picker grid.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::datetime::date_key;
use crate::navigator::TabIndex;

/// Ambient values a day cell is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellContext {
    /// Any day of the displayed month.
    pub displayed_month: NaiveDate,
    pub selected_day: NaiveDate,
    pub today: NaiveDate,
    /// Navigator tab stop, if it is inside the rendered grid.
    pub tab_stop: Option<NaiveDate>,
}

/// Attributes of one day button in the picker grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellAttributes {
    pub date: NaiveDate,
    /// `data-cell-date`, the key the rendering layer resolves cells by.
    pub date_key: String,
    pub date_label: u32,
    pub role: &'static str,
    pub aria_label: String,
    pub aria_disabled: bool,
    pub is_outside_month: bool,
    pub is_today: bool,
    pub is_selected: bool,
    pub is_first_date_of_grid: bool,
    pub hidden: bool,
    pub tab_index: TabIndex,
}

impl CellAttributes {
    /// Clicking an outside-month cell also selects it.
    pub fn click_selects_day(&self) -> bool {
        self.is_outside_month
    }
}

pub fn compose_cell_props(
    ctx: &CellContext,
    date: NaiveDate,
    week_index: usize,
    hide_outside_month: bool,
) -> CellAttributes {
    let is_outside_month =
        date.month() != ctx.displayed_month.month() || date.year() != ctx.displayed_month.year();
    let is_first_date_of_grid = week_index == 0 && date.day() == 1;

    let reachable = match ctx.tab_stop {
        Some(stop) => stop == date,
        None => is_first_date_of_grid,
    };

    CellAttributes {
        date,
        date_key: date_key(date),
        date_label: date.day(),
        role: "button",
        aria_label: date.format("%A, %B %-d, %Y").to_string(),
        aria_disabled: is_outside_month,
        is_outside_month,
        is_today: date == ctx.today,
        is_selected: date == ctx.selected_day,
        is_first_date_of_grid,
        hidden: hide_outside_month && is_outside_month,
        tab_index: if reachable { TabIndex::Reachable } else { TabIndex::Skipped },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn context() -> CellContext {
        CellContext {
            displayed_month: ymd(2024, 1, 17),
            selected_day: ymd(2024, 1, 17),
            today: ymd(2024, 1, 20),
            tab_stop: None,
        }
    }

    #[test]
    fn in_month_cell() {
        let props = compose_cell_props(&context(), ymd(2024, 1, 17), 2, true);
        assert!(!props.is_outside_month);
        assert!(props.is_selected);
        assert!(!props.is_today);
        assert!(!props.hidden);
        assert_eq!(props.date_key, "2024-01-17");
        assert_eq!(props.date_label, 17);
        assert_eq!(props.aria_label, "Wednesday, January 17, 2024");
        assert_eq!(props.tab_index, TabIndex::Skipped);
        assert!(!props.click_selects_day());
    }

    #[test]
    fn outside_month_cell_hides_only_when_asked() {
        let shown = compose_cell_props(&context(), ymd(2023, 12, 31), 0, false);
        assert!(shown.is_outside_month);
        assert!(shown.aria_disabled);
        assert!(!shown.hidden);
        assert!(shown.click_selects_day());

        let hidden = compose_cell_props(&context(), ymd(2023, 12, 31), 0, true);
        assert!(hidden.hidden);
    }

    #[test]
    fn first_date_is_default_tab_stop() {
        let first = compose_cell_props(&context(), ymd(2024, 1, 1), 0, false);
        assert!(first.is_first_date_of_grid);
        assert_eq!(first.tab_index, TabIndex::Reachable);

        // Day 1 of the following month sits in a later row.
        let next = compose_cell_props(&context(), ymd(2024, 2, 1), 4, false);
        assert!(!next.is_first_date_of_grid);
        assert_eq!(next.tab_index, TabIndex::Skipped);
    }

    #[test]
    fn navigator_tab_stop_overrides_default() {
        let ctx = CellContext {
            tab_stop: Some(ymd(2024, 1, 9)),
            ..context()
        };
        assert_eq!(compose_cell_props(&ctx, ymd(2024, 1, 1), 0, false).tab_index, TabIndex::Skipped);
        assert_eq!(compose_cell_props(&ctx, ymd(2024, 1, 9), 1, false).tab_index, TabIndex::Reachable);
    }

    #[test]
    fn today_flag() {
        let props = compose_cell_props(&context(), ymd(2024, 1, 20), 2, false);
        assert!(props.is_today);
    }
}
