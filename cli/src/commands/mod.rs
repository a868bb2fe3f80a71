mod data;
mod day;
mod food;
mod helpers;
mod log;

pub(crate) use data::{cmd_clear, cmd_export_csv, cmd_export_week, cmd_status, cmd_theme};
pub(crate) use day::{cmd_day, cmd_delete, cmd_summary_clear, cmd_summary_set};
pub(crate) use food::{
    cmd_food_list, cmd_food_register, cmd_food_search, cmd_food_show, cmd_food_top,
};
pub(crate) use log::{
    BeverageArgs, BowelArgs, MealArgs, PainArgs, cmd_log_beverage, cmd_log_bowel, cmd_log_meal,
    cmd_log_pain,
};
