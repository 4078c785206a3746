//! Built-in tools

mod calculator;
mod current_time;

pub use calculator::{evaluate, CalculatorTool};
pub use current_time::CurrentTimeTool;
