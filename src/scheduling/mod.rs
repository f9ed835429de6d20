//! 排期计算层：数据模型、日期解析、空闲时段查找

pub mod parse;
pub mod slot_finder;
pub mod types;

pub use parse::{is_date_only, parse_date, parse_date_time, parse_time_of_day};
pub use slot_finder::{find_free_slots, normalize};
pub use types::{BusyInterval, FreeSlot, SlotRequest};
