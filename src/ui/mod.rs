pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    attached, dim, error, header, info, muted, notice, status, success, warn,
};
pub use table::{definitions_table, records_table, referrers_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
