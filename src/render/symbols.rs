pub const CIRCLE: &str = "●";
pub const CROSS: &str = "✖";
pub const BAR: &str = "│";
pub const RIGHT_ARROW: &str = "→";
pub const WARNING: &str = "⚠";
pub const ELLIPSIS: &str = "...";

pub const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
