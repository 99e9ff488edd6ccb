use colored::Color;

pub const PRIMARY: Color = Color::BrightGreen;
pub const ACCENT: Color = Color::Cyan;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;
pub const TABLE_HEAD: Color = Color::Blue;
pub const ADDR: Color = Color::BrightWhite;
pub const GOOD: Color = Color::Green;
pub const FAIR: Color = Color::Yellow;
pub const BAD: Color = Color::Red;
