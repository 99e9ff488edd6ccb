use colored::*;
use edgerank_common::log::PRINT_TARGET;
use edgerank_common::network::result::{ProbeResult, ResultSet};
use tracing::info;
use unicode_width::UnicodeWidthStr;

use crate::terminal::colors;

pub const TOTAL_WIDTH: usize = 72;

const COLUMNS: [&str; 7] = ["ADDRESS", "SENT", "RECV", "LOSS", "DELAY ms", "MB/s", "COLO"];
const WIDTHS: [usize; 5] = [6, 6, 6, 10, 10];

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn banner() {
    let text_content: String = format!("⟦ EDGERANK v{} ⟧", env!("CARGO_PKG_VERSION"));
    let text_width: usize = UnicodeWidthStr::width(text_content.as_str());
    let text: ColoredString = text_content.bright_green().bold();
    let sep: ColoredString = "═"
        .repeat(TOTAL_WIDTH.saturating_sub(text_width) / 2)
        .bright_black();
    print(&format!("{}{}{}", sep, text, sep));
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = UnicodeWidthStr::width(formatted.as_str());

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: ColoredString = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right)
    )
    .bright_black();

    print(&format!("{}", line));
}

/// Prints the first `limit` rows of the final ranking.
pub fn results_table(results: &ResultSet, limit: usize) {
    let shown = &results[..limit.min(results.len())];
    // IPv6 addresses need a wider first column.
    let addr_width = shown
        .iter()
        .map(|r| r.addr.to_string().len())
        .max()
        .unwrap_or(0)
        .max(15)
        + 2;

    let mut head = format!("{:<addr_width$}", COLUMNS[0]);
    for (name, width) in COLUMNS[1..6].iter().zip(WIDTHS) {
        head.push_str(&format!("{name:<width$}"));
    }
    head.push_str(COLUMNS[6]);
    print(&format!("{}", head.color(colors::TABLE_HEAD).bold()));

    for result in shown {
        print(&row(result, addr_width));
    }
}

fn row(result: &ProbeResult, addr_width: usize) -> String {
    let [addr, sent, received, loss, delay, speed, colo] = result.to_record();
    let loss_color = match result.loss_rate() {
        l if l == 0.0 => colors::GOOD,
        l if l < 0.5 => colors::FAIR,
        _ => colors::BAD,
    };
    let delay_color = match result.delay_ms() {
        d if d < 150.0 => colors::GOOD,
        d if d < 300.0 => colors::FAIR,
        _ => colors::BAD,
    };

    format!(
        "{}{}{}{}{}{}{}",
        format!("{addr:<addr_width$}").color(colors::ADDR),
        format!("{sent:<6}").color(colors::TEXT_DEFAULT),
        format!("{received:<6}").color(colors::TEXT_DEFAULT),
        format!("{loss:<6}").color(loss_color),
        format!("{delay:<10}").color(delay_color),
        format!("{speed:<10}").color(colors::ACCENT),
        colo.color(colors::SEPARATOR),
    )
}

pub fn summary(results: &ResultSet, hosts: &[String]) {
    let Some(best) = results.first() else {
        return;
    };
    let prefix: ColoredString = ">".color(colors::SEPARATOR);
    print(&format!(
        "{} best address {} ({:.2} ms, {:.2} MB/s)",
        prefix,
        best.addr.to_string().color(colors::PRIMARY).bold(),
        best.delay_ms(),
        best.throughput_mb()
    ));
    if !hosts.is_empty() {
        print(&format!(
            "{} pinning {}",
            prefix,
            hosts.join(", ").color(colors::ACCENT)
        ));
    }
}

pub fn centerln(msg: &str) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{}{}{}", space, msg, space));
}

const NO_RESULTS: &str = r#"
         _   _  ___    ____  _____ ____  _   _ _   _____ ____
        | \ | |/ _ \  |  _ \| ____/ ___|| | | | | |_   _/ ___|
        |  \| | | | | | |_) |  _| \___ \| | | | |   | | \___ \
        | |\  | |_| | |  _ <| |___ ___) | |_| | |___| |  ___) |
        |_| \_|\___/  |_| \_\_____|____/ \___/|_____|_| |____/
"#;

pub fn no_results() {
    print(&format!("{}", NO_RESULTS.red().bold()));
    centerln(&"no candidate answered, check the range file and probe settings".dimmed().to_string());
}

pub fn end_of_program() {
    print(&format!(
        "{}",
        "═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR)
    ));
}
