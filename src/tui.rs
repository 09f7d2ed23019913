//! Terminal presentation: status macros, banner, progress bar, result table
//! and summary. Nothing in here influences what gets scanned.
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use crate::address::decode;
use crate::scanner::{ProbeResult, ReachabilityStatus, ScanReport, Summary};
use crate::range::AddressRole;

/// Width of the hostname column; longer names are cut with "...".
const HOSTNAME_WIDTH: usize = 45;

#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!("{} {}", $crate::tui::tag_red("[!]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                // Don't print the ascii art
                println!("{}", $name);
            } else {
                println!("{} {}", $crate::tui::tag_red("[!]"), $name);
            }
        }
    };
}

#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!("{} {}", $crate::tui::tag_blue("[~]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", $crate::tui::tag_blue("[~]"), $name);
            }
        }
    };
}

#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!("{} {}", $crate::tui::tag_green("[>]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", $crate::tui::tag_green("[>]"), $name);
            }
        }
    };
}

#[doc(hidden)]
pub fn tag_red(tag: &str) -> ColoredString {
    tag.red().bold()
}

#[doc(hidden)]
pub fn tag_blue(tag: &str) -> ColoredString {
    tag.blue().bold()
}

#[doc(hidden)]
pub fn tag_green(tag: &str) -> ColoredString {
    tag.green().bold()
}

pub fn banner() -> String {
    format!(
        "{}\n{}\n{}",
        "━".repeat(76).bright_cyan(),
        format!("{:^76}", "NETWORK HOST SCANNER").bold().yellow(),
        "━".repeat(76).bright_cyan()
    )
}

/// A progress bar over `total` entries, hidden when `hidden` is set.
pub fn progress_bar(total: usize, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.yellow} Scanning hosts... [{bar:50.yellow/blue}] {percent:>3}% {elapsed_precise}",
    ) {
        bar.set_style(style.progress_chars("━╸ "));
    }
    bar
}

fn truncate_hostname(hostname: &str) -> String {
    if hostname.chars().count() > HOSTNAME_WIDTH {
        let kept: String = hostname.chars().take(HOSTNAME_WIDTH - 3).collect();
        format!("{kept}...")
    } else {
        hostname.to_owned()
    }
}

/// One table row: address, status label and hostname.
pub fn table_row(result: &ProbeResult, accessible: bool) -> String {
    let ip = format!("{:<17}", decode(result.address()));
    let hostname = truncate_hostname(result.hostname_or_marker());

    if accessible {
        return format!("{ip}{:<10}{hostname}", result.label());
    }

    let (ip, status) = match (result.status(), result.role()) {
        (ReachabilityStatus::Up, _) => (ip.bright_white(), "● UP".green().bold()),
        (ReachabilityStatus::Down, _) => (ip.bright_yellow(), "● DOWN".red().bold()),
        (ReachabilityStatus::NotApplicable, AddressRole::Broadcast) => {
            (ip.bright_magenta(), "◆ BCAST".magenta().bold())
        }
        (ReachabilityStatus::NotApplicable, _) => (ip.bright_cyan(), "◆ NTWRK".cyan().bold()),
    };
    // Pad before colouring so escape codes do not skew the columns.
    let padding = " ".repeat(10usize.saturating_sub(status.chars().count()));
    format!("{ip}{status}{padding}{}", hostname.bright_white())
}

pub fn table(report: &ScanReport, accessible: bool) -> String {
    let header = format!("{:<17}{:<10}{}", "IP ADDRESS", "STATUS", "HOSTNAME");
    let mut lines = vec![if accessible {
        header
    } else {
        header.bold().to_string()
    }];
    lines.extend(report.results().iter().map(|r| table_row(r, accessible)));
    lines.join("\n")
}

pub fn summary(summary: &Summary, accessible: bool) -> String {
    let rows = [
        ("● Hosts UP:   ", summary.up),
        ("● Hosts DOWN: ", summary.down),
        ("◆ Network:    ", summary.network),
        ("◆ Broadcast:  ", summary.broadcast),
        ("● Total:      ", summary.total),
    ];
    rows.iter()
        .map(|(label, count)| {
            if accessible {
                format!("{}{count}", label.trim_start_matches(['●', '◆']).trim_start())
            } else {
                format!("{label}{}", count.to_string().bold())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `ip label hostname`, one line per address, for piping into other tools.
pub fn greppable(report: &ScanReport) -> String {
    report
        .results()
        .iter()
        .map(|r| format!("{} {} {}", decode(r.address()), r.label(), r.hostname_or_marker()))
        .collect::<Vec<_>>()
        .join("\n")
}
