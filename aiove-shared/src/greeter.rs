use colored::Colorize;
use console::Term;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: [&str; 5] = [
    r"     _     ___  ___    _____         _                                    ",
    r"    / \   |_ _|/ _ \  | ____| _ __  | |__    __ _  _ __    ___  ___  _ __ ",
    r"   / _ \   | || | | | |  _|  | '_ \ | '_ \  / _` || '_ \  / __|/ _ \| '__|",
    r"  / ___ \  | || |_| | | |___ | | | || | | || (_| || | | || (__|  __/| |   ",
    r" /_/   \_\|___|\___/  |_____||_| |_||_| |_| \__,_||_| |_| \___|\___||_|",
];
const BANNER_WIDTH: usize = 73;
const THANKS_WIDTH: usize = 90;
const REPOSITORY: &str = "https://github.com/Tsubajashi/AIO_Video_Enhancer";

fn terminal_width() -> usize {
    let (_, cols) = Term::stdout().size();
    usize::from(cols).max(1)
}

fn pad(width: usize, content_width: usize) -> String {
    " ".repeat((width / 2).saturating_sub(content_width / 2))
}

/// Greeter for a terminal `width` columns wide. Narrow terminals get a one
/// line version.
pub fn greeter_message(width: usize) -> String {
    let rule = "-".repeat(width);
    let version_text = format!("Version {}", VERSION);

    if width >= BANNER_WIDTH {
        let bias = pad(width, BANNER_WIDTH);
        let mut lines = vec![rule.clone()];
        lines.extend(BANNER.iter().map(|line| format!("{}{}", bias, line)));
        lines.push(String::new());
        lines.push(format!("{}{:^73}", bias, "All in One Video Enhancer"));
        lines.push(format!("{}{:>73}", bias, version_text));
        lines.push(rule);
        lines.join("\n")
    } else {
        let title = format!("[ All in One Enhancer | {} ]", version_text);
        format!("{}\n{}{}\n{}", rule, pad(width, title.len()), title, rule)
    }
}

pub fn thanks_message(width: usize) -> String {
    let rule = "-".repeat(width);

    if width >= THANKS_WIDTH {
        let bias = pad(width, THANKS_WIDTH);
        let border = format!("{}[+{}+]", bias, "-".repeat(85));
        let row = |text: &str| format!("{} |{:<85}|", bias, text);
        [
            rule.clone(),
            border.clone(),
            row(""),
            format!("{} |{:^85}|", bias, ":: Thanks for using the All in One Video Enhancer Project!! ::"),
            format!("{} |{:^85}|", bias, "=".repeat(62)),
            row(""),
            row(" Official links:"),
            row(""),
            row(&format!("    - Repository:  [ {} ]", REPOSITORY)),
            row(""),
            border,
            rule,
        ]
        .join("\n")
    } else {
        format!(
            "{}\n  # # [ Thanks for using the All in One Video Enhancer Project!!! ] # #\n\n  - Repository: {}\n{}",
            rule, REPOSITORY, rule
        )
    }
}

pub fn print_greeter() {
    println!("{}", greeter_message(terminal_width()).bright_cyan());
}

pub fn print_thanks() {
    println!("{}", thanks_message(terminal_width()).bright_green());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_greeter_has_banner() {
        let message = greeter_message(100);
        assert!(message.contains("All in One Video Enhancer"));
        assert!(message.contains(&format!("Version {}", VERSION)));
        assert!(message.lines().all(|line| line.len() <= 100));
        assert_eq!(message.lines().count(), BANNER.len() + 5);
    }

    #[test]
    fn narrow_greeter_is_one_line_title() {
        let message = greeter_message(40);
        assert_eq!(message.lines().count(), 3);
        assert!(message.contains("[ All in One Enhancer |"));
    }

    #[test]
    fn thanks_box_fits_terminal() {
        let message = thanks_message(120);
        assert!(message.lines().all(|line| line.len() <= 120));
        assert!(message.contains(REPOSITORY));
        assert!(thanks_message(60).contains(REPOSITORY));
    }
}
