use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    eprintln!();
    eprintln!("{}", title.bold());
    eprintln!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print one line of a text diff
pub fn diff_line(sign: char, line: &str) {
    let text = format!("{sign} {line}");
    match sign {
        '-' => print!("{}", text.red()),
        '+' => print!("{}", text.green()),
        _ => print!("{}", text.dimmed()),
    }
    if !line.ends_with('\n') {
        println!();
    }
}
