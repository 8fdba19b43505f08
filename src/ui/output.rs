use crate::admin::{Notice, NoticeKind};
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

/// One attachment list: `🔗 related → 3, 5`
pub fn attached(key: &str, ids: &[i64]) {
    let list = if ids.is_empty() {
        muted("(empty)")
    } else {
        ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
    };
    println!("{} {} → {}", Icons::LINK.style(theme().info.clone()), key.style(theme().key.clone()), list);
}

pub fn notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Success => success(&notice.message),
        NoticeKind::Error => error(&notice.message),
    }
}
