// Unit file rendering

use reach_core::installer::ServiceDescriptor;
use std::fmt::Write;

/// Render the systemd unit for `descriptor`
///
/// The service waits for the network to be online, restarts unconditionally
/// after `restart_delay_secs`, and is wanted by `multi-user.target`.
pub fn render_unit(descriptor: &ServiceDescriptor) -> String {
    let mut unit = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(unit, "[Unit]");
    let _ = writeln!(unit, "Description={}", escape_specifiers(&descriptor.description));
    let _ = writeln!(unit, "After=network-online.target");
    let _ = writeln!(unit, "Wants=network-online.target");
    let _ = writeln!(unit);
    let _ = writeln!(unit, "[Service]");
    let _ = writeln!(unit, "Type=simple");
    let _ = writeln!(
        unit,
        "ExecStart={}",
        quote_exec(&descriptor.executable.to_string_lossy())
    );
    for (key, value) in &descriptor.environment {
        let _ = writeln!(unit, "Environment={}", quote_env(key, value));
    }
    let _ = writeln!(unit, "Restart=always");
    let _ = writeln!(unit, "RestartSec={}", descriptor.restart_delay_secs);
    let _ = writeln!(unit, "User=root");
    let _ = writeln!(unit);
    let _ = writeln!(unit, "[Install]");
    let _ = writeln!(unit, "WantedBy=multi-user.target");

    unit
}

/// `%` starts a systemd specifier
fn escape_specifiers(s: &str) -> String {
    s.replace('%', "%%")
}

fn quote_exec(path: &str) -> String {
    let path = escape_specifiers(path);
    if path.contains(char::is_whitespace) {
        format!("\"{}\"", path.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        path
    }
}

fn quote_env(key: &str, value: &str) -> String {
    let assignment = escape_specifiers(&format!("{}={}", key, value));
    format!(
        "\"{}\"",
        assignment.replace('\\', "\\\\").replace('"', "\\\"")
    )
}
