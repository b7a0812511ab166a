use colored::*;

use crate::core::telemetry::{Snapshot, TrafficRow};
use crate::ui::formatters::{format_bytes, format_timestamp};

pub fn print_snapshot(snapshot: &Snapshot) {
    println!("\n{}", "VPN CLIENTS".bold().bright_cyan());
    println!("{}", "=".repeat(96));

    println!(
        "  Configured: {}   Listed: {}   Online: {}",
        snapshot.total.to_string().bold(),
        snapshot.connected.len(),
        snapshot.online_count().to_string().green()
    );

    if snapshot.connected.is_empty() {
        println!("\n  {}", "No peers reported by the status source.".dimmed());
        println!();
        return;
    }

    println!(
        "\n  {:<18} {:<24} {:<16} {:>12} {:>12}  {}",
        "Name".bold(),
        "Remote IP".bold(),
        "Virtual IP".bold(),
        "Received".bold(),
        "Sent".bold(),
        "Last Seen".bold()
    );
    println!("  {}", "-".repeat(94));

    for peer in &snapshot.connected {
        let last_seen = if peer.connected {
            peer.last_seen.green()
        } else {
            peer.last_seen.red()
        };
        let remote = if peer.remote_ip.is_empty() {
            "-"
        } else {
            peer.remote_ip.as_str()
        };

        println!(
            "  {:<18} {:<24} {:<16} {:>12} {:>12}  {}",
            peer.name, remote, peer.virtual_ip, peer.bytes_received, peer.bytes_sent, last_seen
        );
    }

    println!();
}

pub fn print_history(rows: &[TrafficRow], hours: u64) {
    println!(
        "\n{}",
        format!("TRAFFIC (last {}h)", hours).bold().bright_cyan()
    );
    println!("{}", "=".repeat(72));

    if rows.is_empty() {
        println!("  {}", "No samples recorded in this window.".dimmed());
        println!();
        return;
    }

    println!(
        "  {:<20} {:<20} {:>14} {:>14}",
        "Time".bold(),
        "Client".bold(),
        "In".bold(),
        "Out".bold()
    );
    println!("  {}", "-".repeat(70));

    let (mut total_in, mut total_out) = (0u64, 0u64);
    for row in rows {
        total_in = total_in.saturating_add(row.bytes_in);
        total_out = total_out.saturating_add(row.bytes_out);
        println!(
            "  {:<20} {:<20} {:>14} {:>14}",
            format_timestamp(row.ts),
            row.client_name,
            format_bytes(row.bytes_in),
            format_bytes(row.bytes_out)
        );
    }

    println!("  {}", "-".repeat(70));
    println!(
        "  {:<41} {:>14} {:>14}",
        format!("{} sample(s)", rows.len()).dimmed(),
        format_bytes(total_in).bold(),
        format_bytes(total_out).bold()
    );
    println!();
}
