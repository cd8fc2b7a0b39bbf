//! Report display and formatting

use arq_sim::{ScenarioResult, SimReport};

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a tick count, with "tick" pluralised
pub fn format_ticks(ticks: u64) -> String {
    if ticks == 1 {
        "1 tick".to_string()
    } else {
        format!("{} ticks", ticks)
    }
}

/// Percentage of `part` in `whole`, or 0 when `whole` is 0
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// One-line pass/fail summary for a scenario
pub fn display_compact_result(result: &ScenarioResult) {
    match &result.report {
        Ok(report) if report.is_success() => println!(
            "[ OK ] {} ({}, {} retransmissions)",
            result.name,
            format_ticks(report.ticks),
            report.sender.retransmissions
        ),
        _ => {
            if let Some(err) = result.error() {
                println!("[FAIL] {}: {}", result.name, err);
            }
        }
    }
}

/// Display the full statistics of a run
pub fn display_report(name: &str, report: &SimReport) {
    let status = if report.is_success() { "PASSED" } else { "FAILED" };

    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ {:<59} │", name);
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Result: {:<51} │", status);
    println!("│ Duration: {:<49} │", format_ticks(report.ticks));
    println!("│ Delivered: {:<48} │", format_bytes(report.bytes_delivered as u64));
    println!("│ Smoothed RTT: {:<45} │", format!("{:.2} ticks", report.rtt));
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ SENDER                                                      │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Writes:    {:<48} │",
        format!(
            "{} accepted / {} rejected",
            report.sender.writes_accepted, report.sender.writes_rejected
        )
    );
    println!(
        "│ Fragments: {:<48} │",
        format!(
            "{} sent / {} resent ({:.1}%)",
            report.sender.fragments_sent,
            report.sender.retransmissions,
            percent(report.sender.retransmissions, report.sender.fragments_sent)
        )
    );
    println!(
        "│ Acks:      {:<48} │",
        format!(
            "{} retired / {} stale",
            report.sender.acks_retired, report.sender.stale_acks
        )
    );
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ RECEIVER                                                    │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Packets:   {:<48} │",
        format!(
            "{} received / {} corrupted / {} duplicate",
            report.receiver.packets_received,
            report.receiver.corrupted,
            report.receiver.duplicates
        )
    );
    println!(
        "│ Delivered: {:<48} │",
        format!("{} fragments", report.receiver.fragments_delivered)
    );
    println!("├──────────────────┬──────────┬──────────┬──────────┬──────────┤");
    println!("│ Link             │ Sent     │ Lost     │ Corrupt  │ Oversize │");
    println!("├──────────────────┼──────────┼──────────┼──────────┼──────────┤");
    let links = [
        ("sender->receiver", &report.forward),
        ("receiver->sender", &report.backward),
    ];
    for (label, link) in links {
        println!(
            "│ {:16} │ {:8} │ {:8} │ {:8} │ {:8} │",
            label, link.sent, link.lost, link.corrupted, link.dropped_oversize
        );
    }
    println!("└──────────────────┴──────────┴──────────┴──────────┴──────────┘");

    if let Err(err) = &report.outcome {
        println!("Error: {}", err);
    }
}
