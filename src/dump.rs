//! Format compiled buffers for display (hex dump, field listing, report item tree).

use crate::descriptor::DescriptorNode;
use crate::hid::{ItemKind, ReportDescriptor};
use crate::set::DescriptorSet;

/// Uppercase hex, space separated, 16 bytes per line.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|line| line.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `LABEL (N bytes)` followed by the indented hex dump.
pub fn format_buffer(label: &str, bytes: &[u8]) -> String {
    let mut out = format!("{} ({} bytes)", label, bytes.len());
    for line in format_hex(bytes).lines() {
        out.push_str("\n  ");
        out.push_str(line);
    }
    out
}

pub fn format_set(set: &DescriptorSet) -> String {
    set.buffers()
        .iter()
        .map(|(label, bytes)| format_buffer(label, bytes))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One `name = value` line per field, values in hex at the field's width.
pub fn describe_descriptor(node: &DescriptorNode) -> String {
    let mut out = node.label();
    for f in node.fields() {
        let digits = f.width() * 2;
        out.push_str(&format!("\n  {:<22} 0x{:0width$X}", f.tag().name(), f.value(), width = digits));
    }
    out
}

/// Item-per-line listing of a report descriptor, indented by collection depth.
pub fn describe_report(report: &ReportDescriptor) -> String {
    let mut lines = Vec::new();
    let mut depth = 0usize;
    for item in report.items().iter() {
        if item.kind() == ItemKind::EndCollection {
            depth = depth.saturating_sub(1);
        }
        let hex = format_hex(&item.encode());
        let text = if item.kind().carries_data() {
            format!("{}({})", item.kind().name(), item.value())
        } else {
            item.kind().name().to_string()
        };
        lines.push(format!("{:<15}{}{}", hex, "  ".repeat(depth), text));
        if item.kind() == ItemKind::Collection {
            depth += 1;
        }
    }
    lines.join("\n")
}

/// Field listing of every descriptor in every configuration.
pub fn describe_set(set: &DescriptorSet) -> String {
    let mut parts = Vec::new();
    for i in 0..set.configuration_count() {
        if let Some(cfg) = set.configuration(i) {
            for node in cfg.flatten().iter() {
                parts.push(describe_descriptor(node));
            }
        }
    }
    for name in set.report_names() {
        if let Some(r) = set.report(name) {
            parts.push(format!("REPORT {}\n{}", name, describe_report(r)));
        }
    }
    parts.join("\n")
}
