//! HTML report page.

use std::fmt::Write;

use crate::storage::Snapshot;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// One table row per metric, ordered by type then name (the snapshot's
/// ordering).
pub fn render_report(snapshot: &Snapshot) -> String {
    let mut rows = String::new();
    for (mtype, by_name) in snapshot {
        for (name, value) in by_name {
            // writing into a String cannot fail
            let _ = writeln!(
                rows,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(mtype),
                escape(name),
                escape(value)
            );
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Metrics</title></head>\n<body>\n\
         <table>\n<tr><th>Type</th><th>Name</th><th>Value</th></tr>\n{rows}</table>\n</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_sorted_and_escaped() {
        let mut snap = Snapshot::new();
        snap.entry("gauge".into()).or_default().insert("b".into(), "2".into());
        snap.entry("gauge".into()).or_default().insert("a<script>".into(), "1".into());
        snap.entry("counter".into()).or_default().insert("z".into(), "9".into());

        let page = render_report(&snap);
        let z = page.find("<td>z</td>").unwrap();
        let a = page.find("<td>a&lt;script&gt;</td>").unwrap();
        let b = page.find("<td>b</td>").unwrap();
        assert!(z < a && a < b);
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn empty_snapshot_renders_header_only() {
        let page = render_report(&Snapshot::new());
        assert!(page.contains("<th>Type</th>"));
        assert!(!page.contains("<td>"));
    }
}
