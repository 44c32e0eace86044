//! Line-based unified diff between two version bodies.

use similar::TextDiff;

/// Unified diff of `a` against `b`, labelled with the given side names.
/// Empty when the two texts have the same lines.
pub fn unified_diff(a: &str, b: &str, label_a: &str, label_b: &str) -> String {
    if a.lines().eq(b.lines()) {
        return String::new();
    }

    // Normalise line endings so a missing trailing newline is not a change
    let a = normalise(a);
    let b = normalise(b);
    TextDiff::from_lines(&a, &b)
        .unified_diff()
        .context_radius(3)
        .header(label_a, label_b)
        .to_string()
}

fn normalise(text: &str) -> String {
    text.lines().map(|line| format!("{line}\n")).collect()
}
