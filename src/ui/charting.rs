use tovel::typing::TypingStats;

/// One point per typed chunk: (chunk index from 1, wpm).
pub fn chunk_points(history: &[TypingStats]) -> Vec<(f64, f64)> {
    history
        .iter()
        .enumerate()
        .map(|(i, stats)| ((i + 1) as f64, stats.wpm as f64))
        .collect()
}

/// X (chunks) and Y (WPM) upper bounds for the summary chart
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let highest_wpm = points.iter().map(|&(_, wpm)| wpm).fold(0.0, f64::max);

    let last_chunk = points.last().map_or(1.0, |&(x, _)| x).max(2.0);

    (last_chunk, highest_wpm.round().max(1.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
