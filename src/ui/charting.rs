/// The y axis never shrinks below this many WPM.
pub const MIN_WPM_AXIS: f64 = 50.0;

/// X (seconds) and Y (WPM) bounds for the results chart
pub fn compute_chart_params(coords: &[(f64, f64)]) -> (f64, f64) {
    let highest_wpm = coords
        .iter()
        .map(|&(_, wpm)| wpm)
        .fold(MIN_WPM_AXIS, f64::max);

    let overall_duration = coords.last().map(|&(t, _)| t).unwrap_or(1.0).max(1.0);

    (overall_duration, highest_wpm.ceil())
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.1}")
    }
}
