/// Formats a duration as `HH:MM:SS.mmm`.
pub fn time_str(sec: f64) -> String {
    let ms = (sec * 1000f64).max(0.0) as u64;
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let milliseconds = ms % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Duration of `samples` sample frames at `sample_rate`.
pub fn samples_to_secs(samples: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / sample_rate as f64
}

#[test]
fn formats_durations() {
    assert_eq!(time_str(0.0), "00:00:00.000");
    assert_eq!(time_str(61.25), "00:01:01.250");
    assert_eq!(time_str(3600.0 * 123.0 + 5.0), "123:00:05.000");
    assert_eq!(time_str(samples_to_secs(44100 * 90, 44100)), "00:01:30.000");
    assert_eq!(samples_to_secs(100, 0), 0.0);
}
