use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;

/// Packet count from the input size. Packets have a fixed size, so no scan
/// is needed.
pub fn estimate_total_packets(input_path: &Path, frame_size: usize) -> Result<u64> {
    let bytes = std::fs::metadata(input_path)?.len();
    let packets = bytes / frame_size.max(1) as u64;

    let remainder = bytes % frame_size.max(1) as u64;
    if remainder != 0 {
        log::debug!("Input ends with {remainder} bytes of a partial packet");
    }
    log::info!("Expecting {packets} packets ({bytes} bytes)");

    Ok(packets)
}

pub fn create_progress_bar(
    multi: &MultiProgress,
    total_packets: Option<u64>,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_packets {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} packets ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);

        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} packets\n{msg} | elapsed: {elapsed_precise}",
        )?);

        pb
    };
    pb.set_message("initializing decoder");
    Ok(pb)
}

#[test]
fn estimate_from_file_size() -> Result<()> {
    let path = std::env::temp_dir().join(format!("qdm2d-progress-{}", std::process::id()));
    std::fs::write(&path, vec![0u8; 64 * 5 + 3])?;

    let packets = estimate_total_packets(&path, 64)?;
    std::fs::remove_file(&path)?;

    assert_eq!(packets, 5);
    Ok(())
}
