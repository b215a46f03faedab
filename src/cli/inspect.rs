use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

use mzquant::store::{ScanStore, ScanStoreOptions};
use mzquant::xic::tic_trace;

/// Display a summary of the scans in an mzML file
pub fn run(file: PathBuf, all_levels: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let options = ScanStoreOptions {
        ms_level: if all_levels { None } else { Some(1) },
        ..Default::default()
    };
    let collection = ScanStore::load(&file, options)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let scans = &collection.scans;

    println!("mzML Scan Summary");
    println!("=================");
    println!("File: {}", file.display());
    println!();

    println!("Scans:");
    println!("  Decoded: {}", scans.len());
    println!("  Skipped (undecodable): {}", collection.skipped);
    println!("  Filtered by MS level: {}", collection.filtered);

    let mut levels: BTreeMap<u8, usize> = BTreeMap::new();
    for scan in scans {
        *levels.entry(scan.ms_level()).or_default() += 1;
    }
    for (level, count) in &levels {
        println!("  MS{}: {}", level, count);
    }
    println!();

    if let (Some(first), Some(last)) = (scans.first(), scans.last()) {
        let points: usize = scans.iter().map(|s| s.len()).sum();
        let tic = tic_trace(scans);
        let (apex, max_tic) = tic
            .intensities
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });

        println!("Signal:");
        println!(
            "  Retention time: {:.3} - {:.3} min",
            first.retention_time(),
            last.retention_time()
        );
        println!("  m/z range: {:.4} - {:.4}", tic.lower_mz, tic.upper_mz);
        println!("  Data points: {}", points);
        println!(
            "  Max TIC: {:.3e} at {:.3} min",
            max_tic,
            tic.times.get(apex).copied().unwrap_or_default()
        );
    }

    Ok(())
}
