// Example usage of the bsig writer and reader

use bsig::{BsigReader, BsigWriter, Result, Section, SignalArray, WriterConfig};
use tracing::{debug, info, Level};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let path = std::env::temp_dir().join("read_bsig_demo.bsig");

    // Write a small recording
    let mut writer = BsigWriter::create(&path, WriterConfig::default().with_block_size(256))?;
    let timestamps: Vec<i64> = (0..1000).map(|i| 1_000_000 + i * 60_000).collect();
    writer.append("MTS.Package.TimeStamp", timestamps)?;
    writer.append(
        "Cycle counter",
        (0..1000).map(|i| i as f32 * 0.1).collect::<Vec<_>>(),
    )?;
    writer.append(
        "Objects.Distance",
        SignalArray::from_flat((0..4000).map(|i| i as u16).collect::<Vec<_>>(), 4)?,
    )?;
    writer.close()?;

    // List all signals
    let reader = BsigReader::open(&path)?;
    info!(
        "bsig v{} with {} signals, block size {}",
        reader.version() as u8,
        reader.len(),
        reader.block_size()
    );
    for sig in reader.signals() {
        info!(
            "  {} ({}, {} samples x {})",
            sig.name, sig.dtype, sig.sample_count, sig.array_length
        );
    }

    // Read a whole signal
    let counter = reader.read("Cycle counter")?;
    if let Some(values) = counter.as_slice::<f32>() {
        info!(
            "Cycle counter: first={:?} last={:?}",
            values.first(),
            values.last()
        );
    }

    // Read the last ten rows of an array signal
    let tail = reader.read_range("Objects.Distance", -10, None)?;
    if let Some(rows) = tail.rows::<u16>() {
        for row in rows {
            debug!("  {:?}", row);
        }
    }

    // Read a relative time window
    let section = Section::new(0, 600_000, true);
    let window = reader.read_section("Cycle counter", "MTS.Package.TimeStamp", &section)?;
    info!("First 600ms hold {} samples", window.len());

    // Wildcards
    info!("Matches for Objects.*: {:?}", reader.expand_names(&["Objects.*"]));

    std::fs::remove_file(&path)?;
    Ok(())
}
