use std::fmt::Write as _;
use std::io::{self, BufWriter, Write};
use std::sync::Mutex;
use std::thread::scope;
use std::time::Instant;

use anyhow::anyhow;
use globalid::{FixedNodeId, GlobalIdGenerator};

use crate::cli::config::{DecodeConfig, GenerateConfig, IdFormat};

/// IDs a worker renders before taking the output lock.
const CHUNK_SIZE: usize = 4096;

/// Initializes one generator and issues `config.count` IDs across
/// `config.threads` scoped threads, printing them as they are issued.
///
/// Each worker flushes its IDs in chunks, so lines from one chunk stay in
/// issuance order while chunks from different threads interleave.
pub fn generate(config: &GenerateConfig) -> anyhow::Result<()> {
    let generator = GlobalIdGenerator::default();
    generator.initialize(&FixedNodeId(config.node_id))?;

    let out = Mutex::new(BufWriter::new(io::stdout()));

    let start = Instant::now();
    issue_batches(&generator, config, &out)?;
    let elapsed = start.elapsed();

    out.into_inner()
        .map_err(|_| anyhow!("output lock poisoned"))?
        .flush()?;

    let rate = config.count as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    tracing::info!(
        "Issued {} IDs in {:?} ({:.0} ids/sec)",
        config.count,
        elapsed,
        rate
    );
    Ok(())
}

/// Prints the fields of each ID.
pub fn decode(config: &DecodeConfig) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for id in &config.ids {
        writeln!(out, "{}", IdFormat::Parts.render(*id))?;
    }
    out.flush()?;
    Ok(())
}

fn issue_batches<W>(
    generator: &GlobalIdGenerator,
    config: &GenerateConfig,
    out: &Mutex<W>,
) -> anyhow::Result<()>
where
    W: Write + Send,
{
    scope(|s| {
        let handles: Vec<_> = batch_sizes(config.count, config.threads)
            .map(|size| s.spawn(move || issue_batch(generator, size, config.format, out)))
            .collect();

        handles.into_iter().try_for_each(|handle| {
            handle
                .join()
                .map_err(|_| anyhow!("ID worker thread panicked"))?
        })
    })
}

/// Issues `size` IDs, writing each full chunk to `out` before issuing more.
fn issue_batch<W: Write>(
    generator: &GlobalIdGenerator,
    size: usize,
    format: IdFormat,
    out: &Mutex<W>,
) -> anyhow::Result<()> {
    let mut lines = String::new();
    let mut remaining = size;
    while remaining > 0 {
        let chunk = remaining.min(CHUNK_SIZE);
        lines.clear();
        for _ in 0..chunk {
            let id = generator.try_next_id()?;
            writeln!(lines, "{}", format.render(id))?;
        }
        out.lock()
            .map_err(|_| anyhow!("output lock poisoned"))?
            .write_all(lines.as_bytes())?;
        remaining -= chunk;
    }
    Ok(())
}

/// Splits `count` into `threads` sizes differing by at most one.
fn batch_sizes(count: usize, threads: usize) -> impl Iterator<Item = usize> {
    let base = count / threads;
    let extra = count % threads;
    (0..threads).map(move |i| base + usize::from(i < extra))
}
