//! bufmgr - buffer pool replacement simulator
//!
//! Builds a pool, fills a file with blocks, replays an access trace against
//! it from one or more threads and reports how the chosen policy behaved.

use anyhow::{bail, Context, Result};
use bufmgr::config::PoolConfig;
use bufmgr::storage::{
    BlockId, BufferPoolManager, FileDiskManager, FrameHandle, MemoryDiskManager,
    ReplacementPolicy, StorageError,
};
use bufmgr::transaction::TransactionIdGenerator;
use clap::Parser as ClapParser;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TRACE_FILE: &str = "trace.tbl";

/// Replays a block access trace against the buffer pool
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML, JSON or YAML); BUFMGR_* variables also apply
    #[arg(short, long)]
    config: Option<String>,

    /// Number of frames, overrides the config
    #[arg(short = 'n', long)]
    capacity: Option<usize>,

    /// Replacement policy: naive, lru or clock (or 0, 1, 2)
    #[arg(short, long)]
    policy: Option<String>,

    /// Data directory, overrides the config
    #[arg(short = 'D', long)]
    data_dir: Option<PathBuf>,

    /// Keep blocks in memory instead of on disk
    #[arg(short, long)]
    memory: bool,

    /// Blocks in the trace file
    #[arg(short, long, default_value = "32")]
    blocks: u32,

    /// Accesses per thread
    #[arg(short, long, default_value = "1000")]
    accesses: usize,

    /// Pins each thread holds at once
    #[arg(long, default_value = "2")]
    hold: usize,

    /// Worker threads
    #[arg(short, long, default_value = "1")]
    threads: usize,

    /// Scan blocks in order instead of at random
    #[arg(long)]
    sequential: bool,

    /// Seed for the random trace
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = PoolConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    if let Some(policy) = &args.policy {
        config.policy = policy.parse::<ReplacementPolicy>()?;
    }
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if args.threads == 0 || args.blocks == 0 {
        bail!("--threads and --blocks must be at least 1");
    }
    if args.hold * args.threads >= config.capacity {
        warn!(
            "{} threads holding {} pins each can exhaust {} frames",
            args.threads, args.hold, config.capacity
        );
    }

    let pool = if args.memory {
        BufferPoolManager::from_config(MemoryDiskManager::new(), &config)?
    } else {
        let disk = FileDiskManager::new(&config.data_dir)
            .with_context(|| format!("Failed to open data directory: {:?}", config.data_dir))?;
        BufferPoolManager::from_config(disk, &config)?
    };

    let txns = Arc::new(TransactionIdGenerator::new());
    seed_blocks(&pool, args.blocks)?;

    let started = Instant::now();
    let workers: Vec<_> = (0..args.threads)
        .map(|worker| {
            let pool = pool.clone();
            let txns = Arc::clone(&txns);
            let trace = Trace {
                blocks: args.blocks,
                accesses: args.accesses,
                hold: args.hold,
                sequential: args.sequential,
                seed: args.seed + worker as u64,
            };
            thread::spawn(move || run_trace(&pool, &txns, &trace))
        })
        .collect();
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
    }
    let elapsed = started.elapsed();

    let stats = pool.stats();
    println!("policy      : {}", pool.policy());
    println!("frames      : {}", pool.capacity());
    println!("accesses    : {}", args.accesses * args.threads);
    println!("hits        : {}", stats.hits);
    println!("misses      : {}", stats.misses);
    println!("hit ratio   : {:.3}", stats.hit_ratio());
    println!("evictions   : {}", stats.evictions);
    println!("flushes     : {}", stats.flushes);
    println!("elapsed     : {:?}", elapsed);
    println!();
    for frame in pool.snapshot() {
        println!("{}", frame);
    }

    Ok(())
}

/// Make sure the trace file has `blocks` blocks, each tagged with its number.
fn seed_blocks(pool: &BufferPoolManager, blocks: u32) -> Result<()> {
    let mut created = 0;
    for n in 0..blocks {
        let block = BlockId::new(TRACE_FILE, n);
        let handle = match pool.pin(&block) {
            Ok(handle) => handle,
            Err(StorageError::BlockNotFound(_)) => {
                created += 1;
                pool.pin_new(TRACE_FILE, |page| {
                    page.set_i32(0, n as i32)
                        .expect("an i32 at offset 0 fits in any page");
                })?
            }
            Err(err) => return Err(err.into()),
        };
        pool.unpin(&handle)?;
    }
    info!("trace file ready: {} blocks ({} new)", blocks, created);
    Ok(())
}

struct Trace {
    blocks: u32,
    accesses: usize,
    hold: usize,
    sequential: bool,
    seed: u64,
}

fn run_trace(pool: &BufferPoolManager, txns: &TransactionIdGenerator, trace: &Trace) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(trace.seed);
    let mut held: VecDeque<FrameHandle> = VecDeque::with_capacity(trace.hold + 1);
    let mut txn = txns.next();

    for i in 0..trace.accesses {
        let n = if trace.sequential {
            (i % trace.blocks as usize) as u32
        } else {
            rng.gen_range(0..trace.blocks)
        };
        let block = BlockId::new(TRACE_FILE, n);

        let handle = loop {
            match pool.pin_with_retry(&block, Duration::from_millis(50)) {
                Ok(handle) => break handle,
                Err(StorageError::Exhausted) if !held.is_empty() => {
                    debug!("pool exhausted, releasing {} held pins", held.len());
                    for handle in held.drain(..) {
                        pool.unpin(&handle)?;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        };

        let tag = pool.read_page(&handle, |page| page.get_i32(0))??;
        if tag != n as i32 {
            bail!("{} carries tag {}", block, tag);
        }
        if i % 4 == 0 {
            pool.write_page(&handle, txn, |page| page.set_i32(4, i as i32))??;
        }

        held.push_back(handle);
        while held.len() > trace.hold {
            if let Some(oldest) = held.pop_front() {
                pool.unpin(&oldest)?;
            }
        }

        if i % 64 == 63 {
            pool.flush_all(txn)?;
            txn = txns.next();
        }
    }

    for handle in held {
        pool.unpin(&handle)?;
    }
    pool.flush_all(txn)?;
    Ok(())
}
