//! # pagevault Demo
//!
//! Exercises the engine with a deliberately tiny resident cap so the
//! freeze/restore churn is visible.
//!
//! ## Usage
//!
//! ```bash
//! # In-memory compressed backing (default)
//! pagevault
//!
//! # Spill to an encrypted file, chatty logging
//! pagevault --spill /tmp/demo.spill --encrypt --verbose
//!
//! # Bigger workload, larger cap
//! pagevault --pages 64 --cap 16
//! ```

use std::env;
use std::mem::size_of;
use std::path::PathBuf;

use eyre::{bail, Result};

use pagevault::config::{DEMO_RESIDENT_CAP, PAGE_SIZE};
use pagevault::{BackingMode, PageVault, VaultBuffer, VaultConfig};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut config = VaultConfig {
        resident_cap: DEMO_RESIDENT_CAP,
        ..VaultConfig::default()
    };
    let mut pages: usize = 10;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("pagevault {}", pagevault::version());
                return Ok(());
            }
            "--spill" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    bail!("--spill requires a file path");
                };
                config.backing = BackingMode::File;
                config.spill_path = PathBuf::from(path);
            }
            "--raw" => {
                config.compress_before_spill = false;
            }
            "--encrypt" => {
                config.encrypt_on_spill = true;
            }
            "--verbose" => {
                config.verbose = true;
            }
            "--cap" => {
                i += 1;
                config.resident_cap = parse_count(&args, i, "--cap")?;
            }
            "--pages" => {
                i += 1;
                pages = parse_count(&args, i, "--pages")?;
            }
            arg => {
                bail!("Unknown option: {} (try --help)", arg);
            }
        }
        i += 1;
    }

    if config.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .init();
    }

    println!("pagevault {} - fault-driven compressed memory", pagevault::version());
    println!(
        "backing: {:?}, cap: {} pages, workload: {} pages",
        config.backing, config.resident_cap, pages
    );

    let encrypted_demo = config.encrypts();
    let vault = PageVault::initialize(config)?;

    fill_and_verify(vault, pages)?;
    if encrypted_demo {
        secret_round_trip(vault)?;
    }

    let stats = vault.stats();
    println!();
    println!("faults served:        {}", stats.faults_served);
    println!("pages frozen:         {}", stats.pages_frozen);
    println!("pages restored:       {}", stats.pages_restored);
    println!("bytes spilled:        {}", stats.bytes_spilled);
    println!("spill ratio:          {:.1}:1", stats.spill_ratio());
    println!("resident now:         {}", stats.resident_pages);
    println!("frozen now:           {}", stats.frozen_pages);

    Ok(())
}

/// Writes a page-unique word into every page of a ghost buffer, then reads
/// everything back. With `pages` above the cap this swaps constantly.
fn fill_and_verify(vault: &'static PageVault, pages: usize) -> Result<()> {
    let words_per_page = PAGE_SIZE / size_of::<u32>();
    let mut buf: VaultBuffer<u32> = VaultBuffer::new(vault, pages * words_per_page)?;

    println!();
    println!("1. Writing {} pages through the fault path...", pages);
    for page in 0..pages {
        buf.set(page * words_per_page, page as u32);
    }

    println!("2. Reading every page back...");
    for page in 0..pages {
        let value = buf.get(page * words_per_page);
        if value != page as u32 {
            bail!("page {} read back {} after restore", page, value);
        }
    }
    println!("   all {} pages intact", pages);
    Ok(())
}

/// Writes a recognizable secret, forces it through the encrypted spill
/// file, and reads it back.
fn secret_round_trip(vault: &'static PageVault) -> Result<()> {
    const SECRET: &[u8] = b"TOP_SECRET_PATTERN_12345";

    println!("3. Encrypted spill round trip...");
    let mut secret_buf: VaultBuffer<u8> = VaultBuffer::new(vault, PAGE_SIZE)?;
    for (i, &byte) in SECRET.iter().enumerate() {
        secret_buf.set(i, byte);
    }

    // Enough traffic to evict the secret page.
    let mut churn: VaultBuffer<u8> = VaultBuffer::new(vault, 4 * PAGE_SIZE)?;
    for page in 0..4 {
        churn.set(page * PAGE_SIZE, page as u8);
    }

    for (i, &byte) in SECRET.iter().enumerate() {
        if secret_buf.get(i) != byte {
            bail!("secret corrupted at byte {}", i);
        }
    }
    println!("   secret restored from encrypted spill");
    Ok(())
}

fn parse_count(args: &[String], i: usize, flag: &str) -> Result<usize> {
    let Some(raw) = args.get(i) else {
        bail!("{} requires a number", flag);
    };
    let value: usize = raw
        .parse()
        .map_err(|_| eyre::eyre!("{} requires a number, got '{}'", flag, raw))?;
    if value == 0 {
        bail!("{} must be at least 1", flag);
    }
    Ok(value)
}

fn print_usage() {
    println!("pagevault - fault-driven compressed memory demo");
    println!();
    println!("USAGE:");
    println!("    pagevault [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --pages <n>      workload size in pages (default 10)");
    println!("    --cap <n>        resident-page cap (default {})", DEMO_RESIDENT_CAP);
    println!("    --spill <path>   spill frozen pages to a file instead of RAM");
    println!("    --raw            skip compression for file spill");
    println!("    --encrypt        encrypt file spill records");
    println!("    --verbose        log every fault and eviction");
    println!("    --version, -v    print version");
    println!("    --help, -h       show this help");
}
