//! Input Array Provider
//!
//! Generates and loads the plain-text input file: one signed integer per
//! line. Generation plants up to [`MAX_HIDDEN_KEYS`] hidden keys at random
//! positions as negative sentinels `-(j + 1)`; every other element is drawn
//! from `1..=100`. When two keys land on the same position the lower `j`
//! wins, so a file may contain fewer than the full set of sentinels.

use anyhow::Context;
use rand::Rng;
use segscan_ipc::MAX_HIDDEN_KEYS;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Generate an input file of `length` values with planted hidden keys.
pub fn generate_input_file(path: impl AsRef<Path>, length: usize) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create input file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut rng = rand::thread_rng();
    let mut hidden_positions: HashMap<usize, i32> = HashMap::new();
    for j in 0..MAX_HIDDEN_KEYS {
        hidden_positions
            .entry(rng.gen_range(0..length))
            .or_insert(-(j as i32 + 1));
    }

    for i in 0..length {
        match hidden_positions.get(&i) {
            Some(sentinel) => writeln!(writer, "{sentinel}")?,
            None => writeln!(writer, "{}", rng.gen_range(1..=100))?,
        }
    }
    writer.flush()?;

    Ok(())
}

/// Load `length` values from an input file, one integer per line.
pub fn load_input(path: impl AsRef<Path>, length: usize) -> anyhow::Result<Vec<i32>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut values = Vec::with_capacity(length);
    for (line_no, line) in reader.lines().enumerate() {
        if values.len() == length {
            break;
        }
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: i32 = trimmed.parse().with_context(|| {
            format!(
                "invalid integer {:?} at {}:{}",
                trimmed,
                path.display(),
                line_no + 1
            )
        })?;
        values.push(value);
    }

    if values.len() < length {
        anyhow::bail!(
            "input file {} has {} values, expected {}",
            path.display(),
            values.len(),
            length
        );
    }

    Ok(values)
}
