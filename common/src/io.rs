//! Loading job input from files and writing job output.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use clap::ValueEnum;
use glob::glob;
use tracing::debug;

use crate::KeyValue;

/// How input lines become records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Key is `<file name>:<line number>`, value is the whole line.
    #[default]
    Lines,
    /// Each line is `key value`, split at the first whitespace.
    Pairs,
}

/// Read every file matching `pattern`, in sorted path order, as one ordered
/// record sequence. Blank lines are skipped.
pub fn load_records(pattern: &str, format: InputFormat) -> Result<Vec<KeyValue>> {
    let mut paths = glob(pattern)
        .with_context(|| format!("invalid input pattern `{pattern}`"))?
        .collect::<Result<Vec<PathBuf>, _>>()?;
    paths.sort();

    if paths.is_empty() {
        return Err(anyhow!("no input files match `{pattern}`"));
    }

    let mut records = Vec::new();
    for path in &paths {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let before = records.len();
        parse_records(path, &contents, format, &mut records)?;
        debug!(
            "loaded {} records from {}",
            records.len() - before,
            path.display()
        );
    }

    Ok(records)
}

fn parse_records(
    path: &Path,
    contents: &str,
    format: InputFormat,
    out: &mut Vec<KeyValue>,
) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let kv = match format {
            InputFormat::Lines => KeyValue::new(
                format!("{name}:{}", line_no + 1),
                Bytes::copy_from_slice(line.as_bytes()),
            ),
            InputFormat::Pairs => {
                let line = line.trim();
                let (key, value) = line
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("{name}:{}: expected `key value`", line_no + 1))?;
                KeyValue::new(key.to_string(), value.trim_start().to_string())
            }
        };
        out.push(kv);
    }

    Ok(())
}

/// Write one `key value` line per pair to `output`, or to stdout.
pub fn write_results(results: &[KeyValue], output: Option<&Path>, sort: bool) -> Result<()> {
    let mut sorted;
    let results = if sort {
        sorted = results.to_vec();
        sorted.sort();
        &sorted[..]
    } else {
        results
    };

    match output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_lines(results, BufWriter::new(file))
        }
        None => write_lines(results, io::stdout().lock()),
    }
}

fn write_lines(results: &[KeyValue], mut out: impl Write) -> Result<()> {
    for kv in results {
        writeln!(out, "{kv}")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "k2 1\n\nk3 1\n").unwrap();
        fs::write(dir.path().join("a.txt"), "k1 1\n").unwrap();

        let pattern = format!("{}/*.txt", dir.path().display());
        let records = load_records(&pattern, InputFormat::Pairs).unwrap();
        assert_eq!(
            records,
            vec![
                KeyValue::new("k1", "1"),
                KeyValue::new("k2", "1"),
                KeyValue::new("k3", "1"),
            ]
        );

        let records = load_records(&pattern, InputFormat::Lines).unwrap();
        assert_eq!(records[0], KeyValue::new("a.txt:1", "k1 1"));
        assert_eq!(records[2], KeyValue::new("b.txt:3", "k3 1"));
    }

    #[test]
    fn pairs_need_a_separator() {
        let mut out = Vec::new();
        let err = parse_records(Path::new("x"), "lonely\n", InputFormat::Pairs, &mut out);
        assert!(err.is_err());
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.none", dir.path().display());
        assert!(load_records(&pattern, InputFormat::Lines).is_err());
    }

    #[test]
    fn writes_sorted_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let results = vec![KeyValue::new("k2", "2"), KeyValue::new("k1", "3")];

        write_results(&results, Some(&path), true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "k1 3\nk2 2\n");
    }
}
