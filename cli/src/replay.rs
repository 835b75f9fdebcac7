//! NDJSON payload files: one raw provider payload per line.

use std::path::Path;

use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// A line that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadLine {
    pub line: u64,
    pub error: String,
}

/// Read every payload from `path`. Blank lines and `#` comments are skipped;
/// malformed lines are collected instead of aborting the read.
pub async fn read_payloads<P: AsRef<Path>>(path: P) -> std::io::Result<(Vec<Value>, Vec<BadLine>)> {
    let file = File::open(&path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut payloads = Vec::new();
    let mut bad = Vec::new();
    let mut idx = 0u64;

    while let Some(line) = lines.next_line().await? {
        idx += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => payloads.push(value),
            Err(e) => bad.push(BadLine {
                line: idx,
                error: e.to_string(),
            }),
        }
    }

    Ok((payloads, bad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_payloads_and_reports_bad_lines() {
        let path = std::env::temp_dir().join(format!("herald-replay-{}.ndjson", std::process::id()));
        std::fs::write(
            &path,
            "# sample\n{\"type\": \"follow\"}\n\n{not json}\n{\"type\": \"raid\"}\n",
        )
        .unwrap();

        let (payloads, bad) = read_payloads(&path).await.unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1]["type"], "raid");
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].line, 4);

        let _ = std::fs::remove_file(&path);
    }
}
