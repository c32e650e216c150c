use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// One `host:port` endpoint to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

/// Default TLS port applied when a target line carries no `:port` suffix.
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Parse a target-list file content into an ordered list of endpoints.
///
/// Supported formats per line:
/// - `host` (port defaults to 443)
/// - `host:port`
/// - lines starting with `#` are comments
/// - whitespace and blank lines are ignored
///
/// A malformed or out-of-range port is a fatal parse error for the whole
/// invocation, reported with its line number.
pub fn parse_targets_str(s: &str) -> Result<Vec<Target>> {
    let mut out: Vec<Target> = Vec::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (host, port) = match line.split_once(':') {
            Some((h, p)) => {
                let port = parse_port_str(p.trim())
                    .with_context(|| format!("line {line_no}: invalid port value: {p}"))?;
                (h.trim(), port)
            }
            None => (line, DEFAULT_TLS_PORT),
        };

        if host.is_empty() {
            bail!("line {line_no}: empty host");
        }
        out.push(Target {
            host: host.to_string(),
            port,
        });
    }

    Ok(out)
}

/// Load a target list from a file path. Errors if the file cannot be read or parsed.
pub fn load_targets_from_path(path: impl AsRef<Path>) -> Result<Vec<Target>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read targets file: {}", path.as_ref().display()))?;
    parse_targets_str(&content)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
