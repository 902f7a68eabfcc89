use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Raw log export decoded to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInput {
    pub text: String,
    pub encoding: String,
    /// Whether malformed byte sequences were replaced with U+FFFD.
    pub had_replacements: bool,
    pub source: String,
}

impl LogInput {
    pub fn from_bytes(data: &[u8], source: impl Into<String>) -> Self {
        let source = source.into();
        let encoding = detect_encoding(data);
        // `decode` sniffs a BOM itself and replaces malformed sequences.
        let (text, used, had_replacements) = encoding.decode(data);
        if had_replacements {
            warn!(
                "Replaced malformed {} sequences while decoding {}",
                used.name(),
                source
            );
        }
        debug!("Decoded {} bytes from {} as {}", data.len(), source, used.name());
        Self {
            text: text.into_owned(),
            encoding: used.name().to_string(),
            had_replacements,
            source,
        }
    }

    pub fn from_text(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encoding: UTF_8.name().to_string(),
            had_replacements: false,
            source: source.into(),
        }
    }

    /// Lines without their terminators. See [`split_lines`].
    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.text)
    }
}

/// Splits on every Unicode line boundary: `\n`, `\r\n`, a lone `\r`,
/// VT, FF, the file/group/record separators, NEL, U+2028 and U+2029.
/// A trailing terminator does not produce an empty last line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_line_boundary(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0B}'
            | '\u{0C}'
            | '\u{1C}'
            | '\u{1D}'
            | '\u{1E}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Picks the decoder for a log export. UTF-8 unless a BOM or a UTF-16 byte
/// layout says otherwise; invalid UTF-8 is replaced rather than reinterpreted.
fn detect_encoding(data: &[u8]) -> &'static Encoding {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(data) {
        return encoding;
    }
    match detect_utf16_pattern(data) {
        Some(encoding) => encoding,
        None => UTF_8,
    }
}

/// BOM-less UTF-16 shows up as a NUL in every other byte of ASCII text.
fn detect_utf16_pattern(data: &[u8]) -> Option<&'static Encoding> {
    let sample = &data[..data.len().min(1024)];
    if sample.len() < 4 {
        return None;
    }
    let pairs = sample.len() / 2;
    let even_nuls = sample.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_nuls = sample.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();

    if odd_nuls * 10 >= pairs * 8 && even_nuls * 10 <= pairs {
        Some(UTF_16LE)
    } else if even_nuls * 10 >= pairs * 8 && odd_nuls * 10 <= pairs {
        Some(UTF_16BE)
    } else {
        None
    }
}

pub async fn read_log_file(file_path: &str) -> Result<LogInput> {
    info!("Reading log file: {}", file_path);
    let data = match tokio::fs::read(file_path).await {
        Ok(data) => {
            debug!("Read {} bytes from file {}", data.len(), file_path);
            data
        }
        Err(e) => {
            error!("Failed to read file {}: {}", file_path, e);
            return Err(e).with_context(|| format!("Failed to read log file {}", file_path));
        }
    };
    Ok(LogInput::from_bytes(&data, file_path))
}

pub async fn read_stdin() -> Result<LogInput> {
    info!("Reading log data from stdin");
    let mut data = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut data)
        .await
        .context("Failed to read from stdin")?;
    debug!("Read {} bytes from stdin", data.len());
    Ok(LogInput::from_bytes(&data, "stdin"))
}

/// Runs `command` through the shell (e.g. `journalctl -u freeswitch --since today`)
/// and decodes stdout followed by stderr.
pub async fn execute_and_capture(command: &str) -> Result<LogInput> {
    info!("Executing command: {}", command);
    if command.trim().is_empty() {
        error!("Empty command provided");
        return Err(anyhow::anyhow!("Empty command"));
    }

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .with_context(|| format!("Failed to execute command '{}'", command))?;

    debug!("Command completed with status: {}", output.status);
    if !output.status.success() {
        warn!("Command exited with status: {}", output.status);
    }

    let mut data = output.stdout;
    if !output.stderr.is_empty() {
        debug!("Captured {} bytes of stderr", output.stderr.len());
        if !data.is_empty() && !data.ends_with(b"\n") {
            data.push(b'\n');
        }
        data.extend_from_slice(&output.stderr);
    }
    Ok(LogInput::from_bytes(&data, format!("command: {}", command)))
}
