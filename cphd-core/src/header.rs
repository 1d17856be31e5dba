//! ASCII-заголовок CPHD файла.
//!
//! ```text
//! CPHD/1.0.1\n
//! KEY := VALUE\n
//! ...
//! \f\n
//! ```
//! Заголовок задаёт смещения и размеры блоков XML, PVP и сигнальных данных.
//! Смещения абсолютные, от начала файла.

use std::collections::HashMap;

use cphd_types::{CphdError, CphdResult};
use log::debug;

use crate::source::PositionedRead;

/// Префикс первой строки заголовка
pub const CPHD_MAGIC: &[u8] = b"CPHD/";

/// Терминатор секции заголовка: form feed + перевод строки
pub const HEADER_TERMINATOR: &[u8; 2] = b"\x0c\n";

/// Порция, которой дочитывается заголовок
const HEADER_READ_CHUNK: usize = 4 * 1024;

/// Блок файла: абсолютное смещение и размер в байтах.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub offset: u64,
    pub size: u64,
}

/// Разобранный заголовок CPHD файла.
#[derive(Debug, Clone)]
pub struct FileHeader {
    /// Версия формата из первой строки (`1.0.1`)
    pub version: String,
    pub xml_block: BlockRange,
    pub support_block: Option<BlockRange>,
    pub pvp_block: BlockRange,
    pub signal_block: BlockRange,
    pub classification: String,
    pub release_info: String,
    /// Длина заголовка вместе с терминатором
    pub header_len: usize,
}

impl BlockRange {
    /// Конец блока (не включительно), `None` при переполнении.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

impl FileHeader {
    /// Разбирает заголовок из начала файла.
    ///
    /// `buf` должен содержать терминатор `\f\n`; всё после него игнорируется.
    pub fn parse(buf: &[u8]) -> CphdResult<Self> {
        let end = find_terminator(buf)
            .ok_or_else(|| CphdError::malformed_header("missing \\f\\n terminator"))?;

        if !buf.starts_with(CPHD_MAGIC) {
            return Err(CphdError::malformed_header("file does not start with CPHD/"));
        }

        let text = std::str::from_utf8(&buf[..end])
            .map_err(|_| CphdError::malformed_header("header is not ASCII"))?;
        let mut lines = text.lines();

        let version = lines
            .next()
            .and_then(|l| l.strip_prefix("CPHD/"))
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        if version.is_empty() {
            return Err(CphdError::malformed_header("missing version in first line"));
        }

        let mut fields = HashMap::new();

        for line in lines.filter(|l| !l.trim().is_empty()) {
            let (key, value) = line.split_once(":=").ok_or_else(|| {
                CphdError::malformed_header(format!("expected 'KEY := VALUE', got '{line}'"))
            })?;
            fields.insert(key.trim(), value.trim());
        }

        let support_block = match (
            fields.get("SUPPORT_BLOCK_SIZE"),
            fields.get("SUPPORT_BLOCK_BYTE_OFFSET"),
        ) {
            (Some(_), Some(_)) => Some(block(&fields, "SUPPORT_BLOCK")?),
            (None, None) => None,
            _ => {
                return Err(CphdError::malformed_header(
                    "SUPPORT_BLOCK_SIZE and SUPPORT_BLOCK_BYTE_OFFSET must appear together",
                ))
            }
        };

        let header = FileHeader {
            version,
            xml_block: block(&fields, "XML_BLOCK")?,
            support_block,
            pvp_block: block(&fields, "PVP_BLOCK")?,
            signal_block: block(&fields, "SIGNAL_BLOCK")?,
            classification: required(&fields, "CLASSIFICATION")?.to_string(),
            release_info: required(&fields, "RELEASE_INFO")?.to_string(),
            header_len: end + HEADER_TERMINATOR.len(),
        };

        debug!(
            "CPHD/{} header: xml={:?} pvp={:?} signal={:?}",
            header.version, header.xml_block, header.pvp_block, header.signal_block
        );

        Ok(header)
    }

    /// Дочитывает заголовок из источника порциями, пока не встретится
    /// терминатор или не будет превышен `max_bytes`.
    pub fn read_from<S: PositionedRead + ?Sized>(
        source: &S,
        max_bytes: usize,
    ) -> CphdResult<Self> {
        let file_len = source.len()?;
        let limit = (max_bytes as u64).min(file_len) as usize;
        let mut buf = Vec::with_capacity(HEADER_READ_CHUNK.min(limit));

        while buf.len() < limit {
            let n = HEADER_READ_CHUNK.min(limit - buf.len());
            let start = buf.len();

            buf.resize(start + n, 0);
            source.read_exact_at(&mut buf[start..], start as u64)?;

            // Терминатор мог разорваться на границе порций
            let from = start.saturating_sub(1);
            if find_terminator(&buf[from..]).is_some() {
                return Self::parse(&buf);
            }
        }

        Err(CphdError::malformed_header(format!(
            "terminator not found within first {limit} bytes"
        )))
    }

    /// Проверяет, что все блоки лежат внутри файла длиной `file_len`.
    pub fn validate_extents(
        &self,
        file_len: u64,
    ) -> CphdResult<()> {
        let blocks = [
            ("XML", Some(self.xml_block)),
            ("SUPPORT", self.support_block),
            ("PVP", Some(self.pvp_block)),
            ("SIGNAL", Some(self.signal_block)),
        ];

        for (name, range) in blocks {
            let Some(range) = range else { continue };

            if range.offset < self.header_len as u64 {
                return Err(CphdError::malformed_header(format!(
                    "{name} block at offset {} overlaps the header",
                    range.offset
                )));
            }

            match range.end() {
                Some(end) if end <= file_len => {}
                _ => {
                    return Err(CphdError::malformed_header(format!(
                        "{name} block {}+{} exceeds file length {file_len}",
                        range.offset, range.size
                    )))
                }
            }
        }

        Ok(())
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

fn required<'a>(
    fields: &HashMap<&str, &'a str>,
    key: &str,
) -> CphdResult<&'a str> {
    fields
        .get(key)
        .copied()
        .ok_or_else(|| CphdError::malformed_header(format!("missing {key}")))
}

fn number(
    fields: &HashMap<&str, &str>,
    key: &str,
) -> CphdResult<u64> {
    let raw = required(fields, key)?;

    raw.parse()
        .map_err(|e| CphdError::malformed_header(format!("{key} = '{raw}': {e}")))
}

fn block(
    fields: &HashMap<&str, &str>,
    prefix: &str,
) -> CphdResult<BlockRange> {
    Ok(BlockRange {
        offset: number(fields, &format!("{prefix}_BYTE_OFFSET"))?,
        size: number(fields, &format!("{prefix}_SIZE"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> String {
        [
            "CPHD/1.0.1",
            "XML_BLOCK_SIZE := 100",
            "XML_BLOCK_BYTE_OFFSET := 400",
            "PVP_BLOCK_SIZE := 64",
            "PVP_BLOCK_BYTE_OFFSET := 504",
            "SIGNAL_BLOCK_SIZE := 200",
            "SIGNAL_BLOCK_BYTE_OFFSET := 568",
            "CLASSIFICATION := UNCLASSIFIED",
            "RELEASE_INFO := UNRESTRICTED",
            "\x0c\n",
        ]
        .join("\n")
    }

    #[test]
    fn test_parse_header() {
        let text = sample_header();
        let header = FileHeader::parse(text.as_bytes()).unwrap();

        assert_eq!(header.version, "1.0.1");
        assert_eq!(header.xml_block, BlockRange { offset: 400, size: 100 });
        assert_eq!(header.pvp_block, BlockRange { offset: 504, size: 64 });
        assert_eq!(header.signal_block, BlockRange { offset: 568, size: 200 });
        assert_eq!(header.support_block, None);
        assert_eq!(header.classification, "UNCLASSIFIED");
        assert_eq!(header.header_len, text.len());
    }

    #[test]
    fn test_missing_key() {
        let text = sample_header().replace("PVP_BLOCK_SIZE := 64\n", "");
        let err = FileHeader::parse(text.as_bytes()).unwrap_err();

        assert!(err.to_string().contains("PVP_BLOCK_SIZE"));
        assert!(err.is_open_error());
    }

    #[test]
    fn test_bad_magic() {
        let text = sample_header().replace("CPHD/", "SICD/");

        assert!(FileHeader::parse(text.as_bytes()).is_err());
    }

    #[test]
    fn test_non_numeric_size() {
        let text = sample_header().replace(":= 200", ":= lots");

        assert!(FileHeader::parse(text.as_bytes()).is_err());
    }

    #[test]
    fn test_read_from_source_across_chunks() {
        let mut text = sample_header();
        // Раздуваем заголовок, чтобы терминатор оказался за первой порцией
        let filler = format!("RELEASE_INFO := {}\n", "X".repeat(HEADER_READ_CHUNK));
        text = text.replace("RELEASE_INFO := UNRESTRICTED\n", &filler);

        let mut file = text.into_bytes();
        file.extend_from_slice(&[0u8; 16]);

        let header = FileHeader::read_from(&file, 64 * 1024).unwrap();
        assert_eq!(header.release_info.len(), HEADER_READ_CHUNK);
    }

    #[test]
    fn test_read_from_without_terminator() {
        let file = b"CPHD/1.0.1\nXML_BLOCK_SIZE := 1\n".to_vec();

        assert!(FileHeader::read_from(&file, 1024).is_err());
    }

    #[test]
    fn test_validate_extents() {
        let header = FileHeader::parse(sample_header().as_bytes()).unwrap();

        header.validate_extents(768).unwrap();
        assert!(header.validate_extents(767).is_err());
    }
}
