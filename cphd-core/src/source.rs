//! Источники данных с позиционным чтением.
//!
//! Потоки [`crate::wideband`] читают один и тот же источник одновременно,
//! поэтому чтение идёт по явному смещению, без общего курсора.

use std::{fs::File, io};

/// Хранилище, поддерживающее чтение по абсолютному смещению.
///
/// Реализация обязана допускать одновременные вызовы `read_exact_at` из
/// нескольких потоков. Если нижележащее хранилище этого не умеет,
/// синхронизация остаётся на стороне реализации.
pub trait PositionedRead: Sync {
    /// Заполняет `buf` целиком, начиная с `offset`. Короткое чтение даёт ошибку
    /// `UnexpectedEof`.
    fn read_exact_at(
        &self,
        buf: &mut [u8],
        offset: u64,
    ) -> io::Result<()>;

    /// Полный размер источника в байтах.
    fn len(&self) -> io::Result<u64>;

    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl PositionedRead for File {
    #[cfg(unix)]
    fn read_exact_at(
        &self,
        buf: &mut [u8],
        offset: u64,
    ) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_exact_at(
        &self,
        mut buf: &mut [u8],
        mut offset: u64,
    ) -> io::Result<()> {
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.seek_read(buf, offset) {
                Ok(0) => break,
                Ok(n) => {
                    buf = &mut std::mem::take(&mut buf)[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        if buf.is_empty() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer",
            ))
        }
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl PositionedRead for [u8] {
    fn read_exact_at(
        &self,
        buf: &mut [u8],
        offset: u64,
    ) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| eof())?;
        let end = start.checked_add(buf.len()).ok_or_else(eof)?;
        let src = self.get(start..end).ok_or_else(eof)?;

        buf.copy_from_slice(src);
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(<[u8]>::len(self) as u64)
    }
}

impl PositionedRead for Vec<u8> {
    fn read_exact_at(
        &self,
        buf: &mut [u8],
        offset: u64,
    ) -> io::Result<()> {
        self.as_slice().read_exact_at(buf, offset)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(Vec::len(self) as u64)
    }
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of source")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_slice_read_at() {
        let data: Vec<u8> = (0..32).collect();
        let mut buf = [0u8; 4];

        data.read_exact_at(&mut buf, 10).unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);
        assert_eq!(PositionedRead::len(&data).unwrap(), 32);
    }

    #[test]
    fn test_slice_short_read_is_eof() {
        let data = vec![0u8; 8];
        let mut buf = [0u8; 4];

        let err = data.read_exact_at(&mut buf, 6).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_file_read_at() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        tmp.flush().unwrap();

        let file = File::open(tmp.path()).unwrap();
        let mut buf = [0u8; 3];

        file.read_exact_at(&mut buf, 4).unwrap();
        assert_eq!(&buf, b"456");
        assert_eq!(PositionedRead::len(&file).unwrap(), 10);
        assert!(file.read_exact_at(&mut buf, 8).is_err());
    }
}
