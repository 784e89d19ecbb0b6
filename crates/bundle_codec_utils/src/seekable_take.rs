use std::{
    io::{self, Read, Seek, Take},
    ops::RangeInclusive,
};

/// A basic [`Read`] + [`Seek`] adapter that works like [`Take`], but also
/// allows seeking within the taken range.
///
/// The bundle codec uses this to bound every length-prefixed read (a
/// property value, a child list, ...) to the bytes actually declared
/// available by the surrounding section, so a corrupt or hostile length
/// prefix can never force an allocation bigger than the input itself.
#[derive(Debug)]
pub struct SeekableTake<T: Read + Seek> {
    inner: Take<T>,
    range: RangeInclusive<u64>,
}

impl<T: Read + Seek> SeekableTake<T> {
    /// Bytes still available before the take boundary is reached.
    pub fn remaining(&self) -> u64 {
        self.inner.limit()
    }
}

impl<T: Read + Seek> Read for SeekableTake<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Read + Seek> Seek for SeekableTake<T> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        use io::SeekFrom::*;

        let current_pos: i64 = self.stream_position()?.try_into().unwrap();

        match pos {
            Current(n) => {
                let current_limit = self.inner.limit() as i64;
                let new_position = current_pos + n;
                let new_limit = current_limit - n;

                if new_position < 0 || new_limit < 0 || !self.range.contains(&(new_position as u64))
                {
                    Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seeking outside the SeekableTake range",
                    ))
                } else {
                    self.inner.set_limit(new_limit as u64);
                    self.inner.get_mut().seek(pos)
                }
            }
            Start(n) => {
                let new_position = n as i64;
                let new_limit = *self.range.end() as i64 - new_position;
                if new_position < 0 || new_limit < 0 || !self.range.contains(&(new_position as u64))
                {
                    Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seeking outside the SeekableTake range",
                    ))
                } else {
                    self.inner.set_limit(new_limit as u64);
                    self.inner.get_mut().seek(pos)
                }
            }
            End(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "seeking from the end of a SeekableTake is not supported",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.inner.get_mut().stream_position()
    }
}

pub trait SeekableTakeExt: Read + Seek + Sized {
    /// Bounds reads (and seeks) to the next `n` bytes of this stream.
    fn seekable_take(&mut self, n: u64) -> io::Result<SeekableTake<&mut Self>>;
}

impl<T: Read + Seek> SeekableTakeExt for T {
    fn seekable_take(&mut self, n: u64) -> io::Result<SeekableTake<&mut Self>> {
        let start = self.stream_position()?;
        Ok(SeekableTake {
            range: start..=start + n,
            inner: self.take(n),
        })
    }
}
