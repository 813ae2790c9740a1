use std::io::{ErrorKind, Read};

use pantrack_traits::{BoxError, Frame, FrameSource};

use crate::error::HwError;

/// Frames from a raw RGB24 byte stream (e.g. `ffmpeg -f rawvideo -pix_fmt rgb24 -`).
///
/// Each frame is exactly `width * height * 3` bytes. A clean end of stream or a
/// truncated frame is reported as `HwError::StreamClosed`.
pub struct RawFrameReader<R> {
    inner: R,
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(inner: R, width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 3;
        Self {
            inner,
            width,
            height,
            buf: vec![0; len],
        }
    }
}

impl<R: Read> FrameSource for RawFrameReader<R> {
    fn next_frame(&mut self) -> Result<Frame, BoxError> {
        match self.inner.read_exact(&mut self.buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(Box::new(HwError::StreamClosed));
            }
            Err(e) => return Err(Box::new(HwError::Io(e))),
        }
        Frame::from_rgb(self.width, self.height, self.buf.clone())
            .ok_or_else(|| Box::new(HwError::StreamClosed) as BoxError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_whole_frames_then_reports_closed() {
        let mut bytes = vec![1u8; 2 * 2 * 3];
        bytes.extend_from_slice(&[9u8; 5]);
        let mut r = RawFrameReader::new(Cursor::new(bytes), 2, 2);
        let f = r.next_frame().unwrap();
        assert_eq!(f.pixel(1, 1), [1, 1, 1]);
        let err = r.next_frame().expect_err("truncated frame");
        assert!(err.to_string().contains("closed"));
    }
}
