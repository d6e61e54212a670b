use anyhow::{Context, Result};
use image::GrayImage;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    fourcc: FourCC,
}

impl Camera {
    pub fn open(device: &str) -> Result<Self> {
        let dev = Device::with_path(device).context("open camera")?;
        let mut fmt = dev.format().context("get format")?;
        // Prefer GREY, fallback to YUYV, else RGB3
        for code in [b"GREY", b"YUYV", b"RGB3"] {
            let desired = Format::new(fmt.width, fmt.height, FourCC::new(code));
            fmt = dev.set_format(&desired).unwrap_or(fmt);
            if fmt.fourcc == FourCC::new(code) {
                break;
            }
        }
        let fourcc = fmt.fourcc;
        let width = fmt.width;
        let height = fmt.height;
        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 4).context("stream")?;
        Ok(Self {
            stream,
            width,
            height,
            fourcc,
        })
    }

    /// Capture one frame and return its luma plane.
    pub fn frame_gray(&mut self) -> Result<GrayImage> {
        let (data, meta) = self.stream.next().context("capture frame")?;
        log::debug!(
            "captured frame: width={} height={} fourcc={:?} seq={:?} len={}",
            self.width,
            self.height,
            self.fourcc,
            meta.sequence,
            data.len()
        );
        let buf = match self.fourcc {
            f if f == FourCC::new(b"GREY") => grey_luma(self.width, self.height, data)?,
            f if f == FourCC::new(b"YUYV") => yuyv_luma(self.width, self.height, data)?,
            f if f == FourCC::new(b"RGB3") => rgb_luma(self.width, self.height, data)?,
            other => anyhow::bail!("unsupported pixel format {:?}", other),
        };
        GrayImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| anyhow::anyhow!("failed to build image buffer"))
    }

    /// Drop `warmup` frames so exposure settles, then return the next one.
    pub fn still(&mut self, warmup: usize) -> Result<GrayImage> {
        for i in 0..warmup {
            if let Err(e) = self.stream.next() {
                log::warn!("warm-up frame {}: {}", i + 1, e);
            }
        }
        self.frame_gray()
    }
}

fn grey_luma(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let expected = (width * height) as usize;
    if data.len() < expected {
        return Err(anyhow::anyhow!("short GREY buffer"));
    }
    Ok(data[..expected].to_vec())
}

// Y0 U Y1 V: every even byte is a luma sample.
fn yuyv_luma(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(anyhow::anyhow!("short YUYV buffer"));
    }
    Ok(data[..expected].iter().step_by(2).copied().collect())
}

fn rgb_luma(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let expected = (width * height * 3) as usize;
    if data.len() < expected {
        return Err(anyhow::anyhow!("short RGB3 buffer"));
    }
    Ok(data[..expected]
        .chunks_exact(3)
        .map(|p| clamp(0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32))
        .collect())
}

fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
