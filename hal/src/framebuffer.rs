//! # Display HAL
//!
//! This module defines the host display abstraction the FrameBuffer device
//! presents through.
//!
//! ## Philosophy
//!
//! The display HAL provides a minimal, deterministic interface for pixel output.
//! No renderer, no texture management: one window-sized surface of 32-bit
//! pixels that is locked, written and presented.
//!
//! ## Design Principles
//!
//! 1. **Minimal and explicit**: Width, height, stride, and pixel format
//! 2. **Lock/unlock-and-blit**: Writes happen through a [`SurfaceLock`] borrow;
//!    dropping the lock is the unlock
//! 3. **Testable**: Can be mocked with a simple `Vec<u32>`
//! 4. **Deterministic**: Same writes, same presented pixels

use crate::error::HostError;

/// Pixel format of the presentation surface
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit 0xAARRGGBB
    Argb8888,
}

impl PixelFormat {
    /// Returns the number of bytes per pixel
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Argb8888 => 4,
        }
    }

    /// Packs an opaque RGB colour
    pub const fn pack(&self, r: u8, g: u8, b: u8) -> u32 {
        match self {
            PixelFormat::Argb8888 => 0xFF00_0000 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32,
        }
    }
}

/// Surface creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceRequest {
    /// Application content width in pixels
    pub content_width: u32,
    /// Application content height in pixels
    pub content_height: u32,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// The host may choose a different content size
    pub resizable: bool,
    pub fullscreen: bool,
    /// Smooth (filtered) scaling is acceptable
    pub smooth: bool,
    pub title: Option<String>,
}

impl SurfaceRequest {
    /// Creates a request for a window of `width` x `height` showing content
    /// of `content_width` x `content_height`
    pub fn new(content_width: u32, content_height: u32, width: u32, height: u32) -> Self {
        Self {
            content_width,
            content_height,
            width,
            height,
            resizable: false,
            fullscreen: false,
            smooth: true,
            title: None,
        }
    }

    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    pub fn with_smooth(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Presentation surface information
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SurfaceInfo {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Stride in pixels (may be larger than width for alignment)
    pub stride_pixels: usize,
    /// Pixel format
    pub format: PixelFormat,
    /// Content width the host settled on
    pub content_width: u32,
    /// Content height the host settled on
    pub content_height: u32,
}

impl SurfaceInfo {
    /// Calculate the pixel index for (x, y)
    pub const fn offset(&self, x: usize, y: usize) -> usize {
        y * self.stride_pixels + x
    }

    /// Returns total buffer size in bytes
    pub const fn buffer_size(&self) -> usize {
        self.height * self.stride_pixels * self.format.bytes_per_pixel()
    }

    /// Returns total buffer size in pixels
    pub const fn pixel_count(&self) -> usize {
        self.height * self.stride_pixels
    }
}

/// A locked surface
///
/// Writes go to `pixels`; the lock is released on drop.
#[derive(Debug)]
pub struct SurfaceLock<'a> {
    pub pixels: &'a mut [u32],
    pub info: SurfaceInfo,
}

impl SurfaceLock<'_> {
    /// Mutable row slice of `info.width` pixels
    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        let start = self.info.offset(0, y);
        &mut self.pixels[start..start + self.info.width]
    }
}

/// Host display
///
/// Implementations handle the window, renderer and presentation.
pub trait DisplayBackend {
    /// Returns the usable size of the current display in pixels
    fn display_bounds(&self) -> (u32, u32);

    /// Creates (or recreates) the window and presentation surface
    fn create_surface(&mut self, request: &SurfaceRequest) -> Result<SurfaceInfo, HostError>;

    /// Returns the current surface, if one exists
    fn surface_info(&self) -> Option<SurfaceInfo>;

    /// Locks the surface for writing
    fn lock_surface(&mut self) -> Result<SurfaceLock<'_>, HostError>;

    /// Presents the surface contents
    fn present(&mut self) -> Result<(), HostError>;

    fn set_title(&mut self, title: &str) -> Result<(), HostError>;

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), HostError>;
}
