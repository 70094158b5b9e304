//! # FrameBuffer Protocol
//!
//! A display surface fed by application-drawn buffers.
//!
//! ## Frame Cadence
//!
//! The device owns a pool of buffers. A buffer reaches the application inside
//! a Frame event and comes back with [`Pal::framebuffer_submit`]:
//!
//! ```text
//! create ──► FrameReady(b0) ──► Frame{b0} ──► app draws ──► submit(b0)
//!                                   ▲                           │
//!                                   └──── FrameReady(next) ◄────┘
//! ```
//!
//! - Single buffering re-posts the submitted buffer, so at most one frame is
//!   ever outstanding
//! - Double buffering keeps the presented buffer on screen and hands out the
//!   next free one, so the application can draw while a frame is displayed
//!
//! FrameReady notifications travel through the host event stream so they
//! stay ordered with input.
//!
//! ## Presentation
//!
//! Each destination pixel samples the source with 16.16 fixed-point nearest
//! neighbour stepping. 8 bpp content goes through the 256-entry palette;
//! 32 bpp content is copied as `0xAARRGGBB`.

use std::collections::VecDeque;

use bitflags::bitflags;
use core_types::Cap;
use hal::{HostBackend, SurfaceInfo, SurfaceLock, SurfaceRequest, UserEvent};
use serde::{Deserialize, Serialize};

use crate::buffer::{Buffer, Owner};
use crate::error::PalError;
use crate::event::{EventPayload, EventRecord};
use crate::resource::Resource;
use crate::{Pal, PalResult};

/// Palette entries
pub const PALETTE_ENTRIES: usize = 256;

/// Palette upload size in bytes
pub const PALETTE_BYTES: usize = PALETTE_ENTRIES * 4;

const DEFAULT_TITLE: &str = "Framebuffer";

bitflags! {
    /// Framebuffer creation options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FrameBufferOpts: u32 {
        const DOUBLE_BUFFER = 1;
        const PALETTE = 2;
        const SEND_SYNC = 4;
        const DYNAMIC_SIZE = 8;
        const NO_SCALE_UP = 16;
        const NO_SMOOTH = 32;
        const FULLSCREEN = 64;
    }
}

/// Device lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FbPhase {
    /// No surface yet
    Uninitialized,
    /// Surface exists, no frame in flight or held by the application
    Configured,
    /// A frame is on its way to, or held by, the application
    FramePending,
    /// A submitted frame is being drawn and presented
    Presenting,
}

#[derive(Debug)]
struct Surface {
    opts: FrameBufferOpts,
    bpp: u32,
    queue: Cap,
    requested: (u32, u32),
    info: SurfaceInfo,
    pool: Vec<Cap>,
    free: VecDeque<Cap>,
    on_screen: Option<Cap>,
    /// FrameReady posted, Frame not yet translated
    in_flight: usize,
    /// Frame delivered, buffer not yet submitted
    held: usize,
}

impl Surface {
    fn content_size(&self) -> (u32, u32) {
        (self.info.content_width, self.info.content_height)
    }

    fn buffer_bytes(&self) -> usize {
        content_bytes(self.info.content_width, self.info.content_height, self.bpp)
    }
}

/// Framebuffer device state
#[derive(Debug)]
pub struct FrameBufferDevice {
    palette: [u32; PALETTE_ENTRIES],
    title: Option<String>,
    fullscreen: bool,
    phase: FbPhase,
    surface: Option<Surface>,
}

impl Default for FrameBufferDevice {
    fn default() -> Self {
        Self {
            palette: grayscale_palette(),
            title: None,
            fullscreen: false,
            phase: FbPhase::Uninitialized,
            surface: None,
        }
    }
}

impl FrameBufferDevice {
    pub fn phase(&self) -> FbPhase {
        self.phase
    }

    pub fn palette(&self) -> &[u32; PALETTE_ENTRIES] {
        &self.palette
    }

    /// Options in effect, empty before creation
    pub fn opts(&self) -> FrameBufferOpts {
        self.surface.as_ref().map(|s| s.opts).unwrap_or_default()
    }

    /// Content size in pixels, as delivered to the application
    pub fn content_size(&self) -> Option<(u32, u32)> {
        self.surface.as_ref().map(Surface::content_size)
    }

    /// The host surface
    pub fn surface_info(&self) -> Option<SurfaceInfo> {
        self.surface.as_ref().map(|s| s.info)
    }

    /// Queue receiving this device's events
    pub fn queue(&self) -> Option<Cap> {
        self.surface.as_ref().map(|s| s.queue)
    }

    /// Every buffer in the pool
    pub fn buffers(&self) -> &[Cap] {
        self.surface.as_ref().map(|s| s.pool.as_slice()).unwrap_or(&[])
    }

    /// Buffer currently on screen (double buffering only)
    pub fn on_screen(&self) -> Option<Cap> {
        self.surface.as_ref().and_then(|s| s.on_screen)
    }

    /// Frames posted or delivered but not yet submitted
    pub fn frames_outstanding(&self) -> usize {
        self.surface.as_ref().map(|s| s.in_flight + s.held).unwrap_or(0)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }
}

/// Default palette: a grayscale ramp, opaque
fn grayscale_palette() -> [u32; PALETTE_ENTRIES] {
    let mut palette = [0; PALETTE_ENTRIES];
    for (i, entry) in palette.iter_mut().enumerate() {
        let v = i as u32;
        *entry = 0xFF00_0000 | (v << 16) | (v << 8) | v;
    }
    palette
}

fn bytes_per_pixel(bpp: u32) -> PalResult<usize> {
    match bpp {
        8 => Ok(1),
        32 => Ok(4),
        _ => Err(PalError::UnsupportedFormat { bpp }),
    }
}

fn check_content_size(width: u32, height: u32) -> PalResult<()> {
    let max = u16::MAX as u32;
    if width > max || height > max {
        return Err(PalError::SurfaceTooLarge { width, height });
    }
    Ok(())
}

fn content_bytes(width: u32, height: u32, bpp: u32) -> usize {
    let bytes = if bpp == 8 { 1 } else { 4 };
    width as usize * height as usize * bytes
}

/// Chooses the window size for `content` pixels
///
/// - `NO_SCALE_UP`: 1:1
/// - `FULLSCREEN`: the largest size that fits the display, integer-scaled
///   when `NO_SMOOTH` is set, aspect-preserving otherwise
/// - otherwise the default integer scale, reduced to fit the display
pub(crate) fn window_size(
    opts: FrameBufferOpts,
    content: (u32, u32),
    bounds: (u32, u32),
    default_scale: u32,
) -> (u32, u32) {
    let (cw, ch) = content;
    if opts.contains(FrameBufferOpts::NO_SCALE_UP) || cw == 0 || ch == 0 {
        return (cw, ch);
    }
    let (bw, bh) = bounds;
    let fit = (bw / cw).min(bh / ch).max(1);

    if opts.contains(FrameBufferOpts::FULLSCREEN) {
        if opts.contains(FrameBufferOpts::NO_SMOOTH) {
            return (cw * fit, ch * fit);
        }
        // compare bw/cw against bh/ch without rounding
        return if bw as u64 * ch as u64 <= bh as u64 * cw as u64 {
            (bw, (ch as u64 * bw as u64 / cw as u64) as u32)
        } else {
            ((cw as u64 * bh as u64 / ch as u64) as u32, bh)
        };
    }

    let scale = default_scale.min(fit).max(1);
    (cw * scale, ch * scale)
}

/// 16.16 source step per destination pixel, rounded up
fn step(src: usize, dst: usize) -> u64 {
    ((src as u64) << 16).div_ceil(dst.max(1) as u64)
}

/// Resamples `src` into the surface
///
/// `src` holds `content_width * content_height` pixels of `bpp` depth.
pub(crate) fn blit(
    src: &[u8],
    bpp: u32,
    palette: &[u32; PALETTE_ENTRIES],
    surface: &mut SurfaceLock<'_>,
) {
    let info = surface.info;
    let (cw, ch) = (info.content_width as usize, info.content_height as usize);
    if cw == 0 || ch == 0 {
        return;
    }
    let step_x = step(cw, info.width);
    let step_y = step(ch, info.height);

    for y in 0..info.height {
        let sy = (((y as u64 * step_y) >> 16) as usize).min(ch - 1);
        let row = surface.row_mut(y);
        for (x, out) in row.iter_mut().enumerate() {
            let sx = (((x as u64 * step_x) >> 16) as usize).min(cw - 1);
            let index = sy * cw + sx;
            *out = if bpp == 8 {
                palette[src.get(index).copied().unwrap_or(0) as usize]
            } else {
                src.get(index * 4..index * 4 + 4)
                    .map(|p| u32::from_le_bytes([p[0], p[1], p[2], p[3]]))
                    .unwrap_or(0)
            };
        }
    }
}

impl<H: HostBackend> Pal<H> {
    /// Returns the framebuffer device named by `fb`
    pub fn framebuffer(&self, fb: Cap) -> PalResult<&FrameBufferDevice> {
        self.framebuffer_ref(fb)
    }

    /// Creates the display surface and the buffer pool, then posts the first
    /// Frame
    ///
    /// Calling this on a device that already has a surface reconfigures it.
    pub fn framebuffer_create(
        &mut self,
        fb: Cap,
        opts: FrameBufferOpts,
        width: u32,
        height: u32,
        bpp: u32,
        queue: Cap,
    ) -> PalResult<()> {
        if self.framebuffer_ref(fb)?.surface.is_some() {
            log::debug!("{} already has a surface, reconfiguring", fb);
            return self.framebuffer_configure(fb, opts, width, height, bpp, queue);
        }
        bytes_per_pixel(bpp)?;
        self.queue_ref(queue)?;

        let fullscreen =
            opts.contains(FrameBufferOpts::FULLSCREEN) || self.framebuffer_ref(fb)?.fullscreen;
        let info = self.open_surface(fb, opts, width, height, fullscreen)?;
        let count = if opts.contains(FrameBufferOpts::DOUBLE_BUFFER) {
            self.config.framebuffer_buffers
        } else {
            1
        };
        let size = content_bytes(info.content_width, info.content_height, bpp);
        let mut pool = Vec::with_capacity(count);
        for _ in 0..count {
            pool.push(self.allocate(Resource::Buffer(Buffer::for_device(size, fb)))?);
        }
        let mut free: VecDeque<Cap> = pool.iter().copied().collect();
        let first = free.pop_front();

        {
            let device = self.framebuffer_mut(fb)?;
            device.surface = Some(Surface {
                opts,
                bpp,
                queue,
                requested: (width, height),
                info,
                pool,
                free,
                on_screen: None,
                in_flight: 0,
                held: 0,
            });
            device.phase = FbPhase::Configured;
        }
        log::debug!(
            "{} created: {}x{} content, {}x{} window, {} bpp, {} buffer(s)",
            fb,
            info.content_width,
            info.content_height,
            info.width,
            info.height,
            bpp,
            count
        );

        self.set_capture(true)?;
        if (info.content_width, info.content_height) != (width, height) {
            self.post_size(fb, queue, info)?;
        }
        if let Some(first) = first {
            self.post_frame(fb, first)?;
        }
        Ok(())
    }

    /// Changes options, size, depth or queue of a live surface
    ///
    /// The frame cadence carries on: frames already in flight or held by the
    /// application stay valid. A content size change resizes every pool
    /// buffer and is announced with a Size event.
    pub fn framebuffer_configure(
        &mut self,
        fb: Cap,
        opts: FrameBufferOpts,
        width: u32,
        height: u32,
        bpp: u32,
        queue: Cap,
    ) -> PalResult<()> {
        let Some(current) = self.framebuffer_ref(fb)?.surface.as_ref() else {
            return self.framebuffer_create(fb, opts, width, height, bpp, queue);
        };
        bytes_per_pixel(bpp)?;
        self.queue_ref(queue)?;

        let old_opts = current.opts;
        let old_bpp = current.bpp;
        let old_content = current.content_size();
        let requested_changed = (width, height) != current.requested
            || (old_opts ^ opts).intersects(
                FrameBufferOpts::DYNAMIC_SIZE
                    | FrameBufferOpts::NO_SCALE_UP
                    | FrameBufferOpts::NO_SMOOTH,
            );

        let want_fullscreen = opts.contains(FrameBufferOpts::FULLSCREEN);
        let info = if requested_changed {
            Some(self.open_surface(fb, opts, width, height, want_fullscreen)?)
        } else {
            None
        };
        if info.is_none() && want_fullscreen != self.framebuffer_ref(fb)?.fullscreen {
            self.host.set_fullscreen(want_fullscreen)?;
        }

        let grow = if opts.contains(FrameBufferOpts::DOUBLE_BUFFER) {
            self.config
                .framebuffer_buffers
                .saturating_sub(self.framebuffer_ref(fb)?.buffers().len())
        } else {
            0
        };

        let device = self.framebuffer_mut(fb)?;
        device.fullscreen = want_fullscreen;
        let Some(surface) = device.surface.as_mut() else {
            return Err(PalError::NotConfigured(fb));
        };
        surface.opts = opts;
        surface.bpp = bpp;
        surface.queue = queue;
        surface.requested = (width, height);
        if let Some(info) = info {
            surface.info = info;
        }
        if !opts.contains(FrameBufferOpts::DOUBLE_BUFFER) {
            if let Some(prev) = surface.on_screen.take() {
                surface.free.push_back(prev);
            }
        }
        let new_content = surface.content_size();
        let new_info = surface.info;
        let size = surface.buffer_bytes();
        let pool = surface.pool.clone();
        let resize = new_content != old_content || bpp != old_bpp;

        if resize {
            for buffer in &pool {
                self.buffer_mut_ref(*buffer)?.resize(size);
            }
        }
        for _ in 0..grow {
            let buffer = self.allocate(Resource::Buffer(Buffer::for_device(size, fb)))?;
            if let Some(surface) = self.framebuffer_mut(fb)?.surface.as_mut() {
                surface.pool.push(buffer);
                surface.free.push_back(buffer);
            }
        }
        log::debug!(
            "{} reconfigured: {}x{} content, {} bpp, opts {:?}",
            fb,
            new_content.0,
            new_content.1,
            bpp,
            opts
        );

        if new_content != old_content {
            self.post_size(fb, queue, new_info)?;
        }

        // nothing in flight: restart the cadence
        let device = self.framebuffer_mut(fb)?;
        let restart = match device.surface.as_mut() {
            Some(surface) if surface.in_flight + surface.held == 0 => surface.free.pop_front(),
            _ => None,
        };
        if let Some(buffer) = restart {
            self.post_frame(fb, buffer)?;
        }
        Ok(())
    }

    /// Sets the window title; applied at creation if no surface exists yet
    pub fn framebuffer_set_title(&mut self, fb: Cap, title: &str) -> PalResult<()> {
        let device = self.framebuffer_mut(fb)?;
        device.title = Some(title.to_string());
        if device.surface.is_some() {
            self.host.set_title(title)?;
        }
        Ok(())
    }

    /// Enters or leaves fullscreen; applied at creation if no surface exists
    /// yet
    pub fn framebuffer_set_fullscreen(&mut self, fb: Cap, fullscreen: bool) -> PalResult<()> {
        let device = self.framebuffer_mut(fb)?;
        if device.surface.is_none() {
            device.fullscreen = fullscreen;
            return Ok(());
        }
        if device.fullscreen != fullscreen {
            self.host.set_fullscreen(fullscreen)?;
            self.framebuffer_mut(fb)?.fullscreen = fullscreen;
        }
        Ok(())
    }

    /// Replaces the palette from a 1024-byte buffer of little-endian
    /// `0xAARRGGBB` entries
    ///
    /// Any other size is rejected and the palette is left unchanged.
    pub fn framebuffer_set_palette(&mut self, fb: Cap, buffer: Cap) -> PalResult<()> {
        self.framebuffer_ref(fb)?;
        let bytes = self.app_buffer(buffer)?.bytes();
        if bytes.len() != PALETTE_BYTES {
            log::warn!(
                "rejected palette upload from {}: {} bytes",
                buffer,
                bytes.len()
            );
            return Err(PalError::InvalidPalette { size: bytes.len() });
        }
        let mut palette = [0u32; PALETTE_ENTRIES];
        for (entry, chunk) in palette.iter_mut().zip(bytes.chunks_exact(4)) {
            *entry = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        self.framebuffer_mut(fb)?.palette = palette;
        Ok(())
    }

    /// Hands a drawn buffer back to the device and presents it
    ///
    /// Ownership moves to the device before drawing. If presentation fails
    /// the buffer is returned to the application along with the error.
    pub fn framebuffer_submit(&mut self, fb: Cap, buffer: Cap) -> PalResult<()> {
        let device = self.framebuffer_ref(fb)?;
        let Some(surface) = device.surface.as_ref() else {
            return Err(PalError::NotConfigured(fb));
        };
        if !surface.pool.contains(&buffer) {
            return Err(PalError::NotDeviceBuffer { device: fb, buffer });
        }
        let bpp = surface.bpp;
        let opts = surface.opts;
        let palette = device.palette;
        if self.buffer_ref(buffer)?.owner() != Owner::App {
            return Err(PalError::NotOwner(buffer));
        }

        self.transfer(buffer, Owner::Device)?;
        self.framebuffer_mut(fb)?.phase = FbPhase::Presenting;
        if let Err(err) = self.present_buffer(buffer, bpp, &palette) {
            log::warn!("{} failed to present {}: {}", fb, buffer, err);
            self.transfer(buffer, Owner::App)?;
            self.framebuffer_mut(fb)?.phase = FbPhase::FramePending;
            return Err(err);
        }

        let next = {
            let device = self.framebuffer_mut(fb)?;
            let Some(surface) = device.surface.as_mut() else {
                return Err(PalError::NotConfigured(fb));
            };
            surface.held = surface.held.saturating_sub(1);
            if opts.contains(FrameBufferOpts::DOUBLE_BUFFER) {
                if let Some(prev) = surface.on_screen.replace(buffer) {
                    surface.free.push_back(prev);
                }
                surface.free.pop_front()
            } else {
                Some(buffer)
            }
        };

        if opts.contains(FrameBufferOpts::SEND_SYNC) {
            self.host.push_user_event(UserEvent::FrameSync { device: fb })?;
        }
        match next {
            Some(next) => self.post_frame(fb, next),
            None => {
                self.update_phase(fb)?;
                Ok(())
            }
        }
    }

    /// Returns true if a FrameReady for `buffer` still describes a pool
    /// buffer the device holds
    pub(crate) fn frame_ready_is_current(&self, fb: Cap, buffer: Cap) -> bool {
        let Ok(device) = self.framebuffer_ref(fb) else {
            return false;
        };
        let in_pool = device
            .surface
            .as_ref()
            .is_some_and(|s| s.pool.contains(&buffer));
        in_pool
            && self
                .buffer_ref(buffer)
                .is_ok_and(|b| b.owner() == Owner::Device)
    }

    /// Hands a frame buffer to the application after its Frame event was
    /// queued
    pub(crate) fn frame_delivered(&mut self, fb: Cap, buffer: Cap) -> PalResult<()> {
        self.transfer(buffer, Owner::App)?;
        if let Some(surface) = self.framebuffer_mut(fb)?.surface.as_mut() {
            surface.in_flight = surface.in_flight.saturating_sub(1);
            surface.held += 1;
        }
        self.update_phase(fb)
    }

    /// Queue bound to a framebuffer device
    pub(crate) fn framebuffer_queue(&self, fb: Cap) -> Option<Cap> {
        self.framebuffer_ref(fb).ok().and_then(FrameBufferDevice::queue)
    }

    fn open_surface(
        &mut self,
        fb: Cap,
        opts: FrameBufferOpts,
        width: u32,
        height: u32,
        fullscreen: bool,
    ) -> PalResult<SurfaceInfo> {
        check_content_size(width, height)?;
        let (window_width, window_height) = window_size(
            opts,
            (width, height),
            self.host.display_bounds(),
            self.config.default_scale,
        );
        let device = self.framebuffer_ref(fb)?;
        let title = device.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let request = SurfaceRequest::new(width, height, window_width, window_height)
            .with_resizable(opts.contains(FrameBufferOpts::DYNAMIC_SIZE))
            .with_fullscreen(fullscreen)
            .with_smooth(!opts.contains(FrameBufferOpts::NO_SMOOTH))
            .with_title(title);

        let info = self.host.create_surface(&request).map_err(|err| {
            log::error!("{} surface creation failed: {}", fb, err);
            err
        })?;
        if let Err(err) = check_content_size(info.content_width, info.content_height) {
            log::error!("{} host picked an unusable surface: {}", fb, err);
            return Err(err);
        }
        self.framebuffer_mut(fb)?.fullscreen = fullscreen;
        Ok(info)
    }

    fn present_buffer(&mut self, buffer: Cap, bpp: u32, palette: &[u32; PALETTE_ENTRIES]) -> PalResult<()> {
        let src = match self.table.resolve(buffer) {
            Ok(Resource::Buffer(b)) => b.bytes(),
            _ => return Err(PalError::InvalidCapability(buffer)),
        };
        let mut lock = self.host.lock_surface()?;
        blit(src, bpp, palette, &mut lock);
        drop(lock);
        self.host.present()?;
        Ok(())
    }

    fn post_frame(&mut self, fb: Cap, buffer: Cap) -> PalResult<()> {
        self.host
            .push_user_event(UserEvent::FrameReady { device: fb, buffer })?;
        if let Some(surface) = self.framebuffer_mut(fb)?.surface.as_mut() {
            surface.in_flight += 1;
        }
        self.update_phase(fb)
    }

    fn post_size(&mut self, fb: Cap, queue: Cap, info: SurfaceInfo) -> PalResult<()> {
        let too_large = || PalError::SurfaceTooLarge {
            width: info.content_width,
            height: info.content_height,
        };
        let record = EventRecord::new(
            fb,
            EventPayload::Size {
                width: u16::try_from(info.content_width).map_err(|_| too_large())?,
                height: u16::try_from(info.content_height).map_err(|_| too_large())?,
            },
        );
        self.enqueue(queue, &record)
    }

    fn update_phase(&mut self, fb: Cap) -> PalResult<()> {
        let device = self.framebuffer_mut(fb)?;
        device.phase = match &device.surface {
            None => FbPhase::Uninitialized,
            Some(s) if s.in_flight + s.held > 0 => FbPhase::FramePending,
            Some(_) => FbPhase::Configured,
        };
        Ok(())
    }
}
