//! Simulated display
//!
//! One window-sized `Vec<u32>` surface. `present` snapshots it so tests can
//! assert on exactly what reached the screen.

use hal::{DisplayBackend, HostError, PixelFormat, SurfaceInfo, SurfaceLock, SurfaceRequest};

use crate::{SimHostConfig, SimulatedHost};

/// A snapshot taken at present time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedFrame {
    pub info: SurfaceInfo,
    pub pixels: Vec<u32>,
}

impl PresentedFrame {
    /// Returns the pixel at (x, y)
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[self.info.offset(x, y)]
    }
}

#[derive(Debug)]
struct Surface {
    info: SurfaceInfo,
    pixels: Vec<u32>,
}

#[derive(Debug)]
pub(crate) struct SimDisplay {
    bounds: (u32, u32),
    native_content: Option<(u32, u32)>,
    stride_align: usize,
    surface: Option<Surface>,
    requests: Vec<SurfaceRequest>,
    title: String,
    fullscreen: bool,
    frames_presented: u64,
    last_frame: Option<PresentedFrame>,
}

impl SimDisplay {
    pub(crate) fn new(config: &SimHostConfig) -> Self {
        Self {
            bounds: config.display_bounds,
            native_content: config.native_content,
            stride_align: config.stride_align.max(1),
            surface: None,
            requests: Vec::new(),
            title: String::new(),
            fullscreen: false,
            frames_presented: 0,
            last_frame: None,
        }
    }

    fn build_surface(&self, request: &SurfaceRequest) -> SurfaceInfo {
        let (content_width, content_height) = match (request.resizable, self.native_content) {
            (true, Some(native)) => native,
            _ => (request.content_width, request.content_height),
        };

        let (width, height) =
            if (content_width, content_height) == (request.content_width, request.content_height) {
                (request.width, request.height)
            } else {
                // keep the requested integer magnification for the host's size
                let scale = (request.width / request.content_width.max(1)).max(1);
                (content_width * scale, content_height * scale)
            };

        let width = width as usize;
        let stride_pixels = width.div_ceil(self.stride_align) * self.stride_align;
        SurfaceInfo {
            width,
            height: height as usize,
            stride_pixels,
            format: PixelFormat::Argb8888,
            content_width,
            content_height,
        }
    }
}

impl SimulatedHost {
    /// Number of frames presented so far
    pub fn frames_presented(&self) -> u64 {
        self.display.frames_presented
    }

    /// The most recent presented frame
    pub fn last_frame(&self) -> Option<&PresentedFrame> {
        self.display.last_frame.as_ref()
    }

    /// Every surface request received, oldest first
    pub fn surface_requests(&self) -> &[SurfaceRequest] {
        &self.display.requests
    }

    /// Current window title
    pub fn title(&self) -> &str {
        &self.display.title
    }

    /// Returns true if the window is fullscreen
    pub fn is_fullscreen(&self) -> bool {
        self.display.fullscreen
    }
}

impl DisplayBackend for SimulatedHost {
    fn display_bounds(&self) -> (u32, u32) {
        self.display.bounds
    }

    fn create_surface(&mut self, request: &SurfaceRequest) -> Result<SurfaceInfo, HostError> {
        self.display.requests.push(request.clone());
        if self.faults.should_fail_surface() {
            return Err(HostError::SurfaceCreationFailed("injected fault".to_string()));
        }
        if request.width == 0 || request.height == 0 {
            return Err(HostError::SurfaceCreationFailed(format!(
                "empty window {}x{}",
                request.width, request.height
            )));
        }

        let info = self.display.build_surface(request);
        log::debug!(
            "surface {}x{} (stride {}) for content {}x{}",
            info.width,
            info.height,
            info.stride_pixels,
            info.content_width,
            info.content_height
        );
        self.display.surface = Some(Surface {
            info,
            pixels: vec![0; info.pixel_count()],
        });
        self.display.fullscreen = request.fullscreen;
        if let Some(title) = &request.title {
            self.display.title = title.clone();
        }
        Ok(info)
    }

    fn surface_info(&self) -> Option<SurfaceInfo> {
        self.display.surface.as_ref().map(|surface| surface.info)
    }

    fn lock_surface(&mut self) -> Result<SurfaceLock<'_>, HostError> {
        let surface = self.display.surface.as_mut().ok_or(HostError::NoSurface)?;
        Ok(SurfaceLock {
            pixels: &mut surface.pixels,
            info: surface.info,
        })
    }

    fn present(&mut self) -> Result<(), HostError> {
        if self.display.surface.is_none() {
            return Err(HostError::NoSurface);
        }
        if self.faults.should_fail_present() {
            return Err(HostError::Backend("present failed".to_string()));
        }
        let display = &mut self.display;
        if let Some(surface) = &display.surface {
            display.last_frame = Some(PresentedFrame {
                info: surface.info,
                pixels: surface.pixels.clone(),
            });
        }
        display.frames_presented += 1;
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<(), HostError> {
        self.display.title = title.to_string();
        Ok(())
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), HostError> {
        if self.display.surface.is_none() {
            return Err(HostError::NoSurface);
        }
        self.display.fullscreen = fullscreen;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault_injection::{FaultInjector, FaultPlan, HostFault};

    #[test]
    fn test_create_lock_present() {
        let mut host = SimulatedHost::default();
        let info = host
            .create_surface(&SurfaceRequest::new(4, 2, 12, 6).with_title("sim"))
            .unwrap();
        assert_eq!((info.width, info.height), (12, 6));
        assert_eq!((info.content_width, info.content_height), (4, 2));
        assert_eq!(host.title(), "sim");

        {
            let mut lock = host.lock_surface().unwrap();
            lock.row_mut(0).fill(0xFF00_00FF);
        }
        host.present().unwrap();

        let frame = host.last_frame().unwrap();
        assert_eq!(frame.pixel(11, 0), 0xFF00_00FF);
        assert_eq!(frame.pixel(0, 1), 0);
        assert_eq!(host.frames_presented(), 1);
    }

    #[test]
    fn test_no_surface_errors() {
        let mut host = SimulatedHost::default();
        assert!(host.surface_info().is_none());
        assert!(matches!(host.lock_surface(), Err(HostError::NoSurface)));
        assert_eq!(host.present(), Err(HostError::NoSurface));
        assert_eq!(host.set_fullscreen(true), Err(HostError::NoSurface));
    }

    #[test]
    fn test_stride_padding() {
        let config = SimHostConfig::new().with_stride_align(16);
        let mut host = SimulatedHost::new(config);
        let info = host.create_surface(&SurfaceRequest::new(10, 10, 30, 30)).unwrap();
        assert_eq!(info.width, 30);
        assert_eq!(info.stride_pixels, 32);
    }

    #[test]
    fn test_resizable_surface_uses_native_content() {
        let config = SimHostConfig::new().with_native_content(200, 100);
        let mut host = SimulatedHost::new(config);
        let fixed = host.create_surface(&SurfaceRequest::new(320, 200, 960, 600)).unwrap();
        assert_eq!(fixed.content_width, 320);

        let request = SurfaceRequest::new(320, 200, 960, 600).with_resizable(true);
        let dynamic = host.create_surface(&request).unwrap();
        assert_eq!((dynamic.content_width, dynamic.content_height), (200, 100));
        assert_eq!((dynamic.width, dynamic.height), (600, 300));
        assert_eq!(host.surface_requests().len(), 2);
    }

    #[test]
    fn test_surface_fault() {
        let plan = FaultPlan::new().with_fault(HostFault::FailSurfaceCreation { count: 1 });
        let mut host = SimulatedHost::default().with_fault_injector(FaultInjector::new(plan));
        let request = SurfaceRequest::new(8, 8, 8, 8);
        assert!(matches!(
            host.create_surface(&request),
            Err(HostError::SurfaceCreationFailed(_))
        ));
        assert!(host.create_surface(&request).is_ok());
    }

    #[test]
    fn test_title_and_fullscreen() {
        let mut host = SimulatedHost::default();
        host.create_surface(&SurfaceRequest::new(8, 8, 8, 8).with_fullscreen(true))
            .unwrap();
        assert!(host.is_fullscreen());
        host.set_fullscreen(false).unwrap();
        assert!(!host.is_fullscreen());
        host.set_title("renamed").unwrap();
        assert_eq!(host.title(), "renamed");
    }
}
