//! Headless GPU context
//!
//! A CPU implementation of [`GpuContext`] that splats every projected vertex
//! of the content into an RGBA buffer. Used by the demo binary, by tests and
//! anywhere no platform graphics API is available. Context loss can be
//! simulated with [`HeadlessContext::lose_context`].

use super::backend::{BackendResult, FrameDescription, GpuContext};
use super::surface::{pixel_count, OutputSurface, Rgba8};
use super::DeviceLostError;
use crate::foundation::math::Vec4;

/// CPU-backed context
#[derive(Debug)]
pub struct HeadlessContext {
    width: u32,
    height: u32,
    pixels: Vec<Rgba8>,
    animating: bool,
    lost: Option<DeviceLostError>,
    restorable: bool,
    frames_rendered: u64,
    resize_count: u64,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl HeadlessContext {
    /// Create a context with a surface of the given size
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![Rgba8::TRANSPARENT; pixel_count(width, height)],
            animating: false,
            lost: None,
            restorable: true,
            frames_rendered: 0,
            resize_count: 0,
        }
    }

    /// Simulate the platform dropping the context
    pub fn lose_context(&mut self, reason: impl Into<String>) {
        let error = DeviceLostError::new(reason);
        log::warn!("Headless context lost: {}", error.reason);
        self.lost = Some(error);
    }

    /// Whether [`GpuContext::try_restore`] succeeds
    pub fn set_restorable(&mut self, restorable: bool) {
        self.restorable = restorable;
    }

    /// Number of successful draws
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Number of times the shared surface was reallocated
    pub fn resize_count(&self) -> u64 {
        self.resize_count
    }

    fn clear_viewport(&mut self, viewport_width: u32, viewport_height: u32) {
        let width = self.width as usize;
        for row in self.pixels.chunks_exact_mut(width).take(viewport_height as usize) {
            row[..viewport_width as usize].fill(Rgba8::TRANSPARENT);
        }
    }
}

fn to_rgba8(color: &Vec4, exposure: f32) -> Rgba8 {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba8::new(
        channel(color.x * exposure),
        channel(color.y * exposure),
        channel(color.z * exposure),
        channel(color.w),
    )
}

impl GpuContext for HeadlessContext {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_size(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) == (self.width, self.height) {
            return;
        }
        log::debug!("Headless surface {}x{} -> {}x{}", self.width, self.height, width, height);
        self.width = width;
        self.height = height;
        self.pixels = vec![Rgba8::TRANSPARENT; pixel_count(width, height)];
        self.resize_count += 1;
    }

    fn set_animation_loop(&mut self, running: bool) {
        self.animating = running;
    }

    fn is_animating(&self) -> bool {
        self.animating
    }

    fn render(&mut self, frame: &FrameDescription<'_>) -> BackendResult<()> {
        if let Some(error) = &self.lost {
            return Err(error.clone().into());
        }

        let viewport_width = frame.viewport.0.min(self.width);
        let viewport_height = frame.viewport.1.min(self.height);
        self.clear_viewport(viewport_width, viewport_height);

        if let Some(content) = frame.content {
            let stride = self.width as usize;
            for (index, node) in content.nodes().iter().enumerate() {
                let Some(mesh) = node.mesh.and_then(|mesh| content.meshes().get(mesh)) else {
                    continue;
                };
                let color = content
                    .materials()
                    .get(mesh.material)
                    .map_or(Rgba8::new(255, 255, 255, 255), |material| {
                        to_rgba8(&material.base_color, frame.exposure)
                    });
                let mvp = frame.view_projection * frame.model * content.world_matrix(index);

                for position in &mesh.geometry.positions {
                    let clip = mvp * position.push(1.0);
                    if clip.w <= 0.0 {
                        continue;
                    }
                    let ndc = clip.xyz() / clip.w;
                    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || ndc.z.abs() > 1.0 {
                        continue;
                    }
                    let x = (((ndc.x + 1.0) * 0.5 * viewport_width as f32) as u32)
                        .min(viewport_width.saturating_sub(1));
                    let y = (((1.0 - ndc.y) * 0.5 * viewport_height as f32) as u32)
                        .min(viewport_height.saturating_sub(1));
                    if let Some(pixel) = self.pixels.get_mut(y as usize * stride + x as usize) {
                        *pixel = color;
                    }
                }
            }
        }

        self.frames_rendered += 1;
        log::trace!("Headless draw {}x{}", viewport_width, viewport_height);
        Ok(())
    }

    fn copy_to(&self, target: &mut OutputSurface) -> BackendResult<()> {
        if let Some(error) = &self.lost {
            return Err(error.clone().into());
        }
        target.copy_region_from(&self.pixels, self.width);
        Ok(())
    }

    fn is_lost(&self) -> bool {
        self.lost.is_some()
    }

    fn try_restore(&mut self) -> bool {
        if self.lost.is_some() && self.restorable {
            log::info!("Headless context restored");
            self.lost = None;
            self.pixels.fill(Rgba8::TRANSPARENT);
        }
        self.lost.is_none()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
