// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::vk;
use tracing::{debug, info};
use utopia_core::Error;
use utopia_render::{
    AcquireOutcome, ClearColor, DrawData, PresentOutcome, PresentPolicy, RebuildOutcome,
    RenderSize, SurfaceConfig, SwapchainDesc,
};

use crate::device::DeviceContext;
use crate::record::record_draw_data;

pub(crate) const REQUEST_FORMATS: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8_UNORM,
    vk::Format::R8G8B8_UNORM,
];
pub(crate) const REQUEST_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

// Upper bound for one-off submissions from `flush_command_buffer`.
const FLUSH_TIMEOUT_NS: u64 = 100_000_000_000;

// Info only
fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::B8G8R8_UNORM => "B8G8R8_UNORM",
        vk::Format::R8G8B8_UNORM => "R8G8B8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        _ => "OTHER",
    }
}
fn cs_name(cs: vk::ColorSpaceKHR) -> &'static str {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => "SRGB_NONLINEAR",
        vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT => "EXTENDED_SRGB_LINEAR",
        _ => "OTHER",
    }
}
fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

/// A surface that only reports `UNDEFINED` accepts anything, so take our
/// first choice. Otherwise the first requested format in the requested color
/// space wins, then whatever the driver listed first.
pub(crate) fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    request: &[vk::Format],
    color_space: vk::ColorSpaceKHR,
) -> Option<vk::SurfaceFormatKHR> {
    let first = *available.first()?;
    if available.len() == 1 && first.format == vk::Format::UNDEFINED {
        return request.first().map(|&format| vk::SurfaceFormatKHR {
            format,
            color_space,
        });
    }
    request
        .iter()
        .find_map(|&want| {
            available
                .iter()
                .copied()
                .find(|f| f.format == want && f.color_space == color_space)
        })
        .or(Some(first))
}

pub(crate) fn present_mode_preference(policy: PresentPolicy) -> &'static [vk::PresentModeKHR] {
    match policy {
        PresentPolicy::Fifo => &[vk::PresentModeKHR::FIFO],
        PresentPolicy::LowLatency => &[
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
        ],
    }
}

/// FIFO is the only mode every driver must support.
pub(crate) fn select_present_mode(
    available: &[vk::PresentModeKHR],
    request: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    request
        .iter()
        .copied()
        .find(|m| available.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// `None` while the surface has no drawable area, e.g. a minimize the window
/// has not reported yet.
pub(crate) fn extent_from_caps(
    caps: &vk::SurfaceCapabilitiesKHR,
    want: RenderSize,
) -> Option<vk::Extent2D> {
    let extent = if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    };
    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// `max_image_count == 0` means the driver sets no upper bound.
pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let mut count = requested.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count = count.min(caps.max_image_count);
    }
    count
}

struct ImageFrame {
    view: vk::ImageView,
    framebuffer: vk::Framebuffer,
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
}

struct SemaphorePair {
    image_acquired: vk::Semaphore,
    render_complete: vk::Semaphore,
}

/// Everything that is torn down and rebuilt with the swapchain.
struct Bundle {
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    frames: Vec<ImageFrame>,
    semaphores: Vec<SemaphorePair>,
}

/// Window surface plus its swapchain. Owned by the backend next to the
/// `DeviceContext`; must be destroyed with `destroy` before the context drops.
pub struct PresentationSurface {
    surface_loader: surface::Instance,
    swapchain_loader: swapchain::Device,
    surface: vk::SurfaceKHR,
    cfg: SurfaceConfig,
    bundle: Bundle,
    generation: u64,
    semaphore_index: usize,
}

impl PresentationSurface {
    /// Takes ownership of `surface`. It is destroyed on failure.
    pub unsafe fn new(
        ctx: &DeviceContext,
        surface: vk::SurfaceKHR,
        size: RenderSize,
        cfg: SurfaceConfig,
    ) -> Result<Self> {
        let surface_loader = surface::Instance::new(ctx.entry(), ctx.instance());
        let supported = surface_loader
            .get_physical_device_surface_support(ctx.physical_device(), ctx.queue_family(), surface)
            .unwrap_or(false);
        if !supported {
            surface_loader.destroy_surface(surface, ctx.allocator());
            return Err(Error::PresentUnsupported(ctx.queue_family()).into());
        }

        let swapchain_loader = swapchain::Device::new(ctx.instance(), ctx.device());
        let bundle = match create_bundle(
            ctx,
            &surface_loader,
            &swapchain_loader,
            surface,
            vk::SwapchainKHR::null(),
            size,
            cfg,
        ) {
            Ok(b) => b,
            Err(e) => {
                surface_loader.destroy_surface(surface, ctx.allocator());
                return Err(e);
            }
        };

        Ok(Self {
            surface_loader,
            swapchain_loader,
            surface,
            cfg,
            bundle,
            generation: 1,
            semaphore_index: 0,
        })
    }

    pub fn desc(&self) -> SwapchainDesc<vk::Format> {
        SwapchainDesc {
            image_count: self.bundle.frames.len(),
            extent: RenderSize::new(self.bundle.extent.width, self.bundle.extent.height),
            format: self.bundle.format.format,
            generation: self.generation,
        }
    }

    unsafe fn drawable_extent(
        &self,
        ctx: &DeviceContext,
        size: RenderSize,
    ) -> Result<Option<vk::Extent2D>> {
        let caps = self
            .surface_loader
            .get_physical_device_surface_capabilities(ctx.physical_device(), self.surface)
            .context("get_physical_device_surface_capabilities")?;
        Ok(extent_from_caps(&caps, size))
    }

    pub unsafe fn rebuild(
        &mut self,
        ctx: &DeviceContext,
        size: RenderSize,
    ) -> Result<RebuildOutcome> {
        if size.is_zero() {
            debug!("swapchain rebuild to {}x{} skipped", size.width, size.height);
            return Ok(RebuildOutcome::Skipped);
        }
        if self.drawable_extent(ctx, size)?.is_none() {
            debug!(
                "surface extent is zero; rebuild to {}x{} skipped",
                size.width, size.height
            );
            return Ok(RebuildOutcome::Skipped);
        }
        ctx.wait_idle()?;

        let old = self.bundle.swapchain;
        destroy_bundle_resources(ctx, &self.bundle);
        // Keep the old handle alive until the replacement exists.
        self.bundle.frames.clear();
        self.bundle.semaphores.clear();
        self.bundle.render_pass = vk::RenderPass::null();

        let created = create_bundle(
            ctx,
            &self.surface_loader,
            &self.swapchain_loader,
            self.surface,
            old,
            size,
            self.cfg,
        );
        self.swapchain_loader.destroy_swapchain(old, ctx.allocator());
        self.bundle.swapchain = vk::SwapchainKHR::null();

        self.bundle = created?;
        self.generation += 1;
        self.semaphore_index = 0;
        Ok(RebuildOutcome::Rebuilt)
    }

    pub unsafe fn acquire(&mut self, _ctx: &DeviceContext) -> Result<AcquireOutcome> {
        let sem = self.bundle.semaphores[self.semaphore_index].image_acquired;
        match self.swapchain_loader.acquire_next_image(
            self.bundle.swapchain,
            u64::MAX,
            sem,
            vk::Fence::null(),
        ) {
            Ok((image, false)) => Ok(AcquireOutcome::Acquired(image)),
            Ok((_, true)) => {
                debug!("acquire: suboptimal");
                Ok(AcquireOutcome::Stale)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("acquire: out of date");
                Ok(AcquireOutcome::Stale)
            }
            Err(e) => Err(e).context("acquire_next_image"),
        }
    }

    fn frame(&self, image: u32) -> Result<&ImageFrame> {
        self.bundle
            .frames
            .get(image as usize)
            .with_context(|| format!("image index {image} out of range"))
    }

    pub unsafe fn wait_for_image(&self, ctx: &DeviceContext, image: u32) -> Result<()> {
        let fence = self.frame(image)?.fence;
        ctx.device()
            .wait_for_fences(&[fence], true, u64::MAX)
            .context("wait_for_fences(image)")
    }

    pub unsafe fn free_command_buffers(
        &self,
        ctx: &DeviceContext,
        image: u32,
        buffers: &[vk::CommandBuffer],
    ) {
        if buffers.is_empty() {
            return;
        }
        if let Ok(frame) = self.frame(image) {
            ctx.device().free_command_buffers(frame.pool, buffers);
        }
    }

    pub unsafe fn reset_command_pool(&self, ctx: &DeviceContext, image: u32) -> Result<()> {
        let pool = self.frame(image)?.pool;
        ctx.device()
            .reset_command_pool(pool, vk::CommandPoolResetFlags::empty())
            .context("reset_command_pool")
    }

    pub unsafe fn submit(
        &self,
        ctx: &DeviceContext,
        image: u32,
        draw: &DrawData,
        clear: ClearColor,
    ) -> Result<()> {
        let d = ctx.device();
        let frame = self.frame(image)?;
        let sems = &self.bundle.semaphores[self.semaphore_index];

        let begin = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        d.begin_command_buffer(frame.cmd, &begin)
            .context("begin_command_buffer")?;

        let clears = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear.premultiplied(),
            },
        }];
        let rp_begin = vk::RenderPassBeginInfo::default()
            .render_pass(self.bundle.render_pass)
            .framebuffer(frame.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.bundle.extent,
            })
            .clear_values(&clears);
        d.cmd_begin_render_pass(frame.cmd, &rp_begin, vk::SubpassContents::INLINE);
        record_draw_data(d, frame.cmd, draw, self.bundle.extent);
        d.cmd_end_render_pass(frame.cmd);
        d.end_command_buffer(frame.cmd)
            .context("end_command_buffer")?;

        d.reset_fences(&[frame.fence]).context("reset_fences")?;

        let wait = [sems.image_acquired];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let cmds = [frame.cmd];
        let signal = [sems.render_complete];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&stages)
            .command_buffers(&cmds)
            .signal_semaphores(&signal);
        d.queue_submit(ctx.queue(), &[submit], frame.fence)
            .context("queue_submit")
    }

    pub unsafe fn present(&mut self, ctx: &DeviceContext, image: u32) -> Result<PresentOutcome> {
        let wait = [self.bundle.semaphores[self.semaphore_index].render_complete];
        let swapchains = [self.bundle.swapchain];
        let images = [image];
        let info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&images);

        let outcome = match self.swapchain_loader.queue_present(ctx.queue(), &info) {
            Ok(false) => PresentOutcome::Presented,
            Ok(true) => {
                debug!("present: suboptimal");
                PresentOutcome::Stale
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("present: out of date");
                PresentOutcome::Stale
            }
            Err(e) => return Err(e).context("queue_present"),
        };
        self.semaphore_index = (self.semaphore_index + 1) % self.bundle.semaphores.len();
        Ok(outcome)
    }

    pub unsafe fn allocate_command_buffer(
        &self,
        ctx: &DeviceContext,
        image: u32,
    ) -> Result<vk::CommandBuffer> {
        let d = ctx.device();
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.frame(image)?.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = d
            .allocate_command_buffers(&info)
            .context("allocate_command_buffers")?[0];
        let begin = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        d.begin_command_buffer(cmd, &begin)
            .context("begin_command_buffer")?;
        Ok(cmd)
    }

    pub unsafe fn flush_command_buffer(
        &self,
        ctx: &DeviceContext,
        cmd: vk::CommandBuffer,
    ) -> Result<()> {
        let d = ctx.device();
        d.end_command_buffer(cmd).context("end_command_buffer")?;

        let fence = d
            .create_fence(&vk::FenceCreateInfo::default(), ctx.allocator())
            .context("create_fence(flush)")?;
        let cmds = [cmd];
        let submit = vk::SubmitInfo::default().command_buffers(&cmds);
        let result = d
            .queue_submit(ctx.queue(), &[submit], fence)
            .context("queue_submit(flush)")
            .and_then(|()| {
                d.wait_for_fences(&[fence], true, FLUSH_TIMEOUT_NS)
                    .context("wait_for_fences(flush)")
            });
        d.destroy_fence(fence, ctx.allocator());
        result
    }

    /// Caller guarantees the device is idle.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        destroy_bundle_resources(ctx, &self.bundle);
        self.bundle.frames.clear();
        self.bundle.semaphores.clear();
        self.swapchain_loader
            .destroy_swapchain(self.bundle.swapchain, ctx.allocator());
        self.bundle.swapchain = vk::SwapchainKHR::null();
        self.surface_loader
            .destroy_surface(self.surface, ctx.allocator());
        self.surface = vk::SurfaceKHR::null();
        info!("presentation surface destroyed");
    }
}

unsafe fn create_bundle(
    ctx: &DeviceContext,
    surface_loader: &surface::Instance,
    swapchain_loader: &swapchain::Device,
    surface: vk::SurfaceKHR,
    old_swapchain: vk::SwapchainKHR,
    size: RenderSize,
    cfg: SurfaceConfig,
) -> Result<Bundle> {
    let phys = ctx.physical_device();
    let d = ctx.device();
    let alloc = ctx.allocator();

    // --- Query surface ---
    let caps = surface_loader
        .get_physical_device_surface_capabilities(phys, surface)
        .context("get_physical_device_surface_capabilities")?;
    let formats = surface_loader
        .get_physical_device_surface_formats(phys, surface)
        .context("get_physical_device_surface_formats")?;
    let modes = surface_loader
        .get_physical_device_surface_present_modes(phys, surface)
        .context("get_physical_device_surface_present_modes")?;

    let format = select_surface_format(&formats, &REQUEST_FORMATS, REQUEST_COLOR_SPACE)
        .context("surface reports no formats")?;
    let present_mode = select_present_mode(&modes, present_mode_preference(cfg.present_policy));
    let extent = extent_from_caps(&caps, size).context("surface has a zero extent")?;
    let min_count = choose_image_count(&caps, cfg.min_image_count.max(2));

    // --- Swapchain ---
    let composite = if caps
        .supported_composite_alpha
        .contains(vk::CompositeAlphaFlagsKHR::OPAQUE)
    {
        vk::CompositeAlphaFlagsKHR::OPAQUE
    } else {
        vk::CompositeAlphaFlagsKHR::INHERIT
    };
    let info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(min_count)
        .image_format(format.format)
        .image_color_space(format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(caps.current_transform)
        .composite_alpha(composite)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);
    let swapchain = swapchain_loader
        .create_swapchain(&info, alloc)
        .context("create_swapchain")?;

    let images = match swapchain_loader.get_swapchain_images(swapchain) {
        Ok(images) if images.len() >= 2 => images,
        Ok(images) => {
            swapchain_loader.destroy_swapchain(swapchain, alloc);
            return Err(Error::TooFewImages(images.len()).into());
        }
        Err(e) => {
            swapchain_loader.destroy_swapchain(swapchain, alloc);
            return Err(e).context("get_swapchain_images");
        }
    };

    let mut bundle = Bundle {
        swapchain,
        format,
        extent,
        render_pass: vk::RenderPass::null(),
        frames: Vec::with_capacity(images.len()),
        semaphores: Vec::with_capacity(images.len() + 1),
    };
    if let Err(e) = fill_bundle(ctx, &mut bundle, &images) {
        d.device_wait_idle().ok();
        destroy_bundle_resources(ctx, &bundle);
        swapchain_loader.destroy_swapchain(swapchain, alloc);
        return Err(e);
    }

    info!(
        "swapchain ready: {} / {}, {}, {}x{}, images min={} requested={} got={}",
        fmt_name(format.format),
        cs_name(format.color_space),
        pm_name(present_mode),
        extent.width,
        extent.height,
        caps.min_image_count,
        min_count,
        images.len()
    );
    Ok(bundle)
}

// Render pass, then per image: view, framebuffer, pool, primary buffer,
// signalled fence. Then image_count + 1 semaphore pairs.
unsafe fn fill_bundle(
    ctx: &DeviceContext,
    bundle: &mut Bundle,
    images: &[vk::Image],
) -> Result<()> {
    let d = ctx.device();
    let alloc = ctx.allocator();

    let color = [vk::AttachmentDescription::default()
        .format(bundle.format.format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];
    let color_ref = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpass = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_ref)];
    let dependency = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];
    let rp_info = vk::RenderPassCreateInfo::default()
        .attachments(&color)
        .subpasses(&subpass)
        .dependencies(&dependency);
    bundle.render_pass = d
        .create_render_pass(&rp_info, alloc)
        .context("create_render_pass")?;

    for &image in images {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(bundle.format.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = d
            .create_image_view(&view_info, alloc)
            .context("create_image_view")?;

        let attachments = [view];
        let fb_info = vk::FramebufferCreateInfo::default()
            .render_pass(bundle.render_pass)
            .attachments(&attachments)
            .width(bundle.extent.width)
            .height(bundle.extent.height)
            .layers(1);
        let framebuffer = match d.create_framebuffer(&fb_info, alloc) {
            Ok(fb) => fb,
            Err(e) => {
                d.destroy_image_view(view, alloc);
                return Err(e).context("create_framebuffer");
            }
        };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(ctx.queue_family());
        let pool = match d.create_command_pool(&pool_info, alloc) {
            Ok(p) => p,
            Err(e) => {
                d.destroy_framebuffer(framebuffer, alloc);
                d.destroy_image_view(view, alloc);
                return Err(e).context("create_command_pool");
            }
        };

        // Pushed before the remaining fallible calls so cleanup sees it.
        bundle.frames.push(ImageFrame {
            view,
            framebuffer,
            pool,
            cmd: vk::CommandBuffer::null(),
            fence: vk::Fence::null(),
        });
        let frame = bundle
            .frames
            .last_mut()
            .context("image frame just pushed")?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        frame.cmd = d
            .allocate_command_buffers(&alloc_info)
            .context("allocate_command_buffers")?[0];

        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        frame.fence = d
            .create_fence(&fence_info, alloc)
            .context("create_fence")?;
    }

    let sem_info = vk::SemaphoreCreateInfo::default();
    for _ in 0..=images.len() {
        let image_acquired = d
            .create_semaphore(&sem_info, alloc)
            .context("create_semaphore")?;
        let render_complete = match d.create_semaphore(&sem_info, alloc) {
            Ok(s) => s,
            Err(e) => {
                d.destroy_semaphore(image_acquired, alloc);
                return Err(e).context("create_semaphore");
            }
        };
        bundle.semaphores.push(SemaphorePair {
            image_acquired,
            render_complete,
        });
    }
    Ok(())
}

// Everything but the swapchain handle itself. Null handles are skipped by
// the driver.
unsafe fn destroy_bundle_resources(ctx: &DeviceContext, bundle: &Bundle) {
    let d = ctx.device();
    let alloc = ctx.allocator();
    for s in &bundle.semaphores {
        d.destroy_semaphore(s.image_acquired, alloc);
        d.destroy_semaphore(s.render_complete, alloc);
    }
    for f in &bundle.frames {
        d.destroy_fence(f.fence, alloc);
        // Frees the primary buffer with it.
        d.destroy_command_pool(f.pool, alloc);
        d.destroy_framebuffer(f.framebuffer, alloc);
        d.destroy_image_view(f.view, alloc);
    }
    d.destroy_render_pass(bundle.render_pass, alloc);
}
