// SPDX-License-Identifier: CEPL-1.0
#![allow(dead_code)]

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use utopia_app::{FrameContext, Layer};
use utopia_render::{
    AcquireOutcome, ClearColor, DrawData, DrawList, GpuBackend, PresentOutcome, RebuildOutcome,
    RenderSize, SwapchainDesc,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Acquire { image: u32, generation: u64 },
    AcquireStale { generation: u64 },
    WaitImage { image: u32 },
    FreeCmds { image: u32, count: usize },
    ResetPool { image: u32 },
    Submit { image: u32, id: u64, generation: u64 },
    Present { image: u32, generation: u64 },
    PresentStale { generation: u64 },
    Rebuild { size: RenderSize, generation: u64 },
    RebuildSkipped { size: RenderSize },
    Allocate { image: u32, cmd: u32 },
    Flush { cmd: u32 },
    WaitIdle,
}

/// GPU model shared between the backend and the test body. Submissions
/// complete in order, and only when someone waits for them.
#[derive(Debug)]
pub struct GpuState {
    pub image_count: usize,
    pub extent: RenderSize,
    pub generation: u64,
    pub events: Vec<Event>,
    // Submit id each image's fence is tied to.
    pub fences: Vec<Option<u64>>,
    pub last_submit: u64,
    pub completed: u64,
    // Live one-shot buffers per image pool.
    pub live: Vec<Vec<u32>>,
    next_cmd: u32,
    next_image: u32,
    pub image_order: VecDeque<u32>,
    pub stale_acquires: u32,
    pub stale_presents: u32,
    // Image count the next rebuild produces.
    pub rebuild_image_count: Option<usize>,
    // Rebuilds that find a zero surface extent despite a nonzero request.
    pub zero_extent_rebuilds: u32,
}

impl GpuState {
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn is_complete(&self, submit: u64) -> bool {
        submit <= self.completed
    }
}

pub type Gpu = Rc<RefCell<GpuState>>;

pub struct RecordingBackend {
    gpu: Gpu,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32, image_count: usize) -> Self {
        let gpu = GpuState {
            image_count,
            extent: RenderSize::new(width, height),
            generation: 1,
            events: Vec::new(),
            fences: vec![None; image_count],
            last_submit: 0,
            completed: 0,
            live: vec![Vec::new(); image_count],
            next_cmd: 1,
            next_image: 0,
            image_order: VecDeque::new(),
            stale_acquires: 0,
            stale_presents: 0,
            rebuild_image_count: None,
            zero_extent_rebuilds: 0,
        };
        Self {
            gpu: Rc::new(RefCell::new(gpu)),
        }
    }

    pub fn gpu(&self) -> Gpu {
        Rc::clone(&self.gpu)
    }
}

impl GpuBackend for RecordingBackend {
    type CommandBuffer = u32;
    type Format = u32;

    fn desc(&self) -> SwapchainDesc<u32> {
        let g = self.gpu.borrow();
        SwapchainDesc {
            image_count: g.image_count,
            extent: g.extent,
            format: 44,
            generation: g.generation,
        }
    }

    fn rebuild(&mut self, size: RenderSize) -> Result<RebuildOutcome> {
        let mut g = self.gpu.borrow_mut();
        if size.is_zero() || g.zero_extent_rebuilds > 0 {
            g.zero_extent_rebuilds = g.zero_extent_rebuilds.saturating_sub(1);
            g.events.push(Event::RebuildSkipped { size });
            return Ok(RebuildOutcome::Skipped);
        }
        if g.completed != g.last_submit {
            bail!("rebuild while submit {} still in flight", g.last_submit);
        }
        if g.live.iter().any(|l| !l.is_empty()) {
            bail!("rebuild with one-shot buffers outstanding");
        }
        if let Some(n) = g.rebuild_image_count.take() {
            g.image_count = n;
        }
        let n = g.image_count;
        g.extent = size;
        g.generation += 1;
        g.fences = vec![None; n];
        g.live = vec![Vec::new(); n];
        g.next_image = 0;
        let generation = g.generation;
        g.events.push(Event::Rebuild { size, generation });
        Ok(RebuildOutcome::Rebuilt)
    }

    fn acquire_next_image(&mut self) -> Result<AcquireOutcome> {
        let mut g = self.gpu.borrow_mut();
        let generation = g.generation;
        if g.stale_acquires > 0 {
            g.stale_acquires -= 1;
            g.events.push(Event::AcquireStale { generation });
            return Ok(AcquireOutcome::Stale);
        }
        let image = match g.image_order.pop_front() {
            Some(i) => i,
            None => {
                let i = g.next_image;
                g.next_image = (i + 1) % g.image_count as u32;
                i
            }
        };
        g.events.push(Event::Acquire { image, generation });
        Ok(AcquireOutcome::Acquired(image))
    }

    fn wait_for_image(&mut self, image: u32) -> Result<()> {
        let mut g = self.gpu.borrow_mut();
        let Some(&fence) = g.fences.get(image as usize) else {
            bail!("no image {image}");
        };
        if let Some(id) = fence {
            g.completed = g.completed.max(id);
        }
        g.events.push(Event::WaitImage { image });
        Ok(())
    }

    fn free_command_buffers(&mut self, image: u32, buffers: &[u32]) {
        let mut g = self.gpu.borrow_mut();
        if let Some(live) = g.live.get_mut(image as usize) {
            live.retain(|c| !buffers.contains(c));
        }
        g.events.push(Event::FreeCmds {
            image,
            count: buffers.len(),
        });
    }

    fn reset_command_pool(&mut self, image: u32) -> Result<()> {
        let mut g = self.gpu.borrow_mut();
        let i = image as usize;
        if !g.live[i].is_empty() {
            bail!("pool {image} reset with {} buffers outstanding", g.live[i].len());
        }
        if let Some(id) = g.fences[i] {
            if !g.is_complete(id) {
                bail!("pool {image} reset while submit {id} in flight");
            }
        }
        g.events.push(Event::ResetPool { image });
        Ok(())
    }

    fn submit_frame(&mut self, image: u32, _draw: &DrawData, _clear: ClearColor) -> Result<()> {
        let mut g = self.gpu.borrow_mut();
        let i = image as usize;
        if let Some(id) = g.fences[i] {
            if !g.is_complete(id) {
                bail!("image {image} resubmitted before submit {id} finished");
            }
        }
        g.last_submit += 1;
        let id = g.last_submit;
        g.fences[i] = Some(id);
        let generation = g.generation;
        g.events.push(Event::Submit {
            image,
            id,
            generation,
        });
        Ok(())
    }

    fn present(&mut self, image: u32) -> Result<PresentOutcome> {
        let mut g = self.gpu.borrow_mut();
        let generation = g.generation;
        if g.stale_presents > 0 {
            g.stale_presents -= 1;
            g.events.push(Event::PresentStale { generation });
            return Ok(PresentOutcome::Stale);
        }
        g.events.push(Event::Present { image, generation });
        Ok(PresentOutcome::Presented)
    }

    fn allocate_command_buffer(&mut self, image: u32) -> Result<u32> {
        let mut g = self.gpu.borrow_mut();
        let cmd = g.next_cmd;
        g.next_cmd += 1;
        g.live[image as usize].push(cmd);
        g.events.push(Event::Allocate { image, cmd });
        Ok(cmd)
    }

    fn flush_command_buffer(&mut self, cmd: u32) -> Result<()> {
        self.gpu.borrow_mut().events.push(Event::Flush { cmd });
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        let mut g = self.gpu.borrow_mut();
        g.completed = g.last_submit;
        g.events.push(Event::WaitIdle);
        Ok(())
    }
}

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Records every hook it sees as `"<name>:<hook>"`.
pub struct RecordingLayer {
    pub name: &'static str,
    pub log: Log,
    pub close_on_update: bool,
}

impl RecordingLayer {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            close_on_update: false,
        }
    }

    fn push(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{}:{hook}", self.name));
    }
}

impl<B: GpuBackend> Layer<B> for RecordingLayer {
    fn on_attach(&mut self, _ctx: &mut FrameContext<'_, B>) {
        self.push("attach");
    }

    fn on_detach(&mut self, _ctx: &mut FrameContext<'_, B>) {
        self.push("detach");
    }

    fn on_update(&mut self, ctx: &mut FrameContext<'_, B>, _ts: f32) {
        self.push("update");
        if self.close_on_update {
            ctx.close();
        }
    }

    fn on_ui_render(&mut self, _ctx: &mut FrameContext<'_, B>, _ui: &mut DrawList) {
        self.push("ui");
    }
}

pub fn count(log: &Log, entry: &str) -> usize {
    log.borrow().iter().filter(|e| e.as_str() == entry).count()
}
