// SPDX-License-Identifier: CEPL-1.0
//! Per-frame-in-flight bookkeeping.
//!
//! Two rings live here. Deferred-free queues are indexed by the
//! frame-in-flight slot, which rotates once per rendered frame. Allocated
//! command buffer sets are indexed by swapchain image, which the driver hands
//! out in whatever order it likes. Nothing here touches the GPU; callers wait
//! the right fences before draining.

use anyhow::{Context, Result};
use std::mem;
use tracing::trace;

pub type FreeAction = Box<dyn FnOnce()>;

pub struct FrameResources<C> {
    frame_index: usize,
    free_queues: Vec<Vec<FreeAction>>,
    // Swapchain image each slot last submitted with.
    slot_images: Vec<Option<u32>>,
    allocated: Vec<Vec<C>>,
}

impl<C: Copy> FrameResources<C> {
    pub fn new(image_count: usize) -> Self {
        let n = image_count.max(1);
        Self {
            frame_index: 0,
            free_queues: (0..n).map(|_| Vec::new()).collect(),
            slot_images: vec![None; n],
            allocated: (0..n).map(|_| Vec::new()).collect(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.free_queues.len()
    }

    /// Swapchain images the allocated sets are shaped for.
    pub fn image_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn current_slot(&self) -> usize {
        self.frame_index
    }

    /// Queue `action` on the current slot. It runs the next time this slot
    /// becomes current, never now.
    pub fn enqueue_free(&mut self, action: impl FnOnce() + 'static) {
        self.free_queues[self.frame_index].push(Box::new(action));
    }

    pub fn pending_in_slot(&self, slot: usize) -> usize {
        self.free_queues.get(slot).map_or(0, Vec::len)
    }

    pub fn pending_frees(&self) -> usize {
        self.free_queues.iter().map(Vec::len).sum()
    }

    /// Rotate to the next slot and return it.
    pub fn advance(&mut self) -> usize {
        self.frame_index = (self.frame_index + 1) % self.slot_count();
        self.frame_index
    }

    /// The image whose fence guards the current slot's previous submission.
    pub fn last_image_for_current_slot(&self) -> Option<u32> {
        self.slot_images[self.frame_index]
    }

    pub fn mark_submitted(&mut self, image: u32) {
        self.slot_images[self.frame_index] = Some(image);
    }

    /// Run and clear every action queued on the current slot, in enqueue
    /// order. Only call after the slot's previous submission has completed.
    pub fn drain_current_slot(&mut self) -> usize {
        let queue = mem::take(&mut self.free_queues[self.frame_index]);
        let n = queue.len();
        for action in queue {
            action();
        }
        if n > 0 {
            trace!(slot = self.frame_index, freed = n, "drained deferred frees");
        }
        n
    }

    /// Run every pending action in every slot. Only valid once the device is
    /// idle.
    pub fn drain_all(&mut self) -> usize {
        let mut n = 0;
        for queue in &mut self.free_queues {
            for action in mem::take(queue) {
                action();
                n += 1;
            }
        }
        n
    }

    pub fn record_allocated(&mut self, image: u32, cmd: C) -> Result<()> {
        let n = self.image_count();
        self.allocated
            .get_mut(image as usize)
            .with_context(|| format!("image {image} outside frame rings ({n} images)"))?
            .push(cmd);
        Ok(())
    }

    pub fn allocated(&self, image: u32) -> &[C] {
        self.allocated
            .get(image as usize)
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn take_allocated(&mut self, image: u32) -> Result<Vec<C>> {
        let n = self.image_count();
        let set = self
            .allocated
            .get_mut(image as usize)
            .with_context(|| format!("image {image} outside frame rings ({n} images)"))?;
        Ok(mem::take(set))
    }

    pub fn take_all_allocated(&mut self) -> Vec<(u32, Vec<C>)> {
        self.allocated
            .iter_mut()
            .enumerate()
            .filter(|(_, set)| !set.is_empty())
            .map(|(i, set)| (i as u32, mem::take(set)))
            .collect()
    }

    /// Resize the rings for a rebuilt swapchain. The device must be idle and
    /// allocated sets already freed. Pending actions keep their slots unless
    /// the slot count changes, in which case they all run now.
    pub fn reshape(&mut self, image_count: usize) {
        let n = image_count.max(1);
        if n != self.slot_count() {
            let ran = self.drain_all();
            trace!(from = self.slot_count(), to = n, ran, "reshaping frame rings");
            self.free_queues = (0..n).map(|_| Vec::new()).collect();
            self.frame_index %= n;
        }
        self.slot_images = vec![None; n];
        self.allocated = (0..n).map(|_| Vec::new()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn log() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn enqueue_never_runs_immediately() {
        let ran = log();
        let mut ring = FrameResources::<u64>::new(2);
        let r = Rc::clone(&ran);
        ring.enqueue_free(move || r.borrow_mut().push("a"));
        assert!(ran.borrow().is_empty());
        assert_eq!(ring.pending_in_slot(0), 1);
    }

    #[test]
    fn action_runs_only_when_its_slot_comes_back() {
        let ran = log();
        let mut ring = FrameResources::<u64>::new(3);

        let r = Rc::clone(&ran);
        ring.enqueue_free(move || r.borrow_mut().push("slot0"));

        for _ in 0..2 {
            ring.advance();
            ring.drain_current_slot();
            assert!(ran.borrow().is_empty());
        }

        assert_eq!(ring.advance(), 0);
        assert_eq!(ring.drain_current_slot(), 1);
        assert_eq!(*ran.borrow(), vec!["slot0"]);
        assert_eq!(ring.pending_frees(), 0);
    }

    #[test]
    fn drain_preserves_enqueue_order() {
        let ran = log();
        let mut ring = FrameResources::<u64>::new(2);
        for tag in ["first", "second", "third"] {
            let r = Rc::clone(&ran);
            ring.enqueue_free(move || r.borrow_mut().push(tag));
        }
        ring.drain_current_slot();
        assert_eq!(*ran.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn allocated_sets_are_per_image() {
        let mut ring = FrameResources::<u64>::new(3);
        ring.record_allocated(2, 10).unwrap();
        ring.record_allocated(2, 11).unwrap();
        ring.record_allocated(0, 12).unwrap();

        assert_eq!(ring.allocated(2), &[10, 11]);
        assert_eq!(ring.take_allocated(2).unwrap(), vec![10, 11]);
        assert!(ring.allocated(2).is_empty());
        assert_eq!(ring.take_all_allocated(), vec![(0, vec![12])]);
        assert!(ring.take_all_allocated().is_empty());
    }

    #[test]
    fn images_outside_the_rings_are_errors() {
        let mut ring = FrameResources::<u64>::new(2);
        ring.record_allocated(1, 7).unwrap();
        ring.reshape(2);

        assert!(ring.record_allocated(3, 8).is_err());
        assert!(ring.take_allocated(3).is_err());
        assert!(ring.allocated(3).is_empty());
        assert_eq!(ring.image_count(), 2);

        ring.reshape(4);
        ring.record_allocated(3, 9).unwrap();
        assert_eq!(ring.take_allocated(3).unwrap(), vec![9]);
    }

    #[test]
    fn slot_remembers_its_last_image() {
        let mut ring = FrameResources::<u64>::new(2);
        assert_eq!(ring.last_image_for_current_slot(), None);
        ring.mark_submitted(1);
        ring.advance();
        ring.mark_submitted(0);
        ring.advance();
        assert_eq!(ring.last_image_for_current_slot(), Some(1));
    }

    #[test]
    fn reshape_to_same_count_keeps_pending_actions() {
        let ran = log();
        let mut ring = FrameResources::<u64>::new(2);
        ring.advance();
        let r = Rc::clone(&ran);
        ring.enqueue_free(move || r.borrow_mut().push("kept"));
        ring.mark_submitted(1);

        ring.reshape(2);
        assert!(ran.borrow().is_empty());
        assert_eq!(ring.pending_in_slot(1), 1);
        assert_eq!(ring.current_slot(), 1);
        assert_eq!(ring.last_image_for_current_slot(), None);
    }

    #[test]
    fn reshape_to_new_count_flushes_and_wraps_index() {
        let ran = log();
        let mut ring = FrameResources::<u64>::new(3);
        ring.advance();
        ring.advance();
        let r = Rc::clone(&ran);
        ring.enqueue_free(move || r.borrow_mut().push("flushed"));

        ring.reshape(2);
        assert_eq!(*ran.borrow(), vec!["flushed"]);
        assert_eq!(ring.slot_count(), 2);
        assert_eq!(ring.current_slot(), 0);
        assert_eq!(ring.pending_frees(), 0);
    }
}
