// SPDX-License-Identifier: CEPL-1.0
//! Double-buffered frame state machine.
//!
//! `FrameLoop` owns the ordering rules; a [`SwapTarget`] performs the GPU work
//! for each step. The loop never recreates anything itself: when a step
//! reports a stale surface it parks in [`FrameState::NeedsRecreation`] and the
//! owner must rebuild the target and call [`FrameLoop::recreated`] before the
//! next frame can begin.
use crate::cache::{AssetCache, AssetFactory};
use anyhow::{bail, Result};
use tracing::{debug, trace};

/// Frames the CPU may record ahead of the GPU. Independent of the swapchain
/// image count.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
    NeedsRecreation,
}

/// Result of asking the surface for its next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Image(u32),
    /// The surface no longer matches the swapchain.
    Stale,
}

/// Result of handing a finished image back to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Present {
    Presented,
    /// Suboptimal or out of date; either way the swapchain must be rebuilt.
    Stale,
}

/// GPU side of one frame. `slot` indexes the in-flight synchronisation
/// primitives, `image` the swapchain image and its per-image resources.
pub trait SwapTarget {
    /// Waits for the slot's fence, resets it, then requests the next image
    /// signalling the slot's graphics semaphore.
    fn acquire(&mut self, slot: usize) -> Result<Acquire>;

    /// Resets and begins the image's command buffer, sets viewport/scissor and
    /// opens the render pass.
    fn begin_recording(&mut self, image: u32) -> Result<()>;

    /// Closes the render pass and command buffer, then submits it waiting on
    /// the slot's graphics semaphore and signalling its presentation semaphore
    /// and fence.
    fn submit(&mut self, slot: usize, image: u32) -> Result<()>;

    /// Presents the image gated on the slot's presentation semaphore and, on
    /// success, waits for the presentation queue to go idle.
    fn present(&mut self, slot: usize, image: u32) -> Result<Present>;
}

/// Ring cursor over the in-flight slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCursor {
    slot: usize,
    len: usize,
}

impl FrameCursor {
    pub fn new(len: usize) -> Self {
        Self {
            slot: 0,
            len: len.max(1),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn frames_in_flight(&self) -> usize {
        self.len
    }

    pub fn advance(&mut self) {
        self.slot = (self.slot + 1) % self.len;
    }

    pub fn reset(&mut self) {
        self.slot = 0;
    }
}

/// Which half of the frame protocol [`FrameLoop::drive`] should run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStep {
    Begin,
    End,
}

#[derive(Debug)]
pub struct FrameLoop {
    state: FrameState,
    cursor: FrameCursor,
    image: Option<u32>,
    recreation_pending: bool,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::with_frames_in_flight(MAX_FRAMES_IN_FLIGHT)
    }

    pub fn with_frames_in_flight(frames: usize) -> Self {
        Self {
            state: FrameState::Idle,
            cursor: FrameCursor::new(frames),
            image: None,
            recreation_pending: false,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn slot(&self) -> usize {
        self.cursor.slot()
    }

    /// Swapchain image of the frame currently being recorded.
    pub fn image(&self) -> Option<u32> {
        self.image
    }

    pub fn needs_recreation(&self) -> bool {
        self.state == FrameState::NeedsRecreation
    }

    fn enter(&mut self, next: FrameState) {
        trace!("frame {:?} -> {next:?}", self.state);
        self.state = next;
    }

    /// A target step failed: the frame is abandoned and the target must be
    /// rebuilt before another one can begin.
    fn abort(&mut self) {
        self.enter(FrameState::NeedsRecreation);
        self.image = None;
    }

    /// Marks the target stale from outside the loop (window resize). Between
    /// frames this takes effect at once; mid-frame the open frame finishes
    /// against the old target and the loop parks once it is presented.
    pub fn invalidate(&mut self) {
        self.recreation_pending = true;
        if self.state == FrameState::Idle {
            self.enter(FrameState::NeedsRecreation);
        }
    }

    /// The owner rebuilt the target, including fresh per-slot primitives.
    pub fn recreated(&mut self) {
        self.enter(FrameState::Idle);
        self.image = None;
        self.recreation_pending = false;
        self.cursor.reset();
    }

    /// Idle -> Acquiring -> Recording. Returns `false` when the surface is
    /// stale (or already known stale) and nothing was opened.
    pub fn begin<T: SwapTarget + ?Sized>(&mut self, target: &mut T) -> Result<bool> {
        match self.state {
            FrameState::Idle => {}
            FrameState::NeedsRecreation => return Ok(false),
            other => bail!("frame begin while {other:?}"),
        }

        let slot = self.cursor.slot();
        self.enter(FrameState::Acquiring);
        match target.acquire(slot).inspect_err(|_| self.abort())? {
            Acquire::Stale => {
                debug!("acquire on slot {slot}: surface stale");
                self.enter(FrameState::NeedsRecreation);
                Ok(false)
            }
            Acquire::Image(image) => {
                target
                    .begin_recording(image)
                    .inspect_err(|_| self.abort())?;
                self.image = Some(image);
                self.enter(FrameState::Recording);
                Ok(true)
            }
        }
    }

    /// Recording -> Submitted -> Presenting -> Idle, advancing the cursor.
    /// Returns `false` when presentation reports a stale or suboptimal
    /// surface; the cursor does not advance in that case. A frame presented
    /// after [`invalidate`](Self::invalidate) parks in `NeedsRecreation`.
    pub fn end<T: SwapTarget + ?Sized>(&mut self, target: &mut T) -> Result<bool> {
        let image = match (self.state, self.image) {
            (FrameState::Recording, Some(image)) => image,
            (state, _) => bail!("frame end while {state:?}"),
        };

        let slot = self.cursor.slot();
        target
            .submit(slot, image)
            .inspect_err(|_| self.abort())?;
        self.enter(FrameState::Submitted);

        self.enter(FrameState::Presenting);
        let presented = target
            .present(slot, image)
            .inspect_err(|_| self.abort())?;
        self.image = None;
        match presented {
            Present::Stale => {
                debug!("present on slot {slot}: surface stale");
                self.enter(FrameState::NeedsRecreation);
                Ok(false)
            }
            Present::Presented => {
                self.cursor.advance();
                if self.recreation_pending {
                    debug!("resize during frame: recreation deferred to now");
                    self.enter(FrameState::NeedsRecreation);
                } else {
                    self.enter(FrameState::Idle);
                }
                Ok(true)
            }
        }
    }

    /// Runs one half of the frame protocol and, when it reports a stale
    /// target, recovers via [`recover`](Self::recover) and returns `false`.
    pub fn drive<'t, T, P, M, X, F>(
        &mut self,
        step: FrameStep,
        target: &'t mut T,
        assets: &mut AssetCache<P, M, X>,
        rebuild: impl FnOnce(&mut T) -> Result<()>,
        factory: impl FnOnce(&'t T) -> F,
    ) -> Result<bool>
    where
        T: SwapTarget + ?Sized,
        F: AssetFactory<Pipeline = P, Mesh = M, Texture = X>,
    {
        let done = match step {
            FrameStep::Begin => !self.needs_recreation() && self.begin(&mut *target)?,
            FrameStep::End => self.end(&mut *target)?,
        };
        if done {
            return Ok(true);
        }
        self.recover(target, assets, rebuild, factory)?;
        Ok(false)
    }

    /// STRICT ORDER: rebuild the target in place, rebuild every
    /// render-target-dependent asset against the new target, then reopen the
    /// loop at slot 0.
    pub fn recover<'t, T, P, M, X, F>(
        &mut self,
        target: &'t mut T,
        assets: &mut AssetCache<P, M, X>,
        rebuild: impl FnOnce(&mut T) -> Result<()>,
        factory: impl FnOnce(&'t T) -> F,
    ) -> Result<()>
    where
        T: SwapTarget + ?Sized,
        F: AssetFactory<Pipeline = P, Mesh = M, Texture = X>,
    {
        rebuild(&mut *target)?;
        let target: &'t T = target;
        let mut factory = factory(target);
        assets.reload_contextual_assets(&mut factory)?;
        self.recreated();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_modulo_len() {
        let mut c = FrameCursor::new(2);
        let seen: Vec<usize> = (0..5)
            .map(|_| {
                let s = c.slot();
                c.advance();
                s
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn zero_length_cursor_is_clamped() {
        let mut c = FrameCursor::new(0);
        c.advance();
        assert_eq!(c.slot(), 0);
        assert_eq!(c.frames_in_flight(), 1);
    }

    #[test]
    fn invalidate_between_frames_parks_immediately() {
        let mut f = FrameLoop::new();
        f.invalidate();
        assert!(f.needs_recreation());
        f.recreated();
        assert_eq!(f.state(), FrameState::Idle);
    }
}
