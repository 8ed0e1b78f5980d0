//! Resource-state tracking for frame surfaces.
//!
//! wgpu inserts the physical barriers itself; this tracker enforces the
//! write → read discipline every pass has to follow, and keeps a log of the
//! transitions so a frame can be audited after the fact.

use thiserror::Error;

/// Every surface a frame writes or samples.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum TargetId {
    Swap,
    Albedo,
    Normal,
    LinearDepth,
    Shadow,
    Hdr,
    Bright,
    Blur,
    Composite,
}

impl TargetId {
    pub const ALL: [TargetId; 9] = [
        TargetId::Swap,
        TargetId::Albedo,
        TargetId::Normal,
        TargetId::LinearDepth,
        TargetId::Shadow,
        TargetId::Hdr,
        TargetId::Bright,
        TargetId::Blur,
        TargetId::Composite,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceState {
    /// Owned by the presentation engine (swap images only).
    Present,
    /// Bound as a color/depth attachment.
    RenderTarget,
    /// Sampled by shaders.
    ShaderRead,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Transition {
    pub target: TargetId,
    pub before: ResourceState,
    pub after: ResourceState,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum BarrierError {
    #[error("{target:?} expected {expected:?} but is {actual:?}")]
    WrongState {
        target: TargetId,
        expected: ResourceState,
        actual: ResourceState,
    },

    #[error("{0:?} is bound as both an input and an output of the same pass")]
    ReadWriteAlias(TargetId),

    #[error("{target:?} ended the frame with {writes} write transition(s) and {reads} read transition(s)")]
    Unbalanced {
        target: TargetId,
        writes: u32,
        reads: u32,
    },
}

/// Inputs and outputs of one pass.
#[derive(Debug, Copy, Clone)]
pub struct PassIo<'a> {
    pub reads: &'a [TargetId],
    pub writes: &'a [TargetId],
}

/// Ordered record of every transition issued during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarrierLog {
    pub transitions: Vec<Transition>,
}

impl BarrierLog {
    /// Position of the first transition of `target` into `after`, if any.
    pub fn position(&self, target: TargetId, after: ResourceState) -> Option<usize> {
        self.transitions
            .iter()
            .position(|t| t.target == target && t.after == after)
    }

    pub fn count(&self, target: TargetId, after: ResourceState) -> usize {
        self.transitions
            .iter()
            .filter(|t| t.target == target && t.after == after)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct BarrierTracker {
    states: [ResourceState; TargetId::ALL.len()],
    writes: [u32; TargetId::ALL.len()],
    reads: [u32; TargetId::ALL.len()],
    log: BarrierLog,
}

impl Default for BarrierTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BarrierTracker {
    /// Offscreen surfaces start shader-readable; the swap image starts presented.
    pub fn new() -> Self {
        let mut states = [ResourceState::ShaderRead; TargetId::ALL.len()];
        states[TargetId::Swap.index()] = ResourceState::Present;
        Self {
            states,
            writes: [0; TargetId::ALL.len()],
            reads: [0; TargetId::ALL.len()],
            log: BarrierLog::default(),
        }
    }

    #[inline]
    pub fn state(&self, target: TargetId) -> ResourceState {
        self.states[target.index()]
    }

    #[inline]
    pub fn log(&self) -> &BarrierLog {
        &self.log
    }

    /// Present → RenderTarget on the swap image.
    pub fn acquire_swap(&mut self) -> Result<(), BarrierError> {
        self.transition(TargetId::Swap, ResourceState::Present, ResourceState::RenderTarget)
    }

    /// RenderTarget → Present on the swap image.
    pub fn present_swap(&mut self) -> Result<(), BarrierError> {
        self.transition(TargetId::Swap, ResourceState::RenderTarget, ResourceState::Present)
    }

    pub fn transition_for_write(&mut self, target: TargetId) -> Result<(), BarrierError> {
        self.transition(target, ResourceState::ShaderRead, ResourceState::RenderTarget)?;
        self.writes[target.index()] += 1;
        Ok(())
    }

    pub fn transition_for_read(&mut self, target: TargetId) -> Result<(), BarrierError> {
        self.transition(target, ResourceState::RenderTarget, ResourceState::ShaderRead)?;
        self.reads[target.index()] += 1;
        Ok(())
    }

    pub fn require(&self, target: TargetId, expected: ResourceState) -> Result<(), BarrierError> {
        let actual = self.state(target);
        if actual != expected {
            return Err(BarrierError::WrongState {
                target,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Checks inputs are readable and moves outputs into the writable state.
    /// The swap image is already writable after `acquire_swap`.
    pub fn begin_pass(&mut self, io: PassIo<'_>) -> Result<(), BarrierError> {
        if let Some(t) = io.reads.iter().find(|t| io.writes.contains(t)) {
            return Err(BarrierError::ReadWriteAlias(*t));
        }
        for &t in io.reads {
            self.require(t, ResourceState::ShaderRead)?;
        }
        for &t in io.writes {
            if t == TargetId::Swap {
                self.require(t, ResourceState::RenderTarget)?;
            } else {
                self.transition_for_write(t)?;
            }
        }
        Ok(())
    }

    /// Moves every offscreen output back to shader-readable.
    pub fn end_pass(&mut self, io: PassIo<'_>) -> Result<(), BarrierError> {
        for &t in io.writes {
            if t != TargetId::Swap {
                self.transition_for_read(t)?;
            }
        }
        Ok(())
    }

    /// Verifies every surface is back at rest and returns the frame's log.
    pub fn finish_frame(&mut self) -> Result<BarrierLog, BarrierError> {
        for t in TargetId::ALL {
            let at_rest = if t == TargetId::Swap {
                ResourceState::Present
            } else {
                ResourceState::ShaderRead
            };
            self.require(t, at_rest)?;

            let (writes, reads) = (self.writes[t.index()], self.reads[t.index()]);
            if writes != reads {
                return Err(BarrierError::Unbalanced {
                    target: t,
                    writes,
                    reads,
                });
            }
        }
        let log = std::mem::take(&mut self.log);
        self.writes = [0; TargetId::ALL.len()];
        self.reads = [0; TargetId::ALL.len()];
        Ok(log)
    }

    /// Drops the current frame's bookkeeping after an aborted frame.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn transition(
        &mut self,
        target: TargetId,
        before: ResourceState,
        after: ResourceState,
    ) -> Result<(), BarrierError> {
        self.require(target, before)?;
        self.states[target.index()] = after;
        self.log.transitions.push(Transition {
            target,
            before,
            after,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceState::*;
    use TargetId::*;

    #[test]
    fn write_then_read_is_balanced() {
        let mut b = BarrierTracker::new();
        b.transition_for_write(Hdr).unwrap();
        b.transition_for_read(Hdr).unwrap();
        let log = b.finish_frame().unwrap();
        assert_eq!(log.count(Hdr, RenderTarget), 1);
        assert_eq!(log.count(Hdr, ShaderRead), 1);
    }

    #[test]
    fn double_write_is_rejected() {
        let mut b = BarrierTracker::new();
        b.transition_for_write(Albedo).unwrap();
        assert_eq!(
            b.transition_for_write(Albedo),
            Err(BarrierError::WrongState {
                target: Albedo,
                expected: ShaderRead,
                actual: RenderTarget
            })
        );
    }

    #[test]
    fn read_of_unwritten_target_is_rejected() {
        let mut b = BarrierTracker::new();
        assert!(b.transition_for_read(Normal).is_err());
    }

    #[test]
    fn sampling_a_target_mid_write_is_rejected() {
        let mut b = BarrierTracker::new();
        b.begin_pass(PassIo { reads: &[], writes: &[Bright] }).unwrap();
        let err = b
            .begin_pass(PassIo { reads: &[Bright], writes: &[Blur] })
            .unwrap_err();
        assert!(matches!(err, BarrierError::WrongState { target: Bright, .. }));
    }

    #[test]
    fn same_target_as_input_and_output_is_rejected() {
        let mut b = BarrierTracker::new();
        assert_eq!(
            b.begin_pass(PassIo { reads: &[Hdr], writes: &[Hdr] }),
            Err(BarrierError::ReadWriteAlias(Hdr))
        );
    }

    #[test]
    fn unfinished_frame_fails_verification() {
        let mut b = BarrierTracker::new();
        b.acquire_swap().unwrap();
        assert!(b.finish_frame().is_err());
    }

    #[test]
    fn swap_cycle_is_present_to_present() {
        let mut b = BarrierTracker::new();
        b.acquire_swap().unwrap();
        b.begin_pass(PassIo { reads: &[], writes: &[Swap] }).unwrap();
        b.end_pass(PassIo { reads: &[], writes: &[Swap] }).unwrap();
        b.present_swap().unwrap();
        let log = b.finish_frame().unwrap();
        assert_eq!(log.transitions.len(), 2);
        assert_eq!(b.state(Swap), Present);
    }

    #[test]
    fn ping_pong_reuse_after_read() {
        let mut b = BarrierTracker::new();
        for _ in 0..2 {
            b.begin_pass(PassIo { reads: &[], writes: &[Bright] }).unwrap();
            b.end_pass(PassIo { reads: &[], writes: &[Bright] }).unwrap();
        }
        let log = b.finish_frame().unwrap();
        assert_eq!(log.count(Bright, RenderTarget), 2);
    }
}
