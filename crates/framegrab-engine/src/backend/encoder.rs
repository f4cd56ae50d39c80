use std::collections::BTreeMap;

use glam::Mat4;

use crate::coords::ViewRect;

use super::handles::{FrameBufferHandle, TextureHandle};
use super::types::{DrawCall, ReadbackTicket, ViewClear, ViewId};

/// Persistent per-view settings. They survive frame advances until changed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct ViewState {
    /// `None` renders to the back buffer.
    pub frame_buffer: Option<FrameBufferHandle>,
    pub clear: ViewClear,
    /// `None` covers the whole target.
    pub rect: Option<ViewRect>,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            frame_buffer: None,
            clear: ViewClear::default(),
            rect: None,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Blit {
    pub dst: TextureHandle,
    pub src: TextureHandle,
}

/// Work encoded for one view since the last frame advance.
#[derive(Debug, Default)]
pub(crate) struct ViewWork {
    pub touched: bool,
    pub blits: Vec<Blit>,
    pub draws: Vec<DrawCall>,
}

impl ViewWork {
    /// The view clears and renders this frame.
    pub fn renders(&self) -> bool {
        self.touched || !self.draws.is_empty()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct PendingReadback {
    pub ticket: ReadbackTicket,
    pub texture: TextureHandle,
}

/// Everything a backend executes in one frame advance.
#[derive(Debug, Default)]
pub(crate) struct FrameWork {
    /// Views in ascending id, each with its state snapshot.
    pub views: Vec<(ViewId, ViewState, ViewWork)>,
    /// Executed after all views.
    pub readbacks: Vec<PendingReadback>,
}

/// Records view settings and encoded work between frame advances.
///
/// Shared by every backend so that ordering rules are identical: views run in
/// ascending id, a view's blits run before its draws, read-backs run last.
#[derive(Debug, Default)]
pub(crate) struct FrameEncoder {
    states: BTreeMap<ViewId, ViewState>,
    work: BTreeMap<ViewId, ViewWork>,
    readbacks: Vec<PendingReadback>,
    next_readback_id: u64,
}

impl FrameEncoder {
    pub fn state_mut(&mut self, view: ViewId) -> &mut ViewState {
        self.states.entry(view).or_default()
    }

    pub fn state(&self, view: ViewId) -> ViewState {
        self.states.get(&view).copied().unwrap_or_default()
    }

    pub fn touch(&mut self, view: ViewId) {
        self.work.entry(view).or_default().touched = true;
    }

    pub fn draw(&mut self, view: ViewId, draw: DrawCall) {
        self.work.entry(view).or_default().draws.push(draw);
    }

    pub fn blit(&mut self, view: ViewId, dst: TextureHandle, src: TextureHandle) {
        self.work.entry(view).or_default().blits.push(Blit { dst, src });
    }

    /// Queues a read-back that completes with frame `completed_frame + 1`.
    pub fn read_texture(&mut self, texture: TextureHandle, completed_frame: u64) -> ReadbackTicket {
        let ticket = ReadbackTicket {
            id: self.next_readback_id,
            ready_frame: completed_frame + 1,
        };
        self.next_readback_id += 1;
        self.readbacks.push(PendingReadback { ticket, texture });
        ticket
    }

    /// Forgets a queued read-back. Returns `false` if it already ran.
    pub fn discard_readback(&mut self, id: u64) -> bool {
        let before = self.readbacks.len();
        self.readbacks.retain(|r| r.ticket.id != id);
        self.readbacks.len() != before
    }

    pub fn pending_readbacks(&self) -> usize {
        self.readbacks.len()
    }

    /// Drops any binding to `fb`; bound views fall back to the back buffer.
    pub fn unbind_frame_buffer(&mut self, fb: FrameBufferHandle) {
        for state in self.states.values_mut() {
            if state.frame_buffer == Some(fb) {
                state.frame_buffer = None;
            }
        }
    }

    /// Takes the encoded work, leaving view settings in place.
    pub fn take(&mut self) -> FrameWork {
        let work = std::mem::take(&mut self.work);
        let views = work
            .into_iter()
            .map(|(id, w)| (id, self.state(id), w))
            .collect();

        FrameWork {
            views,
            readbacks: std::mem::take(&mut self.readbacks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn tex(n: u64) -> TextureHandle {
        TextureHandle::from(KeyData::from_ffi(n))
    }

    #[test]
    fn views_come_out_in_ascending_order() {
        let mut enc = FrameEncoder::default();
        enc.touch(3);
        enc.touch(0);
        enc.touch(1);
        let ids: Vec<ViewId> = enc.take().views.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 3]);
    }

    #[test]
    fn view_state_persists_across_frames() {
        let mut enc = FrameEncoder::default();
        enc.state_mut(0).rect = Some(ViewRect::new(0, 0, 8, 8));
        enc.touch(0);
        let _ = enc.take();

        enc.touch(0);
        let work = enc.take();
        assert_eq!(work.views[0].1.rect, Some(ViewRect::new(0, 0, 8, 8)));
    }

    #[test]
    fn readback_is_ready_one_frame_later() {
        let mut enc = FrameEncoder::default();
        let ticket = enc.read_texture(tex(1), 4);
        assert_eq!(ticket.ready_frame, 5);
        assert!(!ticket.is_ready(4));
        assert!(ticket.is_ready(5));

        let work = enc.take();
        assert_eq!(work.readbacks.len(), 1);
        assert!(enc.take().readbacks.is_empty());
    }

    #[test]
    fn discarded_readback_never_runs() {
        let mut enc = FrameEncoder::default();
        let kept = enc.read_texture(tex(1), 0);
        let dropped = enc.read_texture(tex(2), 0);
        assert!(enc.discard_readback(dropped.id));
        assert!(!enc.discard_readback(dropped.id));
        assert_eq!(enc.pending_readbacks(), 1);

        let work = enc.take();
        assert_eq!(work.readbacks.len(), 1);
        assert_eq!(work.readbacks[0].ticket, kept);
    }

    #[test]
    fn blit_only_view_does_not_render() {
        let mut enc = FrameEncoder::default();
        enc.blit(0, tex(1), tex(2));
        let work = enc.take();
        assert!(!work.views[0].2.renders());
        assert_eq!(work.views[0].2.blits.len(), 1);
    }
}
