//! Host Surface
//!
//! What the session needs from whatever embeds it: a viewport size, frame
//! scheduling, resize notifications and a place to attach the renderer's
//! output. [`HeadlessHost`] implements it with an in-memory event queue.

use std::collections::{BTreeSet, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Pending animation-frame request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(pub u64);

/// Registered resize listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Renderer output attached to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

/// Events the host delivers to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    AnimationFrame(FrameHandle),
    Resized(ListenerId, Viewport),
}

pub trait HostSurface {
    fn viewport(&self) -> Viewport;

    /// Schedule one `AnimationFrame` event.
    fn request_frame(&mut self) -> FrameHandle;

    fn cancel_frame(&mut self, handle: FrameHandle);

    fn add_resize_listener(&mut self) -> ListenerId;

    fn remove_resize_listener(&mut self, id: ListenerId);

    /// Attach the output of the renderer called `renderer`.
    fn attach_output(&mut self, renderer: &str) -> SurfaceId;

    fn detach_output(&mut self, id: SurfaceId);
}

/// In-memory host for the CLI and tests.
#[derive(Debug)]
pub struct HeadlessHost {
    viewport: Viewport,
    events: VecDeque<HostEvent>,
    listeners: BTreeSet<ListenerId>,
    outputs: BTreeSet<SurfaceId>,
    next_id: u64,
}

impl HeadlessHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            events: VecDeque::new(),
            listeners: BTreeSet::new(),
            outputs: BTreeSet::new(),
            next_id: 1,
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Change the viewport and notify every listener.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
        for &listener in &self.listeners {
            self.events.push_back(HostEvent::Resized(listener, self.viewport));
        }
    }

    /// Next queued event, oldest first.
    pub fn poll_event(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    pub fn pending_frames(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, HostEvent::AnimationFrame(_)))
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn attached_outputs(&self) -> usize {
        self.outputs.len()
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl HostSurface for HeadlessHost {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next());
        self.events.push_back(HostEvent::AnimationFrame(handle));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.events.retain(|e| *e != HostEvent::AnimationFrame(handle));
    }

    fn add_resize_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next());
        self.listeners.insert(id);
        id
    }

    fn remove_resize_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
        self.events.retain(|e| !matches!(e, HostEvent::Resized(l, _) if *l == id));
    }

    fn attach_output(&mut self, renderer: &str) -> SurfaceId {
        let id = SurfaceId(self.next());
        tracing::debug!("Attached {} output as surface {}", renderer, id.0);
        self.outputs.insert(id);
        id
    }

    fn detach_output(&mut self, id: SurfaceId) {
        self.outputs.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_cancel() {
        let mut host = HeadlessHost::new(10, 10);
        let a = host.request_frame();
        let b = host.request_frame();
        host.cancel_frame(a);
        assert_eq!(host.poll_event(), Some(HostEvent::AnimationFrame(b)));
        assert_eq!(host.poll_event(), None);
    }

    #[test]
    fn test_resize_notifies_listeners() {
        let mut host = HeadlessHost::new(10, 10);
        let listener = host.add_resize_listener();
        host.resize(30, 0);
        assert_eq!(host.viewport(), Viewport::new(30, 1));
        assert_eq!(
            host.poll_event(),
            Some(HostEvent::Resized(listener, Viewport { width: 30, height: 1 }))
        );

        host.remove_resize_listener(listener);
        host.resize(5, 5);
        assert_eq!(host.poll_event(), None);
        assert_eq!(host.listener_count(), 0);
    }
}
