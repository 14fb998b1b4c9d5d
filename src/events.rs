use std::fmt;

/// Commands emitted by the control panel. The controllers consume these as a
/// drained stream once per frame; nothing reads panel widget state directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    SetAttach(bool),
    SetMinDistance(f32),
    ZoomIn,
    ZoomOut,
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEvent::SetAttach(attach) => write!(f, "SetAttach attach={attach}"),
            ControlEvent::SetMinDistance(distance) => {
                write!(f, "SetMinDistance distance={distance:.3}")
            }
            ControlEvent::ZoomIn => write!(f, "ZoomIn"),
            ControlEvent::ZoomOut => write!(f, "ZoomOut"),
        }
    }
}

#[derive(Default)]
pub struct ControlBus {
    events: Vec<ControlEvent>,
}

impl ControlBus {
    pub fn push(&mut self, event: ControlEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<ControlEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
