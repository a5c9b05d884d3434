//! Messages exchanged with the renderer driving a [`crate::BacklightModule`].

use crate::errors::BacklightError;

/// Mouse button of a click or scroll on the rendered output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
    Back,
    Forward,
}

/// Input event sent from the renderer to the watch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickEvent {
    pub button: Button,
}

impl From<Button> for ClickEvent {
    fn from(button: Button) -> Self {
        ClickEvent { button }
    }
}

/// Sent from the watch loop to the renderer.
#[derive(Debug)]
pub enum Update<O> {
    /// Freshly formatted state
    Output(O),
    /// Any failure, fatal or not; see [`BacklightError::is_fatal`]
    Error(BacklightError),
}
