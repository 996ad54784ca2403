//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! The reducer only mutates state; anything touching the terminal or the
//! loop itself goes through here.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    Quit,

    /// Empty the scrollback once the current event batch is processed.
    ClearScrollback,

    SetTitle { title: String },
}
