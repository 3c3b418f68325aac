use crossterm::event::KeyEvent;

use crate::ops::OpOutcome;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize(u16, u16),

    // -- Operation results from the worker
    OpResponse(OpOutcome),

    // -- System
    Tick,
}
