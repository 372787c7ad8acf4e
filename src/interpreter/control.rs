//! # Control-flow stacks
//!
//! The `FOR` stack and `GOSUB` stack that give line-numbered BASIC its
//! control flow, plus the parallel call-stack mirror the debugger reads
//! (§9 "Call-stack mirror for debugger"). `WHILE`/`WEND` and `DO`/`LOOP`
//! need no stack at all in this design: each is a pair of sibling
//! statements that re-evaluate their condition and jump directly, so there
//! is nothing to corrupt when a `GOTO` escapes one mid-iteration (see `S3`
//! in the integration tests).

/// One entry of the `FOR` stack (§4.3.4).
#[derive(Debug, Clone, PartialEq)]
pub struct ForFrame {
    pub variable: String,
    pub end: f64,
    pub step: f64,
    /// Index of the statement immediately after `FOR` — where `NEXT` jumps
    /// back to when the loop continues.
    pub body_start: usize,
    /// Index of the matching `NEXT` statement, used only to bound the
    /// frame's body range for the `GOTO`-out-of-loop trim discipline below.
    pub next_index: usize,
}

/// A frame in the debugger-facing call-stack mirror (§9).
#[derive(Debug, Clone, PartialEq)]
pub enum CallFrame {
    Gosub { return_index: usize },
    For { variable: String },
}

#[derive(Debug, Default, Clone)]
pub struct ControlStacks {
    for_stack: Vec<ForFrame>,
    gosub_stack: Vec<usize>,
}

impl ControlStacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.for_stack.clear();
        self.gosub_stack.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.for_stack.is_empty() && self.gosub_stack.is_empty()
    }

    pub fn push_for(&mut self, frame: ForFrame) {
        self.for_stack.push(frame);
    }

    pub fn top_for(&self) -> Option<&ForFrame> {
        self.for_stack.last()
    }

    pub fn pop_for(&mut self) -> Option<ForFrame> {
        self.for_stack.pop()
    }

    pub fn push_gosub(&mut self, return_index: usize) {
        self.gosub_stack.push(return_index);
    }

    /// Current `GOSUB` nesting depth, checked by the driver against
    /// [`crate::interpreter::MAX_GOSUB_DEPTH`] before each push to catch an
    /// unbounded recursive subroutine rather than growing the stack forever.
    pub fn gosub_depth(&self) -> usize {
        self.gosub_stack.len()
    }

    pub fn pop_gosub(&mut self) -> Option<usize> {
        self.gosub_stack.pop()
    }

    /// Recommended discipline (per the "non-local control flow" design
    /// note) for a `GOTO`/`ON...GOTO` jump: drop every `FOR` frame whose
    /// body range `[body_start, next_index]` no longer contains the new
    /// instruction pointer. A `GOTO` that stays inside a loop body (or
    /// jumps to the statement right after its `NEXT`) leaves the frame
    /// alone; one that jumps elsewhere discards it rather than leaving a
    /// stale entry a later, unrelated `NEXT` could mismatch against.
    pub fn trim_for_goto(&mut self, new_index: usize) {
        self.for_stack
            .retain(|f| (f.body_start..=f.next_index).contains(&new_index));
    }

    /// Call-stack mirror for the debugger: interleaves `FOR` and `GOSUB`
    /// frames is not meaningful (they're independent stacks), so the
    /// mirror simply reports both, `GOSUB` frames first by convention.
    pub fn call_stack(&self) -> Vec<CallFrame> {
        let mut frames: Vec<CallFrame> = self
            .gosub_stack
            .iter()
            .map(|&return_index| CallFrame::Gosub { return_index })
            .collect();
        frames.extend(
            self.for_stack
                .iter()
                .map(|f| CallFrame::For { variable: f.variable.clone() }),
        );
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_drops_frames_whose_range_no_longer_covers_pointer() {
        let mut stacks = ControlStacks::new();
        stacks.push_for(ForFrame {
            variable: "I".into(),
            end: 10.0,
            step: 1.0,
            body_start: 5,
            next_index: 9,
        });
        stacks.trim_for_goto(100);
        assert!(stacks.top_for().is_none());
    }

    #[test]
    fn trim_keeps_frames_whose_range_still_covers_pointer() {
        let mut stacks = ControlStacks::new();
        stacks.push_for(ForFrame {
            variable: "I".into(),
            end: 10.0,
            step: 1.0,
            body_start: 5,
            next_index: 9,
        });
        stacks.trim_for_goto(7);
        assert!(stacks.top_for().is_some());
    }

    #[test]
    fn gosub_return_index_round_trips() {
        let mut stacks = ControlStacks::new();
        stacks.push_gosub(42);
        assert_eq!(stacks.pop_gosub(), Some(42));
        assert_eq!(stacks.pop_gosub(), None);
    }
}
