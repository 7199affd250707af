//! FIFO queue of deferred checks
//!
//! Actions run in the order they were queued. An action may queue further
//! actions; they join the back of the same queue and run before draining
//! finishes.

use std::collections::VecDeque;

/// A deferred closure over the context `C`
pub(crate) struct Action<'q, C> {
    pub(crate) f: Box<dyn FnOnce(&mut C) + 'q>,
    /// Only filled in when trace logging is enabled
    pub(crate) desc: Option<String>,
}

pub(crate) struct DelayedQueue<'q, C> {
    actions: VecDeque<Action<'q, C>>,
}

impl<C> Default for DelayedQueue<'_, C> {
    fn default() -> Self {
        Self {
            actions: VecDeque::new(),
        }
    }
}

impl<'q, C> DelayedQueue<'q, C> {
    pub(crate) fn push(&mut self, f: impl FnOnce(&mut C) + 'q, desc: Option<String>) {
        self.actions.push_back(Action { f: Box::new(f), desc });
    }

    pub(crate) fn pop(&mut self) -> Option<Action<'q, C>> {
        self.actions.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.actions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ctx {
        queue: DelayedQueue<'static, Ctx>,
        log: Vec<u32>,
    }

    fn drain(ctx: &mut Ctx) {
        while let Some(action) = ctx.queue.pop() {
            (action.f)(ctx);
        }
    }

    #[test]
    fn test_runs_in_enqueue_order() {
        let mut ctx = Ctx::default();
        for i in 0..4 {
            ctx.queue.push(move |c: &mut Ctx| c.log.push(i), None);
        }
        drain(&mut ctx);
        assert_eq!(ctx.log, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_nested_actions_run_after_earlier_ones() {
        let mut ctx = Ctx::default();
        ctx.queue.push(
            |c: &mut Ctx| {
                c.log.push(1);
                c.queue.push(|c: &mut Ctx| c.log.push(3), None);
            },
            None,
        );
        ctx.queue.push(|c: &mut Ctx| c.log.push(2), None);
        drain(&mut ctx);
        assert_eq!(ctx.log, vec![1, 2, 3]);
        assert!(ctx.queue.pop().is_none());
    }
}
