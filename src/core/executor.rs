//! Single-threaded FIFO run queue.
//!
//! Units of work run strictly in submission order and never overlap: a task
//! that submits more work only appends to the queue. The queue borrow is
//! released before a task runs so tasks may submit freely.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::ports::scheduler::{Scheduler, Task};

#[derive(Clone, Default)]
pub struct LocalExecutor {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}

impl LocalExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle implementing the scheduler port.
    #[must_use]
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::new(self.clone())
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the oldest task. Returns `false` when the queue was empty.
    pub fn run_one(&self) -> bool {
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run until the queue is empty, including work submitted along the way.
    /// Returns the number of tasks executed.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for LocalExecutor {
    fn submit(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }
}
