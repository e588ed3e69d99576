//! Job submission and completion.
//!
//! A job moves through `Idle → Submitted → Waiting → Done`, or ends in
//! `Aborted` when the interrupt line is released under a blocked waiter.
//!
//! In interrupt mode the submitting thread sleeps on a condition variable
//! guarding a private completion flag. Only the interrupt handler sets the
//! flag, so any other wakeup re-checks it and goes back to sleep. In polling
//! mode `Done` stays latched between jobs, so each job starts with a stop
//! pulse and the thread then spins on the `Done` register.
//!
//! The interrupt status register is toggle-on-write: each write of 1 flips the
//! done bit. It is written exactly once per completion, by the handler, and
//! once before a job only if a stale done bit is still set.

use core::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use fpga::ReadWrite;
use tracing::{debug, trace};

use crate::{
    app::{Register, ISR_DONE},
    layout::Job,
    Error, Result,
};

/// State of the most recent job.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    Idle,
    Submitted,
    Waiting,
    Done,
    Aborted,
}

/// How the submitting thread waits for completion.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Wait {
    /// sleep until the completion interrupt is handled
    Interrupt,
    /// busy-read the `Done` register
    Poll,
}

impl FromStr for Wait {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, String> {
        match s {
            "interrupt" | "irq" => Ok(Wait::Interrupt),
            "poll" => Ok(Wait::Poll),
            _ => Err(format!("unknown wait policy '{}', expected interrupt or poll", s)),
        }
    }
}

#[derive(Default)]
struct Flag {
    completed: bool,
    released: bool,
}

/// Completion flag shared between a waiter and the interrupt handler.
#[derive(Default)]
pub struct Completion {
    flag: Mutex<Flag>,
    signal: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Flag> {
        self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the flag ahead of a new job.
    pub fn arm(&self) {
        self.lock().completed = false;
    }

    pub fn is_complete(&self) -> bool {
        self.lock().completed
    }

    /// Mark the job complete and wake the waiter.
    pub fn complete(&self) {
        self.lock().completed = true;
        self.signal.notify_all();
    }

    /// Wake waiters without completing; they go back to sleep.
    pub fn wake(&self) {
        let _flag = self.lock();
        self.signal.notify_all();
    }

    /// The interrupt line is gone; current and future waits abort until
    /// [`connect`](Self::connect).
    pub fn release(&self) {
        self.lock().released = true;
        self.signal.notify_all();
    }

    /// The interrupt line is back.
    pub fn connect(&self) {
        self.lock().released = false;
    }

    /// Block until [`complete`](Self::complete) has been called since the last
    /// [`arm`](Self::arm).
    pub fn wait(&self) -> Result<()> {
        let mut flag = self.lock();
        while !flag.completed {
            if flag.released {
                return Err(Error::Aborted);
            }
            flag = self
                .signal
                .wait(flag)
                .unwrap_or_else(PoisonError::into_inner);
            if !flag.completed {
                trace!("woken without completion, waiting again");
            }
        }
        Ok(())
    }
}

/// Acknowledges the core's completion interrupt and wakes the waiter.
///
/// Runs outside the submitting thread and never blocks beyond the flag's
/// mutex, nor allocates.
pub struct InterruptHandler<P> {
    port: Arc<P>,
    completion: Arc<Completion>,
}

impl<P> Clone for InterruptHandler<P> {
    fn clone(&self) -> Self {
        Self {
            port: self.port.clone(),
            completion: self.completion.clone(),
        }
    }
}

impl<P: ReadWrite<u32>> InterruptHandler<P> {
    /// Handle one interrupt. Returns `false` if the core did not raise it.
    pub fn handle(&self) -> bool {
        if self.port.read(Register::InterruptStatus as _) & ISR_DONE == 0 {
            return false;
        }
        // toggles the done bit back to 0, re-arming the edge
        self.port
            .write(Register::InterruptStatus as _, &ISR_DONE);
        self.port.flush();
        self.completion.complete();
        true
    }

    /// Attach to the line, undoing an earlier [`release`](Self::release).
    pub fn connect(&self) {
        self.completion.connect();
    }

    /// Detach from the line; a blocked waiter aborts.
    pub fn release(&self) {
        self.completion.release();
    }
}

/// Drives one job at a time through the core's registers.
///
/// Submission takes `&mut self`, so jobs on one synchronizer are serialized;
/// callers sharing a device across synchronizers must serialize themselves.
pub struct Synchronizer<P> {
    port: Arc<P>,
    completion: Arc<Completion>,
    wait: Wait,
    state: State,
}

impl<P: ReadWrite<u32>> Synchronizer<P> {
    pub fn new(port: Arc<P>, wait: Wait) -> Self {
        Self {
            port,
            completion: Arc::new(Completion::new()),
            wait,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn completion(&self) -> &Arc<Completion> {
        &self.completion
    }

    pub fn interrupt_handler(&self) -> InterruptHandler<P> {
        InterruptHandler {
            port: self.port.clone(),
            completion: self.completion.clone(),
        }
    }

    fn write(&self, register: Register, value: u32) {
        self.port.write(register as _, &value);
        self.port.flush();
    }

    /// Stop pulse, returning the core to idle.
    pub fn reset(&mut self) {
        self.write(Register::Start, 0);
        self.write(Register::Stop, 1);
        for _ in 0..1000 {
            core::hint::spin_loop();
        }
        self.write(Register::Stop, 0);
        self.state = State::Idle;
    }

    /// Run `job` to completion. On success the result region may be read.
    pub fn submit(&mut self, job: &Job) -> Result<()> {
        if job.block_count == 0 {
            return Err(Error::EmptyJob);
        }
        if self.wait == Wait::Poll {
            // Done stays latched from the previous job until a stop pulse
            self.reset();
        }
        self.state = State::Idle;

        self.write(Register::BlockAddress, job.block_address);
        self.write(Register::Blocks, job.block_count);
        self.write(Register::Difficulty, job.difficulty_mask);
        self.write(Register::ResultAddress, job.result_address);
        self.state = State::Submitted;
        debug!(
            "job: {} blocks at {:#010x}, mask {:08x}, results at {:#010x}",
            job.block_count, job.block_address, job.difficulty_mask, job.result_address
        );

        if self.wait == Wait::Interrupt {
            self.write(Register::InterruptEnable, 0xFFFF_FFFF);
            if self.port.read(Register::InterruptStatus as _) & ISR_DONE != 0 {
                debug!("clearing stale done interrupt");
                self.write(Register::InterruptStatus, ISR_DONE);
            }
            // armed before the start pulse, a fast completion cannot be lost
            self.completion.arm();
        }

        self.write(Register::Start, 1);
        self.write(Register::Start, 0);
        self.state = State::Waiting;

        let waited = match self.wait {
            Wait::Interrupt => self.completion.wait(),
            Wait::Poll => {
                while 0 == self.port.read(Register::Done as _) {
                    continue;
                }
                Ok(())
            }
        };
        if let Err(error) = waited {
            self.state = State::Aborted;
            return Err(error);
        }

        // results written by the core are visible past this point
        self.port.flush();
        self.state = State::Done;
        debug!("job done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };

    #[test]
    fn spurious_wakeup_does_not_release_waiter() {
        let completion = Arc::new(Completion::new());
        completion.arm();
        let proceeded = Arc::new(AtomicBool::new(false));

        let waiter = {
            let completion = completion.clone();
            let proceeded = proceeded.clone();
            thread::spawn(move || {
                let result = completion.wait();
                proceeded.store(true, Ordering::SeqCst);
                result
            })
        };

        for _ in 0..5 {
            thread::sleep(Duration::from_millis(20));
            completion.wake();
        }
        thread::sleep(Duration::from_millis(50));
        assert!(!proceeded.load(Ordering::SeqCst));
        assert!(!waiter.is_finished());

        completion.complete();
        waiter.join().unwrap().unwrap();
        assert!(proceeded.load(Ordering::SeqCst));
    }

    #[test]
    fn completion_before_wait_is_not_lost() {
        let completion = Completion::new();
        completion.arm();
        completion.complete();
        completion.wait().unwrap();
        assert!(completion.is_complete());

        completion.arm();
        assert!(!completion.is_complete());
    }

    #[test]
    fn release_aborts_waiter() {
        let completion = Arc::new(Completion::new());
        completion.arm();
        let waiter = {
            let completion = completion.clone();
            thread::spawn(move || completion.wait())
        };
        thread::sleep(Duration::from_millis(20));
        completion.release();
        assert!(matches!(waiter.join().unwrap(), Err(Error::Aborted)));
    }

    #[test]
    fn reconnect_after_release() {
        let completion = Completion::new();
        completion.release();
        completion.arm();
        assert!(matches!(completion.wait(), Err(Error::Aborted)));

        completion.connect();
        completion.arm();
        completion.complete();
        completion.wait().unwrap();
    }

    #[test]
    fn parses_wait_policies() {
        assert_eq!("interrupt".parse::<Wait>(), Ok(Wait::Interrupt));
        assert_eq!("poll".parse::<Wait>(), Ok(Wait::Poll));
        assert!("sleep".parse::<Wait>().is_err());
    }
}
