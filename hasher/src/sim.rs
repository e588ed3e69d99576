//! In-memory model of the hasher core.
//!
//! Mirrors the register semantics of the hardware closely enough to drive the
//! synchronizer end to end: a rising edge on `Start` launches the search on a
//! worker thread, completion sets `Done` and, with interrupts enabled, raises
//! the done bit of the toggle-on-write status register and calls the attached
//! interrupt handler. `Done` stays latched until a stop pulse on an idle core.
use std::{
    sync::{
        atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
};

use fpga::{Flush, PhysicalMemory, ReadWrite, Write};
use tracing::{debug, warn};

use crate::{
    app::{Register, ISR_DONE, REGISTERS},
    layout::{encode_result, Block, BLOCK_LEN, RESULT_LEN},
    search::search,
    sync::InterruptHandler,
};

type Handler = InterruptHandler<Simulator>;

struct Inner {
    registers: [AtomicU32; REGISTERS],
    memory: Arc<dyn PhysicalMemory>,
    busy: AtomicBool,
    handler: Mutex<Option<Handler>>,
    hold: Mutex<bool>,
    resume: Condvar,
    jobs: AtomicU64,
    interrupts: AtomicU64,
    faults: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn register(&self, register: Register) -> u32 {
        self.registers[register as usize].load(Ordering::SeqCst)
    }

    fn run(&self) {
        let base = self.register(Register::BlockAddress);
        let blocks = self.register(Register::Blocks);
        let mask = self.register(Register::Difficulty);
        let results = self.register(Register::ResultAddress);
        debug!("sim: {} blocks at {:#010x}, mask {:08x}", blocks, base, mask);

        let mut block: Block = [0u8; BLOCK_LEN];
        for i in 0..blocks {
            let source = base.wrapping_add(i * BLOCK_LEN as u32);
            let target = results.wrapping_add(i * RESULT_LEN as u32);
            let written = self
                .memory
                .read(source, &mut block)
                .and_then(|()| self.memory.write(target, &encode_result(&search(&mut block, mask))));
            if let Err(error) = written {
                warn!("sim: block {} aborted: {}", i, error);
                self.faults.fetch_add(1, Ordering::SeqCst);
                break;
            }
        }

        let mut hold = lock(&self.hold);
        while *hold {
            hold = self.resume.wait(hold).unwrap_or_else(PoisonError::into_inner);
        }
        drop(hold);

        // idle before Done is visible, so the next stop pulse clears it
        self.jobs.fetch_add(1, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        self.registers[Register::Done as usize].store(1, Ordering::SeqCst);
        self.raise();
    }

    fn raise(&self) {
        if self.register(Register::InterruptEnable) == 0 {
            return;
        }
        // the core sets the bit; only software writes toggle it
        let before = self.registers[Register::InterruptStatus as usize]
            .fetch_or(ISR_DONE, Ordering::SeqCst);
        if before & ISR_DONE != 0 {
            // no rising edge, no interrupt
            return;
        }
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            if !handler.handle() {
                warn!("sim: interrupt not claimed");
            }
        }
    }
}

/// Register-level model of the hasher core over [`PhysicalMemory`].
#[derive(Clone)]
pub struct Simulator(Arc<Inner>);

impl Simulator {
    pub fn new(memory: impl PhysicalMemory + 'static) -> Self {
        Self(Arc::new(Inner {
            registers: Default::default(),
            memory: Arc::new(memory),
            busy: AtomicBool::new(false),
            handler: Mutex::new(None),
            hold: Mutex::new(false),
            resume: Condvar::new(),
            jobs: AtomicU64::new(0),
            interrupts: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }))
    }

    /// Connect the interrupt line to `handler`.
    pub fn attach(&self, handler: Handler) {
        handler.connect();
        *lock(&self.0.handler) = Some(handler);
    }

    /// Disconnect the interrupt line, releasing any waiter.
    pub fn detach(&self) {
        if let Some(handler) = lock(&self.0.handler).take() {
            handler.release();
        }
    }

    /// While held, finished jobs do not signal completion.
    pub fn hold(&self, hold: bool) {
        *lock(&self.0.hold) = hold;
        self.0.resume.notify_all();
    }

    pub fn is_busy(&self) -> bool {
        self.0.busy.load(Ordering::SeqCst)
    }

    /// jobs completed so far
    pub fn jobs(&self) -> u64 {
        self.0.jobs.load(Ordering::SeqCst)
    }

    /// interrupts raised so far
    pub fn interrupts(&self) -> u64 {
        self.0.interrupts.load(Ordering::SeqCst)
    }

    /// jobs cut short by an unmapped or out-of-bounds memory access
    pub fn faults(&self) -> u64 {
        self.0.faults.load(Ordering::SeqCst)
    }

    fn start(&self) {
        if self.0.busy.swap(true, Ordering::SeqCst) {
            warn!("sim: start while busy ignored");
            return;
        }
        let inner = self.0.clone();
        thread::spawn(move || inner.run());
    }
}

impl Flush for Simulator {
    fn flush(&self) {
        fence(Ordering::SeqCst);
    }
}

impl Write<u32> for Simulator {
    fn write(&self, index: usize, value: &u32) {
        let register = match self.0.registers.get(index) {
            Some(register) => register,
            None => return,
        };
        if index == Register::InterruptStatus as usize {
            register.fetch_xor(value & ISR_DONE, Ordering::SeqCst);
        } else if index == Register::Start as usize {
            let before = register.swap(*value, Ordering::SeqCst);
            if before & 1 == 0 && value & 1 == 1 {
                self.start();
            }
        } else if index == Register::Stop as usize {
            register.store(*value, Ordering::SeqCst);
            if *value & 1 == 1 && !self.is_busy() {
                self.0.registers[Register::Done as usize].store(0, Ordering::SeqCst);
            }
        } else {
            register.store(*value, Ordering::SeqCst);
        }
    }
}

impl ReadWrite<u32> for Simulator {
    fn read(&self, index: usize) -> u32 {
        self.0
            .registers
            .get(index)
            .map_or(0, |register| register.load(Ordering::SeqCst))
    }
}
