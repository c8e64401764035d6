//! Driving a simulation from a background thread.

use crate::simulation::{RunSwitch, Simulation};
use eco_core::{Error, Result, RunSummary, StepStatus};
use parking_lot::{Mutex, MutexGuard};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// A simulation that may be driven from more than one thread.
///
/// At most one step may be in flight. A second request made while the
/// simulation is busy fails with [`Error::StepInFlight`] instead of waiting.
#[derive(Clone)]
pub struct SharedSimulation {
    inner: Arc<Mutex<Simulation>>,
    switch: RunSwitch,
}

impl SharedSimulation {
    pub fn new(simulation: Simulation) -> Self {
        let switch = simulation.switch();
        Self {
            inner: Arc::new(Mutex::new(simulation)),
            switch,
        }
    }

    /// The run switch, usable without taking the lock
    pub fn switch(&self) -> RunSwitch {
        self.switch.clone()
    }

    pub fn try_step(&self) -> Result<Option<StepStatus>> {
        self.try_with(|sim| sim.step())?
    }

    pub fn try_simulate_with<F>(&self, steps: u64, observer: F) -> Result<RunSummary>
    where
        F: FnMut(&StepStatus),
    {
        self.try_with(|sim| sim.simulate_with(steps, observer))?
    }

    /// Run `f` against the simulation if nobody else holds it
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> Result<R> {
        let mut guard = self.inner.try_lock().ok_or(Error::StepInFlight)?;
        Ok(f(&mut guard))
    }

    /// Block until the simulation is free
    pub fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.inner.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    Step,
    Run(u64),
    RunLong,
    Reset,
    Shutdown,
}

/// Messages published by the worker thread
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Status(StepStatus),
    Finished(RunSummary),
    Failed(String),
}

/// Handle for a simulation running on its own thread
pub struct SimulationHandle {
    thread: Option<JoinHandle<()>>,
    command_tx: Sender<SimCommand>,
    event_rx: Receiver<WorkerEvent>,
    shared: SharedSimulation,
}

impl SimulationHandle {
    pub fn spawn(shared: SharedSimulation) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let worker = shared.clone();
        let thread = thread::Builder::new()
            .name("eco-sim-worker".to_string())
            .spawn(move || run_worker(worker, command_rx, event_tx))?;

        Ok(Self {
            thread: Some(thread),
            command_tx,
            event_rx,
            shared,
        })
    }

    pub fn send(&self, command: SimCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::InvalidState("simulation worker has stopped".to_string()))
    }

    /// Turn the run switch off. The worker stops before its next step.
    pub fn cancel(&self) {
        self.shared.switch().turn_off();
    }

    pub fn shared(&self) -> &SharedSimulation {
        &self.shared
    }

    /// Wait for the next event. `None` once the worker has exited.
    pub fn recv(&self) -> Option<WorkerEvent> {
        self.event_rx.recv().ok()
    }

    /// Drain pending events without blocking
    pub fn try_recv_all(&self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(&mut self) {
        self.cancel();
        let _ = self.command_tx.send(SimCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(event = "worker_panicked", "Simulation worker panicked");
            }
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: SharedSimulation, commands: Receiver<SimCommand>, events: Sender<WorkerEvent>) {
    info!(event = "worker_started", "Simulation worker started");

    while let Ok(command) = commands.recv() {
        debug!(event = "worker_command", command = ?command, "Worker received command");
        let outcome = match command {
            SimCommand::Shutdown => break,
            SimCommand::Step => match shared.try_step() {
                Ok(Some(status)) => {
                    let _ = events.send(WorkerEvent::Status(status));
                    Ok(())
                }
                Ok(None) => Err(Error::InvalidState("simulation is stopped".to_string())),
                Err(err) => Err(err),
            },
            SimCommand::Run(steps) => run(&shared, &events, |sim, observer| sim.simulate_with(steps, observer)),
            SimCommand::RunLong => run(&shared, &events, |sim, observer| {
                let steps = sim.config().long_run_steps;
                sim.simulate_with(steps, observer)
            }),
            SimCommand::Reset => shared.try_with(|sim| sim.reset()).and_then(|reset| reset),
        };

        if let Err(err) = outcome {
            warn!(event = "worker_command_failed", command = ?command, error = %err, "Command failed");
            if events.send(WorkerEvent::Failed(err.to_string())).is_err() {
                break;
            }
        }
    }

    info!(event = "worker_stopped", "Simulation worker stopped");
}

fn run<F>(shared: &SharedSimulation, events: &Sender<WorkerEvent>, f: F) -> Result<()>
where
    F: FnOnce(&mut Simulation, &mut dyn FnMut(&StepStatus)) -> Result<RunSummary>,
{
    let mut publish = |status: &StepStatus| {
        let _ = events.send(WorkerEvent::Status(status.clone()));
    };
    let summary = shared.try_with(|sim| f(sim, &mut publish))??;
    let _ = events.send(WorkerEvent::Finished(summary));
    Ok(())
}
