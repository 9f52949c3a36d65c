//! Program lifecycle: thread spawn, operation polling, completion, stop.
//!
//! Each `start` creates a fresh run: its own operation channel, completion
//! signal, and running flag. A previous run is stopped first and its thread
//! is left to wind down on its own; nothing it does afterwards can reach the
//! new run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bindings::HostBindings;
use crate::channel::{operation_channel, CompletionSignal};
use crate::namespace::ActionNamespace;
use crate::operation::Operation;
use crate::output::OutputBuffer;
use crate::program::UserProgram;
use crate::RuntimeError;

/// State of one started program.
struct Run {
    name: String,
    ops_tx: Sender<Operation>,
    ops_rx: Receiver<Operation>,
    signal: Arc<CompletionSignal>,
    running: Arc<AtomicBool>,
    /// Kept after stop so `thread_finished` reports the real thread state.
    thread: JoinHandle<()>,
}

/// Runs at most one user program at a time.
///
/// The simulation thread drives it with [`poll_op`](Self::poll_op) and
/// [`op_done`](Self::op_done); the program thread only ever blocks inside
/// its own action calls.
pub struct ProgramRuntime {
    bindings: HostBindings,
    current: Option<Run>,
}

impl ProgramRuntime {
    pub fn new() -> Self {
        Self::with_bindings(HostBindings::new())
    }

    pub fn with_bindings(bindings: HostBindings) -> Self {
        Self {
            bindings,
            current: None,
        }
    }

    /// Callbacks handed to the next started program.
    pub fn bindings_mut(&mut self) -> &mut HostBindings {
        &mut self.bindings
    }

    pub fn bindings(&self) -> &HostBindings {
        &self.bindings
    }

    pub fn output(&self) -> Option<&Arc<OutputBuffer>> {
        self.bindings.output.as_ref()
    }

    /// Start `program` on a new thread, stopping any program already running.
    pub fn start<P: UserProgram>(&mut self, program: P) -> Result<(), RuntimeError> {
        self.stop();

        let name = program.name().to_owned();
        let (ops_tx, ops_rx) = operation_channel();
        let signal = Arc::new(CompletionSignal::new());
        let running = Arc::new(AtomicBool::new(true));

        let thread_ops = ops_tx.clone();
        let thread_signal = Arc::clone(&signal);
        let thread_running = Arc::clone(&running);
        let bindings = self.bindings.clone();
        let program: Box<dyn UserProgram> = Box::new(program);

        let spawned = thread::Builder::new()
            .name(format!("program-{name}"))
            .spawn(move || {
                let api = Arc::new(ActionNamespace::new(
                    thread_ops,
                    thread_signal,
                    Arc::clone(&thread_running),
                    bindings.clone(),
                    thread::current().id(),
                ));
                program_thread(program, api, &thread_running, bindings.output.as_deref());
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                return Err(RuntimeError::Spawn(e));
            }
        };

        tracing::debug!(program = %name, "program started");
        self.current = Some(Run {
            name,
            ops_tx,
            ops_rx,
            signal,
            running,
            thread: handle,
        });
        Ok(())
    }

    /// Non-blocking dequeue of the next issued operation.
    pub fn poll_op(&self) -> Option<Operation> {
        self.current.as_ref()?.ops_rx.try_recv().ok()
    }

    /// Signal that the in-flight operation has been applied.
    pub fn op_done(&self) {
        if let Some(run) = &self.current {
            run.signal.set();
        }
    }

    /// Stop the current program. Never blocks; safe to call repeatedly.
    ///
    /// The program thread is not joined; it detaches when the next `start`
    /// replaces this run. A thread blocked in an action call
    /// wakes with [`ActionError::Stopped`](crate::ActionError::Stopped); one
    /// busy in pure computation runs on until its next action call.
    pub fn stop(&mut self) {
        let Some(run) = &self.current else {
            return;
        };
        if run.running.swap(false, Ordering::SeqCst) {
            // The receiver is still alive, so this cannot fail.
            let _ = run.ops_tx.send(Operation::Stop);
            run.signal.cancel();
            tracing::debug!(program = %run.name, "program stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::SeqCst))
    }

    /// Whether the program thread has exited. `true` when nothing was started.
    pub fn thread_finished(&self) -> bool {
        match &self.current {
            Some(Run {
                thread: handle,
                ..
            }) => handle.is_finished(),
            _ => true,
        }
    }

    pub fn program_name(&self) -> Option<&str> {
        self.current.as_ref().map(|run| run.name.as_str())
    }
}

impl Default for ProgramRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgramRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ProgramRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramRuntime")
            .field("bindings", &self.bindings)
            .field("program", &self.program_name())
            .field("running", &self.is_running())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Program thread body
// ---------------------------------------------------------------------------

fn program_thread(
    program: Box<dyn UserProgram>,
    api: Arc<ActionNamespace>,
    running: &AtomicBool,
    output: Option<&OutputBuffer>,
) {
    let name = program.name().to_owned();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| program.run(api)));

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
    };

    // After stop, the outcome belongs to nobody.
    let was_running = running.swap(false, Ordering::SeqCst);
    match failure {
        None => tracing::debug!(program = %name, "program finished"),
        Some(text) if was_running => {
            tracing::warn!(program = %name, error = %text, "program failed");
            if let Some(buffer) = output {
                write_diagnostic(buffer, &name, &text);
            }
        }
        Some(text) => tracing::debug!(program = %name, error = %text, "stopped program exited"),
    }
}

fn write_diagnostic(buffer: &OutputBuffer, program: &str, text: &str) {
    buffer.append_line("");
    buffer.write(&format!("Error in program '{program}':\n{text}\n"));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::FarmApi;
    use crate::program::NativeProgram;
    use crate::ActionError;
    use bytefarm_world::kinds::Direction;
    use std::time::{Duration, Instant};

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn runtime_with_output() -> (ProgramRuntime, Arc<OutputBuffer>) {
        let output = Arc::new(OutputBuffer::new());
        let mut runtime = ProgramRuntime::new();
        runtime.bindings_mut().set_output_buffer(Arc::clone(&output));
        (runtime, output)
    }

    #[test]
    fn operations_arrive_in_issue_order() {
        let (mut runtime, _) = runtime_with_output();
        runtime
            .start(NativeProgram::new("order", |api: &dyn FarmApi| {
                api.move_to(Direction::North)?;
                api.till()?;
                api.collect()?;
                Ok(())
            }))
            .unwrap();

        let mut seen = Vec::new();
        while seen.len() < 3 {
            if let Some(op) = runtime.poll_op() {
                seen.push(op);
                runtime.op_done();
            }
        }
        assert_eq!(
            seen,
            vec![
                Operation::Move {
                    direction: Direction::North
                },
                Operation::Till,
                Operation::Collect,
            ]
        );
        wait_until(|| !runtime.is_running());
    }

    #[test]
    fn next_operation_waits_for_op_done() {
        let (mut runtime, _) = runtime_with_output();
        runtime
            .start(NativeProgram::new("two", |api: &dyn FarmApi| {
                api.till()?;
                api.till()?;
                Ok(())
            }))
            .unwrap();

        wait_until(|| runtime.poll_op().is_some());
        thread::sleep(Duration::from_millis(30));
        assert!(runtime.poll_op().is_none(), "second op issued before completion");
        runtime.op_done();
        wait_until(|| runtime.poll_op().is_some());
    }

    #[test]
    fn error_becomes_diagnostic_and_clears_running() {
        let (mut runtime, output) = runtime_with_output();
        runtime
            .start(NativeProgram::new("boom", |_api: &dyn FarmApi| {
                anyhow::bail!("something broke")
            }))
            .unwrap();
        wait_until(|| !runtime.is_running());
        wait_until(|| runtime.thread_finished());
        let text = output.lines().join("\n");
        assert!(text.contains("Error in program 'boom'"), "{text}");
        assert!(text.contains("something broke"), "{text}");
    }

    #[test]
    fn panic_is_caught_at_thread_boundary() {
        let (mut runtime, output) = runtime_with_output();
        runtime
            .start(NativeProgram::new("panicky", |_api: &dyn FarmApi| {
                panic!("kaboom");
            }))
            .unwrap();
        wait_until(|| runtime.thread_finished());
        assert!(!runtime.is_running());
        assert!(output.lines().join("\n").contains("kaboom"));
    }

    #[test]
    fn stop_is_idempotent_and_unblocks_waiting_call() {
        let (mut runtime, output) = runtime_with_output();
        let (tx, rx) = std::sync::mpsc::channel();
        runtime
            .start(NativeProgram::new("blocked", move |api: &dyn FarmApi| {
                let result = api.collect();
                tx.send(result).ok();
                result?;
                Ok(())
            }))
            .unwrap();

        wait_until(|| runtime.poll_op().is_some());
        runtime.stop();
        runtime.stop();
        assert!(!runtime.is_running());
        assert_eq!(runtime.poll_op(), Some(Operation::Stop));

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Err(ActionError::Stopped));
        wait_until(|| runtime.thread_finished());
        assert!(output.is_empty(), "stopped program must not report");
    }

    #[test]
    fn busy_thread_is_not_finished_after_stop() {
        let (mut runtime, output) = runtime_with_output();
        let release = Arc::new(AtomicBool::new(false));
        let spin = Arc::clone(&release);
        runtime
            .start(NativeProgram::new("spinner", move |_api: &dyn FarmApi| {
                while !spin.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
                Ok(())
            }))
            .unwrap();

        runtime.stop();
        assert!(!runtime.is_running());
        thread::sleep(Duration::from_millis(20));
        assert!(!runtime.thread_finished(), "thread is still spinning");

        release.store(true, Ordering::SeqCst);
        wait_until(|| runtime.thread_finished());
        assert!(output.is_empty());
    }

    #[test]
    fn stop_after_natural_completion_is_harmless() {
        let (mut runtime, _) = runtime_with_output();
        runtime
            .start(NativeProgram::new("quick", |_api: &dyn FarmApi| Ok(())))
            .unwrap();
        wait_until(|| runtime.thread_finished());
        runtime.stop();
        runtime.stop();
        assert!(!runtime.is_running());
        assert_eq!(runtime.poll_op(), None);
    }

    #[test]
    fn start_replaces_previous_program() {
        let (mut runtime, _) = runtime_with_output();
        runtime
            .start(NativeProgram::new("first", |api: &dyn FarmApi| {
                api.till()?;
                Ok(())
            }))
            .unwrap();
        wait_until(|| runtime.poll_op().is_some());

        runtime
            .start(NativeProgram::new("second", |api: &dyn FarmApi| {
                api.collect()?;
                Ok(())
            }))
            .unwrap();
        assert_eq!(runtime.program_name(), Some("second"));
        wait_until(|| {
            matches!(runtime.poll_op(), Some(Operation::Collect))
        });
        runtime.op_done();
        wait_until(|| !runtime.is_running());
    }
}
