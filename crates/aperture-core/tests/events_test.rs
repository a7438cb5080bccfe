//! Tests for the event dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aperture_core::events::{
    EngineEventHandler, EventDispatcher, RunCompleteEvent, RunProgressEvent,
};

#[derive(Default)]
struct CountingHandler {
    progress: AtomicUsize,
    complete: AtomicUsize,
}

impl EngineEventHandler for CountingHandler {
    fn on_run_progress(&self, _event: &RunProgressEvent) {
        self.progress.fetch_add(1, Ordering::SeqCst);
    }

    fn on_run_complete(&self, _event: &RunCompleteEvent) {
        self.complete.fetch_add(1, Ordering::SeqCst);
    }
}

struct PanickingHandler;

impl EngineEventHandler for PanickingHandler {
    fn on_run_progress(&self, _event: &RunProgressEvent) {
        panic!("handler bug");
    }
}

fn progress(processed: usize) -> RunProgressEvent {
    RunProgressEvent {
        processed,
        total: 100,
    }
}

#[test]
fn empty_dispatcher_is_a_noop() {
    let dispatcher = EventDispatcher::new();
    assert_eq!(dispatcher.handler_count(), 0);
    dispatcher.emit_run_progress(&progress(1));
}

#[test]
fn handlers_receive_events() {
    let handler = Arc::new(CountingHandler::default());
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(handler.clone());

    dispatcher.emit_run_progress(&progress(1));
    dispatcher.emit_run_progress(&progress(2));

    assert_eq!(handler.progress.load(Ordering::SeqCst), 2);
    assert_eq!(handler.complete.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_handler_does_not_block_others() {
    let counting = Arc::new(CountingHandler::default());
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Arc::new(PanickingHandler));
    dispatcher.register(counting.clone());

    dispatcher.emit_run_progress(&progress(1));

    assert_eq!(counting.progress.load(Ordering::SeqCst), 1);
}
