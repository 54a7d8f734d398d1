use std::{cell::RefCell, rc::Rc};

use instant::Duration;
use rigview::{
    ViewerConfig, ViewerError,
    flow::{LoopState, RenderLoop},
    session::Session,
};

use crate::common::test_utils::{Journal, MockRenderer};

mod common;

const FRAME: Duration = Duration::from_millis(16);

fn scheduler(journal: &Journal) -> impl FnMut() + use<> {
    let journal = journal.clone();
    move || journal.borrow_mut().push("request_frame".to_string())
}

#[test]
fn tick_schedules_the_next_frame_before_clearing_and_drawing() {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(ViewerConfig::character(), (800, 600));
    let mut renderer = MockRenderer::with_journal(journal.clone());
    let mut request_frame = scheduler(&journal);
    let mut render_loop = RenderLoop::new();
    render_loop.start();

    assert!(render_loop.advance(FRAME, &mut session, &mut request_frame, &mut renderer).unwrap());

    assert_eq!(*journal.borrow(), vec!["request_frame", "clear", "draw"]);
}

#[test]
fn idle_loop_does_nothing() {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(ViewerConfig::robot(), (800, 600));
    let mut renderer = MockRenderer::new();
    let mut request_frame = scheduler(&journal);
    let mut render_loop = RenderLoop::new();

    assert!(!render_loop.advance(FRAME, &mut session, &mut request_frame, &mut renderer).unwrap());
    assert_eq!(render_loop.state(), LoopState::Idle);
    assert!(journal.borrow().is_empty());
    assert!(renderer.calls.is_empty());
}

#[test]
fn cancel_stops_the_loop_at_the_next_tick() {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(ViewerConfig::robot(), (800, 600));
    let mut renderer = MockRenderer::new();
    let mut request_frame = scheduler(&journal);
    let mut render_loop = RenderLoop::new();
    let handle = render_loop.start();

    assert!(render_loop.advance(FRAME, &mut session, &mut request_frame, &mut renderer).unwrap());
    handle.cancel();
    assert_eq!(render_loop.state(), LoopState::Running);
    assert!(!render_loop.advance(FRAME, &mut session, &mut request_frame, &mut renderer).unwrap());
    assert_eq!(render_loop.state(), LoopState::Stopped);

    assert_eq!(renderer.draws().len(), 1);
    assert_eq!(journal.borrow().len(), 1);
}

#[test]
fn stopped_loop_can_be_started_again() {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(ViewerConfig::robot(), (800, 600));
    let mut renderer = MockRenderer::new();
    let mut request_frame = scheduler(&journal);
    let mut render_loop = RenderLoop::new();

    render_loop.start();
    render_loop.stop();
    assert!(!render_loop.frame(&mut session, &mut request_frame, &mut renderer).unwrap());

    render_loop.start();
    assert!(render_loop.frame(&mut session, &mut request_frame, &mut renderer).unwrap());
    assert_eq!(renderer.draws().len(), 1);
}

#[test]
fn start_after_cancel_runs_a_fresh_loop() {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(ViewerConfig::robot(), (800, 600));
    let mut renderer = MockRenderer::new();
    let mut request_frame = scheduler(&journal);
    let mut render_loop = RenderLoop::new();

    let old = render_loop.start();
    old.cancel();
    let new = render_loop.start();

    assert!(old.is_cancelled());
    assert!(!new.is_cancelled());
    assert!(render_loop.advance(FRAME, &mut session, &mut request_frame, &mut renderer).unwrap());
    assert_eq!(render_loop.state(), LoopState::Running);
    assert_eq!(renderer.draws().len(), 1);
}

#[test]
fn draw_errors_reach_the_host() {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(ViewerConfig::robot(), (800, 600));
    let mut renderer = MockRenderer {
        fail_draws: true,
        ..MockRenderer::new()
    };
    let mut request_frame = scheduler(&journal);
    let mut render_loop = RenderLoop::new();
    render_loop.start();

    let err = render_loop
        .advance(FRAME, &mut session, &mut request_frame, &mut renderer)
        .unwrap_err();
    assert!(matches!(err, ViewerError::Graphics(_)));
    // the next frame was already requested, so the loop goes on
    assert_eq!(render_loop.state(), LoopState::Running);
    assert_eq!(journal.borrow().len(), 1);
}
