//! AR session state machine
//!
//! Every phase change goes through [`ArSession::transition`], which rejects
//! transitions outside the documented graph. Asynchronous platform requests
//! are stored as futures and polled once per host frame; a hit-test source
//! that arrives after its session ended is cancelled and dropped.
//!
//! Two hit-test sources serve a presentation: the screen-center ray, which
//! places the content, and the transient touch source requested after the
//! first placement, which feeds drag, twist and pinch gestures.

use super::placement::{hit_test_ray, Placement};
use super::platform::{
    FrameHandle, HitTestSource, ReferenceSpace, ReferenceSpaceKind, SessionEvent, XrFrame, XrPlatform, XrSession,
    TOUCHSCREEN_PROFILE,
};
use super::{ArError, ArStatus, SessionBusyError, UnsupportedCapabilityError};
use crate::config::XrConfig;
use crate::events::{ArEvent, EventQueue};
use crate::foundation::collections::SceneId;
use crate::foundation::time::Millis;
use crate::render::Renderer;
use crate::scene::SceneSnapshot;
use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Externally visible session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArPhase {
    /// No session
    Inactive,
    /// Waiting for the platform to grant a session and reference space
    Requesting,
    /// A Scene is being presented
    Presenting,
    /// Restoring the Scene after the session ended
    Cleanup,
}

type SessionRequest = LocalBoxFuture<'static, Result<(Box<dyn XrSession>, ReferenceSpace), ArError>>;
type HitSourceRequest = LocalBoxFuture<'static, Result<Box<dyn HitTestSource>, ArError>>;

struct Requesting {
    scene: SceneId,
    request: SessionRequest,
    stop_requested: bool,
}

struct Presenting {
    scene: SceneId,
    session: Box<dyn XrSession>,
    space: ReferenceSpace,
    frame_handle: Option<FrameHandle>,
    saved: SceneSnapshot,
    placement: Placement,
    hit_source: Option<Box<dyn HitTestSource>>,
    touch_source: Option<Box<dyn HitTestSource>>,
    touch_events: Vec<SessionEvent>,
    place_requested: bool,
    end_requested: bool,
    last_frame: Option<Millis>,
}

enum SessionState {
    Inactive,
    Requesting(Requesting),
    Presenting(Box<Presenting>),
    Cleanup,
}

impl SessionState {
    fn phase(&self) -> ArPhase {
        match self {
            SessionState::Inactive => ArPhase::Inactive,
            SessionState::Requesting(_) => ArPhase::Requesting,
            SessionState::Presenting(_) => ArPhase::Presenting,
            SessionState::Cleanup => ArPhase::Cleanup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HitSourceKind {
    ScreenCenter,
    Touch,
}

struct PendingHitSource {
    epoch: u64,
    kind: HitSourceKind,
    request: HitSourceRequest,
}

/// Completion of a [`ArSession::stop_presenting`] call
///
/// Resolves once the session has fully returned to [`ArPhase::Inactive`].
#[derive(Debug)]
#[must_use = "a stop request does nothing unless awaited or polled"]
pub struct StopRequest {
    receiver: Option<oneshot::Receiver<()>>,
}

impl StopRequest {
    fn resolved() -> Self {
        Self { receiver: None }
    }

    fn pending(receiver: oneshot::Receiver<()>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    /// Poll without a task context
    pub fn is_resolved(&mut self) -> bool {
        FutureExt::now_or_never(&mut *self).is_some()
    }
}

impl Future for StopRequest {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(());
        };
        match Pin::new(receiver).poll(cx) {
            // A dropped sender also means the session is gone
            Poll::Ready(_) => {
                self.receiver = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Presents one Scene at a time in immersive AR
pub struct ArSession {
    platform: Option<Rc<dyn XrPlatform>>,
    config: XrConfig,
    state: SessionState,
    epoch: u64,
    pending_hit_sources: Vec<PendingHitSource>,
    stop_waiters: Vec<oneshot::Sender<()>>,
    events: EventQueue<ArEvent>,
    cleanups: u64,
}

impl ArSession {
    /// Create a session manager; `None` means the host has no AR platform
    pub fn new(platform: Option<Rc<dyn XrPlatform>>, config: &XrConfig) -> Self {
        Self {
            platform,
            config: config.clone(),
            state: SessionState::Inactive,
            epoch: 0,
            pending_hit_sources: Vec::new(),
            stop_waiters: Vec::new(),
            events: EventQueue::new(),
            cleanups: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> ArPhase {
        self.state.phase()
    }

    /// Whether a Scene is being presented
    pub fn is_presenting(&self) -> bool {
        self.phase() == ArPhase::Presenting
    }

    /// Scene held by the session, while requesting or presenting
    pub fn presented_scene(&self) -> Option<SceneId> {
        match &self.state {
            SessionState::Requesting(requesting) => Some(requesting.scene),
            SessionState::Presenting(presenting) => Some(presenting.scene),
            SessionState::Inactive | SessionState::Cleanup => None,
        }
    }

    /// Whether immersive AR can be requested at all
    pub fn is_supported(&self) -> bool {
        self.platform
            .as_ref()
            .is_some_and(|platform| platform.supports_immersive_ar())
    }

    /// Number of completed cleanups
    pub fn cleanup_count(&self) -> u64 {
        self.cleanups
    }

    /// Hit-test source requests still in flight
    pub fn pending_hit_sources(&self) -> usize {
        self.pending_hit_sources.len()
    }

    /// Whether the placement has found a usable surface yet
    pub fn has_hit(&self) -> bool {
        match &self.state {
            SessionState::Presenting(presenting) => presenting.placement.latest_hit().is_some(),
            _ => false,
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<SessionState, ArError> {
        let from = self.phase();
        let to = next.phase();
        let allowed = matches!(
            (from, to),
            (ArPhase::Inactive, ArPhase::Requesting)
                | (ArPhase::Requesting, ArPhase::Presenting)
                | (ArPhase::Requesting, ArPhase::Inactive)
                | (ArPhase::Presenting, ArPhase::Cleanup)
                | (ArPhase::Cleanup, ArPhase::Inactive)
        );
        if !allowed {
            log::error!("Rejected AR transition {:?} -> {:?}", from, to);
            return Err(ArError::InvalidTransition { from, to });
        }
        log::debug!("AR session {:?} -> {:?}", from, to);
        Ok(std::mem::replace(&mut self.state, next))
    }

    // ---- Activation ----

    /// Start presenting `scene`
    ///
    /// Fails immediately when AR is unsupported or a session is already
    /// underway. Platform failures after this point are reported as
    /// [`ArStatus::Failed`] and leave the normal view untouched.
    pub fn present(&mut self, renderer: &mut Renderer, scene: SceneId) -> Result<(), ArError> {
        let platform = match &self.platform {
            Some(platform) if platform.supports_immersive_ar() => Rc::clone(platform),
            _ => return Err(UnsupportedCapabilityError.into()),
        };
        let phase = self.phase();
        if phase != ArPhase::Inactive {
            return Err(SessionBusyError { phase }.into());
        }
        if renderer.scene(scene).is_none() {
            return Err(ArError::UnknownScene);
        }

        let request = async move {
            let mut session = platform.request_session().await?;
            let space_request = session.request_reference_space(ReferenceSpaceKind::Local);
            match space_request.await {
                Ok(space) => Ok((session, space)),
                Err(error) => {
                    if let Err(end_error) = session.end() {
                        log::warn!("Could not end AR session after failed setup: {}", end_error);
                    }
                    Err(error)
                }
            }
        }
        .boxed_local();

        self.transition(SessionState::Requesting(Requesting {
            scene,
            request,
            stop_requested: false,
        }))?;
        log::info!("Requesting AR session for scene {:?}", scene);
        self.poll(renderer);
        Ok(())
    }

    /// Advance pending platform requests and session notifications
    ///
    /// Called once per host frame.
    pub fn poll(&mut self, renderer: &mut Renderer) {
        self.poll_request(renderer);
        self.poll_hit_sources();
        self.poll_session_events(renderer);
    }

    fn poll_request(&mut self, renderer: &mut Renderer) {
        let SessionState::Requesting(requesting) = &mut self.state else {
            return;
        };
        let Some(result) = (&mut requesting.request).now_or_never() else {
            return;
        };
        let scene = requesting.scene;
        let stop_requested = requesting.stop_requested;

        match result {
            Err(error) => {
                log::warn!("AR activation failed: {}", error);
                self.abandon_request();
                self.events.send(ArEvent::Status(ArStatus::Failed));
            }
            Ok((mut session, _)) if stop_requested => {
                log::debug!("AR session granted after stop was requested; ending it");
                if let Err(error) = session.end() {
                    log::warn!("Error while ending AR session: {}", error);
                }
                self.abandon_request();
                self.events.send(ArEvent::Status(ArStatus::NotPresenting));
            }
            Ok((mut session, _)) if renderer.scene(scene).is_none() => {
                log::warn!("Scene {:?} was removed before its AR session started", scene);
                if let Err(error) = session.end() {
                    log::warn!("Error while ending AR session: {}", error);
                }
                self.abandon_request();
                self.events.send(ArEvent::Status(ArStatus::Failed));
            }
            Ok((session, space)) => self.start_presenting(renderer, scene, session, space),
        }
    }

    fn abandon_request(&mut self) {
        if self.transition(SessionState::Inactive).is_ok() {
            self.resolve_stop_waiters();
        }
    }

    fn start_presenting(
        &mut self,
        renderer: &mut Renderer,
        scene_id: SceneId,
        mut session: Box<dyn XrSession>,
        space: ReferenceSpace,
    ) {
        let Some(scene) = renderer.scene_mut(scene_id) else {
            return;
        };
        let saved = scene.snapshot();
        scene.set_shadow_intensity(0.0);
        scene.set_yaw(0.0);

        self.epoch += 1;
        let ray = hit_test_ray(self.config.hit_angle_deg, self.config.place_on_wall);
        self.pending_hit_sources.push(PendingHitSource {
            epoch: self.epoch,
            kind: HitSourceKind::ScreenCenter,
            request: session.request_hit_test_source(ray),
        });
        let frame_handle = Some(session.request_animation_frame());

        let presenting = Presenting {
            scene: scene_id,
            session,
            space,
            frame_handle,
            saved,
            placement: Placement::new(&self.config),
            hit_source: None,
            touch_source: None,
            touch_events: Vec::new(),
            place_requested: false,
            end_requested: false,
            last_frame: None,
        };
        if self.transition(SessionState::Presenting(Box::new(presenting))).is_ok() {
            renderer.set_presenting(Some(scene_id));
            log::info!("Presenting scene {:?} in AR", scene_id);
        }
    }

    fn poll_hit_sources(&mut self) {
        let mut still_pending = Vec::new();
        for mut pending in std::mem::take(&mut self.pending_hit_sources) {
            match (&mut pending.request).now_or_never() {
                None => still_pending.push(pending),
                Some(Err(error)) => log::warn!("Hit-test source request failed: {}", error),
                Some(Ok(mut source)) => {
                    let slot = match &mut self.state {
                        SessionState::Presenting(presenting) if pending.epoch == self.epoch => match pending.kind {
                            HitSourceKind::ScreenCenter => Some(&mut presenting.hit_source),
                            HitSourceKind::Touch => Some(&mut presenting.touch_source),
                        },
                        _ => None,
                    };
                    match slot {
                        Some(slot) if slot.is_none() => {
                            log::debug!("{:?} hit-test source {} ready", pending.kind, source.id());
                            *slot = Some(source);
                        }
                        _ => {
                            log::debug!("Discarding late hit-test source {}", source.id());
                            source.cancel();
                        }
                    }
                }
            }
        }
        self.pending_hit_sources = still_pending;
    }

    fn poll_session_events(&mut self, renderer: &mut Renderer) {
        let events = match &mut self.state {
            SessionState::Presenting(presenting) => presenting.session.poll_events(),
            _ => return,
        };
        for event in events {
            match event {
                // A tap places content that is still waiting for one; once
                // placed, taps are the ends of touch gestures
                SessionEvent::Select => {
                    if let SessionState::Presenting(presenting) = &mut self.state {
                        if !presenting.placement.is_placed() {
                            presenting.place_requested = true;
                        }
                    }
                }
                SessionEvent::SelectStart(_) | SessionEvent::SelectEnd(_) => {
                    if let SessionState::Presenting(presenting) = &mut self.state {
                        presenting.touch_events.push(event);
                    }
                }
                SessionEvent::End => {
                    self.cleanup(renderer);
                    return;
                }
            }
        }
    }

    // ---- Presentation ----

    /// Ask to place the content at the current screen-center hit
    ///
    /// Applied on the next AR frame; waits until a surface has been found.
    /// Placed content is moved there, which is reported as a model move.
    pub fn place(&mut self) -> Result<(), ArError> {
        match &mut self.state {
            SessionState::Presenting(presenting) => {
                presenting.place_requested = true;
                Ok(())
            }
            _ => Err(ArError::NotPresenting),
        }
    }

    /// Platform frame callback
    pub fn on_frame(&mut self, time: Millis, frame: &dyn XrFrame, renderer: &mut Renderer) {
        self.poll(renderer);
        let SessionState::Presenting(presenting) = &mut self.state else {
            log::trace!("Ignoring AR frame outside presentation");
            return;
        };
        let presenting = presenting.as_mut();
        presenting.frame_handle = Some(presenting.session.request_animation_frame());
        let delta = presenting.last_frame.map_or(0.0, |last| time - last);
        presenting.last_frame = Some(time);

        let Some(pose) = frame.viewer_pose(&presenting.space) else {
            return;
        };
        let Some(first_view) = pose.views.first() else {
            return;
        };
        let scene_id = presenting.scene;
        let Some(scene) = renderer.scene_mut(scene_id) else {
            log::warn!("Presented scene {:?} is gone; ending AR", scene_id);
            self.cleanup(renderer);
            return;
        };

        if presenting.placement.initialize(scene, first_view) {
            self.events.send(ArEvent::Status(ArStatus::SessionStarted));
        }

        if let Some(source) = &presenting.hit_source {
            if let Some(hit) = frame.hit_test_results(source.id(), &presenting.space).first() {
                presenting.placement.record_hit(&hit.pose);
            }
        }
        presenting.placement.follow_view(scene, first_view);

        let auto_place = self.config.auto_place && !presenting.placement.is_placed();
        if presenting.place_requested || auto_place {
            match presenting.placement.place(scene) {
                Some(true) => {
                    presenting.place_requested = false;
                    self.events.send(ArEvent::Status(ArStatus::ObjectPlaced));
                    self.pending_hit_sources.push(PendingHitSource {
                        epoch: self.epoch,
                        kind: HitSourceKind::Touch,
                        request: presenting.session.request_transient_hit_test_source(TOUCHSCREEN_PROFILE),
                    });
                }
                Some(false) => {
                    presenting.place_requested = false;
                    self.events.send(ArEvent::ModelMove);
                }
                None => log::trace!("Placement waiting for a surface"),
            }
        }

        let touches = presenting
            .touch_source
            .as_ref()
            .map(|source| frame.transient_hit_test_results(source.id(), &presenting.space))
            .unwrap_or_default();
        for event in presenting.touch_events.drain(..) {
            match event {
                SessionEvent::SelectStart(input) => presenting.placement.begin_gesture(scene, input, &touches),
                SessionEvent::SelectEnd(_) => {
                    if presenting.placement.end_gesture() {
                        self.events.send(ArEvent::ModelMove);
                    }
                }
                SessionEvent::Select | SessionEvent::End => {}
            }
        }
        presenting.placement.process_gesture(scene, &touches, first_view.position());
        presenting.placement.update(scene, delta);

        for view in &pose.views {
            if let Err(error) = renderer.render_xr_view(scene_id, view.view_projection()) {
                log::warn!("AR view render failed: {}", error);
            }
        }
    }

    // ---- Deactivation ----

    /// End the presentation
    ///
    /// While requesting, the session is ended as soon as the platform grants
    /// it. Calling this when nothing is presented resolves immediately.
    pub fn stop_presenting(&mut self, renderer: &mut Renderer) -> StopRequest {
        let (sender, receiver) = oneshot::channel();
        match &mut self.state {
            SessionState::Inactive | SessionState::Cleanup => return StopRequest::resolved(),
            SessionState::Requesting(requesting) => {
                requesting.stop_requested = true;
                self.stop_waiters.push(sender);
            }
            SessionState::Presenting(presenting) => {
                self.stop_waiters.push(sender);
                if !presenting.end_requested {
                    presenting.end_requested = true;
                    if let Err(error) = presenting.session.end() {
                        log::warn!("Error while ending AR session: {}", error);
                        self.cleanup(renderer);
                    }
                }
            }
        }
        StopRequest::pending(receiver)
    }

    fn cleanup(&mut self, renderer: &mut Renderer) {
        if self.phase() != ArPhase::Presenting {
            return;
        }
        let Ok(SessionState::Presenting(presenting)) = self.transition(SessionState::Cleanup) else {
            return;
        };
        let Presenting {
            scene,
            mut session,
            frame_handle,
            saved,
            hit_source,
            touch_source,
            ..
        } = *presenting;

        if let Some(handle) = frame_handle {
            session.cancel_animation_frame(handle);
        }
        for mut source in [hit_source, touch_source].into_iter().flatten() {
            source.cancel();
        }
        match renderer.scene_mut(scene) {
            Some(scene) => scene.restore(&saved),
            None => log::warn!("Scene {:?} vanished before AR cleanup", scene),
        }
        if renderer.presenting() == Some(scene) {
            renderer.set_presenting(None);
        }
        drop(session);

        self.epoch += 1;
        self.cleanups += 1;
        if self.transition(SessionState::Inactive).is_ok() {
            self.resolve_stop_waiters();
        }
        self.events.send(ArEvent::Status(ArStatus::NotPresenting));
        self.events.send(ArEvent::End);
        log::info!("AR session ended");
    }

    fn resolve_stop_waiters(&mut self) {
        for waiter in self.stop_waiters.drain(..) {
            // The caller may have dropped its request
            let _ = waiter.send(());
        }
    }

    // ---- Events ----

    /// Pending notifications
    pub fn events(&self) -> &EventQueue<ArEvent> {
        &self.events
    }

    /// Pending notifications, mutably
    pub fn events_mut(&mut self) -> &mut EventQueue<ArEvent> {
        &mut self.events
    }

    /// Take all pending notifications
    pub fn drain_events(&mut self) -> Vec<ArEvent> {
        self.events.drain()
    }
}

impl fmt::Debug for ArSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArSession")
            .field("phase", &self.phase())
            .field("scene", &self.presented_scene())
            .field("supported", &self.is_supported())
            .field("epoch", &self.epoch)
            .field("pending_hit_sources", &self.pending_hit_sources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetCache, AssetId, MemoryFetcher};
    use crate::config::RendererConfig;
    use crate::foundation::math::Vec3;
    use crate::render::HeadlessContext;
    use crate::scene::{ContentAnchor, ModelScene};
    use crate::tests::support::{cube_content, MockFrame, MockXr};

    struct Fixture {
        renderer: Renderer,
        scene: SceneId,
        _cache: AssetCache,
    }

    fn fixture() -> Fixture {
        let cache = AssetCache::new(Rc::new(MemoryFetcher::new().with_content("cube.glb", cube_content("cube"))));
        let mut renderer = Renderer::new(Box::new(HeadlessContext::new(1, 1)), &RendererConfig::default());
        let mut model = ModelScene::new(64, 64);
        model.set_source(&cache, Some(AssetId::new("cube.glb")));
        let scene = renderer.register_scene(model);
        Fixture {
            renderer,
            scene,
            _cache: cache,
        }
    }

    fn session_for(platform: &Rc<MockXr>) -> ArSession {
        let platform: Rc<dyn XrPlatform> = platform.clone();
        ArSession::new(Some(platform), &XrConfig::default())
    }

    #[test]
    fn test_unsupported_platform_fails_immediately() {
        let mut f = fixture();
        let mut ar = ArSession::new(None, &XrConfig::default());
        assert_eq!(
            ar.present(&mut f.renderer, f.scene),
            Err(ArError::UnsupportedCapability(UnsupportedCapabilityError))
        );

        let platform = MockXr::new(false);
        let mut ar = session_for(&platform);
        assert!(ar.present(&mut f.renderer, f.scene).is_err());
        assert_eq!(ar.phase(), ArPhase::Inactive);
        assert_eq!(platform.state().sessions_requested, 0);
    }

    #[test]
    fn test_second_present_is_busy() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        platform.state().defer_session = true;
        let mut ar = session_for(&platform);

        ar.present(&mut f.renderer, f.scene).unwrap();
        assert_eq!(ar.phase(), ArPhase::Requesting);
        assert_eq!(
            ar.present(&mut f.renderer, f.scene),
            Err(ArError::SessionBusy(SessionBusyError {
                phase: ArPhase::Requesting
            }))
        );
    }

    #[test]
    fn test_present_place_and_stop() {
        let mut f = fixture();
        let before = f.renderer.scene(f.scene).unwrap().snapshot();
        let platform = MockXr::new(true);
        let mut ar = session_for(&platform);

        ar.present(&mut f.renderer, f.scene).unwrap();
        assert_eq!(ar.phase(), ArPhase::Presenting);
        assert_eq!(f.renderer.presenting(), Some(f.scene));
        assert_eq!(ar.place(), Ok(()));

        let frame = MockFrame::looking_forward(Some(Vec3::new(0.0, 0.0, -2.0)));
        ar.on_frame(0.0, &frame, &mut f.renderer);
        ar.on_frame(16.0, &frame, &mut f.renderer);
        assert_eq!(
            ar.drain_events(),
            vec![
                ArEvent::Status(ArStatus::SessionStarted),
                ArEvent::Status(ArStatus::ObjectPlaced)
            ]
        );
        assert_eq!(f.renderer.scene(f.scene).unwrap().anchor(), ContentAnchor::Dolly);

        let mut stop = ar.stop_presenting(&mut f.renderer);
        assert!(!stop.is_resolved());
        ar.poll(&mut f.renderer);
        assert!(stop.is_resolved());
        assert_eq!(ar.phase(), ArPhase::Inactive);
        assert_eq!(f.renderer.presenting(), None);
        assert_eq!(f.renderer.scene(f.scene).unwrap().anchor(), before.anchor);
        assert_eq!(f.renderer.scene(f.scene).unwrap().position(), before.position);
        assert_eq!(
            ar.drain_events(),
            vec![ArEvent::Status(ArStatus::NotPresenting), ArEvent::End]
        );

        let state = platform.state();
        assert_eq!(state.frames_requested, 3);
        assert_eq!(state.frames_canceled, 1);
        assert_eq!(state.hit_sources_canceled, 2);
    }

    #[test]
    fn test_cleanup_runs_once() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        let mut ar = session_for(&platform);
        ar.present(&mut f.renderer, f.scene).unwrap();

        platform.push_event(SessionEvent::End);
        ar.poll(&mut f.renderer);
        assert!(ar.stop_presenting(&mut f.renderer).is_resolved());
        ar.poll(&mut f.renderer);

        assert_eq!(ar.cleanup_count(), 1);
        let ends = ar.drain_events().into_iter().filter(|event| *event == ArEvent::End).count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_end_failure_cleans_up_immediately() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        platform.state().fail_end = true;
        let mut ar = session_for(&platform);
        ar.present(&mut f.renderer, f.scene).unwrap();

        let mut stop = ar.stop_presenting(&mut f.renderer);
        assert!(stop.is_resolved());
        assert_eq!(ar.phase(), ArPhase::Inactive);
        assert_eq!(ar.cleanup_count(), 1);
        assert_eq!(f.renderer.presenting(), None);
    }

    #[test]
    fn test_late_hit_source_is_cancelled() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        platform.state().defer_hit_source = true;
        let mut ar = session_for(&platform);
        ar.present(&mut f.renderer, f.scene).unwrap();
        assert_eq!(ar.pending_hit_sources(), 1);

        platform.push_event(SessionEvent::End);
        ar.poll(&mut f.renderer);
        assert_eq!(ar.phase(), ArPhase::Inactive);

        assert!(platform.resolve_hit_source());
        ar.poll(&mut f.renderer);
        assert_eq!(ar.pending_hit_sources(), 0);
        assert_eq!(platform.state().hit_sources_canceled, 1);
    }

    #[test]
    fn test_stop_while_requesting_ends_granted_session() {
        let mut f = fixture();
        let before = f.renderer.scene(f.scene).unwrap().snapshot();
        let platform = MockXr::new(true);
        platform.state().defer_session = true;
        let mut ar = session_for(&platform);
        ar.present(&mut f.renderer, f.scene).unwrap();

        let mut stop = ar.stop_presenting(&mut f.renderer);
        assert!(!stop.is_resolved());

        assert!(platform.resolve_session(Ok(())));
        ar.poll(&mut f.renderer);
        assert!(stop.is_resolved());
        assert_eq!(ar.phase(), ArPhase::Inactive);
        assert_eq!(ar.cleanup_count(), 0);
        assert_eq!(platform.state().end_calls, 1);
        assert_eq!(f.renderer.presenting(), None);
        assert_eq!(f.renderer.scene(f.scene).unwrap().snapshot(), before);
    }

    #[test]
    fn test_failed_request_reports_status() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        platform.state().defer_session = true;
        let mut ar = session_for(&platform);
        ar.present(&mut f.renderer, f.scene).unwrap();

        assert!(platform.resolve_session(Err(ArError::Platform("denied".to_string()))));
        ar.poll(&mut f.renderer);
        assert_eq!(ar.phase(), ArPhase::Inactive);
        assert_eq!(ar.drain_events(), vec![ArEvent::Status(ArStatus::Failed)]);
        assert_eq!(f.renderer.presenting(), None);
    }

    #[test]
    fn test_place_outside_session() {
        let mut ar = ArSession::new(None, &XrConfig::default());
        assert_eq!(ar.place(), Err(ArError::NotPresenting));
    }

    #[test]
    fn test_removed_scene_ends_presentation() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        let mut ar = session_for(&platform);
        ar.present(&mut f.renderer, f.scene).unwrap();

        f.renderer.unregister_scene(f.scene);
        ar.on_frame(0.0, &MockFrame::looking_forward(None), &mut f.renderer);
        assert_eq!(ar.phase(), ArPhase::Inactive);
        assert_eq!(ar.cleanup_count(), 1);
    }
    #[test]
    fn test_waits_for_tap_without_auto_place() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        let config = XrConfig {
            auto_place: false,
            ..XrConfig::default()
        };
        let platform_handle: Rc<dyn XrPlatform> = platform.clone();
        let mut ar = ArSession::new(Some(platform_handle), &config);
        ar.present(&mut f.renderer, f.scene).unwrap();

        let frame = MockFrame::looking_forward(Some(Vec3::new(0.0, 0.0, -2.0)));
        ar.on_frame(0.0, &frame, &mut f.renderer);
        ar.on_frame(16.0, &frame, &mut f.renderer);
        assert_eq!(ar.drain_events(), vec![ArEvent::Status(ArStatus::SessionStarted)]);
        assert_eq!(platform.state().touch_sources_requested, 0);

        platform.push_event(SessionEvent::Select);
        ar.on_frame(32.0, &frame, &mut f.renderer);
        assert_eq!(ar.drain_events(), vec![ArEvent::Status(ArStatus::ObjectPlaced)]);
        assert_eq!(platform.state().touch_sources_requested, 1);
    }

    #[test]
    fn test_drag_moves_placed_content() {
        let mut f = fixture();
        let platform = MockXr::new(true);
        let mut ar = session_for(&platform);
        ar.present(&mut f.renderer, f.scene).unwrap();

        let floor = Some(Vec3::new(0.0, 0.0, -2.0));
        let mut time = 0.0;
        let mut step = |ar: &mut ArSession, renderer: &mut Renderer, frame: &MockFrame| {
            ar.on_frame(time, frame, renderer);
            time += 16.0;
        };
        for _ in 0..200 {
            step(&mut ar, &mut f.renderer, &MockFrame::looking_forward(floor));
        }
        assert_eq!(
            ar.drain_events(),
            vec![
                ArEvent::Status(ArStatus::SessionStarted),
                ArEvent::Status(ArStatus::ObjectPlaced)
            ]
        );
        assert_eq!(f.renderer.scene(f.scene).unwrap().position(), Vec3::new(0.0, 0.0, -2.0));

        platform.push_event(SessionEvent::SelectStart(7));
        step(&mut ar, &mut f.renderer, &MockFrame::touching(floor, 7, [0.0, 0.0], Vec3::new(0.1, 0.0, -2.0)));
        step(&mut ar, &mut f.renderer, &MockFrame::touching(floor, 7, [0.3, 0.0], Vec3::new(1.1, 0.0, -2.0)));
        // Platforms follow a lifted touch with a tap; it must not re-place
        platform.push_event(SessionEvent::SelectEnd(7));
        platform.push_event(SessionEvent::Select);
        for _ in 0..200 {
            step(&mut ar, &mut f.renderer, &MockFrame::looking_forward(floor));
        }

        assert_eq!(ar.drain_events(), vec![ArEvent::ModelMove]);
        let position = f.renderer.scene(f.scene).unwrap().position();
        assert!((position - Vec3::new(1.0, 0.0, -2.0)).norm() < 1e-4, "{position:?}");
    }
}
