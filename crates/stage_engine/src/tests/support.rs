//! Shared fixtures for unit and integration tests

use crate::assets::{AssetFetcher, AssetId, Geometry, LoadError, Material, SceneGraphContent};
use crate::foundation::math::{Mat4, Mat4Ext, Transform, Vec3};
use crate::xr::{
    ArError, FrameHandle, HitTestRay, HitTestResult, HitTestSource, ReferenceSpace, ReferenceSpaceKind, SessionEvent,
    TransientHitResult, ViewerPose, XrFrame, XrPlatform, XrSession, XrView,
};
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;

type Reply = oneshot::Sender<Result<SceneGraphContent, LoadError>>;

/// Fetcher whose requests stay pending until the test resolves them
#[derive(Default)]
pub(crate) struct ManualFetcher {
    requests: RefCell<Vec<AssetId>>,
    pending: RefCell<Vec<(AssetId, Reply)>>,
}

impl ManualFetcher {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of fetches started so far
    pub(crate) fn fetch_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Complete the oldest pending fetch of `id`
    pub(crate) fn resolve(&self, id: &str, result: Result<SceneGraphContent, LoadError>) -> bool {
        let reply = {
            let mut pending = self.pending.borrow_mut();
            match pending.iter().position(|(pending_id, _)| pending_id.as_str() == id) {
                Some(index) => pending.remove(index).1,
                None => return false,
            }
        };
        reply.send(result).is_ok()
    }
}

impl AssetFetcher for ManualFetcher {
    fn fetch(&self, id: &AssetId) -> LocalBoxFuture<'static, Result<SceneGraphContent, LoadError>> {
        let (reply, response) = oneshot::channel();
        self.requests.borrow_mut().push(id.clone());
        self.pending.borrow_mut().push((id.clone(), reply));

        let url = id.clone();
        async move {
            match response.await {
                Ok(result) => result,
                Err(_) => Err(LoadError::Fetch {
                    url,
                    reason: "request dropped".to_string(),
                }),
            }
        }
        .boxed_local()
    }
}

/// A unit cube centered at the origin with one white material
pub(crate) fn cube_content(name: &str) -> SceneGraphContent {
    cuboid_content(name, Vec3::new(1.0, 1.0, 1.0))
}

/// A box with the given full extents, centered at the origin
pub(crate) fn cuboid_content(name: &str, size: Vec3) -> SceneGraphContent {
    let half = size * 0.5;
    let mut positions = Vec::with_capacity(8);
    for &x in &[-half.x, half.x] {
        for &y in &[-half.y, half.y] {
            for &z in &[-half.z, half.z] {
                positions.push(Vec3::new(x, y, z));
            }
        }
    }

    let mut content = SceneGraphContent::new();
    let root = content.add_node(name, Transform::identity(), None);
    let material = content.add_material(Material::new(format!("{name}-material")));
    let mesh = content.add_mesh(Rc::new(Geometry::new(positions, vec![0, 1, 2, 1, 3, 2])), material);
    content.attach_mesh(root, mesh);
    content
}

// ---- AR platform ----

type SessionReply = oneshot::Sender<Result<Box<dyn XrSession>, ArError>>;
type HitSourceReply = oneshot::Sender<Result<Box<dyn HitTestSource>, ArError>>;

/// Knobs and counters shared by a [`MockXr`] and the sessions it grants
#[derive(Default)]
pub(crate) struct MockXrState {
    /// Hold session requests until [`MockXr::resolve_session`]
    pub defer_session: bool,
    /// Hold hit-test source requests until [`MockXr::resolve_hit_source`]
    pub defer_hit_source: bool,
    /// Make `XrSession::end` fail
    pub fail_end: bool,
    pub sessions_requested: usize,
    pub end_calls: usize,
    pub frames_requested: usize,
    pub frames_canceled: usize,
    pub hit_sources_canceled: usize,
    pub touch_sources_requested: usize,
    events: Vec<SessionEvent>,
    session_replies: Vec<SessionReply>,
    hit_source_replies: Vec<HitSourceReply>,
    next_hit_source: u64,
}

/// Scriptable AR platform
pub(crate) struct MockXr {
    supported: bool,
    state: Rc<RefCell<MockXrState>>,
}

impl MockXr {
    pub(crate) fn new(supported: bool) -> Rc<Self> {
        Rc::new(Self {
            supported,
            state: Rc::new(RefCell::new(MockXrState::default())),
        })
    }

    pub(crate) fn state(&self) -> RefMut<'_, MockXrState> {
        self.state.borrow_mut()
    }

    /// Queue a notification for the running session
    pub(crate) fn push_event(&self, event: SessionEvent) {
        self.state().events.push(event);
    }

    /// Grant (or refuse) the oldest deferred session request
    pub(crate) fn resolve_session(&self, result: Result<(), ArError>) -> bool {
        let reply = {
            let mut state = self.state();
            if state.session_replies.is_empty() {
                return false;
            }
            state.session_replies.remove(0)
        };
        let session = result.map(|()| MockSession::boxed(&self.state));
        reply.send(session).is_ok()
    }

    /// Grant the oldest deferred hit-test source request
    pub(crate) fn resolve_hit_source(&self) -> bool {
        let reply = {
            let mut state = self.state();
            if state.hit_source_replies.is_empty() {
                return false;
            }
            state.hit_source_replies.remove(0)
        };
        reply.send(Ok(MockHitSource::boxed(&self.state))).is_ok()
    }
}

impl XrPlatform for MockXr {
    fn supports_immersive_ar(&self) -> bool {
        self.supported
    }

    fn request_session(&self) -> LocalBoxFuture<'static, Result<Box<dyn XrSession>, ArError>> {
        let mut state = self.state();
        state.sessions_requested += 1;
        if !state.defer_session {
            return future::ready(Ok(MockSession::boxed(&self.state))).boxed_local();
        }
        let (reply, response) = oneshot::channel();
        state.session_replies.push(reply);
        async move {
            response
                .await
                .unwrap_or_else(|_| Err(ArError::Platform("request dropped".to_string())))
        }
        .boxed_local()
    }
}

struct MockSession {
    state: Rc<RefCell<MockXrState>>,
    next_frame: FrameHandle,
}

impl MockSession {
    fn boxed(state: &Rc<RefCell<MockXrState>>) -> Box<dyn XrSession> {
        Box::new(Self {
            state: Rc::clone(state),
            next_frame: 0,
        })
    }

    fn hit_source(&self) -> LocalBoxFuture<'static, Result<Box<dyn HitTestSource>, ArError>> {
        let mut state = self.state.borrow_mut();
        if !state.defer_hit_source {
            drop(state);
            return future::ready(Ok(MockHitSource::boxed(&self.state))).boxed_local();
        }
        let (reply, response) = oneshot::channel();
        state.hit_source_replies.push(reply);
        async move {
            response
                .await
                .unwrap_or_else(|_| Err(ArError::Platform("request dropped".to_string())))
        }
        .boxed_local()
    }
}

impl XrSession for MockSession {
    fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> LocalBoxFuture<'static, Result<ReferenceSpace, ArError>> {
        future::ready(Ok(ReferenceSpace { kind })).boxed_local()
    }

    fn request_hit_test_source(
        &mut self,
        _ray: HitTestRay,
    ) -> LocalBoxFuture<'static, Result<Box<dyn HitTestSource>, ArError>> {
        self.hit_source()
    }

    fn request_transient_hit_test_source(
        &mut self,
        _profile: &str,
    ) -> LocalBoxFuture<'static, Result<Box<dyn HitTestSource>, ArError>> {
        self.state.borrow_mut().touch_sources_requested += 1;
        self.hit_source()
    }

    fn request_animation_frame(&mut self) -> FrameHandle {
        self.state.borrow_mut().frames_requested += 1;
        self.next_frame += 1;
        self.next_frame
    }

    fn cancel_animation_frame(&mut self, _handle: FrameHandle) {
        self.state.borrow_mut().frames_canceled += 1;
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }

    fn end(&mut self) -> Result<(), ArError> {
        let mut state = self.state.borrow_mut();
        state.end_calls += 1;
        if state.fail_end {
            return Err(ArError::Platform("session already gone".to_string()));
        }
        state.events.push(SessionEvent::End);
        Ok(())
    }
}

struct MockHitSource {
    id: u64,
    state: Rc<RefCell<MockXrState>>,
}

impl MockHitSource {
    fn boxed(state: &Rc<RefCell<MockXrState>>) -> Box<dyn HitTestSource> {
        let id = {
            let mut state = state.borrow_mut();
            state.next_hit_source += 1;
            state.next_hit_source
        };
        Box::new(Self {
            id,
            state: Rc::clone(state),
        })
    }
}

impl HitTestSource for MockHitSource {
    fn id(&self) -> u64 {
        self.id
    }

    fn cancel(&mut self) {
        self.state.borrow_mut().hit_sources_canceled += 1;
    }
}

/// One AR frame with a single view, at most one screen-center hit and any
/// number of touches
pub(crate) struct MockFrame {
    pub view: XrView,
    pub hit: Option<Vec3>,
    pub touches: Vec<TransientHitResult>,
}

impl MockFrame {
    /// A phone held 1.5 m above the floor, looking down -Z
    pub(crate) fn looking_forward(hit: Option<Vec3>) -> Self {
        Self {
            view: XrView {
                transform: Mat4::new_translation(&Vec3::new(0.0, 1.5, 0.0)),
                projection: Mat4::perspective(1.0, 1.0, 0.01, 100.0),
            },
            hit,
            touches: Vec::new(),
        }
    }

    /// Same view with one finger at `axes` whose ray meets `point`
    pub(crate) fn touching(hit: Option<Vec3>, input: u32, axes: [f32; 2], point: Vec3) -> Self {
        let mut frame = Self::looking_forward(hit);
        frame.touches.push(TransientHitResult {
            input,
            axes,
            results: vec![HitTestResult {
                pose: Mat4::new_translation(&point),
            }],
        });
        frame
    }
}

impl XrFrame for MockFrame {
    fn viewer_pose(&self, _space: &ReferenceSpace) -> Option<ViewerPose> {
        Some(ViewerPose {
            views: vec![self.view.clone()],
        })
    }

    fn hit_test_results(&self, _source: u64, _space: &ReferenceSpace) -> Vec<HitTestResult> {
        self.hit
            .iter()
            .map(|point| HitTestResult {
                pose: Mat4::new_translation(point),
            })
            .collect()
    }

    fn transient_hit_test_results(&self, _source: u64, _space: &ReferenceSpace) -> Vec<TransientHitResult> {
        self.touches.clone()
    }
}
