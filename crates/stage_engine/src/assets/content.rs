//! Decoded scene-graph content
//!
//! This is the in-memory shape the (external) file parser produces: a node
//! arena with a root list plus material, mesh, skin and animation tables.
//!
//! **Sharing rules** when a cached source is instanced for a Scene:
//! - Materials are deep-copied so edits on one instance never leak
//! - Geometry buffers stay shared through `Rc`
//! - Animation clips stay shared through `Rc` (read-only)
//! - Skins are rebound to the cloned hierarchy by joint index, in bone order

use crate::foundation::math::{Aabb, Mat4, Quat, Transform, Vec3, Vec4};
use std::collections::HashSet;
use std::rc::Rc;

/// Index of a node inside its content's arena
pub type NodeIndex = usize;

/// How a material's alpha channel is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    /// Alpha ignored
    #[default]
    Opaque,
    /// Alpha tested against a cutoff
    Mask,
    /// Alpha blended
    Blend,
}

/// PBR material parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Material name
    pub name: String,
    /// Base color factor (linear RGBA)
    pub base_color: Vec4,
    /// Metallic factor
    pub metallic: f32,
    /// Roughness factor
    pub roughness: f32,
    /// Emissive color
    pub emissive: Vec3,
    /// Alpha interpretation
    pub alpha_mode: AlphaMode,
    /// Render back faces
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            metallic: 1.0,
            roughness: 1.0,
            emissive: Vec3::zeros(),
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}

impl Material {
    /// Create a named material with default factors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the base color factor
    pub fn with_base_color(mut self, base_color: Vec4) -> Self {
        self.base_color = base_color;
        self
    }
}

/// Vertex and index buffers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    /// Vertex positions in mesh space
    pub positions: Vec<Vec3>,
    /// Vertex normals
    pub normals: Vec<Vec3>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Create geometry from positions and indices
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: Vec::new(),
            indices,
        }
    }

    /// Mesh-space bounds
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for position in &self.positions {
            aabb.expand(position);
        }
        aabb
    }
}

/// Geometry paired with a material slot
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Shared vertex data
    pub geometry: Rc<Geometry>,
    /// Index into the content's material table
    pub material: usize,
    /// Whether the mesh casts a shadow
    pub cast_shadow: bool,
}

/// Skeleton binding of a skinned mesh
#[derive(Debug, Clone)]
pub struct Skin {
    /// Joint nodes in bone order
    pub joints: Vec<NodeIndex>,
    /// Inverse bind matrix per joint
    pub inverse_bind_matrices: Rc<[Mat4]>,
}

/// A node in the content hierarchy
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Node name (unique after [`SceneGraphContent::ensure_node_names`])
    pub name: String,
    /// Local transform relative to the parent
    pub transform: Transform,
    /// Parent node
    pub parent: Option<NodeIndex>,
    /// Child nodes
    pub children: Vec<NodeIndex>,
    /// Index into the mesh table
    pub mesh: Option<usize>,
    /// Index into the skin table
    pub skin: Option<usize>,
}

/// Keyframe values of one animated property
#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    /// Local position keyframes
    Translation(Vec<Vec3>),
    /// Local rotation keyframes
    Rotation(Vec<Quat>),
    /// Local scale keyframes
    Scale(Vec<Vec3>),
}

/// Keyframes targeting one node property by node name
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    /// Name of the animated node
    pub target: String,
    /// Keyframe times in seconds, ascending
    pub times: Vec<f32>,
    /// Keyframe values, one per time
    pub values: TrackValues,
}

impl AnimationTrack {
    /// Write the value at `time` (seconds) into `transform`
    pub fn sample(&self, time: f32, transform: &mut Transform) {
        let Some((from, to, t)) = self.keyframe_span(time) else {
            return;
        };

        match &self.values {
            TrackValues::Translation(values) => {
                if let (Some(a), Some(b)) = (values.get(from), values.get(to)) {
                    transform.position = a.lerp(b, t);
                }
            }
            TrackValues::Rotation(values) => {
                if let (Some(a), Some(b)) = (values.get(from), values.get(to)) {
                    transform.rotation = a.try_slerp(b, t, 1.0e-6).unwrap_or(*b);
                }
            }
            TrackValues::Scale(values) => {
                if let (Some(a), Some(b)) = (values.get(from), values.get(to)) {
                    transform.scale = a.lerp(b, t);
                }
            }
        }
    }

    /// Surrounding keyframes and the blend factor between them
    fn keyframe_span(&self, time: f32) -> Option<(usize, usize, f32)> {
        let last = self.times.len().checked_sub(1)?;
        if time <= self.times[0] {
            return Some((0, 0, 0.0));
        }
        if time >= self.times[last] {
            return Some((last, last, 0.0));
        }

        let to = self.times.partition_point(|&key| key <= time);
        let from = to - 1;
        let span = self.times[to] - self.times[from];
        let t = if span > 0.0 { (time - self.times[from]) / span } else { 0.0 };
        Some((from, to, t))
    }
}

/// A named set of tracks
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    /// Clip name
    pub name: String,
    /// Length in seconds
    pub duration: f32,
    /// Animated properties
    pub tracks: Vec<AnimationTrack>,
}

impl AnimationClip {
    /// Create a clip whose duration is its last keyframe
    pub fn new(name: impl Into<String>, tracks: Vec<AnimationTrack>) -> Self {
        let duration = tracks
            .iter()
            .filter_map(|track| track.times.last().copied())
            .fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }

    /// Pose `content` at `time` seconds
    ///
    /// Tracks whose target node does not exist are skipped.
    pub fn apply(&self, content: &mut SceneGraphContent, time: f32) {
        for track in &self.tracks {
            if let Some(index) = content.find_node(&track.target) {
                track.sample(time, &mut content.nodes[index].transform);
            }
        }
    }
}

/// Decoded 3D content: hierarchy, materials, meshes, skins and animations
#[derive(Debug, Clone, Default)]
pub struct SceneGraphContent {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeIndex>,
    materials: Vec<Material>,
    meshes: Vec<Mesh>,
    skins: Vec<Skin>,
    animations: Vec<Rc<AnimationClip>>,
}

impl SceneGraphContent {
    /// Create empty content
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node under `parent` (or as a root) and return its index
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        parent: Option<NodeIndex>,
    ) -> NodeIndex {
        let index = self.nodes.len();
        let parent = parent.filter(|&p| p < index);
        self.nodes.push(SceneNode {
            name: name.into(),
            transform,
            parent,
            children: Vec::new(),
            mesh: None,
            skin: None,
        });
        match parent {
            Some(p) => self.nodes[p].children.push(index),
            None => self.roots.push(index),
        }
        index
    }

    /// Add a material and return its slot
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Add a mesh and return its index
    pub fn add_mesh(&mut self, geometry: Rc<Geometry>, material: usize) -> usize {
        self.meshes.push(Mesh {
            geometry,
            material,
            cast_shadow: true,
        });
        self.meshes.len() - 1
    }

    /// Attach a mesh to a node
    pub fn attach_mesh(&mut self, node: NodeIndex, mesh: usize) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.mesh = Some(mesh);
        }
    }

    /// Add a skin and return its index
    pub fn add_skin(&mut self, joints: Vec<NodeIndex>, inverse_bind_matrices: Vec<Mat4>) -> usize {
        self.skins.push(Skin {
            joints,
            inverse_bind_matrices: inverse_bind_matrices.into(),
        });
        self.skins.len() - 1
    }

    /// Bind a skin to a node
    pub fn attach_skin(&mut self, node: NodeIndex, skin: usize) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.skin = Some(skin);
        }
    }

    /// Add an animation clip
    pub fn add_animation(&mut self, clip: AnimationClip) {
        self.animations.push(Rc::new(clip));
    }

    /// All nodes
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Node by index
    pub fn node(&self, index: NodeIndex) -> Option<&SceneNode> {
        self.nodes.get(index)
    }

    /// Mutable node by index
    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut SceneNode> {
        self.nodes.get_mut(index)
    }

    /// Root nodes
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Material table
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Mutable material by slot
    pub fn material_mut(&mut self, slot: usize) -> Option<&mut Material> {
        self.materials.get_mut(slot)
    }

    /// Mesh table
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Skin table
    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    /// Animation clips
    pub fn animations(&self) -> &[Rc<AnimationClip>] {
        &self.animations
    }

    /// Animation clip by name
    pub fn animation(&self, name: &str) -> Option<&Rc<AnimationClip>> {
        self.animations.iter().find(|clip| clip.name == name)
    }

    /// First node with the given name
    pub fn find_node(&self, name: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// Transform of a node relative to the content root
    pub fn world_matrix(&self, index: NodeIndex) -> Mat4 {
        let mut matrix = Mat4::identity();
        let mut current = Some(index);
        while let Some(i) = current {
            let Some(node) = self.nodes.get(i) else {
                break;
            };
            matrix = node.transform.to_matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// Visit every mesh vertex in content space
    pub fn for_each_vertex(&self, mut visit: impl FnMut(Vec3)) {
        for (index, node) in self.nodes.iter().enumerate() {
            let Some(mesh) = node.mesh.and_then(|m| self.meshes.get(m)) else {
                continue;
            };
            let world = self.world_matrix(index);
            for position in &mesh.geometry.positions {
                visit(world.transform_point(&(*position).into()).coords);
            }
        }
    }

    /// Content-space bounds of all meshes
    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        self.for_each_vertex(|vertex| aabb.expand(&vertex));
        aabb
    }

    /// Skinning matrices of a skin in its current pose, in bone order
    pub fn joint_matrices(&self, skin: usize) -> Vec<Mat4> {
        let Some(skin) = self.skins.get(skin) else {
            return Vec::new();
        };
        skin.joints
            .iter()
            .zip(skin.inverse_bind_matrices.iter())
            .map(|(&joint, inverse_bind)| self.world_matrix(joint) * inverse_bind)
            .collect()
    }

    /// Give every unnamed node a unique generated name
    ///
    /// Animation tracks address nodes by name, so this runs once on cached
    /// sources before any instance is cloned from them.
    pub fn ensure_node_names(&mut self) {
        let mut taken: HashSet<String> = self
            .nodes
            .iter()
            .filter(|node| !node.name.is_empty())
            .map(|node| node.name.clone())
            .collect();

        for index in 0..self.nodes.len() {
            if !self.nodes[index].name.is_empty() {
                continue;
            }
            let mut name = format!("node-{index}");
            let mut suffix = 0;
            while taken.contains(&name) {
                suffix += 1;
                name = format!("node-{index}-{suffix}");
            }
            taken.insert(name.clone());
            self.nodes[index].name = name;
        }
    }

    /// Independent instance for one Scene
    ///
    /// Materials are copied and geometry and animation clips are shared. The
    /// node arena is copied in order, so each skin keeps its joint indices
    /// and binds the same bones in the new hierarchy even when names repeat.
    pub fn deep_clone(&self) -> Self {
        let skins = self
            .skins
            .iter()
            .map(|skin| Skin {
                joints: skin.joints.clone(),
                inverse_bind_matrices: Rc::clone(&skin.inverse_bind_matrices),
            })
            .collect();

        Self {
            nodes: self.nodes.clone(),
            roots: self.roots.clone(),
            materials: self.materials.clone(),
            meshes: self.meshes.clone(),
            skins,
            animations: self.animations.clone(),
        }
    }
}
