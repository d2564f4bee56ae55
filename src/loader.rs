use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
};

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::{
    error::AssetError,
    mesh::{ModelMesh, ModelVertex},
    scene::{Diagnostic, SceneState},
};

/// Root node of a loaded model. Cloning shares the mesh data and copies the transform,
/// so every clone can be positioned independently.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub name: String,
    pub mesh: Arc<ModelMesh>,
    pub scale: Vec3,
    pub translation: Vec3,
}

impl ModelAsset {
    pub fn new(name: impl Into<String>, mesh: ModelMesh) -> Self {
        Self {
            name: name.into(),
            mesh: Arc::new(mesh),
            scale: Vec3::ONE,
            translation: Vec3::ZERO,
        }
    }

    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, Quat::IDENTITY, self.translation)
    }
}

pub trait AssetSource: Send + 'static {
    fn load(&self, path: &Path) -> Result<ModelMesh, AssetError>;
}

/// Reads glTF / GLB files through the `gltf` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfSource;

impl AssetSource for GltfSource {
    fn load(&self, path: &Path) -> Result<ModelMesh, AssetError> {
        let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Import {
            path: path.to_owned(),
            source,
        })?;

        let mut mesh = ModelMesh::default();
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next());
        if let Some(scene) = scene {
            for node in scene.nodes() {
                collect_node(&node, Mat4::IDENTITY, &buffers, &mut mesh);
            }
        }

        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(AssetError::NoMeshes {
                path: path.to_owned(),
            });
        }
        Ok(mesh)
    }
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut ModelMesh,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals = padded_normals(reader.read_normals().map(|n| n.collect()), positions.len());
            let color = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();

            let base = out.vertices.len() as u32;
            for (position, normal) in positions.iter().zip(normals.iter()) {
                out.vertices.push(ModelVertex {
                    position: world.transform_point3(Vec3::from(*position)).to_array(),
                    normal: (normal_matrix * Vec3::from(*normal))
                        .normalize_or_zero()
                        .to_array(),
                    color,
                });
            }

            match reader.read_indices() {
                Some(indices) => out.indices.extend(indices.into_u32().map(|i| base + i)),
                None => out.indices.extend(base..base + positions.len() as u32),
            }
        }
    }

    for child in node.children() {
        collect_node(&child, world, buffers, out);
    }
}

/// One normal per position; missing or short normal streams face +Y.
fn padded_normals(normals: Option<Vec<[f32; 3]>>, count: usize) -> Vec<[f32; 3]> {
    let mut normals = normals.unwrap_or_default();
    normals.resize(count, [0.0, 1.0, 0.0]);
    normals
}

/// A load running on a background thread. The result is picked up by `poll`
/// between frames, so the scene never observes a half-applied load.
pub struct AssetRequest {
    path: PathBuf,
    receiver: Receiver<Result<ModelMesh, AssetError>>,
}

impl AssetRequest {
    pub fn spawn<S: AssetSource>(source: S, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();
        let thread_path = path.clone();
        tracing::info!(asset = %path.display(), "loading model");
        thread::spawn(move || {
            let result = source.load(&thread_path);
            // The receiver is gone only if the scene already shut down.
            let _ = sender.send(result);
        });
        Self { path, receiver }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` while the load is still in flight.
    pub fn poll(&self) -> Option<Result<ModelMesh, AssetError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AssetError::Disconnected {
                path: self.path.clone(),
            })),
        }
    }
}

/// Apply a finished load to the scene. Failure is recorded and logged; the scene keeps
/// running without models.
pub fn complete_load(state: &mut SceneState, path: &Path, result: Result<ModelMesh, AssetError>) {
    let name = path.display().to_string();
    match result {
        Ok(mesh) => {
            tracing::info!(
                asset = %name,
                vertices = mesh.vertices.len(),
                triangles = mesh.indices.len() / 3,
                "model loaded"
            );
            let mut model = ModelAsset::new(name, mesh);
            model.scale = Vec3::splat(state.config.model_scale);
            model.translation = Vec3::ZERO;
            state.model = Some(model);
            attach_clones(state);
        }
        Err(error) => {
            tracing::error!(asset = %name, %error, "an error occurred while loading the model");
            state.diagnostics.push(Diagnostic {
                asset: name,
                message: error.to_string(),
            });
        }
    }
}

/// Give each of the first decorated spheres its own clone of the loaded model.
/// Does nothing until both the model and the field exist.
pub fn attach_clones(state: &mut SceneState) {
    let Some(model) = state.model.as_ref() else {
        return;
    };
    if !state.is_generated() {
        tracing::debug!("model arrived before the object field; attaching later");
        return;
    }

    let count = state.config.decorated_spheres.min(state.spheres.len());
    for sphere in state.spheres.iter_mut().take(count) {
        sphere.model = Some(model.clone());
    }
    tracing::info!(count, "model clones attached");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{config::SceneConfig, field};

    struct Failing;

    impl AssetSource for Failing {
        fn load(&self, path: &Path) -> Result<ModelMesh, AssetError> {
            Err(AssetError::NoMeshes {
                path: path.to_owned(),
            })
        }
    }

    struct Triangle;

    impl AssetSource for Triangle {
        fn load(&self, _path: &Path) -> Result<ModelMesh, AssetError> {
            Ok(triangle())
        }
    }

    fn triangle() -> ModelMesh {
        let vertex = |x: f32, y: f32| ModelVertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            color: [1.0; 4],
        };
        ModelMesh {
            vertices: vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
            indices: vec![0, 1, 2],
        }
    }

    fn wait(request: &AssetRequest) -> Result<ModelMesh, AssetError> {
        for _ in 0..500 {
            if let Some(result) = request.poll() {
                return result;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("asset request never completed");
    }

    fn generated_state() -> SceneState {
        let mut state = SceneState::new(SceneConfig::default(), 800, 600);
        field::generate(&mut state, &mut StdRng::seed_from_u64(7)).unwrap();
        state
    }

    #[test]
    fn failed_load_leaves_field_intact() {
        let mut state = generated_state();
        let positions: Vec<Vec3> = state.spheres.iter().map(|s| s.position).collect();

        let request = AssetRequest::spawn(Failing, "cyberpunk_robot.glb");
        let result = wait(&request);
        complete_load(&mut state, request.path(), result);

        assert_eq!(state.spheres.len(), 500);
        assert_eq!(state.decorated_count(), 0);
        assert!(state.model.is_none());
        assert_eq!(state.diagnostics.len(), 1);
        assert_eq!(state.diagnostics[0].asset, "cyberpunk_robot.glb");
        assert!(state.diagnostics[0].message.contains("no mesh primitives"));

        let after: Vec<Vec3> = state.spheres.iter().map(|s| s.position).collect();
        assert_eq!(positions, after);

        for _ in 0..3 {
            crate::update::advance(&mut state, 1.0);
        }
        let moved = state
            .spheres
            .iter()
            .zip(&positions)
            .filter(|(sphere, before)| sphere.position != **before)
            .count();
        assert_eq!(moved, 500);
        assert!(state.comets.iter().all(|c| c.progress > 0.0));
    }

    #[test]
    fn short_normal_streams_are_padded() {
        assert_eq!(padded_normals(None, 2), vec![[0.0, 1.0, 0.0]; 2]);

        let normals = padded_normals(Some(vec![[1.0, 0.0, 0.0]]), 3);
        assert_eq!(
            normals,
            vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
        );
    }

    #[test]
    fn successful_load_decorates_first_ten() {
        let mut state = generated_state();
        let request = AssetRequest::spawn(Triangle, "robot.glb");
        let result = wait(&request);
        complete_load(&mut state, request.path(), result);

        assert_eq!(state.decorated_count(), 10);
        assert!(state.spheres[..10].iter().all(|s| s.model.is_some()));
        let model = state.spheres[0].model.as_ref().unwrap();
        assert_eq!(model.scale, Vec3::splat(5.0));
        assert_eq!(model.translation, Vec3::ZERO);
        assert!(state.diagnostics.is_empty());
    }

    #[test]
    fn clones_are_independent() {
        let mut state = generated_state();
        complete_load(&mut state, Path::new("robot.glb"), Ok(triangle()));

        if let Some(model) = state.spheres[0].model.as_mut() {
            model.translation = Vec3::X;
        }
        let other = state.spheres[1].model.as_ref().unwrap();
        assert_eq!(other.translation, Vec3::ZERO);
    }

    #[test]
    fn early_model_waits_for_field() {
        let mut state = SceneState::new(SceneConfig::default(), 800, 600);
        complete_load(&mut state, Path::new("robot.glb"), Ok(triangle()));
        assert!(state.model.is_some());
        assert_eq!(state.decorated_count(), 0);

        field::generate(&mut state, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(state.decorated_count(), 10);
    }

    #[test]
    fn missing_file_reports_import_error() {
        let result = GltfSource.load(Path::new("does/not/exist.glb"));
        assert!(matches!(result, Err(AssetError::Import { .. })));
    }
}
