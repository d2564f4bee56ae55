use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to import {}: {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("{} contains no mesh primitives", path.display())]
    NoMeshes { path: PathBuf },
    #[error("asset loader for {} stopped before delivering a result", path.display())]
    Disconnected { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("object field was already generated")]
    AlreadyGenerated,
}

/// Failures while bringing up the window and GPU surface.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("surface creation failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface is not supported by the selected adapter")]
    UnsupportedSurface,
}
