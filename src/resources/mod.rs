/**
 * This module contains all logic for loading scenes and images from external files
 * into a scene graph.
 */
pub mod importer;
pub mod texture;

use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;

pub use importer::{GltfImport, import_gltf_slice};

use crate::{
    data_structures::scene_graph::SceneGraph,
    error::{Error, Result},
};

/// Which optional vertex streams the importer keeps, and where relative
/// URIs are resolved from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    pub vertex_colors: bool,
    pub tex_coords: bool,
    pub normals: bool,
    pub tangents: bool,
    pub base_path: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            vertex_colors: true,
            tex_coords: true,
            normals: true,
            tangents: true,
            base_path: None,
        }
    }
}

pub fn load_binary(file_name: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
    let path = file_name.as_ref();
    std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))
}

/// Imports a `.gltf` or `.glb` file into `graph`. Relative URIs resolve
/// against the file's directory unless `options` names a base path.
pub fn load_scene_gltf(
    graph: &mut SceneGraph,
    file_name: impl AsRef<Path>,
    options: &ImportOptions,
) -> anyhow::Result<GltfImport> {
    let path = file_name.as_ref();
    let bytes = load_binary(path)?;
    let mut options = options.clone();
    if options.base_path.is_none() {
        options.base_path = path.parent().map(Path::to_path_buf);
    }
    let import = import_gltf_slice(graph, &bytes, &options)
        .with_context(|| format!("Could not import {}", path.display()))?;
    Ok(import)
}

/// Bytes behind a buffer or image URI: either an embedded base64 data URI or
/// a file relative to `base_path`.
pub(crate) fn resolve_uri(uri: &str, base_path: Option<&Path>) -> Result<Vec<u8>> {
    if uri.starts_with("data:") {
        return decode_data_uri(uri);
    }
    let relative = percent_decode(uri);
    let path = match base_path {
        Some(base) => base.join(&relative),
        None => PathBuf::from(&relative),
    };
    std::fs::read(&path).map_err(|err| Error::parse(format!("cannot read '{}': {err}", path.display())))
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (_, payload) = uri
        .split_once(";base64,")
        .ok_or_else(|| Error::parse(format!("unsupported data URI '{}'", truncated(uri))))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|err| Error::parse(format!("invalid base64 in data URI: {err}")))
}

fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = (bytes[i] == b'%')
            .then(|| uri.get(i + 1..i + 3))
            .flatten()
            .and_then(|digits| u8::from_str_radix(digits, 16).ok());
        match hex {
            Some(byte) => {
                decoded.push(byte);
                i += 3;
            }
            None => {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn truncated(uri: &str) -> &str {
    uri.get(..32).unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_embedded_buffers() {
        let bytes = resolve_uri("data:application/gltf-buffer;base64,AAECAw==", None).unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn rejects_plain_data_uris() {
        let err = resolve_uri("data:text/plain,hello", None).unwrap_err();
        assert_eq!(err.code(), -3);
    }

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(percent_decode("my%20model.bin"), "my model.bin");
        assert_eq!(percent_decode("100%"), "100%");
    }
}
