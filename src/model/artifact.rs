//! Versioned JSON artifact: `{format_version, checksum, params}`.
//! The loader refuses unknown formats and checksum mismatches instead of
//! guessing at what the weights mean.

use super::ModelParameters;
use crate::error::{Result, StrokeError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Bump when the artifact layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct Header {
    format_version: u32,
}

#[derive(Serialize, Deserialize)]
struct Artifact {
    format_version: u32,
    checksum: String,
    params: ModelParameters,
}

fn checksum(params: &ModelParameters) -> Result<String> {
    let bytes = serde_json::to_vec(params)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn unavailable(path: &Path, msg: impl std::fmt::Display) -> StrokeError {
    StrokeError::ModelUnavailable(format!("{}: {}", path.display(), msg))
}

/// Write atomically: temp file next to the target, then rename over it.
pub fn save(params: &ModelParameters, path: &Path) -> Result<()> {
    params.validate()?;
    let artifact = Artifact {
        format_version: FORMAT_VERSION,
        checksum: checksum(params)?,
        params: params.clone(),
    };
    let data = serde_json::to_vec_pretty(&artifact)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;

    info!(path = %path.display(), model_id = %params.model_id, "model artifact saved");
    Ok(())
}

pub fn load(path: &Path) -> Result<ModelParameters> {
    let data = std::fs::read(path).map_err(|e| unavailable(path, e))?;

    let header: Header = serde_json::from_slice(&data).map_err(|e| unavailable(path, e))?;
    if header.format_version != FORMAT_VERSION {
        return Err(unavailable(
            path,
            format!(
                "artifact format v{} is not supported (expected v{})",
                header.format_version, FORMAT_VERSION
            ),
        ));
    }

    let artifact: Artifact = serde_json::from_slice(&data).map_err(|e| unavailable(path, e))?;
    if checksum(&artifact.params)? != artifact.checksum {
        return Err(unavailable(path, "checksum mismatch"));
    }
    artifact.params.validate()?;

    info!(
        path = %path.display(),
        model_id = %artifact.params.model_id,
        schema_version = artifact.params.schema_version,
        "model artifact loaded"
    );
    Ok(artifact.params)
}
