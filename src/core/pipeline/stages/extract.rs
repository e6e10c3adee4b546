#![allow(clippy::result_large_err)]

use crate::core::artifacts::{ArtifactKind, ArtifactSet};
use crate::core::error::AppError;
use crate::core::pipeline::parameters::JobParameters;
use crate::core::pipeline::result::{PartialResult, PipelineResult};
use crate::core::pipeline::stage::{Stage, StageId};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Decodes the uploaded package and pulls out its single XTF.
#[derive(Default)]
pub struct ExtractInputZip;

impl ExtractInputZip {
    pub fn new() -> Self {
        ExtractInputZip
    }
}

#[async_trait]
impl Stage for ExtractInputZip {
    fn id(&self) -> StageId {
        StageId::ExtractInputZip
    }

    async fn run(
        &self,
        params: &JobParameters,
        artifacts: &mut ArtifactSet,
        _result: &PipelineResult,
    ) -> Result<PartialResult, AppError> {
        let encoded: String = params
            .base()
            .zip_file
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let package = match STANDARD.decode(encoded.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                return Ok(PartialResult::failed(format!(
                    "The sent file is not valid base64: {}",
                    err
                )))
            }
        };
        artifacts.save_working(ArtifactKind::InputZip, &package)?;

        let xtf = match single_xtf(&package) {
            Ok(bytes) => bytes,
            Err(message) => return Ok(PartialResult::failed(message)),
        };
        let location = artifacts.save_and_publish(ArtifactKind::InputXtf, &xtf)?;
        tracing::debug!(bytes = xtf.len(), location = %location, "input xtf extracted");

        Ok(PartialResult::new().with(ArtifactKind::InputXtf.result_key(), location))
    }
}

/// Bytes of the only `*.xtf` entry; the error is the user-facing failure message.
pub fn single_xtf(package: &[u8]) -> Result<Vec<u8>, String> {
    let mut archive = ZipArchive::new(Cursor::new(package))
        .map_err(|_| "The sent file was not a valid zip.".to_string())?;

    let mut xtf_indices = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|err| format!("The sent zip could not be read: {}", err))?;
        if !entry.is_dir() && entry.name().to_lowercase().ends_with(".xtf") {
            xtf_indices.push(index);
        }
    }

    match xtf_indices.as_slice() {
        [] => Err("The sent zip does not contain an XTF.".to_string()),
        [index] => {
            let mut entry = archive
                .by_index(*index)
                .map_err(|err| format!("The sent zip could not be read: {}", err))?;
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|err| format!("The sent zip could not be read: {}", err))?;
            Ok(bytes)
        }
        _ => Err("The sent zip contains more than 1 XTF.".to_string()),
    }
}
