// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Checks a conversion job before any archive is touched.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::io::filter::CompiledSelector;
use crate::{BagError, Result};

use super::job::ConversionJob;

/// Validate a job and compile its output selectors.
///
/// The returned selectors are in output order. No file system access
/// happens here.
pub fn validate(job: &ConversionJob) -> Result<Vec<CompiledSelector>> {
    if job.inputs.is_empty() && job.outputs.is_empty() {
        return Err(BagError::validation("no inputs and no outputs given"));
    }
    if job.inputs.is_empty() {
        return Err(BagError::validation("no inputs given"));
    }
    if job.outputs.is_empty() {
        return Err(BagError::validation("no outputs given"));
    }

    let mut input_paths = HashSet::new();
    for (i, input) in job.inputs.iter().enumerate() {
        if input.uri.trim().is_empty() {
            return Err(BagError::validation(format!("input {i} has an empty uri")));
        }
        input_paths.insert(normalize(&input.uri));
    }

    let mut output_paths = HashSet::new();
    let mut selectors = Vec::with_capacity(job.outputs.len());
    for (i, output) in job.outputs.iter().enumerate() {
        let uri = &output.storage.uri;
        if uri.trim().is_empty() {
            return Err(BagError::validation(format!("output {i} has an empty uri")));
        }
        let path = normalize(uri);
        if input_paths.contains(&path) {
            return Err(BagError::validation(format!(
                "output {i} ('{uri}') is also an input"
            )));
        }
        if !output_paths.insert(path) {
            return Err(BagError::validation(format!(
                "output {i} ('{uri}') is used by more than one output"
            )));
        }

        selectors.push(output.selector.compile().map_err(|e| match e {
            BagError::Validation { reason } => {
                BagError::validation(format!("output {i}: {reason}"))
            }
            other => other,
        })?);
    }

    Ok(selectors)
}

/// Lexically normalize a URI so that `out/./a/` and `out/a` compare equal.
fn normalize(uri: &str) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in Path::new(uri).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
