// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Topic selection for output archives.
//!
//! A [`TopicSelector`] is the user-facing rule set of one output: an
//! inclusion list and an exclusion pattern. Before a job starts it is
//! compiled into a [`CompiledSelector`], which is what the router
//! evaluates for every record.
//!
//! Precedence:
//! 1. A non-empty inclusion list drops every topic not in it.
//! 2. The exclusion pattern drops topics it fully matches, except topics
//!    that are explicitly included.
//! 3. Everything else passes.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{BagError, Result};

/// Topic selection rules of one output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSelector {
    /// Topics to include; empty means "all topics"
    pub topics: Vec<String>,
    /// Regular expression over topic names to exclude
    pub exclude: Option<String>,
}

impl TopicSelector {
    /// Select every topic.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select only the listed topics.
    pub fn include<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            exclude: None,
        }
    }

    /// Exclude topics matching a regular expression.
    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            topics: Vec::new(),
            exclude: Some(pattern.into()),
        }
    }

    /// Set the exclusion pattern.
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }

    /// Compile the exclusion pattern and index the inclusion list.
    ///
    /// The pattern must match the whole topic name, so it is anchored on
    /// both ends. An empty pattern is treated as "no exclusion".
    pub fn compile(&self) -> Result<CompiledSelector> {
        let exclude = match self.exclude.as_deref() {
            None | Some("") => None,
            Some(pattern) => Some(Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                BagError::validation(format!("invalid exclude pattern '{pattern}': {e}"))
            })?),
        };

        Ok(CompiledSelector {
            include: self.topics.iter().cloned().collect(),
            exclude,
        })
    }
}

/// A selector ready for per-record evaluation.
#[derive(Clone, Default)]
pub struct CompiledSelector {
    include: HashSet<String>,
    exclude: Option<Regex>,
}

impl fmt::Debug for CompiledSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSelector")
            .field("include", &self.include)
            .field("exclude", &self.exclude.as_ref().map(|re| re.as_str()))
            .finish()
    }
}

impl CompiledSelector {
    /// Check if a topic is routed to this output.
    pub fn matches(&self, topic: &str) -> bool {
        matches(topic, self)
    }

    /// Check if the selector passes every topic.
    pub fn is_all(&self) -> bool {
        self.include.is_empty() && self.exclude.is_none()
    }
}

/// Decide whether `topic` passes `selector`.
pub fn matches(topic: &str, selector: &CompiledSelector) -> bool {
    let explicitly_included = selector.include.contains(topic);
    if !selector.include.is_empty() && !explicitly_included {
        return false;
    }
    match &selector.exclude {
        Some(re) if re.is_match(topic) => explicitly_included,
        _ => true,
    }
}
