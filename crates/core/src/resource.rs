// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contended domain entities and the per-call resource intent map

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of entity kinds the engine arbitrates access to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Repository,
    RepositoryImporter,
    RepositoryDistributor,
    RepositoryGroup,
    RepositoryGroupDistributor,
    Consumer,
    ConsumerGroup,
    Bind,
    ContentUnit,
    Schedule,
    Cds,
    RepositoryProfileApplicability,
}

impl ResourceType {
    pub const ALL: [ResourceType; 12] = [
        ResourceType::Repository,
        ResourceType::RepositoryImporter,
        ResourceType::RepositoryDistributor,
        ResourceType::RepositoryGroup,
        ResourceType::RepositoryGroupDistributor,
        ResourceType::Consumer,
        ResourceType::ConsumerGroup,
        ResourceType::Bind,
        ResourceType::ContentUnit,
        ResourceType::Schedule,
        ResourceType::Cds,
        ResourceType::RepositoryProfileApplicability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Repository => "repository",
            ResourceType::RepositoryImporter => "repository_importer",
            ResourceType::RepositoryDistributor => "repository_distributor",
            ResourceType::RepositoryGroup => "repository_group",
            ResourceType::RepositoryGroupDistributor => "repository_group_distributor",
            ResourceType::Consumer => "consumer",
            ResourceType::ConsumerGroup => "consumer_group",
            ResourceType::Bind => "bind",
            ResourceType::ContentUnit => "content_unit",
            ResourceType::Schedule => "schedule",
            ResourceType::Cds => "cds",
            ResourceType::RepositoryProfileApplicability => "repository_profile_applicability",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors parsing resource specifications
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseResourceError {
    #[error("unknown resource type: {0}")]
    UnknownType(String),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("malformed resource `{0}`, expected type:id or type:id=operation")]
    Malformed(String),
}

impl FromStr for ResourceType {
    type Err = ParseResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseResourceError::UnknownType(s.to_string()))
    }
}

/// A `(type, id)` pair identifying one contended entity
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl ResourceKey {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}

impl FromStr for ResourceKey {
    type Err = ParseResourceError;

    /// Parse `repository:zoo`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| ParseResourceError::Malformed(s.to_string()))?;
        Ok(ResourceKey::new(kind.parse()?, id))
    }
}

/// Resource intent of one call: `resource_type -> resource_id -> operation`
///
/// Declaring the same resource twice keeps the last operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(BTreeMap<ResourceType, BTreeMap<String, Operation>>);

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) the operation on a resource
    pub fn insert(
        &mut self,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        operation: Operation,
    ) {
        self.0
            .entry(resource_type)
            .or_default()
            .insert(resource_id.into(), operation);
    }

    pub fn with(
        mut self,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        self.insert(resource_type, resource_id, operation);
        self
    }

    pub fn get(&self, resource_type: ResourceType, resource_id: &str) -> Option<Operation> {
        self.0
            .get(&resource_type)
            .and_then(|ids| ids.get(resource_id))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|ids| ids.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.values().map(|ids| ids.len()).sum()
    }

    /// Every declared `(key, operation)` pair, ordered by type then id
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKey, Operation)> + '_ {
        self.0.iter().flat_map(|(kind, ids)| {
            ids.iter()
                .map(move |(id, op)| (ResourceKey::new(*kind, id.clone()), *op))
        })
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.iter().map(|(key, _)| key).collect()
    }

    /// Parse `repository:zoo=update`
    pub fn parse_entry(s: &str) -> Result<(ResourceKey, Operation), ParseResourceError> {
        let (key, op) = s
            .rsplit_once('=')
            .ok_or_else(|| ParseResourceError::Malformed(s.to_string()))?;
        let operation = op
            .parse()
            .map_err(|_| ParseResourceError::UnknownOperation(op.to_string()))?;
        Ok((key.parse()?, operation))
    }
}

impl FromIterator<(ResourceKey, Operation)> for Resources {
    fn from_iter<T: IntoIterator<Item = (ResourceKey, Operation)>>(iter: T) -> Self {
        let mut resources = Resources::new();
        for (key, op) in iter {
            resources.insert(key.resource_type, key.resource_id, op);
        }
        resources
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
