// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute names shared by logs and metrics.

pub(crate) const CACHE_NAME: &str = "cache.name";
pub(crate) const TIER_NAME: &str = "cache.tier";
pub(crate) const OPERATION_NAME: &str = "cache.operation";
pub(crate) const ACTIVITY_NAME: &str = "cache.activity";
