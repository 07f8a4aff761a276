// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signed catalog loaders for the clawee decision core (SPEC_FULL §2, §4.1, §6).
//!
//! Every catalog kind is a plain Rust struct with a loader built on
//! [`signed::load_catalog`]: parse, canonicalize, verify a signature (legacy
//! hex or v2 `{kid,sig}`), and return a [`signed::SignedCatalog`] carrying the
//! normalized rules plus a fingerprint and signing-mode descriptor. Catalogs
//! are published for hot reload behind [`signed::CatalogHandle`], an
//! `ArcSwap` snapshot so readers never observe a torn catalog (SPEC_FULL §5, §9).

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// `ApprovalPolicy`: default quorum plus risk-class/tool/`channel:action` overrides.
pub mod approval_policy;
/// `CapabilityRules`: per-scope tool/action allow/deny lists.
pub mod capability;
/// `DestinationPolicy`: per-channel regex allow/deny lists.
pub mod destination;
/// `ModelRegistry`: approved `(model_id, modality)` entries.
pub mod model_registry;
/// Opaque pass-through catalogs (connector catalog, control tokens).
pub mod opaque;
/// `PolicyRules`: critical/high-risk tool and pattern sets.
pub mod policy;
/// `PricingCatalog`: per-model token pricing.
pub mod pricing;
/// `SignedCatalog<T>`, the verifier dispatch, and the hot-reload handle.
pub mod signed;

pub use approval_policy::{ApprovalPolicy, ApprovalRequirement};
pub use capability::{CapabilityRules, Mode, ScopeRules};
pub use destination::{CompiledDestinationRules, DestinationPolicy, DestinationRulesSource};
pub use model_registry::{Modality, ModelRegistry, ModelRegistryEntry, load_model_registry};
pub use opaque::OpaqueCatalog;
pub use policy::PolicyRules;
pub use pricing::{ModelPrice, PricingCatalog};
pub use signed::{CatalogHandle, SignedCatalog, Verifier, load_catalog, save_catalog};
