//! Shared data models.
//!
//! [`AssetRecord`] is the canonical record the crate hands back;
//! [`RawAsset`] is the provider-neutral shape each upstream client maps its
//! own response models into before normalization.

mod asset;

pub use asset::{AssetRecord, RawAsset};
