//! Filemirror Core - Domain types and configuration
//!
//! This crate holds everything the synchronization engine reasons about
//! without touching the filesystem itself:
//! - **Configuration** - YAML-backed [`config::Config`] with validation and a builder
//! - **Domain types** - [`domain::IdentityKey`], [`domain::FileEntry`], error types
//! - **Port definitions** - [`ports::IFileCopier`], the byte-transfer boundary
//!
//! # Architecture
//!
//! The domain module is pure: key derivation and age arithmetic have no I/O.
//! Ports define the trait interfaces the sync crate implements.

pub mod config;
pub mod domain;
pub mod ports;
