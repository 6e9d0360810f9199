//! Client for an asynchronous media-assembly service.
//!
//! Uploads are submitted to a worker instance as a multipart form post
//! and tracked by polling the assembly's status URL until it completes,
//! aborts, or fails. [`uploader::Uploader`] drives the whole flow;
//! [`poller::AssemblyPoller`] watches an assembly that is already
//! submitted.

pub mod api;
pub mod config;
pub mod events;
pub mod poller;
pub mod resolver;
pub mod uploader;
