//! Task orchestration for assetpipe
//!
//! # Overview
//!
//! - **Graph**: named tasks with dependencies and an action ([`TaskGraph`])
//! - **Dispatch**: pipeline task kinds mapped to their pipelines
//! - **Execution**: dependencies first, parallel groups on a worker pool
//!   ([`TaskRunner`])
//! - **Progress**: task events to the console or as JSON lines
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::{BuildContext, NullProgress, TaskGraph, TaskRunner};
//! use assetpipe::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let graph = TaskGraph::standard();
//! let result = TaskRunner::new(&graph, context, &NullProgress).run(&["build".into()])?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod graph;
pub mod parallel;
pub mod progress;
pub mod result;
pub mod tasks;

pub use context::*;
pub use graph::*;
pub use parallel::*;
pub use progress::*;
pub use result::*;
