//! assetpipe - Asset pipeline for static sites
//!
//! This library provides functionality to:
//! - Compile, prefix and minify stylesheets, with source maps
//! - Concatenate and minify scripts
//! - Copy fonts and optimize images
//! - Lint style and script sources
//! - Run named tasks in series or in parallel
//! - Watch sources and serve the site with live reload

pub mod build;
pub mod clean;
pub mod cli;
pub mod config;
pub mod error;
pub mod lint;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod preflight;
pub mod report;
pub mod serve;
pub mod watch;
