//! Integration tests for autostack
//!
//! These drive the real `PulumiCli` engine and the `autostack` binary against
//! a scripted stand-in for the `pulumi` CLI that keeps its stacks in a file,
//! so state survives across separate process runs.

#![cfg(unix)]

pub mod bootstrap_flow;
pub mod cli_exit;
