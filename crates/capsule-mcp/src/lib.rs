//! # Capsule MCP Server
//!
//! Model Context Protocol (MCP) server for Capsule CRM.
//!
//! Exposes common Capsule actions (contact search and creation, notes,
//! tasks, cases, projects, opportunities, and account configuration) as MCP
//! tools so that AI assistants can read and update a sales pipeline, plus a
//! `calculate_sold_project_days` tool that allocates sold engineer-days to a
//! calendar month.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with stdio transport (for Claude Desktop)
//! CAPSULE_API_TOKEN=... capsule-mcp-server
//!
//! # Run with HTTP transport (for remote hosting)
//! CAPSULE_API_TOKEN=... capsule-mcp-server --http --port 8080
//! ```

#![warn(missing_docs)]

pub mod server;

pub use server::CapsuleMcpServer;

/// Server name for the MCP protocol.
pub const SERVER_NAME: &str = "capsule-mcp";

/// Server version (same as crate version).
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
